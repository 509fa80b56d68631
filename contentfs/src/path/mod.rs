//! Path element classification and normalization.
//!
//! The rest of the crate never compares raw path strings: every lookup
//! key goes through [`normalize`] first, and every structural decision
//! (what a fragment *is*) goes through [`classify`].

mod element;
mod normalize;

pub use element::{
    classify, is_invalid_sentinel, is_relative_marker, PathElement, INVALID_TOKEN,
    RELATIVE_ROOT_TOKEN,
};
pub use normalize::{normalize, normalized_path, NormalizedPath, NORMALIZE_CACHE_CAPACITY};
