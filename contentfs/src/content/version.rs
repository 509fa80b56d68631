//! Content directory versions.
//!
//! Definition files carry a semantic version plus free-form errata text
//! (`1.2.3-rc1`). Parsing is deliberately lenient: whatever does not
//! convert to a number ends up in the errata, and parsing never fails.

use std::fmt;

/// A `major.minor.patch` version with free-form errata.
///
/// Ordering is lexicographic over `(major, minor, patch, errata)`, which
/// is what prerequisite minimum-version checks compare.
///
/// # Example
///
/// ```
/// use contentfs::content::ContentVersion;
///
/// let version = ContentVersion::parse("1.2.3-rc1");
/// assert_eq!(version.major, 1);
/// assert_eq!(version.minor, 2);
/// assert_eq!(version.patch, 3);
/// assert_eq!(version.errata, "-rc1");
/// assert_eq!(version.to_string(), "1.2.3-rc1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub errata: String,
}

impl Default for ContentVersion {
    /// The version assumed for definitions that carry none: `0.0.1`.
    fn default() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 1,
            errata: String::new(),
        }
    }
}

/// Split off the leading decimal digits of `text`.
fn leading_number(text: &str) -> Option<(u32, &str)> {
    let digits = text.len() - text.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let value = text[..digits].parse().ok()?;
    Some((value, &text[digits..]))
}

impl ContentVersion {
    pub fn new(major: u32, minor: u32, patch: u32, errata: impl Into<String>) -> Self {
        Self {
            major,
            minor,
            patch,
            errata: errata.into(),
        }
    }

    /// Parse a version string, never failing.
    ///
    /// Components are read as dot-separated numbers. The first component
    /// that does not start with a digit stops numeric parsing and becomes
    /// the errata; text trailing the patch number (like `-rc1`) becomes
    /// the errata verbatim. Unparsed components keep their defaults.
    pub fn parse(text: &str) -> Self {
        let mut version = Self::default();
        let mut parts = text.splitn(3, '.');

        match parts.next().and_then(leading_number) {
            Some((major, _)) => version.major = major,
            None => {
                version.errata = text.to_string();
                return version;
            }
        }

        let Some(minor_part) = parts.next() else {
            return version;
        };
        match leading_number(minor_part) {
            Some((minor, _)) => version.minor = minor,
            None => {
                version.errata = minor_part.to_string();
                return version;
            }
        }

        let Some(patch_part) = parts.next() else {
            return version;
        };
        match leading_number(patch_part) {
            Some((patch, rest)) => {
                version.patch = patch;
                version.errata = rest.to_string();
            }
            None => version.errata = patch_part.to_string(),
        }

        version
    }
}

impl fmt::Display for ContentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.major, self.minor, self.patch, self.errata
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_version() {
        let version = ContentVersion::parse("2.10.4");
        assert_eq!(version, ContentVersion::new(2, 10, 4, ""));
    }

    #[test]
    fn test_parse_with_errata() {
        let version = ContentVersion::parse("1.2.3-rc1");
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 2);
        assert_eq!(version.patch, 3);
        assert_eq!(version.errata, "-rc1");
    }

    #[test]
    fn test_parse_non_numeric_becomes_errata() {
        let version = ContentVersion::parse("unstable");
        assert_eq!(version.major, 0);
        assert_eq!(version.minor, 0);
        assert_eq!(version.patch, 1);
        assert_eq!(version.errata, "unstable");
    }

    #[test]
    fn test_parse_partial_versions_keep_defaults() {
        let version = ContentVersion::parse("3");
        assert_eq!(version, ContentVersion::new(3, 0, 1, ""));

        let version = ContentVersion::parse("3.5");
        assert_eq!(version, ContentVersion::new(3, 5, 1, ""));
    }

    #[test]
    fn test_parse_bad_minor_stops_numeric_parsing() {
        let version = ContentVersion::parse("1.x.3");
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 0);
        assert_eq!(version.errata, "x");
    }

    #[test]
    fn test_ordering() {
        let parse = ContentVersion::parse;
        assert!(parse("1.0.0") < parse("2.0.0"));
        assert!(parse("1.2.0") < parse("1.10.0"));
        assert!(parse("1.2.3") < parse("1.2.4"));
        // Errata participates last and compares lexicographically.
        assert!(parse("1.2.3") < parse("1.2.3-rc1"));
        assert_eq!(parse("1.2.3"), parse("1.2.3"));
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(ContentVersion::parse("1.2.3-rc1").to_string(), "1.2.3-rc1");
        assert_eq!(ContentVersion::parse("0.4.0").to_string(), "0.4.0");
        assert_eq!(ContentVersion::default().to_string(), "0.0.1");
    }
}
