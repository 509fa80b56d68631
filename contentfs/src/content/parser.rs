//! Content directory definition parser.
//!
//! Parses the small declarative `Content.inf` format describing one or
//! more content directories:
//!
//! ```text
//! ContentDefinition
//!     Label       "mod"
//!     Description "An example mod"
//!     Version     "0.2.0"
//!     Prerequisites [
//!         File "base" = "1.0.0"
//!     ]
//!     Retain [
//!         "scripting/species/override.txt"
//!     ]
//! ```
//!
//! Keywords are bare words, values are double-quoted strings, and the
//! bracketed list forms collapse to a single unbracketed entry. The
//! format has no comment syntax. A syntax error aborts the current
//! definition and reports file, line, and column; parsing resumes at the
//! next `ContentDefinition` keyword so one bad block does not take down
//! the rest of the file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::dir::ContentDir;

/// Definition parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Malformed input at a known position.
    #[error("{file}:{line}:{column}: {message}")]
    Syntax {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// The definition file could not be read at all.
    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of parsing one definition source: every block that parsed,
/// plus every error that aborted a block.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub dirs: Vec<ContentDir>,
    pub errors: Vec<ParseError>,
}

/// Parse a definition file from disk.
///
/// A leading UTF-8 byte order mark is accepted. Read failures abort the
/// whole file; syntax failures abort single blocks and are collected in
/// the returned outcome.
pub fn parse_definition_file(path: &Path) -> Result<ParseOutcome, ParseError> {
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        file: path.display().to_string(),
        source,
    })?;

    let stripped = bytes
        .strip_prefix(&[0xEF, 0xBB, 0xBF][..])
        .unwrap_or(&bytes);
    let source = String::from_utf8_lossy(stripped);
    Ok(parse_definitions(&source, &path.display().to_string()))
}

/// Parse definition text. `origin` names the source in error messages.
pub fn parse_definitions(source: &str, origin: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let lexed = lex(source, origin, &mut outcome.errors);

    let mut parser = Parser {
        tokens: &lexed.tokens,
        pos: 0,
        origin,
        end_line: lexed.end_line,
        end_column: lexed.end_column,
    };

    while parser.peek().is_some() {
        let start = parser.pos;
        match parser.parse_definition() {
            Ok(dir) => outcome.dirs.push(dir),
            Err(error) => {
                outcome.errors.push(error);
                if parser.pos == start {
                    parser.pos += 1;
                }
                parser.skip_to_next_definition();
            }
        }
    }

    outcome
}

//      ##      Lexer         ##

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare keyword like `ContentDefinition` or `File`.
    Word(String),
    /// Double-quoted string value.
    Text(String),
    OpenBracket,
    CloseBracket,
    Equals,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("keyword {word:?}"),
            Token::Text(text) => format!("string {text:?}"),
            Token::OpenBracket => "'['".to_string(),
            Token::CloseBracket => "']'".to_string(),
            Token::Equals => "'='".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: u32,
    column: u32,
}

struct Lexed {
    tokens: Vec<Spanned>,
    end_line: u32,
    end_column: u32,
}

fn lex(source: &str, origin: &str, errors: &mut Vec<ParseError>) -> Lexed {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1u32;
    let mut column = 1u32;

    macro_rules! bump {
        ($c:expr) => {
            if $c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        };
    }

    while let Some(&c) = chars.peek() {
        let (token_line, token_column) = (line, column);

        if c.is_whitespace() {
            chars.next();
            bump!(c);
            continue;
        }

        if c == '[' || c == ']' || c == '=' {
            chars.next();
            bump!(c);
            let token = match c {
                '[' => Token::OpenBracket,
                ']' => Token::CloseBracket,
                _ => Token::Equals,
            };
            tokens.push(Spanned {
                token,
                line: token_line,
                column: token_column,
            });
            continue;
        }

        if c == '"' {
            chars.next();
            bump!(c);
            let mut text = String::new();
            let mut terminated = false;
            while let Some(&inner) = chars.peek() {
                chars.next();
                bump!(inner);
                match inner {
                    '"' => {
                        terminated = true;
                        break;
                    }
                    '\\' => {
                        if let Some(&escaped) = chars.peek() {
                            chars.next();
                            bump!(escaped);
                            match escaped {
                                '"' | '\\' => text.push(escaped),
                                other => {
                                    text.push('\\');
                                    text.push(other);
                                }
                            }
                        }
                    }
                    other => text.push(other),
                }
            }
            if terminated {
                tokens.push(Spanned {
                    token: Token::Text(text),
                    line: token_line,
                    column: token_column,
                });
            } else {
                errors.push(ParseError::Syntax {
                    file: origin.to_string(),
                    line: token_line,
                    column: token_column,
                    message: "unterminated string".to_string(),
                });
            }
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            let mut word = String::new();
            while let Some(&inner) = chars.peek() {
                if inner.is_alphanumeric() || inner == '_' {
                    word.push(inner);
                    chars.next();
                    bump!(inner);
                } else {
                    break;
                }
            }
            tokens.push(Spanned {
                token: Token::Word(word),
                line: token_line,
                column: token_column,
            });
            continue;
        }

        // Anything else (including would-be comment markers) is rejected.
        chars.next();
        bump!(c);
        errors.push(ParseError::Syntax {
            file: origin.to_string(),
            line: token_line,
            column: token_column,
            message: format!("unexpected character {c:?}"),
        });
    }

    Lexed {
        tokens,
        end_line: line,
        end_column: column,
    }
}

//      ##      Parser         ##

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    origin: &'a str,
    end_line: u32,
    end_column: u32,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn at_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Spanned { token: Token::Word(w), .. }) if w == word)
    }

    fn error_here(&self, message: String) -> ParseError {
        let (line, column) = self
            .peek()
            .map(|spanned| (spanned.line, spanned.column))
            .unwrap_or((self.end_line, self.end_column));
        ParseError::Syntax {
            file: self.origin.to_string(),
            line,
            column,
            message,
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(Spanned { token: Token::Word(word), .. }) if word == keyword => {
                self.pos += 1;
                Ok(())
            }
            Some(spanned) => Err(self.error_here(format!(
                "expected keyword {:?}, found {}",
                keyword,
                spanned.token.describe()
            ))),
            None => Err(self.error_here(format!(
                "expected keyword {keyword:?}, found end of input"
            ))),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek() {
            Some(Spanned { token: Token::Text(text), .. }) => {
                let text = text.clone();
                self.pos += 1;
                Ok(text)
            }
            Some(spanned) => Err(self.error_here(format!(
                "expected {} string, found {}",
                what,
                spanned.token.describe()
            ))),
            None => Err(self.error_here(format!("expected {what} string, found end of input"))),
        }
    }

    fn skip_to_next_definition(&mut self) {
        while let Some(spanned) = self.peek() {
            if matches!(&spanned.token, Token::Word(word) if word == "ContentDefinition") {
                break;
            }
            self.pos += 1;
        }
    }

    fn parse_definition(&mut self) -> Result<ContentDir, ParseError> {
        self.expect_keyword("ContentDefinition")?;

        self.expect_keyword("Label")?;
        let label = self.expect_string("label")?;

        self.expect_keyword("Description")?;
        let description = self.expect_string("description")?;

        self.expect_keyword("Version")?;
        let version = self.expect_string("version")?;

        let mut requires = BTreeMap::new();
        if self.at_word("Prerequisites") {
            self.pos += 1;
            self.parse_prerequisites(&mut requires)?;
        }

        let mut explicit_paths = BTreeSet::new();
        if self.at_word("Retain") {
            self.pos += 1;
            self.parse_explicit_paths(&mut explicit_paths)?;
        }

        Ok(ContentDir::new(
            label,
            description,
            &version,
            requires,
            explicit_paths,
        ))
    }

    fn parse_prerequisites(
        &mut self,
        requires: &mut BTreeMap<String, String>,
    ) -> Result<(), ParseError> {
        if matches!(self.peek(), Some(Spanned { token: Token::OpenBracket, .. })) {
            self.pos += 1;
            let mut count = 0;
            while self.at_word("File") {
                self.parse_prereq(requires)?;
                count += 1;
            }
            if count == 0 {
                return Err(self.error_here("expected at least one prerequisite".to_string()));
            }
            match self.peek() {
                Some(Spanned { token: Token::CloseBracket, .. }) => {
                    self.pos += 1;
                    Ok(())
                }
                _ => Err(self.error_here("expected ']' after prerequisites".to_string())),
            }
        } else {
            self.parse_prereq(requires)
        }
    }

    fn parse_prereq(&mut self, requires: &mut BTreeMap<String, String>) -> Result<(), ParseError> {
        self.expect_keyword("File")?;
        let label = self.expect_string("prerequisite label")?;

        let version = if matches!(self.peek(), Some(Spanned { token: Token::Equals, .. })) {
            self.pos += 1;
            self.expect_string("prerequisite version")?
        } else {
            // No constraint clause: accept any version.
            String::new()
        };

        requires.entry(label).or_insert(version);
        Ok(())
    }

    fn parse_explicit_paths(
        &mut self,
        explicit_paths: &mut BTreeSet<PathBuf>,
    ) -> Result<(), ParseError> {
        if matches!(self.peek(), Some(Spanned { token: Token::OpenBracket, .. })) {
            self.pos += 1;
            let mut count = 0;
            while let Some(Spanned { token: Token::Text(_), .. }) = self.peek() {
                let path = self.expect_string("retained path")?;
                explicit_paths.insert(PathBuf::from(path));
                count += 1;
            }
            if count == 0 {
                return Err(self.error_here("expected at least one retained path".to_string()));
            }
            match self.peek() {
                Some(Spanned { token: Token::CloseBracket, .. }) => {
                    self.pos += 1;
                    Ok(())
                }
                _ => Err(self.error_here("expected ']' after retained paths".to_string())),
            }
        } else {
            let path = self.expect_string("retained path")?;
            explicit_paths.insert(PathBuf::from(path));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        ContentDefinition
            Label       "mod"
            Description "An example mod"
            Version     "0.2.0"
            Prerequisites [
                File "base" = "1.0.0"
                File "art"
            ]
            Retain [
                "scripting/species/override.txt"
                "data/tables.txt"
            ]
    "#;

    #[test]
    fn test_parse_full_definition() {
        let outcome = parse_definitions(FULL, "test");
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.dirs.len(), 1);

        let dir = &outcome.dirs[0];
        assert_eq!(dir.label(), "mod");
        assert_eq!(dir.description(), "An example mod");
        assert_eq!(dir.version().minor, 2);
        assert_eq!(dir.requires().get("base").unwrap(), "1.0.0");
        // No '=' clause records an empty constraint (accept any).
        assert_eq!(dir.requires().get("art").unwrap(), "");
        assert!(dir.is_explicit(Path::new("scripting/species/override.txt")));
        assert!(dir.is_explicit(Path::new("data/tables.txt")));
        assert!(dir.path().as_os_str().is_empty());
    }

    #[test]
    fn test_parse_minimal_definition() {
        let outcome = parse_definitions(
            r#"ContentDefinition Label "base" Description "Base assets" Version "1.0.0""#,
            "test",
        );
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.dirs.len(), 1);
        assert!(outcome.dirs[0].requires().is_empty());
        assert!(outcome.dirs[0].explicit_paths().is_empty());
    }

    #[test]
    fn test_parse_unbracketed_forms() {
        let outcome = parse_definitions(
            r#"
            ContentDefinition
                Label "patch"
                Description "p"
                Version "1.0.1"
                Prerequisites File "base"
                Retain "a/b.txt"
            "#,
            "test",
        );
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        let dir = &outcome.dirs[0];
        assert!(dir.requires().contains_key("base"));
        assert!(dir.is_explicit(Path::new("a/b.txt")));
    }

    #[test]
    fn test_parse_multiple_definitions() {
        let source = r#"
            ContentDefinition Label "one" Description "" Version "1.0.0"
            ContentDefinition Label "two" Description "" Version "2.0.0"
        "#;
        let outcome = parse_definitions(source, "test");
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.dirs.len(), 2);
        assert_eq!(outcome.dirs[0].label(), "one");
        assert_eq!(outcome.dirs[1].label(), "two");
    }

    #[test]
    fn test_error_recovery_at_next_definition() {
        let source = r#"
            ContentDefinition Label "broken" Version "1.0.0"
            ContentDefinition Label "good" Description "" Version "1.0.0"
        "#;
        let outcome = parse_definitions(source, "test");
        // The first block is missing Description; the second still parses.
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.dirs.len(), 1);
        assert_eq!(outcome.dirs[0].label(), "good");
    }

    #[test]
    fn test_error_carries_position() {
        let outcome = parse_definitions("ContentDefinition Label 42", "species.inf");
        assert_eq!(outcome.dirs.len(), 0);
        let message = outcome.errors[0].to_string();
        assert!(message.starts_with("species.inf:1:"), "{message}");
        assert!(message.contains("expected label string"), "{message}");
    }

    #[test]
    fn test_unterminated_string_is_reported() {
        let outcome = parse_definitions(r#"ContentDefinition Label "oops"#, "test");
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.to_string().contains("unterminated string")));
    }

    #[test]
    fn test_comments_are_rejected() {
        let outcome = parse_definitions(
            "# not a comment\nContentDefinition Label \"x\" Description \"\" Version \"1\"",
            "test",
        );
        assert!(outcome
            .errors
            .iter()
            .any(|e| e.to_string().contains("unexpected character")));
        // The definition after the bad character still parses.
        assert_eq!(outcome.dirs.len(), 1);
    }

    #[test]
    fn test_empty_bracketed_list_is_an_error() {
        let outcome = parse_definitions(
            r#"ContentDefinition Label "x" Description "" Version "1" Prerequisites [ ]"#,
            "test",
        );
        assert!(!outcome.errors.is_empty());
        assert!(outcome.errors[0]
            .to_string()
            .contains("at least one prerequisite"));
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let outcome = parse_definitions(
            r#"ContentDefinition Label "with \"quotes\"" Description "" Version "1""#,
            "test",
        );
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.dirs[0].label(), "with \"quotes\"");
    }

    #[test]
    fn test_parse_definition_file_with_bom() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("Content.inf");
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(
            br#"ContentDefinition Label "base" Description "" Version "1.0.0""#,
        );
        std::fs::write(&path, bytes).unwrap();

        let outcome = parse_definition_file(&path).unwrap();
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.dirs[0].label(), "base");
    }

    #[test]
    fn test_parse_definition_file_missing_is_io_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = parse_definition_file(&temp.path().join("nope.inf"));
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }
}
