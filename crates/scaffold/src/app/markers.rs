//! Locating marker comments in source text.
//!
//! A marker is a whole line consisting of optional indentation, the comment token, optional
//! whitespace, the marker prefix, and the marker name:
//!
//! ```text
//!     // MARK:REPOS:START
//! ```
//!
//! Block markers come in `<NAME>:START` / `<NAME>:END` pairs.

use std::ops::Range;

use regex::Regex;

use crate::domain::errors::{ScaffoldError, ScaffoldResult};
use crate::infra::config::MarkersConfig;

pub const START_SUFFIX: &str = ":START";
pub const END_SUFFIX: &str = ":END";

/// Standard block names emitted by the project templates.
pub mod blocks {
    pub const MODELS: &str = "MODELS";
    pub const REPOS: &str = "REPOS";
    pub const SERVICES: &str = "SERVICES";
    pub const CONTROLLERS: &str = "CONTROLLERS";
    pub const ROUTES: &str = "ROUTES";
    pub const IMPORTS: &str = "IMPORTS";
    pub const RELATIONSHIPS: &str = "RELATIONSHIPS";
    pub const NAV_ITEMS: &str = "NAV_ITEMS";
}

/// Name of the opening marker of a block, e.g. `REPOS:START`.
pub fn start_of(block: &str) -> String {
    format!("{block}{START_SUFFIX}")
}

/// Name of the closing marker of a block, e.g. `REPOS:END`.
pub fn end_of(block: &str) -> String {
    format!("{block}{END_SUFFIX}")
}

/// Comment conventions used to spell markers in a file.
///
/// The line pattern is compiled once per syntax and shared by every lookup.
#[derive(Debug, Clone)]
pub struct MarkerSyntax {
    comment_token: String,
    prefix: String,
    line: Regex,
}

impl Default for MarkerSyntax {
    fn default() -> Self {
        Self::new("//", "MARK:")
    }
}

impl PartialEq for MarkerSyntax {
    fn eq(&self, other: &Self) -> bool {
        self.comment_token == other.comment_token && self.prefix == other.prefix
    }
}

impl Eq for MarkerSyntax {}

impl MarkerSyntax {
    pub fn new(comment_token: impl Into<String>, prefix: impl Into<String>) -> Self {
        let comment_token = comment_token.into();
        let prefix = prefix.into();
        let line = line_pattern(&comment_token, &prefix);
        Self {
            comment_token,
            prefix,
            line,
        }
    }

    pub fn from_config(config: &MarkersConfig) -> Self {
        Self::new(config.comment_token(), config.prefix())
    }

    pub fn comment_token(&self) -> &str {
        &self.comment_token
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Render the literal marker line (without indentation) for `name`.
    pub fn render(&self, name: &str) -> String {
        format!("{} {}{}", self.comment_token, self.prefix, name)
    }
}

/// Matches any marker line; group 1 is the indentation, group 2 the marker name.
fn line_pattern(comment_token: &str, prefix: &str) -> Regex {
    let pattern = format!(
        r"(?m)^([ \t]*){}[ \t]*{}(\S+)[ \t]*\r?$",
        regex::escape(comment_token),
        regex::escape(prefix),
    );
    // Every interpolated piece is escaped, so the pattern always compiles.
    Regex::new(&pattern).unwrap_or_else(|_| unreachable!("escaped marker pattern"))
}

/// Position of a marker line inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLocation {
    /// Byte range of the marker line, excluding the line terminator.
    pub range: Range<usize>,
    /// Offset just past the line terminator (or the end of the text on the last line).
    pub line_end: usize,
    /// Leading whitespace captured from the marker line.
    pub indent: String,
    /// Terminator used by the marker line: `"\r\n"` for CRLF files, `"\n"` otherwise.
    pub line_break: &'static str,
}

impl MarkerLocation {
    pub fn offset(&self) -> usize {
        self.range.start
    }
}

/// Read-only scanner over a text buffer.
#[derive(Debug, Clone, Copy)]
pub struct MarkerLocator<'a> {
    syntax: &'a MarkerSyntax,
}

impl<'a> MarkerLocator<'a> {
    pub fn new(syntax: &'a MarkerSyntax) -> Self {
        Self { syntax }
    }

    /// Find the first line spelling the marker `name`.
    pub fn locate(&self, text: &str, name: &str) -> ScaffoldResult<MarkerLocation> {
        let captures = self
            .syntax
            .line
            .captures_iter(text)
            .find(|captures| captures.get(2).is_some_and(|found| found.as_str() == name))
            .ok_or_else(|| ScaffoldError::marker_not_found(name))?;
        let (Some(line), Some(indent)) = (captures.get(0), captures.get(1)) else {
            return Err(ScaffoldError::marker_not_found(name));
        };

        let crlf = line.as_str().ends_with('\r');
        let range = if crlf {
            line.start()..line.end() - 1
        } else {
            line.range()
        };
        let line_end = match text[line.end()..].find('\n') {
            Some(pos) => line.end() + pos + 1,
            None => text.len(),
        };

        Ok(MarkerLocation {
            range,
            line_end,
            indent: indent.as_str().to_owned(),
            line_break: if crlf { "\r\n" } else { "\n" },
        })
    }

    /// Locate both markers of a pair and check that `start` precedes `end`.
    pub fn locate_pair(
        &self,
        text: &str,
        start: &str,
        end: &str,
    ) -> ScaffoldResult<(MarkerLocation, MarkerLocation)> {
        let start_loc = self.locate(text, start)?;
        let end_loc = self.locate(text, end)?;
        if end_loc.offset() <= start_loc.offset() {
            return Err(ScaffoldError::MarkerOrderInvalid {
                start: start.to_owned(),
                end: end.to_owned(),
            });
        }
        Ok((start_loc, end_loc))
    }

    pub fn contains(&self, text: &str, name: &str) -> bool {
        self.names(text).any(|found| found == name)
    }

    /// Returns `true` only when both markers of the pair are present.
    pub fn has_pair(&self, text: &str, start: &str, end: &str) -> bool {
        self.contains(text, start) && self.contains(text, end)
    }

    /// Names of every marker line in document order.
    pub fn list(&self, text: &str) -> Vec<String> {
        self.names(text).map(str::to_owned).collect()
    }

    fn names<'t>(&self, text: &'t str) -> impl Iterator<Item = &'t str> {
        self.syntax
            .line
            .captures_iter(text)
            .filter_map(|captures| captures.get(2).map(|name| name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = "func main() {\n\t// MARK:REPOS:START\n\t// MARK:REPOS:END\n}\n";

    #[test]
    fn locates_marker_with_indentation() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let loc = locator.locate(MAIN, "REPOS:END").unwrap();
        assert_eq!(loc.indent, "\t");
        assert_eq!(&MAIN[loc.range.clone()], "\t// MARK:REPOS:END");
        assert_eq!(&MAIN[loc.line_end..], "}\n");
    }

    #[test]
    fn does_not_match_longer_marker_names() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let text = "// MARK:ROUTES:PUBLIC:START\n";
        assert!(locator.locate(text, "ROUTES:START").is_err());
        assert!(locator.contains(text, "ROUTES:PUBLIC:START"));
    }

    #[test]
    fn tolerates_trailing_whitespace_and_missing_space() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let text = "  //MARK:MODELS:START   \r\n";
        let loc = locator.locate(text, "MODELS:START").unwrap();
        assert_eq!(loc.indent, "  ");
        assert_eq!(loc.line_end, text.len());
        assert_eq!(&text[loc.range.clone()], "  //MARK:MODELS:START   ");
        assert_eq!(loc.line_break, "\r\n");
    }

    #[test]
    fn names_are_compared_literally() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let text = "// MARK:A.B:START\n// MARK:AXB:START\n";
        let loc = locator.locate(text, "AXB:START").unwrap();
        assert_eq!(loc.offset(), "// MARK:A.B:START\n".len());
        assert!(!locator.contains(text, "A?B:START"));
        assert_eq!(loc.line_break, "\n");
    }

    #[test]
    fn cloned_syntax_shares_spelling() {
        let syntax = MarkerSyntax::new("#", "@");
        let copy = syntax.clone();
        assert_eq!(syntax, copy);
        assert_ne!(syntax, MarkerSyntax::default());
        assert!(MarkerLocator::new(&copy).contains("# @ROUTES:START\n", "ROUTES:START"));
    }

    #[test]
    fn ignores_markers_inside_other_text() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let text = "x := 1 // MARK:REPOS:START\n";
        assert!(matches!(
            locator.locate(text, "REPOS:START"),
            Err(ScaffoldError::MarkerNotFound { .. })
        ));
    }

    #[test]
    fn pair_rejects_reversed_order() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let text = "// MARK:REPOS:END\n// MARK:REPOS:START\n";
        let err = locator
            .locate_pair(text, "REPOS:START", "REPOS:END")
            .unwrap_err();
        assert!(matches!(err, ScaffoldError::MarkerOrderInvalid { .. }));
    }

    #[test]
    fn pair_reports_missing_end() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        let err = locator
            .locate_pair("// MARK:REPOS:START\n", "REPOS:START", "REPOS:END")
            .unwrap_err();
        match err {
            ScaffoldError::MarkerNotFound { marker } => assert_eq!(marker, "REPOS:END"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lists_markers_in_order() {
        let syntax = MarkerSyntax::default();
        let locator = MarkerLocator::new(&syntax);

        assert_eq!(locator.list(MAIN), vec!["REPOS:START", "REPOS:END"]);
    }

    #[test]
    fn custom_comment_token() {
        let syntax = MarkerSyntax::new("#", "MARK:");
        let locator = MarkerLocator::new(&syntax);

        let text = "routes:\n  # MARK:ROUTES:START\n  # MARK:ROUTES:END\n";
        let (start, end) = locator
            .locate_pair(text, "ROUTES:START", "ROUTES:END")
            .unwrap();
        assert!(start.offset() < end.offset());
        assert_eq!(syntax.render("ROUTES:END"), "# MARK:ROUTES:END");
    }
}
