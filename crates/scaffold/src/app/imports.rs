//! Adding entries to import lists.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::app::document::SourceDocument;
use crate::app::markers::{blocks, end_of, start_of};
use crate::domain::errors::{ScaffoldError, ScaffoldResult};
use crate::domain::model::Injection;

/// A grouped `import ( ... )` block: any lines not starting with `)`, closed by `)` at column
/// zero.
static IMPORT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^import[ \t]*\([ \t]*\r?\n(?:[^)\n][^\n]*\n|\n)*\)")
        .unwrap_or_else(|_| unreachable!("static import pattern"))
});

const ENTRY_INDENT: &str = "\t";

/// One entry of an import list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub path: String,
    pub alias: Option<String>,
}

impl ImportEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: None,
        }
    }

    pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: Some(alias.into()),
        }
    }

    /// The quoted path, which is what makes an entry recognizable in any import style.
    pub fn quoted_path(&self) -> String {
        format!("\"{}\"", self.path)
    }

    pub fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias} {}", self.quoted_path()),
            None => self.quoted_path(),
        }
    }
}

/// Add `entry` to the document's import list.
///
/// Uses the `IMPORTS` marker pair when present and otherwise appends to the first grouped import
/// block. A path that already appears anywhere in the document is left alone.
pub fn add_import(doc: &mut SourceDocument, entry: &ImportEntry) -> ScaffoldResult<Injection> {
    if doc.content().contains(&entry.quoted_path()) {
        debug!(path = %entry.path, "import already present");
        return Ok(Injection::AlreadyPresent);
    }

    let start = start_of(blocks::IMPORTS);
    let end = end_of(blocks::IMPORTS);
    if doc.has_pair(&start, &end) {
        return doc.inject_between(&start, &end, &entry.render());
    }

    let Some(block) = IMPORT_BLOCK.find(doc.content()) else {
        return Err(ScaffoldError::NoImportBlockFound);
    };
    // The match ends with the closing parenthesis.
    let closing = block.end() - 1;
    let line_break = if block.as_str().contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    };
    doc.splice(
        closing,
        &format!("{ENTRY_INDENT}{}{line_break}", entry.render()),
    );
    debug!(path = %entry.path, "added import to import block");
    Ok(Injection::Inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;

    #[test]
    fn prefers_import_markers() -> Result<()> {
        let text = "import (\n\t\"fmt\"\n\t// MARK:IMPORTS:START\n\t// MARK:IMPORTS:END\n)\n";
        let mut doc = SourceDocument::from_string(text);

        add_import(&mut doc, &ImportEntry::new("app/internal/product"))?;

        assert_eq!(
            doc.content(),
            "import (\n\t\"fmt\"\n\t// MARK:IMPORTS:START\n\t\"app/internal/product\"\n\t// MARK:IMPORTS:END\n)\n"
        );
        Ok(())
    }

    #[test]
    fn falls_back_to_import_block() -> Result<()> {
        let text = "package main\n\nimport (\n\t\"fmt\"\n\n\t\"net/http\"\n)\n\nfunc main() {}\n";
        let mut doc = SourceDocument::from_string(text);

        let outcome = add_import(&mut doc, &ImportEntry::aliased("app/internal/order", "order"))?;

        assert_eq!(outcome, Injection::Inserted);
        assert!(
            doc.content()
                .contains("\t\"net/http\"\n\torder \"app/internal/order\"\n)\n")
        );
        Ok(())
    }

    #[test]
    fn existing_path_is_not_added_twice() -> Result<()> {
        let text = "import (\n\tp \"app/internal/product\"\n)\n";
        let mut doc = SourceDocument::from_string(text);

        let outcome = add_import(&mut doc, &ImportEntry::new("app/internal/product"))?;

        assert_eq!(outcome, Injection::AlreadyPresent);
        assert_eq!(doc.content(), text);
        Ok(())
    }

    #[test]
    fn empty_import_block_accepts_entries() -> Result<()> {
        let mut doc = SourceDocument::from_string("import (\n)\n");
        add_import(&mut doc, &ImportEntry::new("fmt"))?;
        assert_eq!(doc.content(), "import (\n\t\"fmt\"\n)\n");
        Ok(())
    }

    #[test]
    fn block_may_contain_unindented_comments() -> Result<()> {
        let mut doc = SourceDocument::from_string("import (\n// keep\n\t\"fmt\"\n)\n");
        add_import(&mut doc, &ImportEntry::new("os"))?;
        assert_eq!(doc.content(), "import (\n// keep\n\t\"fmt\"\n\t\"os\"\n)\n");
        Ok(())
    }

    #[test]
    fn crlf_import_block_keeps_line_endings() -> Result<()> {
        let mut doc = SourceDocument::from_string("import (\r\n\t\"fmt\"\r\n)\r\n");
        add_import(&mut doc, &ImportEntry::new("os"))?;
        assert_eq!(doc.content(), "import (\r\n\t\"fmt\"\r\n\t\"os\"\r\n)\r\n");
        Ok(())
    }

    #[test]
    fn fails_without_markers_or_block() {
        let mut doc = SourceDocument::from_string("import \"fmt\"\n");
        let err = add_import(&mut doc, &ImportEntry::new("os")).unwrap_err();
        assert!(matches!(err, ScaffoldError::NoImportBlockFound));
        assert_eq!(doc.content(), "import \"fmt\"\n");
    }
}
