//! In-memory source buffers mutated at marker locations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::markers::{MarkerLocator, MarkerSyntax};
use crate::domain::errors::{ScaffoldError, ScaffoldResult};
use crate::domain::model::Injection;

/// Text buffer optionally bound to a file on disk.
///
/// Injection never removes marker lines, so every marker stays locatable for subsequent calls.
/// Changes reach the filesystem only through [`SourceDocument::save`] or
/// [`SourceDocument::save_to`].
#[derive(Debug, Clone)]
pub struct SourceDocument {
    path: Option<PathBuf>,
    content: String,
    syntax: MarkerSyntax,
    modified: bool,
}

impl SourceDocument {
    /// Seed a document from a string with no backing file.
    pub fn from_string(content: impl Into<String>) -> Self {
        Self {
            path: None,
            content: content.into(),
            syntax: MarkerSyntax::default(),
            modified: false,
        }
    }

    /// Read a document from disk and bind it to `path`.
    pub fn open(path: impl AsRef<Path>) -> ScaffoldResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| ScaffoldError::fs(path, err))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            content,
            syntax: MarkerSyntax::default(),
            modified: false,
        })
    }

    /// Use a non-default marker spelling.
    pub fn with_syntax(mut self, syntax: MarkerSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn syntax(&self) -> &MarkerSyntax {
        &self.syntax
    }

    /// Whether any injection changed the buffer since it was loaded or last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn locator(&self) -> MarkerLocator<'_> {
        MarkerLocator::new(&self.syntax)
    }

    pub fn has_marker(&self, name: &str) -> bool {
        self.locator().contains(&self.content, name)
    }

    pub fn has_pair(&self, start: &str, end: &str) -> bool {
        self.locator().has_pair(&self.content, start, end)
    }

    /// Insert `fragment` just before the `end` marker unless the block already contains it.
    ///
    /// The fragment is re-indented with the indentation of the `end` marker line.
    pub fn inject_between(
        &mut self,
        start: &str,
        end: &str,
        fragment: &str,
    ) -> ScaffoldResult<Injection> {
        let (start_loc, end_loc) = self.locator().locate_pair(&self.content, start, end)?;

        let interior = &self.content[start_loc.line_end..end_loc.offset()];
        let line_break = end_loc.line_break;
        let block = reindent_lines(fragment, &end_loc.indent, line_break);
        if interior.contains(fragment.trim()) || interior.contains(block.trim()) {
            debug!(marker = %end, "fragment already present");
            return Ok(Injection::AlreadyPresent);
        }

        self.content
            .insert_str(end_loc.offset(), &format!("{block}{line_break}"));
        self.modified = true;
        debug!(marker = %end, "injected fragment");
        Ok(Injection::Inserted)
    }

    /// Insert `fragment` on the line after `marker`, using the marker's indentation.
    pub fn inject_after(&mut self, marker: &str, fragment: &str) -> ScaffoldResult<Injection> {
        let loc = self.locator().locate(&self.content, marker)?;
        let line_break = loc.line_break;
        let block = reindent_lines(fragment, &loc.indent, line_break);

        let terminated = self.content[..loc.line_end].ends_with('\n');
        let insertion = if terminated {
            format!("{block}{line_break}")
        } else {
            format!("{line_break}{block}")
        };
        self.content.insert_str(loc.line_end, &insertion);
        self.modified = true;
        debug!(%marker, "injected fragment after marker");
        Ok(Injection::Inserted)
    }

    /// Insert `fragment` on the line before `marker`, using the marker's indentation.
    pub fn inject_before(&mut self, marker: &str, fragment: &str) -> ScaffoldResult<Injection> {
        let loc = self.locator().locate(&self.content, marker)?;
        let block = reindent_lines(fragment, &loc.indent, loc.line_break);

        self.content
            .insert_str(loc.offset(), &format!("{block}{}", loc.line_break));
        self.modified = true;
        debug!(%marker, "injected fragment before marker");
        Ok(Injection::Inserted)
    }

    /// Discard everything between the markers and put `fragment` there instead.
    ///
    /// An empty fragment leaves the block empty.
    pub fn replace_between(
        &mut self,
        start: &str,
        end: &str,
        fragment: &str,
    ) -> ScaffoldResult<Injection> {
        let (start_loc, end_loc) = self.locator().locate_pair(&self.content, start, end)?;

        let replacement = if fragment.trim().is_empty() {
            String::new()
        } else {
            let line_break = end_loc.line_break;
            format!(
                "{}{line_break}",
                reindent_lines(fragment, &end_loc.indent, line_break)
            )
        };
        self.content
            .replace_range(start_loc.line_end..end_loc.offset(), &replacement);
        self.modified = true;
        debug!(marker = %start, "replaced block");
        Ok(Injection::Replaced)
    }

    /// Insert raw text at a byte offset found by a structural match.
    pub(crate) fn splice(&mut self, offset: usize, text: &str) {
        self.content.insert_str(offset, text);
        self.modified = true;
    }

    /// Write the buffer back to the path it was opened from.
    pub fn save(&mut self) -> ScaffoldResult<()> {
        let path = self.path.clone().ok_or(ScaffoldError::NoDocumentPath)?;
        self.save_to(path)
    }

    /// Overwrite `path` with the buffer and bind the document to it.
    pub fn save_to(&mut self, path: impl AsRef<Path>) -> ScaffoldResult<()> {
        let path = path.as_ref();
        fs::write(path, &self.content).map_err(|err| ScaffoldError::fs(path, err))?;
        self.path = Some(path.to_path_buf());
        self.modified = false;
        debug!(path = %path.display(), "saved document");
        Ok(())
    }
}

/// Trim `fragment` as a block and prefix every non-blank line with `indent`.
pub fn reindent(fragment: &str, indent: &str) -> String {
    reindent_lines(fragment, indent, "\n")
}

fn reindent_lines(fragment: &str, indent: &str, line_break: &str) -> String {
    fragment
        .trim()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join(line_break)
}
