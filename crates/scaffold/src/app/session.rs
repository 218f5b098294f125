//! Per-invocation scaffold session.

use std::path::Path;
use anyhow::Result;
use tracing::{info, warn};

use crate::app::document::SourceDocument;
use crate::app::markers::MarkerSyntax;
use crate::app::outcome::ScaffoldOutcome;
use crate::app::report::{ConflictReporter, ReportFormat};
use crate::app::wiring::DomainWiring;
use crate::app::writer::{FileWriter, PendingFile, WriteOptions};
use crate::domain::errors::ScaffoldResult;
use crate::infra::config::Config;

/// Settings shared by the documents and writes of one scaffold call.
///
/// Every [`ScaffoldSession::write_files`] call uses a fresh [`FileWriter`], so ledgers from
/// unrelated operations never mix.
pub struct ScaffoldSession {
    options: WriteOptions,
    report_format: ReportFormat,
    syntax: MarkerSyntax,
    wiring: DomainWiring,
    reporter: ConflictReporter,
}

impl ScaffoldSession {
    pub fn from_config(config: &Config) -> Result<Self> {
        let report_format = config
            .report
            .format()
            .parse::<ReportFormat>()
            .unwrap_or_else(|err| {
                warn!(error = %err, "falling back to xml conflict reports");
                ReportFormat::Xml
            });
        Ok(Self {
            options: WriteOptions::from_config(config),
            report_format,
            syntax: MarkerSyntax::from_config(&config.markers),
            wiring: DomainWiring::from_config(&config.wiring),
            reporter: ConflictReporter::new()?,
        })
    }

    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    pub fn report_format(&self) -> ReportFormat {
        self.report_format
    }

    pub fn syntax(&self) -> &MarkerSyntax {
        &self.syntax
    }

    pub fn wiring(&self) -> &DomainWiring {
        &self.wiring
    }

    /// Load a document using the session's marker spelling.
    pub fn open_document(&self, path: impl AsRef<Path>) -> ScaffoldResult<SourceDocument> {
        Ok(SourceDocument::open(path)?.with_syntax(self.syntax.clone()))
    }

    pub fn document_from_string(&self, content: impl Into<String>) -> SourceDocument {
        SourceDocument::from_string(content).with_syntax(self.syntax.clone())
    }

    /// Write `files` with a fresh writer and summarize what happened.
    pub fn write_files(&self, files: &[PendingFile]) -> Result<ScaffoldOutcome> {
        let mut writer = FileWriter::new(self.options);
        writer.write_all(files);
        let result = writer.finish();
        info!(
            created = result.created.len(),
            updated = result.updated.len(),
            conflicts = result.conflicts.len(),
            failed = result.failed.len(),
            dry_run = self.options.dry_run,
            "write operation finished"
        );
        ScaffoldOutcome::from_result(
            result,
            self.options.dry_run,
            &self.reporter,
            self.report_format,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempfile::tempdir;

    #[test]
    fn sequential_operations_do_not_share_ledgers() -> Result<()> {
        let dir = tempdir()?;
        let session = ScaffoldSession::from_config(&Config::default())?;

        let first = session.write_files(&[PendingFile::new(dir.path().join("a.go"), "a")])?;
        let second = session.write_files(&[PendingFile::new(dir.path().join("b.go"), "b")])?;

        assert_eq!(first.created, vec![dir.path().join("a.go")]);
        assert_eq!(second.created, vec![dir.path().join("b.go")]);
        Ok(())
    }

    #[test]
    fn write_errors_are_reported_with_earlier_writes() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("blocker"), "file")?;
        let session = ScaffoldSession::from_config(&Config::default())?;

        let outcome = session.write_files(&[
            PendingFile::new(dir.path().join("a.go"), "a"),
            PendingFile::new(dir.path().join("blocker/b.go"), "b"),
        ])?;

        assert!(!outcome.success);
        assert_eq!(outcome.created, vec![dir.path().join("a.go")]);
        assert_eq!(outcome.failed[0].path, dir.path().join("blocker/b.go"));
        Ok(())
    }

    #[test]
    fn documents_use_configured_marker_syntax() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("routes.py");
        fs::write(&file, "# MARK:ROUTES:START\n# MARK:ROUTES:END\n")?;

        let config: Config = toml::from_str("[markers]\ncomment_token = \"#\"\n")?;
        let session = ScaffoldSession::from_config(&config)?;
        let mut doc = session.open_document(&file)?;
        doc.inject_between("ROUTES:START", "ROUTES:END", "register(app)")?;

        assert!(doc.content().contains("register(app)\n# MARK:ROUTES:END"));
        Ok(())
    }

    #[test]
    fn unknown_report_format_falls_back_to_xml() -> Result<()> {
        let config: Config = toml::from_str("[report]\nformat = \"yaml\"\n")?;
        let session = ScaffoldSession::from_config(&config)?;
        assert_eq!(session.report_format(), ReportFormat::Xml);
        Ok(())
    }
}
