//! Result object handed back to the orchestrator after a scaffold operation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::report::{ConflictReport, ConflictReporter, ReportFormat};
use crate::domain::model::{GenerationResult, WriteFailure};

/// Conflict report embedded in an outcome, either as nested data or as pre-rendered text.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EmbeddedReport {
    Structured(ConflictReport),
    Rendered(String),
}

/// Everything an upstream caller needs to decide how to proceed.
#[derive(Debug, Clone, Serialize)]
pub struct ScaffoldOutcome {
    pub success: bool,
    pub dry_run: bool,
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<WriteFailure>,
    pub conflict_report: Option<EmbeddedReport>,
    pub next_steps: Vec<String>,
    pub generated_at: String,
}

impl ScaffoldOutcome {
    /// Summarize `result`, rendering the conflict report in `format` when there are conflicts.
    pub fn from_result(
        result: GenerationResult,
        dry_run: bool,
        reporter: &ConflictReporter,
        format: ReportFormat,
    ) -> Result<Self> {
        let conflict_report = if result.has_conflicts {
            let report = ConflictReport::from_conflicts(&result.conflicts);
            Some(match format {
                ReportFormat::Json => EmbeddedReport::Structured(report),
                ReportFormat::Xml => EmbeddedReport::Rendered(reporter.render(&report, format)?),
            })
        } else {
            None
        };

        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("failed to format outcome timestamp")?;

        Ok(Self {
            success: result.is_success(),
            dry_run,
            next_steps: next_steps(&result, dry_run),
            created: result.created,
            updated: result.updated,
            unchanged: result.unchanged,
            skipped: result.skipped,
            failed: result.failed,
            conflict_report,
            generated_at,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize scaffold outcome")
    }
}

fn next_steps(result: &GenerationResult, dry_run: bool) -> Vec<String> {
    let mut steps = Vec::new();
    if !result.failed.is_empty() {
        steps.push(format!(
            "{} file(s) could not be written; fix the errors listed under failed and re-run.",
            result.failed.len()
        ));
    }
    if result.has_conflicts {
        steps.push(format!(
            "{} file(s) already exist with different content and were not written.",
            result.conflicts.len()
        ));
        steps.push(
            "Review the conflict report, merge the proposed content by hand, or re-run with force to overwrite."
                .to_owned(),
        );
        let written = result.written().count();
        if written > 0 && !dry_run {
            steps.push(format!(
                "{written} other file(s) were written; they are listed under created/updated."
            ));
        }
    } else if !result.failed.is_empty() {
        let written = result.written().count();
        if written > 0 {
            steps.push(format!(
                "{written} other file(s) were written; they are listed under created/updated."
            ));
        }
    } else if dry_run {
        steps.push("Dry run only: re-run without dry-run to apply these changes.".to_owned());
    } else if result.written().next().is_some() {
        steps.push("Review the generated files and run the project's formatter and tests.".to_owned());
    } else {
        steps.push("Nothing to do: every file is already up to date.".to_owned());
    }
    steps
}
