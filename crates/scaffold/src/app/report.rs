//! Structured reports describing write conflicts.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use clap::ValueEnum;
use minijinja::Environment;
use serde::{Deserialize, Serialize};

use crate::domain::model::Conflict;

const INSTRUCTION: &str = "Existing files were left untouched. Choose an action for each conflict \
and re-run the operation; nothing is resolved automatically.";

/// Resolution options offered to the caller. None of them is ever applied by the engine.
pub const SUGGESTED_ACTIONS: [&str; 3] = ["manual_merge", "skip", "backup_and_replace"];

/// Supported report encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// XML with proposed content kept verbatim in CDATA sections.
    #[default]
    Xml,
    /// JSON document.
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(ReportFormat::Xml),
            "json" => Ok(ReportFormat::Json),
            other => Err(ReportFormatParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Error returned when parsing a [`ReportFormat`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ReportFormatParseError {
    #[error("unknown report format '{0}'")]
    UnknownFormat(String),
}

/// Serializable view of a conflict list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub summary: ReportSummary,
    pub conflicts: Vec<ConflictEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub count: usize,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    /// One-based position in the report.
    pub index: usize,
    pub path: String,
    pub description: String,
    pub proposed_content: String,
    pub suggested_actions: Vec<String>,
}

impl ConflictReport {
    pub fn from_conflicts(conflicts: &[Conflict]) -> Self {
        let conflicts = conflicts
            .iter()
            .enumerate()
            .map(|(idx, conflict)| ConflictEntry {
                index: idx + 1,
                path: conflict.path.display().to_string(),
                description: conflict.description.clone(),
                proposed_content: conflict.proposed_content.clone(),
                suggested_actions: SUGGESTED_ACTIONS.iter().map(|a| a.to_string()).collect(),
            })
            .collect::<Vec<_>>();

        Self {
            summary: ReportSummary {
                count: conflicts.len(),
                instruction: INSTRUCTION.to_owned(),
            },
            conflicts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Renders [`ConflictReport`]s.
pub struct ConflictReporter {
    env: Environment<'static>,
}

impl ConflictReporter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            env: default_environment()?,
        })
    }

    pub fn render(&self, report: &ConflictReport, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Xml => self
                .env
                .get_template("conflict_report")
                .and_then(|template| template.render(report))
                .map_err(|err| anyhow!("failed to render conflict report: {err}")),
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|err| anyhow!("failed to serialize conflict report: {err}")),
        }
    }
}

fn default_environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("xml_escape", xml_escape);
    env.add_filter("cdata", cdata);
    env.add_template("conflict_report", XML_TEMPLATE)
        .map_err(|err| anyhow!("failed to register conflict report template: {err}"))?;
    Ok(env)
}

/// Escape the characters that are structural in XML text and attribute values.
pub fn xml_escape(value: String) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Wrap `value` in a CDATA section, splitting it wherever it contains `]]>`.
pub fn cdata(value: String) -> String {
    format!("<![CDATA[{}]]>", value.replace("]]>", "]]]]><![CDATA[>"))
}

const XML_TEMPLATE: &str = r#"<conflict_report count="{{ summary.count }}">
  <instruction>{{ summary.instruction | xml_escape }}</instruction>
{% for conflict in conflicts %}
  <conflict index="{{ conflict.index }}">
    <path>{{ conflict.path | xml_escape }}</path>
    <description>{{ conflict.description | xml_escape }}</description>
    <proposed_content>{{ conflict.proposed_content | cdata }}</proposed_content>
    <suggested_actions>
{% for action in conflict.suggested_actions %}
      <action>{{ action }}</action>
{% endfor %}
    </suggested_actions>
  </conflict>
{% endfor %}
</conflict_report>
"#;
