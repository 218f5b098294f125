//! Domain models for conflicts, generation ledgers, and wiring inputs.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// A proposed write that was refused because the target already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub path: PathBuf,
    pub description: String,
    pub proposed_content: String,
}

impl Conflict {
    pub fn new(
        path: impl Into<PathBuf>,
        description: impl Into<String>,
        proposed_content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            proposed_content: proposed_content.into(),
        }
    }
}

/// A target that could not be written because of a filesystem error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub error: String,
}

impl WriteFailure {
    pub fn new(path: impl Into<PathBuf>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: error.into(),
        }
    }
}

/// Ledger of what a single write operation did (or would do in dry-run mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
    /// Targets whose existing content already matched the proposal.
    pub unchanged: Vec<PathBuf>,
    /// Targets left untouched because the batch was aborted or conflicted.
    pub skipped: Vec<PathBuf>,
    pub conflicts: Vec<Conflict>,
    pub has_conflicts: bool,
    /// Targets whose write failed; nothing else in the ledger mentions them.
    pub failed: Vec<WriteFailure>,
}

impl GenerationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when every requested write was applied without conflict or error.
    pub fn is_success(&self) -> bool {
        !self.has_conflicts && self.failed.is_empty()
    }

    /// Paths that were written (or would be written in dry-run mode).
    pub fn written(&self) -> impl Iterator<Item = &PathBuf> {
        self.created.iter().chain(self.updated.iter())
    }

    pub(crate) fn record_conflict(&mut self, conflict: Conflict) {
        self.skipped.push(conflict.path.clone());
        self.conflicts.push(conflict);
        self.has_conflicts = true;
    }

    pub(crate) fn record_failure(&mut self, failure: WriteFailure) {
        self.failed.push(failure);
    }
}

/// Outcome of a single fragment injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Injection {
    /// The fragment was spliced into the document.
    Inserted,
    /// The marker interior already contained the fragment.
    AlreadyPresent,
    /// The marker interior was discarded and replaced.
    Replaced,
}

impl Injection {
    pub fn changed(&self) -> bool {
        !matches!(self, Injection::AlreadyPresent)
    }
}

/// Partition of route registrations, each served by its own marker pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum RouteGroup {
    Public,
    #[default]
    Authenticated,
    Admin,
}

impl RouteGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteGroup::Public => "public",
            RouteGroup::Authenticated => "authenticated",
            RouteGroup::Admin => "admin",
        }
    }

    /// Marker block name for route registrations in this group.
    pub fn routes_block(&self) -> &'static str {
        match self {
            RouteGroup::Public => "ROUTES:PUBLIC",
            RouteGroup::Authenticated => "ROUTES:AUTHENTICATED",
            RouteGroup::Admin => "ROUTES:ADMIN",
        }
    }

    /// Router variable the generated main file declares for this group.
    pub fn router_var(&self) -> &'static str {
        match self {
            RouteGroup::Public => "publicRoutes",
            RouteGroup::Authenticated => "protected",
            RouteGroup::Admin => "admin",
        }
    }

    /// Navigation block name; layouts only declare an authenticated and an admin section.
    pub fn nav_block(&self) -> &'static str {
        match self {
            RouteGroup::Admin => "NAV_ITEMS:ADMIN",
            RouteGroup::Public | RouteGroup::Authenticated => "NAV_ITEMS",
        }
    }
}

impl fmt::Display for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteGroup {
    type Err = RouteGroupParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(RouteGroup::Public),
            "authenticated" | "auth" | "protected" => Ok(RouteGroup::Authenticated),
            "admin" => Ok(RouteGroup::Admin),
            other => Err(RouteGroupParseError::UnknownGroup(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RouteGroupParseError {
    #[error("unknown route group '{0}'")]
    UnknownGroup(String),
}

/// Naming strings for one domain, already derived by the caller's naming utilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNames {
    /// Exported type name, e.g. `Product`.
    pub model: String,
    /// Package alias used to qualify the domain's constructors, e.g. `product`.
    pub pkg_alias: String,
    /// Variable stem used for instantiated dependencies, e.g. `product`.
    pub var_name: String,
}

impl DomainNames {
    pub fn new(
        model: impl Into<String>,
        pkg_alias: impl Into<String>,
        var_name: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            pkg_alias: pkg_alias.into(),
            var_name: var_name.into(),
        }
    }
}
