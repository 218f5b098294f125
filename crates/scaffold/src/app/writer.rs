//! Conflict-aware file writes.
//!
//! A [`FileWriter`] is created for one scaffold operation and accumulates a
//! [`GenerationResult`]. Existing files are never overwritten unless `force` is set; instead a
//! [`Conflict`] carrying the proposed content is recorded for the caller to resolve.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::errors::{ScaffoldError, ScaffoldResult};
use crate::domain::model::{Conflict, GenerationResult, WriteFailure};
use crate::infra::config::Config;

const CONFLICT_DESCRIPTION: &str =
    "file already exists with different content; refusing to overwrite without force";

/// What happens to the rest of a batch when one target conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// Conflicts are detected per file; non-conflicting files are still written.
    #[default]
    PerFile,
    /// Every target is checked first and nothing is written if any of them conflicts.
    AllOrNothing,
}

impl BatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPolicy::PerFile => "per-file",
            BatchPolicy::AllOrNothing => "all-or-nothing",
        }
    }
}

impl FromStr for BatchPolicy {
    type Err = BatchPolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "per-file" | "partial" => Ok(BatchPolicy::PerFile),
            "all-or-nothing" | "atomic" => Ok(BatchPolicy::AllOrNothing),
            other => Err(BatchPolicyParseError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BatchPolicyParseError {
    #[error("unknown batch policy '{0}'")]
    UnknownPolicy(String),
}

/// Policy flags for one write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub dry_run: bool,
    pub force: bool,
    pub batch_policy: BatchPolicy,
}

impl WriteOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        let batch_policy = config
            .writer
            .batch_policy()
            .parse::<BatchPolicy>()
            .unwrap_or_else(|err| {
                warn!(error = %err, "falling back to per-file batch policy");
                BatchPolicy::PerFile
            });
        Self {
            dry_run: config.writer.dry_run(),
            force: config.writer.force(),
            batch_policy,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }
}

/// A file the generator wants to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: PathBuf,
    pub content: String,
}

impl PendingFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Decision taken for a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
    Unchanged,
    Conflict,
}

/// Writes generated files while protecting existing ones.
#[derive(Debug, Default)]
pub struct FileWriter {
    options: WriteOptions,
    result: GenerationResult,
}

impl FileWriter {
    pub fn new(options: WriteOptions) -> Self {
        Self {
            options,
            result: GenerationResult::new(),
        }
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    /// Ledger accumulated so far.
    pub fn result(&self) -> &GenerationResult {
        &self.result
    }

    /// Drop the accumulated ledger so the writer can serve a new operation.
    pub fn reset(&mut self) {
        self.result = GenerationResult::new();
    }

    /// Consume the writer and return its ledger.
    pub fn finish(self) -> GenerationResult {
        self.result
    }

    /// Write `content` to `path` unless doing so would clobber an existing file.
    ///
    /// A filesystem error is recorded in the ledger's `failed` list before it is returned.
    pub fn write_or_skip(
        &mut self,
        path: impl AsRef<Path>,
        content: &str,
    ) -> ScaffoldResult<WriteAction> {
        let path = path.as_ref();

        if self.options.dry_run {
            let action = if path.exists() {
                self.result.updated.push(path.to_path_buf());
                WriteAction::Updated
            } else {
                self.result.created.push(path.to_path_buf());
                WriteAction::Created
            };
            debug!(path = %path.display(), ?action, "dry run");
            return Ok(action);
        }

        let applied = self.classify(path, content).and_then(|action| {
            if matches!(action, WriteAction::Created | WriteAction::Updated) {
                write_file(path, content)?;
            }
            Ok(action)
        });
        match applied {
            Ok(action) => {
                self.record(path, content, action);
                Ok(action)
            }
            Err(err) => {
                self.record_failure(path, &err);
                Err(err)
            }
        }
    }

    /// Write a batch of files according to the configured [`BatchPolicy`].
    ///
    /// Under [`BatchPolicy::PerFile`] files that do not conflict are written even when others do,
    /// and a filesystem error on one target does not stop the rest. Under
    /// [`BatchPolicy::AllOrNothing`] a single conflict leaves every target untouched and lists
    /// the non-conflicting ones as skipped; a filesystem error rolls back the targets already
    /// written by the batch.
    pub fn write_all(&mut self, files: &[PendingFile]) -> &GenerationResult {
        if self.options.dry_run || self.options.batch_policy == BatchPolicy::PerFile {
            for file in files {
                // Errors are already in the ledger.
                let _ = self.write_or_skip(&file.path, &file.content);
            }
        } else {
            self.write_all_or_nothing(files);
        }
        &self.result
    }

    fn write_all_or_nothing(&mut self, files: &[PendingFile]) {
        let mut plan = Vec::with_capacity(files.len());
        for (position, file) in files.iter().enumerate() {
            match self.classify(&file.path, &file.content) {
                Ok(action) => plan.push((file, action)),
                Err(err) => {
                    self.record_failure(&file.path, &err);
                    self.skip_all_but(files.iter().map(|file| &file.path), position);
                    return;
                }
            }
        }

        if plan
            .iter()
            .any(|(_, action)| *action == WriteAction::Conflict)
        {
            for (file, action) in plan {
                if action == WriteAction::Conflict {
                    self.record_conflict(&file.path, &file.content);
                } else {
                    self.result.skipped.push(file.path.clone());
                }
            }
            warn!(
                conflicts = self.result.conflicts.len(),
                "batch aborted before writing"
            );
            return;
        }

        let mut undo_log = Vec::new();
        for (position, (file, action)) in plan.iter().enumerate() {
            if *action == WriteAction::Unchanged {
                continue;
            }
            let written = Undo::capture(&file.path).and_then(|undo| {
                match write_file(&file.path, &file.content) {
                    Ok(()) => Ok(undo),
                    Err(err) => {
                        undo.restore();
                        Err(err)
                    }
                }
            });
            match written {
                Ok(undo) => undo_log.push(undo),
                Err(err) => {
                    for undo in undo_log.into_iter().rev() {
                        undo.restore();
                    }
                    self.record_failure(&file.path, &err);
                    self.skip_all_but(plan.iter().map(|(file, _)| &file.path), position);
                    warn!(path = %file.path.display(), "batch rolled back after write failure");
                    return;
                }
            }
        }

        for (file, action) in plan {
            self.record(&file.path, &file.content, action);
        }
    }

    fn classify(&self, path: &Path, content: &str) -> ScaffoldResult<WriteAction> {
        if !path.exists() {
            return Ok(WriteAction::Created);
        }
        let existing = fs::read(path).map_err(|err| ScaffoldError::fs(path, err))?;
        if existing == content.as_bytes() {
            Ok(WriteAction::Unchanged)
        } else if self.options.force {
            Ok(WriteAction::Updated)
        } else {
            Ok(WriteAction::Conflict)
        }
    }

    fn record(&mut self, path: &Path, content: &str, action: WriteAction) {
        match action {
            WriteAction::Created => {
                info!(path = %path.display(), "created file");
                self.result.created.push(path.to_path_buf());
            }
            WriteAction::Updated => {
                info!(path = %path.display(), "overwrote file");
                self.result.updated.push(path.to_path_buf());
            }
            WriteAction::Unchanged => {
                debug!(path = %path.display(), "file already up to date");
                self.result.unchanged.push(path.to_path_buf());
            }
            WriteAction::Conflict => self.record_conflict(path, content),
        }
    }

    fn record_conflict(&mut self, path: &Path, content: &str) {
        warn!(path = %path.display(), "write conflict");
        self.result
            .record_conflict(Conflict::new(path, CONFLICT_DESCRIPTION, content));
    }

    fn record_failure(&mut self, path: &Path, err: &ScaffoldError) {
        error!(path = %path.display(), error = %err, "write failed");
        self.result
            .record_failure(WriteFailure::new(path, err.to_string()));
    }

    fn skip_all_but<'p>(&mut self, paths: impl Iterator<Item = &'p PathBuf>, failed: usize) {
        for (position, path) in paths.enumerate() {
            if position != failed {
                self.result.skipped.push(path.clone());
            }
        }
    }
}

/// State of a target before a batch wrote it, used to roll the write back.
struct Undo {
    path: PathBuf,
    previous: Option<Vec<u8>>,
    /// Outermost directory the write had to create.
    created_dir: Option<PathBuf>,
}

impl Undo {
    fn capture(path: &Path) -> ScaffoldResult<Self> {
        let previous = if path.exists() {
            Some(fs::read(path).map_err(|err| ScaffoldError::fs(path, err))?)
        } else {
            None
        };
        let created_dir = path
            .ancestors()
            .skip(1)
            .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
            .last()
            .map(Path::to_path_buf);
        Ok(Self {
            path: path.to_path_buf(),
            previous,
            created_dir,
        })
    }

    fn restore(self) {
        let restored = match &self.previous {
            Some(bytes) => fs::write(&self.path, bytes),
            None => ignore_absent(fs::remove_file(&self.path)),
        };
        if let Err(err) = restored {
            warn!(path = %self.path.display(), error = %err, "failed to roll back write");
        }
        if let Some(dir) = &self.created_dir
            && let Err(err) = ignore_absent(fs::remove_dir_all(dir))
        {
            warn!(path = %dir.display(), error = %err, "failed to remove created directory");
        }
        debug!(path = %self.path.display(), "rolled back write");
    }
}

fn ignore_absent(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) =>
        {
            Ok(())
        }
        other => other,
    }
}

fn write_file(path: &Path, content: &str) -> ScaffoldResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| ScaffoldError::fs(parent, err))?;
    }
    fs::write(path, content).map_err(|err| ScaffoldError::fs(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn refuses_to_overwrite_without_force() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("existing.txt");
        fs::write(&target, "original")?;

        let mut writer = FileWriter::new(WriteOptions::default());
        let action = writer.write_or_skip(&target, "updated")?;
        let result = writer.finish();

        assert_eq!(action, WriteAction::Conflict);
        assert_eq!(fs::read_to_string(&target)?, "original");
        assert!(result.has_conflicts);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].proposed_content, "updated");
        assert_eq!(result.conflicts[0].path, target);
        assert!(result.updated.is_empty());
        Ok(())
    }

    #[test]
    fn force_overwrites_existing_file() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("existing.txt");
        fs::write(&target, "original")?;

        let mut writer = FileWriter::new(WriteOptions::default().force(true));
        writer.write_or_skip(&target, "updated")?;
        let result = writer.finish();

        assert_eq!(fs::read_to_string(&target)?, "updated");
        assert_eq!(result.updated, vec![target]);
        assert!(result.conflicts.is_empty());
        assert!(!result.has_conflicts);
        Ok(())
    }

    #[test]
    fn creates_missing_files_and_parents() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("internal/product/model.go");

        let mut writer = FileWriter::new(WriteOptions::default());
        assert_eq!(writer.write_or_skip(&target, "package product\n")?, WriteAction::Created);

        assert_eq!(fs::read_to_string(&target)?, "package product\n");
        assert_eq!(writer.result().created, vec![target]);
        Ok(())
    }

    #[test]
    fn identical_content_is_not_a_conflict() -> Result<()> {
        let dir = tempdir()?;
        let target = dir.path().join("same.txt");
        fs::write(&target, "same")?;

        let mut writer = FileWriter::new(WriteOptions::default());
        assert_eq!(writer.write_or_skip(&target, "same")?, WriteAction::Unchanged);
        assert!(writer.result().is_success());
        assert_eq!(writer.result().unchanged, vec![target]);
        Ok(())
    }

    #[test]
    fn dry_run_touches_nothing() -> Result<()> {
        let dir = tempdir()?;
        let existing = dir.path().join("existing.txt");
        fs::write(&existing, "original")?;
        let fresh = dir.path().join("nested/fresh.txt");

        let mut writer = FileWriter::new(WriteOptions::default().dry_run(true));
        writer.write_or_skip(&fresh, "new")?;
        writer.write_or_skip(&existing, "changed")?;
        let result = writer.finish();

        assert_eq!(result.created, vec![fresh.clone()]);
        assert_eq!(result.updated, vec![existing.clone()]);
        assert!(!fresh.exists());
        assert!(!dir.path().join("nested").exists());
        assert_eq!(fs::read_to_string(&existing)?, "original");
        Ok(())
    }

    #[test]
    fn per_file_batch_keeps_earlier_writes() -> Result<()> {
        let dir = tempdir()?;
        let taken = dir.path().join("b.txt");
        fs::write(&taken, "hand edited")?;
        let files = vec![
            PendingFile::new(dir.path().join("a.txt"), "a"),
            PendingFile::new(&taken, "b"),
            PendingFile::new(dir.path().join("c.txt"), "c"),
        ];

        let mut writer = FileWriter::new(WriteOptions::default());
        let result = writer.write_all(&files).clone();

        assert!(!result.is_success());
        assert_eq!(
            result.created,
            vec![dir.path().join("a.txt"), dir.path().join("c.txt")]
        );
        assert_eq!(result.skipped, vec![taken.clone()]);
        assert_eq!(fs::read_to_string(&taken)?, "hand edited");
        assert!(dir.path().join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn all_or_nothing_batch_writes_nothing_on_conflict() -> Result<()> {
        let dir = tempdir()?;
        let taken = dir.path().join("b.txt");
        fs::write(&taken, "hand edited")?;
        let files = vec![
            PendingFile::new(dir.path().join("a.txt"), "a"),
            PendingFile::new(&taken, "b"),
        ];

        let options = WriteOptions::default().batch_policy(BatchPolicy::AllOrNothing);
        let mut writer = FileWriter::new(options);
        let result = writer.write_all(&files).clone();

        assert!(result.has_conflicts);
        assert!(result.created.is_empty());
        assert_eq!(result.skipped, vec![dir.path().join("a.txt"), taken.clone()]);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(&taken)?, "hand edited");
        Ok(())
    }

    #[test]
    fn all_or_nothing_batch_writes_everything_without_conflicts() -> Result<()> {
        let dir = tempdir()?;
        let files = vec![
            PendingFile::new(dir.path().join("a.txt"), "a"),
            PendingFile::new(dir.path().join("b.txt"), "b"),
        ];

        let options = WriteOptions::default().batch_policy(BatchPolicy::AllOrNothing);
        let mut writer = FileWriter::new(options);
        let result = writer.write_all(&files);

        assert!(result.is_success());
        assert_eq!(result.created.len(), 2);
        Ok(())
    }

    #[test]
    fn per_file_batch_reports_writes_around_a_failure() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("blocker"), "not a directory")?;
        let blocked = dir.path().join("blocker/b.txt");
        let files = vec![
            PendingFile::new(dir.path().join("a.txt"), "a"),
            PendingFile::new(&blocked, "b"),
            PendingFile::new(dir.path().join("c.txt"), "c"),
        ];

        let mut writer = FileWriter::new(WriteOptions::default());
        let result = writer.write_all(&files).clone();

        assert!(!result.is_success());
        assert!(!result.has_conflicts);
        assert_eq!(
            result.created,
            vec![dir.path().join("a.txt"), dir.path().join("c.txt")]
        );
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, blocked);
        assert!(result.failed[0].error.contains("blocker"));
        assert!(dir.path().join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn single_write_failure_stays_in_the_ledger() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("blocker"), "not a directory")?;
        let blocked = dir.path().join("blocker/b.txt");

        let mut writer = FileWriter::new(WriteOptions::default());
        let err = writer.write_or_skip(&blocked, "b").unwrap_err();

        assert!(matches!(err, ScaffoldError::FileSystem { .. }));
        assert_eq!(writer.result().failed[0].path, blocked);
        assert!(writer.result().created.is_empty());
        Ok(())
    }

    #[test]
    fn all_or_nothing_batch_rolls_back_after_a_failure() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("blocker"), "not a directory")?;
        let existing = dir.path().join("existing.txt");
        fs::write(&existing, "original")?;
        let blocked = dir.path().join("blocker/b.txt");
        let files = vec![
            PendingFile::new(dir.path().join("nested/a.txt"), "a"),
            PendingFile::new(&existing, "replaced"),
            PendingFile::new(&blocked, "b"),
        ];

        let options = WriteOptions::default()
            .force(true)
            .batch_policy(BatchPolicy::AllOrNothing);
        let mut writer = FileWriter::new(options);
        let result = writer.write_all(&files).clone();

        assert!(!result.is_success());
        assert!(result.created.is_empty());
        assert!(result.updated.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].path, blocked);
        assert_eq!(
            result.skipped,
            vec![dir.path().join("nested/a.txt"), existing.clone()]
        );
        assert!(!dir.path().join("nested").exists());
        assert_eq!(fs::read_to_string(&existing)?, "original");
        Ok(())
    }

    #[test]
    fn reset_clears_previous_operation() -> Result<()> {
        let dir = tempdir()?;
        let mut writer = FileWriter::new(WriteOptions::default());
        writer.write_or_skip(dir.path().join("one.txt"), "1")?;
        writer.reset();
        assert_eq!(writer.result(), &GenerationResult::default());
        Ok(())
    }

    #[test]
    fn options_read_batch_policy_from_config() -> Result<()> {
        let config: Config = toml::from_str("[writer]\nbatch_policy = \"atomic\"\nforce = true\n")?;
        let options = WriteOptions::from_config(&config);
        assert_eq!(options.batch_policy, BatchPolicy::AllOrNothing);
        assert!(options.force);

        let config: Config = toml::from_str("[writer]\nbatch_policy = \"eventually\"\n")?;
        assert_eq!(WriteOptions::from_config(&config).batch_policy, BatchPolicy::PerFile);
        Ok(())
    }

    #[test]
    fn parses_batch_policy_names() {
        assert_eq!("atomic".parse::<BatchPolicy>(), Ok(BatchPolicy::AllOrNothing));
        assert_eq!(BatchPolicy::PerFile.as_str(), "per-file");
        assert!("sometimes".parse::<BatchPolicy>().is_err());
    }
}
