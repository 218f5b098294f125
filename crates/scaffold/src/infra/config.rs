//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".scaffold/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub wiring: WiringConfig,
}

/// How marker comments are spelled in generated files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MarkersConfig {
    #[serde(default)]
    comment_token: Option<String>,
    #[serde(default)]
    prefix: Option<String>,
}

impl MarkersConfig {
    fn default_comment_token() -> &'static str {
        "//"
    }

    fn default_prefix() -> &'static str {
        "MARK:"
    }

    pub fn comment_token(&self) -> String {
        self.comment_token
            .clone()
            .unwrap_or_else(|| Self::default_comment_token().to_owned())
    }

    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| Self::default_prefix().to_owned())
    }
}

/// Defaults for the conflict-aware writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WriterConfig {
    #[serde(default)]
    dry_run: Option<bool>,
    #[serde(default)]
    force: Option<bool>,
    #[serde(default)]
    batch_policy: Option<String>,
}

impl WriterConfig {
    fn default_batch_policy() -> &'static str {
        "per-file"
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }

    pub fn force(&self) -> bool {
        self.force.unwrap_or(false)
    }

    pub fn batch_policy(&self) -> &str {
        self.batch_policy
            .as_deref()
            .unwrap_or(Self::default_batch_policy())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    #[serde(default)]
    format: Option<String>,
}

impl ReportConfig {
    fn default_format() -> &'static str {
        "xml"
    }

    pub fn format(&self) -> &str {
        self.format
            .as_deref()
            .unwrap_or(Self::default_format())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WiringConfig {
    #[serde(default)]
    default_router: Option<String>,
    #[serde(default)]
    default_icon: Option<String>,
}

impl WiringConfig {
    fn default_router_name() -> &'static str {
        "router"
    }

    fn default_icon_name() -> &'static str {
        "circle"
    }

    pub fn default_router(&self) -> String {
        self.default_router
            .clone()
            .unwrap_or_else(|| Self::default_router_name().to_owned())
    }

    pub fn default_icon(&self) -> String {
        self.default_icon
            .clone()
            .unwrap_or_else(|| Self::default_icon_name().to_owned())
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    dry_run: Option<bool>,
    force: Option<bool>,
    report_format: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            dry_run: env::var("SCAFFOLD_DRY_RUN").ok().and_then(parse_flag),
            force: env::var("SCAFFOLD_FORCE").ok().and_then(parse_flag),
            report_format: env::var("SCAFFOLD_REPORT_FORMAT").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(force: bool, report_format: &str) -> Self {
        Self {
            dry_run: None,
            force: Some(force),
            report_format: Some(report_format.to_owned()),
        }
    }
}

fn parse_flag(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            markers: MarkersConfig {
                comment_token: other.markers.comment_token.or(self.markers.comment_token),
                prefix: other.markers.prefix.or(self.markers.prefix),
            },
            writer: WriterConfig {
                dry_run: other.writer.dry_run.or(self.writer.dry_run),
                force: other.writer.force.or(self.writer.force),
                batch_policy: other.writer.batch_policy.or(self.writer.batch_policy),
            },
            report: ReportConfig {
                format: other.report.format.or(self.report.format),
            },
            wiring: WiringConfig {
                default_router: other.wiring.default_router.or(self.wiring.default_router),
                default_icon: other.wiring.default_icon.or(self.wiring.default_icon),
            },
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("scaffold/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(dry_run) = env.dry_run {
        config.writer.dry_run = Some(dry_run);
    }
    if let Some(force) = env.force {
        config.writer.force = Some(force);
    }
    if let Some(format) = env.report_format {
        config.report.format = Some(format);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.markers.comment_token(), "//");
        assert_eq!(config.markers.prefix(), "MARK:");
        assert_eq!(config.writer.batch_policy(), "per-file");
        assert!(!config.writer.force());
        assert_eq!(config.wiring.default_icon(), "circle");
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r##"
[markers]
comment_token = "#"
[writer]
batch_policy = "all-or-nothing"
"##,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".scaffold"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".scaffold/config.toml"),
            r#"
[writer]
force = true
[wiring]
default_router = "api"
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".scaffold/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.markers.comment_token(), "#");
        assert_eq!(config.markers.prefix(), "MARK:");
        assert_eq!(config.writer.batch_policy(), "all-or-nothing");
        assert!(config.writer.force());
        assert_eq!(config.wiring.default_router(), "api");
        assert_eq!(find_repo_root(&workspace_dir), Some(workspace_dir.clone()));

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests(true, "json");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert!(config.writer.force());
        assert_eq!(config.report.format(), "json");
        Ok(())
    }

    #[test]
    fn parses_boolean_flags() {
        assert_eq!(parse_flag("YES".into()), Some(true));
        assert_eq!(parse_flag("0".into()), Some(false));
        assert_eq!(parse_flag("maybe".into()), None);
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
