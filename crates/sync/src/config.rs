use crate::{Result, SyncError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-workspace configuration file.
pub const CONFIG_FILE_NAME: &str = ".vsproj.toml";

pub const FOLDER_CATEGORY: &str = "Folder";
pub const DEFAULT_CATEGORY: &str = "Content";
const WILDCARD: &str = "*";

/// Configuration for manifest synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Global kill switch
    pub enabled: bool,

    /// Whether this workspace opted in to synchronization
    pub activate: bool,

    /// Manifest file extension, without the dot
    pub proj_extension: String,

    /// Item category per file extension
    pub item_type: ItemTypeConfig,

    /// Only paths matching this pattern are synchronized
    pub include_regex: Option<String>,

    /// Paths matching this pattern are never synchronized
    pub exclude_regex: Option<String>,

    /// Quiescence window for deletion batches, in milliseconds
    pub debounce_delete_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activate: false,
            proj_extension: "njsproj".to_string(),
            item_type: ItemTypeConfig::default(),
            include_regex: Some(".*".to_string()),
            exclude_regex: None,
            debounce_delete_ms: 2_000,
        }
    }
}

impl SyncConfig {
    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|err| SyncError::invalid_config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// `<workspace>/.vsproj.toml` when present, defaults otherwise.
    pub fn discover(workspace: &Path) -> Result<Self> {
        let candidate = config_path_for_workspace(workspace);
        if candidate.is_file() {
            log::debug!("loading config from {}", candidate.display());
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    /// `true` when both switches allow synchronization.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && self.activate
    }

    #[must_use]
    pub const fn debounce_delete(&self) -> Duration {
        Duration::from_millis(self.debounce_delete_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let ext = self.proj_extension.trim();
        if ext.is_empty() {
            return Err(SyncError::invalid_config("proj_extension must not be empty"));
        }
        if ext.starts_with('.') {
            return Err(SyncError::invalid_config(format!(
                "proj_extension ({ext}) must not start with a dot"
            )));
        }
        if self.debounce_delete_ms == 0 {
            return Err(SyncError::invalid_config("debounce_delete_ms must be > 0"));
        }
        PathFilter::from_config(self)?;
        Ok(())
    }
}

#[must_use]
pub fn config_path_for_workspace(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_FILE_NAME)
}

/// Either one category for everything or a map keyed by extension (`.js`)
/// with an optional `*` fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemTypeConfig {
    Single(String),
    ByExtension(BTreeMap<String, String>),
}

impl Default for ItemTypeConfig {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(WILDCARD.to_string(), DEFAULT_CATEGORY.to_string());
        map.insert(".js".to_string(), "Compile".to_string());
        map.insert(".ts".to_string(), "TypeScriptCompile".to_string());
        Self::ByExtension(map)
    }
}

impl ItemTypeConfig {
    /// Category for a path. Directories map to `Folder` unless a single category
    /// was configured.
    #[must_use]
    pub fn category_for(&self, path: &Path, is_dir: bool) -> String {
        let map = match self {
            Self::Single(category) => return category.clone(),
            Self::ByExtension(map) => map,
        };
        if is_dir {
            return FOLDER_CATEGORY.to_string();
        }
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()));
        extension
            .and_then(|ext| map.get(&ext))
            .or_else(|| map.get(WILDCARD))
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }
}

/// Compiled include/exclude patterns.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl PathFilter {
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Ok(Self {
            include: compile(config.include_regex.as_deref(), "include_regex")?,
            exclude: compile(config.exclude_regex.as_deref(), "exclude_regex")?,
        })
    }

    /// Matches against the full path as given.
    #[must_use]
    pub fn allows(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        if let Some(include) = &self.include {
            if !include.is_match(&text) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(&text) {
                return false;
            }
        }
        true
    }
}

fn compile(pattern: Option<&str>, field: &str) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|err| SyncError::invalid_config(format!("{field}: {err}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::{ItemTypeConfig, PathFilter, SyncConfig};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn default_categories() {
        let item_type = ItemTypeConfig::default();
        assert_eq!(item_type.category_for(Path::new("/w/a.js"), false), "Compile");
        assert_eq!(
            item_type.category_for(Path::new("/w/a.ts"), false),
            "TypeScriptCompile"
        );
        assert_eq!(item_type.category_for(Path::new("/w/a.css"), false), "Content");
        assert_eq!(item_type.category_for(Path::new("/w/src"), true), "Folder");
    }

    #[test]
    fn single_category_applies_to_everything() {
        let item_type = ItemTypeConfig::Single("None".to_string());
        assert_eq!(item_type.category_for(Path::new("/w/a.js"), false), "None");
        assert_eq!(item_type.category_for(Path::new("/w/src"), true), "None");
    }

    #[test]
    fn parses_toml_with_both_item_type_forms() {
        let config: SyncConfig = toml::from_str(
            r#"
            activate = true
            proj_extension = "csproj"
            exclude_regex = "node_modules"

            [item_type]
            "*" = "None"
            ".cs" = "Compile"
            "#,
        )
        .unwrap();
        assert!(config.is_active());
        assert_eq!(config.proj_extension, "csproj");
        assert_eq!(
            config.item_type.category_for(Path::new("a.cs"), false),
            "Compile"
        );
        assert_eq!(config.debounce_delete_ms, 2_000);

        let single: SyncConfig = toml::from_str(r#"item_type = "Content""#).unwrap();
        assert_eq!(single.item_type, ItemTypeConfig::Single("Content".to_string()));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = SyncConfig::default();
        assert!(config.validate().is_ok());

        config.exclude_regex = Some("(".to_string());
        assert!(config.validate().is_err());

        config = SyncConfig {
            proj_extension: ".njsproj".to_string(),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn filter_applies_include_then_exclude() {
        let config = SyncConfig {
            include_regex: Some(r"[/\\]src[/\\]".to_string()),
            exclude_regex: Some(r"\.map$".to_string()),
            ..SyncConfig::default()
        };
        let filter = PathFilter::from_config(&config).unwrap();
        assert!(filter.allows(Path::new("/w/src/a.js")));
        assert!(!filter.allows(Path::new("/w/src/a.js.map")));
        assert!(!filter.allows(Path::new("/w/test/a.js")));
    }
}
