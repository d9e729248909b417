use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dsl::optimize::{normalize_version, Build};
use crate::dsl::RenderOptions;
use crate::error::AppError;

/// What to build the documentation for, and how VUs are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BuildConfig {
    /// Registry XML (`vk.xml`). Required by every command that compiles.
    pub registry: Option<PathBuf>,
    /// Core versions in the build, as `1.2` or `VK_VERSION_1_2`.
    pub versions: Vec<String>,
    /// Extensions in the build.
    pub extensions: Vec<String>,
    /// Columns between the start of a source line and the VU text.
    pub column_offset: usize,
    /// Line width for boolean chains; 0 always wraps them.
    pub max_width: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            registry: None,
            versions: vec!["1.0".to_string()],
            extensions: Vec::new(),
            column_offset: options.column_offset,
            max_width: options.max_width,
        }
    }
}

impl BuildConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::NotFound {
                what: format!("Config file {}", path.display()),
            });
        }
        let data = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Versions as a build matches them, `vk_version_x_y`.
    pub fn normalized_versions(&self) -> Vec<String> {
        self.versions.iter().map(|v| normalize_version(v)).collect()
    }

    pub fn build(&self) -> Build {
        Build::new(&self.versions, &self.extensions)
    }

    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            column_offset: self.column_offset,
            max_width: self.max_width,
        }
    }

    pub fn registry_path(&self) -> Result<&Path, AppError> {
        self.registry.as_deref().ok_or_else(|| AppError::ConfigError {
            message: "no registry given (use --registry or the config file)".to_string(),
        })
    }

    /// Space-separated lists as given on the command line.
    pub fn set_versions(&mut self, list: &str) {
        self.versions = split_list(list);
    }

    pub fn set_extensions(&mut self, list: &str) {
        self.extensions = split_list(list);
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split([' ', ','])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON schema of [`BuildConfig`].
pub fn config_schema() -> serde_json::Value {
    let root = schemars::schema_for!(BuildConfig);
    serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: BuildConfig = serde_json::from_str(r#"{ "versions": ["1.0", "1.1"] }"#).unwrap();
        assert_eq!(config.column_offset, 4);
        assert_eq!(config.max_width, 0);
        assert!(config.extensions.is_empty());
        assert_eq!(config.normalized_versions(), ["vk_version_1_0", "vk_version_1_1"]);
    }

    #[test]
    fn builds_are_case_insensitive() {
        let mut config = BuildConfig::default();
        config.set_versions("1.0 VK_VERSION_1_1");
        config.set_extensions("VK_KHR_maintenance1,VK_EXT_dynamic_rendering");
        let build = config.build();
        assert!(build.has_version(1, 1));
        assert!(!build.has_version(1, 2));
        assert!(build.has_extension("vk_khr_maintenance1"));
        assert!(build.has_extension("VK_EXT_dynamic_rendering"));
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = std::env::temp_dir().join(format!("vu-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert!(matches!(BuildConfig::load(&missing), Err(AppError::NotFound { .. })));

        let bad = dir.join("bad.json");
        std::fs::write(&bad, "{ versions: ").unwrap();
        assert!(matches!(BuildConfig::load(&bad), Err(AppError::ConfigError { .. })));

        let good = dir.join("good.json");
        std::fs::write(&good, r#"{ "registry": "vk.xml", "max_width": 80 }"#).unwrap();
        let config = BuildConfig::load(&good).unwrap();
        assert_eq!(config.registry_path().unwrap(), Path::new("vk.xml"));
        assert_eq!(config.options().max_width, 80);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn schema_lists_every_field() {
        let schema = config_schema();
        let properties = schema["properties"].as_object().unwrap();
        for field in ["registry", "versions", "extensions", "column_offset", "max_width"] {
            assert!(properties.contains_key(field), "{field}");
        }
    }
}
