//! `xcsynth.toml` loading
//!
//! Every field is optional. A project with no configuration file gets the
//! built-in scan globs, the directory-mirroring layout and the skeleton's
//! default build settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use xcsynth_manifest::{GroupLayout, ProjectTemplate, SettingsOverlay};

use crate::errors::ConfigError;

/// File name looked up at the project root
pub const CONFIG_FILE_NAME: &str = "xcsynth.toml";

/// Environment variable that points at a configuration file elsewhere
pub const CONFIG_ENV_VAR: &str = "XCSYNTH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swift_version: Option<String>,
    pub scan: ScanConfig,
    pub layout: GroupLayout,
    pub settings: SettingsConfig,
    /// Runtime only - file this configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Glob lists that decide which files under the root are scanned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub sources: Vec<String>,
    pub headers: Vec<String>,
    pub resources: Vec<String>,
    pub supporting: Vec<String>,
    pub frameworks: Vec<String>,
    pub exclude: Vec<String>,
    /// Directory extensions scanned as a single file
    pub bundle_extensions: Vec<String>,
}

fn globs(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| (*p).to_string()).collect()
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            sources: globs(&[
                "**/*.swift",
                "**/*.m",
                "**/*.mm",
                "**/*.cpp",
                "**/*.cc",
                "**/*.cxx",
                "**/*.c",
                "**/*.metal",
            ]),
            headers: globs(&["**/*.h", "**/*.hpp", "**/*.hh"]),
            resources: globs(&[
                "**/*.xcassets",
                "**/*.storyboard",
                "**/*.xib",
                "**/*.strings",
                "**/*.json",
                "**/*.wav",
                "**/*.mp3",
                "**/*.m4a",
                "**/*.caf",
                "**/*.aiff",
                "**/*.png",
                "**/*.jpg",
            ]),
            supporting: globs(&["**/*.plist", "**/*.entitlements", "**/*.xcconfig"]),
            frameworks: globs(&["**/*.framework"]),
            exclude: globs(&[
                "**/*.xcodeproj/**",
                "**/*.xcworkspace/**",
                "**/.git/**",
                "**/.build/**",
                "**/build/**",
                "**/DerivedData/**",
                "**/Pods/**",
            ]),
            bundle_extensions: globs(&["xcassets", "framework"]),
        }
    }
}

impl ScanConfig {
    /// Every include glob, in category order
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .chain(&self.headers)
            .chain(&self.resources)
            .chain(&self.supporting)
            .chain(&self.frameworks)
            .map(String::as_str)
    }
}

/// Build setting overrides, keyed by configuration name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub project: SettingsOverlay,
    pub target: SettingsOverlay,
}

impl Config {
    /// Configuration file for `root`, honoring `XCSYNTH_CONFIG`
    pub fn path(root: &Path) -> PathBuf {
        let env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::path_with_override(root, env)
    }

    fn path_with_override(root: &Path, env: Option<PathBuf>) -> PathBuf {
        match env {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => root.join(CONFIG_FILE_NAME),
        }
    }

    /// Load the configuration for `root`; a missing default file yields defaults
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path(root);
        if !path.exists() && std::env::var_os(CONFIG_ENV_VAR).is_none() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Self::load_from(&path)
    }

    /// Load a configuration file that must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Skeleton template for a project called `project_name`
    pub fn to_template(&self, project_name: &str) -> ProjectTemplate {
        let mut template = ProjectTemplate::new(project_name);
        if let Some(target) = &self.target {
            template.target_name.clone_from(target);
        }
        if let Some(bundle) = &self.bundle_identifier {
            template.bundle_identifier.clone_from(bundle);
        }
        if let Some(deployment) = &self.deployment_target {
            template.deployment_target.clone_from(deployment);
        }
        if let Some(swift) = &self.swift_version {
            template.swift_version.clone_from(swift);
        }
        template.project_settings.clone_from(&self.settings.project);
        template.target_settings.clone_from(&self.settings.target);
        template
    }
}
