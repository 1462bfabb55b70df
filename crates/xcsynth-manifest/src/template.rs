//! Built-in skeleton for full synthesis
//!
//! A skeleton is the structure every app document needs before any source
//! file is placed: the project, its main and Products groups, the product
//! reference, one native target with its three phases, and two configuration
//! lists. Build settings are opaque here; defaults come from this module,
//! then a prior document's settings, then the caller's overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::errors::ManifestError;
use crate::ident::IdAllocator;
use crate::index::resolve;
use crate::plist::Value;
use crate::types::{
    BuildConfiguration, BuildPhase, ConfigurationList, Entity, EntityIndex, Fields, FileReference,
    Group, NativeTarget, ObjectId, PhaseRole, Project, BUILT_PRODUCTS_DIR, GROUP_TREE,
};

/// Build settings keyed by configuration name, then by setting name
pub type SettingsOverlay = BTreeMap<String, BTreeMap<String, String>>;

const PRODUCT_TYPE: &str = "com.apple.product-type.application";

/// Names and settings the skeleton is built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTemplate {
    pub project_name: String,
    pub target_name: String,
    pub bundle_identifier: String,
    pub deployment_target: String,
    pub swift_version: String,
    pub object_version: String,
    /// Configuration names, in list order
    pub configurations: Vec<String>,
    pub project_settings: SettingsOverlay,
    pub target_settings: SettingsOverlay,
}

impl ProjectTemplate {
    /// Template for an app target named after the project
    pub fn new(project_name: &str) -> Self {
        ProjectTemplate {
            project_name: project_name.to_string(),
            target_name: project_name.to_string(),
            bundle_identifier: format!("com.example.{}", bundle_suffix(project_name)),
            deployment_target: "16.0".to_string(),
            swift_version: "5.0".to_string(),
            object_version: "56".to_string(),
            configurations: vec!["Debug".to_string(), "Release".to_string()],
            project_settings: SettingsOverlay::new(),
            target_settings: SettingsOverlay::new(),
        }
    }

    /// Build a fresh skeleton. Every identifier comes from `allocator`.
    ///
    /// When `prior` is given, its build settings, project attributes and
    /// configuration names are carried over by configuration name; nothing
    /// else of it survives.
    pub fn build_skeleton(
        &self,
        allocator: &mut IdAllocator,
        prior: Option<&EntityIndex>,
    ) -> Result<EntityIndex, ManifestError> {
        let carried = prior.map(|p| Carried::collect(p, &self.target_name)).unwrap_or_default();
        let configurations = if carried.configurations.is_empty() {
            self.configurations.clone()
        } else {
            carried.configurations.clone()
        };
        if configurations.is_empty() {
            return Err(ManifestError::Configuration(
                "at least one build configuration is required".to_string(),
            ));
        }

        let project_id = allocator.allocate()?;
        let main_group = allocator.allocate()?;
        let products_group = allocator.allocate()?;
        let product_ref = allocator.allocate()?;
        let target_id = allocator.allocate()?;
        let sources = allocator.allocate()?;
        let frameworks = allocator.allocate()?;
        let resources = allocator.allocate()?;
        let project_list = allocator.allocate()?;
        let target_list = allocator.allocate()?;
        let mut project_configs = Vec::with_capacity(configurations.len());
        for _ in &configurations {
            project_configs.push(allocator.allocate()?);
        }
        let mut target_configs = Vec::with_capacity(configurations.len());
        for _ in &configurations {
            target_configs.push(allocator.allocate()?);
        }

        let mut index = EntityIndex::new(project_id.clone());
        index.object_version.clone_from(&self.object_version);
        index.project_name.clone_from(&self.project_name);

        let product_path = format!("{}.app", self.target_name);
        let mut product_extra = Fields::new();
        product_extra.insert("includeInIndex".to_string(), Value::from("0"));
        index.insert(Entity::FileReference(FileReference {
            id: product_ref.clone(),
            relative_path: resolve("", BUILT_PRODUCTS_DIR, Some(&product_path)),
            path: product_path,
            name: None,
            source_tree: BUILT_PRODUCTS_DIR.to_string(),
            declared_type: Some("wrapper.application".to_string()),
            explicit_type: true,
            extra: product_extra,
        }))?;

        index.insert(Entity::Group(Group {
            id: main_group.clone(),
            name: None,
            path: None,
            source_tree: GROUP_TREE.to_string(),
            children: vec![products_group.clone()],
            extra: Fields::new(),
        }))?;
        index.insert(Entity::Group(Group {
            id: products_group.clone(),
            name: Some("Products".to_string()),
            path: None,
            source_tree: GROUP_TREE.to_string(),
            children: vec![product_ref.clone()],
            extra: Fields::new(),
        }))?;

        for (id, role) in [
            (&sources, PhaseRole::Sources),
            (&frameworks, PhaseRole::Frameworks),
            (&resources, PhaseRole::Resources),
        ] {
            index.insert(Entity::BuildPhase(empty_phase(id.clone(), role)))?;
        }

        let mut target_extra = Fields::new();
        target_extra.insert("buildRules".to_string(), Value::Array(Vec::new()));
        target_extra.insert("dependencies".to_string(), Value::Array(Vec::new()));
        target_extra.insert("productName".to_string(), Value::string(&self.target_name));
        target_extra.insert("productType".to_string(), Value::from(PRODUCT_TYPE));
        index.insert(Entity::NativeTarget(NativeTarget {
            id: target_id.clone(),
            name: self.target_name.clone(),
            build_configuration_list: target_list.clone(),
            build_phases: vec![sources, frameworks, resources],
            product_reference: Some(product_ref),
            extra: target_extra,
        }))?;

        index.insert(Entity::Project(Project {
            id: project_id,
            build_configuration_list: project_list.clone(),
            main_group,
            product_ref_group: Some(products_group),
            targets: vec![target_id.clone()],
            extra: self.project_extra(&carried, &target_id),
        }))?;

        for (id, name) in project_configs.iter().zip(&configurations) {
            let settings = self.settings_for(Level::Project, name, carried.project.get(name));
            index.insert(Entity::BuildConfiguration(configuration(id, name, settings)))?;
        }
        for (id, name) in target_configs.iter().zip(&configurations) {
            let settings = self.settings_for(Level::Target, name, carried.target.get(name));
            index.insert(Entity::BuildConfiguration(configuration(id, name, settings)))?;
        }

        let default_name = configurations
            .iter()
            .find(|c| c.as_str() == "Release")
            .or(configurations.last())
            .cloned()
            .unwrap_or_default();
        index.insert(Entity::ConfigurationList(configuration_list(
            project_list,
            project_configs,
            &default_name,
        )))?;
        index.insert(Entity::ConfigurationList(configuration_list(
            target_list,
            target_configs,
            &default_name,
        )))?;

        index.rebuild_indexes();
        debug!(
            "Built skeleton for {} with {} configurations",
            self.target_name,
            configurations.len()
        );
        Ok(index)
    }

    fn project_extra(&self, carried: &Carried, target_id: &ObjectId) -> Fields {
        let mut extra = Fields::new();
        let attributes = match &carried.attributes {
            Some(prior) => retarget_attributes(prior, carried.old_target.as_ref(), target_id),
            None => default_attributes(target_id),
        };
        extra.insert("attributes".to_string(), attributes);
        extra.insert("compatibilityVersion".to_string(), Value::from("Xcode 14.0"));
        extra.insert("developmentRegion".to_string(), Value::from("en"));
        extra.insert("hasScannedForEncodings".to_string(), Value::from("0"));
        extra.insert(
            "knownRegions".to_string(),
            Value::Array(vec![Value::from("en"), Value::from("Base")]),
        );
        extra.insert("projectDirPath".to_string(), Value::from(""));
        extra.insert("projectRoot".to_string(), Value::from(""));
        for (key, value) in &carried.project_extra {
            extra.insert(key.clone(), value.clone());
        }
        extra
    }

    fn settings_for(&self, level: Level, config: &str, prior: Option<&Value>) -> Value {
        let mut settings: BTreeMap<String, Value> = match prior.and_then(Value::as_dict) {
            Some(entries) => entries.iter().cloned().collect(),
            None => {
                let debug = config.eq_ignore_ascii_case("debug");
                match level {
                    Level::Project => self.project_defaults(debug),
                    Level::Target => self.target_defaults(),
                }
            }
        };
        let overlay = match level {
            Level::Project => &self.project_settings,
            Level::Target => &self.target_settings,
        };
        if let Some(values) = overlay.get(config) {
            for (key, value) in values {
                settings.insert(key.clone(), Value::string(value));
            }
        }
        Value::Dict(settings.into_iter().collect())
    }

    fn project_defaults(&self, debug: bool) -> BTreeMap<String, Value> {
        let mut settings = string_settings(&[
            ("ALWAYS_SEARCH_USER_PATHS", "NO"),
            ("CLANG_ANALYZER_NONNULL", "YES"),
            ("CLANG_CXX_LANGUAGE_STANDARD", "gnu++20"),
            ("CLANG_ENABLE_MODULES", "YES"),
            ("CLANG_ENABLE_OBJC_ARC", "YES"),
            ("CLANG_WARN_DOCUMENTATION_COMMENTS", "YES"),
            ("CLANG_WARN_UNREACHABLE_CODE", "YES"),
            ("COPY_PHASE_STRIP", "NO"),
            ("ENABLE_STRICT_OBJC_MSGSEND", "YES"),
            ("GCC_C_LANGUAGE_STANDARD", "gnu17"),
            ("GCC_NO_COMMON_BLOCKS", "YES"),
            ("GCC_WARN_UNUSED_VARIABLE", "YES"),
            ("MTL_FAST_MATH", "YES"),
            ("SDKROOT", "iphoneos"),
        ]);
        settings.insert(
            "IPHONEOS_DEPLOYMENT_TARGET".to_string(),
            Value::string(&self.deployment_target),
        );
        if debug {
            settings.extend(string_settings(&[
                ("DEBUG_INFORMATION_FORMAT", "dwarf"),
                ("ENABLE_TESTABILITY", "YES"),
                ("GCC_DYNAMIC_NO_PIC", "NO"),
                ("GCC_OPTIMIZATION_LEVEL", "0"),
                ("MTL_ENABLE_DEBUG_INFO", "INCLUDE_SOURCE"),
                ("ONLY_ACTIVE_ARCH", "YES"),
                ("SWIFT_ACTIVE_COMPILATION_CONDITIONS", "DEBUG $(inherited)"),
                ("SWIFT_OPTIMIZATION_LEVEL", "-Onone"),
            ]));
            settings.insert(
                "GCC_PREPROCESSOR_DEFINITIONS".to_string(),
                Value::Array(vec![Value::from("DEBUG=1"), Value::from("$(inherited)")]),
            );
        } else {
            settings.extend(string_settings(&[
                ("DEBUG_INFORMATION_FORMAT", "dwarf-with-dsym"),
                ("ENABLE_NS_ASSERTIONS", "NO"),
                ("MTL_ENABLE_DEBUG_INFO", "NO"),
                ("SWIFT_COMPILATION_MODE", "wholemodule"),
                ("VALIDATE_PRODUCT", "YES"),
            ]));
        }
        settings
    }

    fn target_defaults(&self) -> BTreeMap<String, Value> {
        let mut settings = string_settings(&[
            ("ASSETCATALOG_COMPILER_APPICON_NAME", "AppIcon"),
            ("CODE_SIGN_STYLE", "Automatic"),
            ("CURRENT_PROJECT_VERSION", "1"),
            ("GENERATE_INFOPLIST_FILE", "YES"),
            ("MARKETING_VERSION", "1.0"),
            ("PRODUCT_NAME", "$(TARGET_NAME)"),
            ("SWIFT_EMIT_LOC_STRINGS", "YES"),
            ("TARGETED_DEVICE_FAMILY", "1,2"),
        ]);
        settings.insert(
            "LD_RUNPATH_SEARCH_PATHS".to_string(),
            Value::Array(vec![
                Value::from("$(inherited)"),
                Value::from("@executable_path/Frameworks"),
            ]),
        );
        settings.insert(
            "PRODUCT_BUNDLE_IDENTIFIER".to_string(),
            Value::string(&self.bundle_identifier),
        );
        settings.insert("SWIFT_VERSION".to_string(), Value::string(&self.swift_version));
        settings
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Project,
    Target,
}

/// What a prior document contributes to a fresh skeleton
#[derive(Debug, Default)]
struct Carried {
    project: BTreeMap<String, Value>,
    target: BTreeMap<String, Value>,
    configurations: Vec<String>,
    attributes: Option<Value>,
    old_target: Option<ObjectId>,
    project_extra: Vec<(String, Value)>,
}

impl Carried {
    fn collect(prior: &EntityIndex, target_name: &str) -> Self {
        let mut carried = Carried::default();
        let Some(project) = prior.project() else {
            return carried;
        };
        carried.attributes = project.extra.get("attributes").cloned();
        for key in ["developmentRegion", "knownRegions"] {
            if let Some(value) = project.extra.get(key) {
                carried.project_extra.push((key.to_string(), value.clone()));
            }
        }
        for (name, settings) in configurations_of(prior, &project.build_configuration_list) {
            carried.configurations.push(name.clone());
            carried.project.insert(name, settings);
        }

        let target = prior
            .targets()
            .find(|t| t.name == target_name)
            .or_else(|| prior.targets().next());
        if let Some(target) = target {
            carried.old_target = Some(target.id.clone());
            carried.target = configurations_of(prior, &target.build_configuration_list)
                .into_iter()
                .collect();
        }
        debug!(
            "Carrying over {} configurations from the prior document",
            carried.configurations.len()
        );
        carried
    }
}

/// `(name, buildSettings)` of each configuration in a list, in list order
fn configurations_of(index: &EntityIndex, list: &ObjectId) -> Vec<(String, Value)> {
    let Some(Entity::ConfigurationList(list)) = index.get(list.as_str()) else {
        return Vec::new();
    };
    list.build_configurations
        .iter()
        .filter_map(|id| match index.get(id.as_str()) {
            Some(Entity::BuildConfiguration(c)) => Some((
                c.name.clone(),
                c.extra
                    .get("buildSettings")
                    .cloned()
                    .unwrap_or(Value::Dict(Vec::new())),
            )),
            _ => None,
        })
        .collect()
}

fn default_attributes(target_id: &ObjectId) -> Value {
    Value::Dict(vec![
        ("BuildIndependentTargetsInParallel".to_string(), Value::from("1")),
        ("LastSwiftUpdateCheck".to_string(), Value::from("1500")),
        ("LastUpgradeCheck".to_string(), Value::from("1500")),
        (
            "TargetAttributes".to_string(),
            Value::Dict(vec![(
                target_id.to_string(),
                Value::Dict(vec![(
                    "CreatedOnToolsVersion".to_string(),
                    Value::from("15.0"),
                )]),
            )]),
        ),
    ])
}

/// Re-key the prior target's `TargetAttributes` entry to the new target and
/// drop entries for targets that no longer exist
fn retarget_attributes(prior: &Value, old: Option<&ObjectId>, new: &ObjectId) -> Value {
    let Some(entries) = prior.as_dict() else {
        return default_attributes(new);
    };
    let entries = entries
        .iter()
        .map(|(key, value)| {
            if key != "TargetAttributes" {
                return (key.clone(), value.clone());
            }
            let kept: Vec<(String, Value)> = value
                .as_dict()
                .unwrap_or(&[])
                .iter()
                .filter(|(target, _)| old.is_some_and(|o| o.as_str() == target))
                .map(|(_, attrs)| (new.to_string(), attrs.clone()))
                .collect();
            (key.clone(), Value::Dict(kept))
        })
        .collect();
    Value::Dict(entries)
}

pub(crate) fn empty_phase(id: ObjectId, role: PhaseRole) -> BuildPhase {
    let mut extra = Fields::new();
    extra.insert("buildActionMask".to_string(), Value::from("2147483647"));
    extra.insert("runOnlyForDeploymentPostprocessing".to_string(), Value::from("0"));
    BuildPhase {
        id,
        role,
        files: Vec::new(),
        extra,
    }
}

fn configuration(id: &ObjectId, name: &str, settings: Value) -> BuildConfiguration {
    let mut extra = Fields::new();
    extra.insert("buildSettings".to_string(), settings);
    BuildConfiguration {
        id: id.clone(),
        name: name.to_string(),
        extra,
    }
}

fn configuration_list(id: ObjectId, configs: Vec<ObjectId>, default_name: &str) -> ConfigurationList {
    let mut extra = Fields::new();
    extra.insert("defaultConfigurationIsVisible".to_string(), Value::from("0"));
    extra.insert("defaultConfigurationName".to_string(), Value::string(default_name));
    ConfigurationList {
        id,
        build_configurations: configs,
        extra,
    }
}

fn string_settings(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|&(key, value)| (key.to_string(), Value::from(value)))
        .collect()
}

/// Reverse-DNS friendly form of a name
fn bundle_suffix(name: &str) -> String {
    let suffix: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if suffix.is_empty() {
        "app".to_string()
    } else {
        suffix
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{parse_fixture, SAMPLE_PROJECT};
    use crate::ident::IdAllocator;
    use crate::plist::Value;
    use crate::template::*;
    use crate::types::Entity;

    fn build_settings(index: &EntityIndex, config: &str, target: bool) -> Option<Value> {
        let list = if target {
            index.targets().next()?.build_configuration_list.clone()
        } else {
            index.project()?.build_configuration_list.clone()
        };
        configurations_of(index, &list)
            .into_iter()
            .find(|(name, _)| name == config)
            .map(|(_, settings)| settings)
    }

    #[test]
    fn test_skeleton_is_consistent() {
        let template = ProjectTemplate::new("Reverb");
        let mut allocator = IdAllocator::deterministic(7);
        let Ok(index) = template.build_skeleton(&mut allocator, None) else {
            panic!("skeleton should build");
        };
        assert!(index.verify().is_ok());
        assert_eq!(index.phases().count(), 3);
        assert_eq!(index.file_refs().count(), 1);
        assert!(index
            .file_by_path("$(BUILT_PRODUCTS_DIR)/Reverb.app")
            .is_some());
        let debug = build_settings(&index, "Debug", false);
        assert_eq!(
            debug.as_ref().and_then(|s| s.get("SWIFT_OPTIMIZATION_LEVEL")).and_then(Value::as_str),
            Some("-Onone")
        );
    }

    #[test]
    fn test_overlay_wins_over_defaults() {
        let mut template = ProjectTemplate::new("Reverb");
        template
            .target_settings
            .entry("Release".to_string())
            .or_default()
            .insert("SWIFT_VERSION".to_string(), "6.0".to_string());
        let mut allocator = IdAllocator::deterministic(1);
        let Ok(index) = template.build_skeleton(&mut allocator, None) else {
            panic!("skeleton should build");
        };
        let release = build_settings(&index, "Release", true);
        let debug = build_settings(&index, "Debug", true);
        assert_eq!(
            release.as_ref().and_then(|s| s.get("SWIFT_VERSION")).and_then(Value::as_str),
            Some("6.0")
        );
        assert_eq!(
            debug.as_ref().and_then(|s| s.get("SWIFT_VERSION")).and_then(Value::as_str),
            Some("5.0")
        );
    }

    #[test]
    fn test_prior_settings_carried_by_configuration_name() {
        let prior = parse_fixture(SAMPLE_PROJECT);
        let template = ProjectTemplate::new("Reverb");
        let mut allocator = IdAllocator::new();
        allocator.seed_from(&prior);
        let Ok(index) = template.build_skeleton(&mut allocator, Some(&prior)) else {
            panic!("skeleton should build");
        };
        for config in ["Debug", "Release"] {
            assert_eq!(
                build_settings(&index, config, true),
                build_settings(&prior, config, true)
            );
        }
        // no identifier of the prior document survives
        for entity in &index.objects {
            assert!(prior.get(entity.id().as_str()).is_none());
        }
        let target = index.targets().next().map(|t| t.id.to_string());
        let attributes = index.project().and_then(|p| p.extra.get("attributes"));
        let keyed = attributes
            .and_then(|a| a.get("TargetAttributes"))
            .and_then(Value::as_dict)
            .map(|d| d.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>());
        assert_eq!(keyed, target.map(|t| vec![t]));
        assert!(index.verify().is_ok());
        assert!(!index
            .objects
            .iter()
            .any(|e| matches!(e, Entity::BuildFile(_))));
    }
}
