//! Synthesis of a consistent document from a path set
//!
//! This module provides:
//! - `plan`, the classification and group mapping of scanned paths
//! - `SyncEngine`, full and incremental synthesis with structural repair
//! - `SyncResult` / `SyncWarning`, the counts and non-fatal findings of a run
//!
//! Every run ends with a whole-document `verify`; a violation is returned as
//! an error and the index is never handed out half repaired.

use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::classify::{accepts, classify, Classification};
use crate::errors::{InvariantViolation, ManifestError};
use crate::ident::IdAllocator;
use crate::index::{normalize_path, resolve};
use crate::layout::GroupLayout;
use crate::template::{empty_phase, ProjectTemplate};
use crate::types::{
    BuildFile, Entity, EntityIndex, Fields, FileReference, Group, ObjectId, PhaseRole, GROUP_TREE,
    SOURCE_ROOT,
};

// =============================================================================
// SYNC RESULT
// =============================================================================

/// A non-fatal finding of a synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    /// Extension with no known file type; the path was skipped
    Unclassified { path: String },
    /// Distinct paths sharing a file name, kept as distinct files
    DuplicateBasename { name: String, paths: Vec<String> },
    /// Structural damage fixed in an existing document
    Repaired { action: String },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::Unclassified { path } => {
                write!(f, "no file type known for {}, skipped", path)
            }
            SyncWarning::DuplicateBasename { name, paths } => write!(
                f,
                "{} files are named {}: {}",
                paths.len(),
                name,
                paths.join(", ")
            ),
            SyncWarning::Repaired { action } => write!(f, "repaired: {}", action),
        }
    }
}

/// Result of a synthesis run
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncResult {
    pub files_inserted: usize,
    pub files_removed: usize,
    pub files_retained: usize,
    pub groups_pruned: usize,
    pub repairs: usize,
    pub warnings: Vec<SyncWarning>,
}

impl SyncResult {
    fn warn(&mut self, warning: SyncWarning) {
        warn!("{}", warning);
        if matches!(warning, SyncWarning::Repaired { .. }) {
            self.repairs += 1;
        }
        self.warnings.push(warning);
    }
}

/// A synthesized document together with what the run did
#[derive(Debug)]
pub struct Synthesis {
    pub index: EntityIndex,
    pub result: SyncResult,
}

// =============================================================================
// PLANNING
// =============================================================================

/// One scanned path, classified and mapped to its destination group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFile {
    pub path: String,
    #[serde(flatten)]
    pub classification: Classification,
    /// Group path segments below the main group
    pub group: Vec<String>,
}

impl PlannedFile {
    pub fn role(&self) -> Option<PhaseRole> {
        self.classification.kind.phase()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Sorted by path, one entry per distinct path
    pub files: Vec<PlannedFile>,
    pub warnings: Vec<SyncWarning>,
}

/// Classify and place every path. Duplicates are collapsed; unknown
/// extensions and shared file names become warnings.
pub fn plan(layout: &GroupLayout, paths: &[String]) -> Plan {
    let mut result = Plan::default();
    let mut seen: AHashSet<String> = AHashSet::new();
    for raw in paths {
        let path = normalize_path(raw);
        if path.is_empty() || !seen.insert(path.clone()) {
            continue;
        }
        match classify(&path) {
            Some(classification) => result.files.push(PlannedFile {
                group: layout.group_for(&path),
                classification,
                path,
            }),
            None => result.warnings.push(SyncWarning::Unclassified { path }),
        }
    }
    result.files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut by_name: Vec<(&str, Vec<String>)> = Vec::new();
    let mut slot: AHashMap<&str, usize> = AHashMap::new();
    for file in &result.files {
        let name = basename(&file.path);
        match slot.get(name) {
            Some(&i) => by_name[i].1.push(file.path.clone()),
            None => {
                slot.insert(name, by_name.len());
                by_name.push((name, vec![file.path.clone()]));
            }
        }
    }
    let shared: Vec<SyncWarning> = by_name
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(name, paths)| SyncWarning::DuplicateBasename {
            name: name.to_string(),
            paths,
        })
        .collect();
    result.warnings.extend(shared);
    result
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `name` recorded for a `SOURCE_ROOT` reference, omitted when equal to the path
fn reference_name(path: &str) -> Option<String> {
    let name = basename(path);
    (name != path).then(|| name.to_string())
}

// =============================================================================
// SYNC ENGINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Discard the document and rebuild it from the template
    Full,
    /// Patch the existing document, keeping identifiers of unchanged paths
    Incremental,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub layout: GroupLayout,
    pub template: ProjectTemplate,
}

/// Entities every placement step hangs files from
struct Anchors {
    main_group: ObjectId,
    products_group: Option<ObjectId>,
    target: ObjectId,
    phases: AHashMap<PhaseRole, ObjectId>,
}

impl Anchors {
    fn resolve(index: &EntityIndex, target_name: &str) -> Result<Self, ManifestError> {
        let Some(project) = index.project() else {
            return Err(ManifestError::Invariant(vec![InvariantViolation::MissingProject(
                index.root_object.clone(),
            )]));
        };
        if index.group(project.main_group.as_str()).is_none() {
            return Err(ManifestError::Invariant(vec![InvariantViolation::MissingMainGroup(
                project.main_group.clone(),
            )]));
        }
        let target = project
            .targets
            .iter()
            .filter_map(|id| index.target(id.as_str()))
            .find(|t| t.name == target_name)
            .or_else(|| {
                project
                    .targets
                    .iter()
                    .find_map(|id| index.target(id.as_str()))
            });
        let Some(target) = target else {
            return Err(ManifestError::Configuration(
                "document has no native target".to_string(),
            ));
        };
        if target.name != target_name {
            debug!("No target named {}, using {}", target_name, target.name);
        }

        let mut phases = AHashMap::new();
        for id in &target.build_phases {
            if let Some(phase) = index.phase(id.as_str()) {
                phases.entry(phase.role).or_insert_with(|| id.clone());
            }
        }
        Ok(Anchors {
            main_group: project.main_group.clone(),
            products_group: project.product_ref_group.clone(),
            target: target.id.clone(),
            phases,
        })
    }
}

/// Engine for synthesizing documents from path sets
pub struct SyncEngine {
    options: SyncOptions,
    allocator: IdAllocator,
}

impl SyncEngine {
    /// Engine drawing random identifiers
    pub fn new(options: SyncOptions) -> Self {
        SyncEngine {
            options,
            allocator: IdAllocator::new(),
        }
    }

    /// Replace the identifier source, e.g. with a seeded allocator
    pub fn with_allocator(mut self, allocator: IdAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one synthesis. Incremental mode without a document falls back to
    /// full synthesis.
    pub fn run(
        &mut self,
        mode: SyncMode,
        paths: &[String],
        existing: Option<EntityIndex>,
    ) -> Result<Synthesis, ManifestError> {
        match (mode, existing) {
            (SyncMode::Incremental, Some(index)) => self.incremental(paths, index),
            (SyncMode::Incremental, None) => {
                info!("No existing document, running full synthesis");
                self.full(paths, None)
            }
            (SyncMode::Full, prior) => self.full(paths, prior.as_ref()),
        }
    }

    /// Build a new document from the template and the path set. Identifiers
    /// of `prior` are never reused; only its settings are carried over.
    pub fn full(
        &mut self,
        paths: &[String],
        prior: Option<&EntityIndex>,
    ) -> Result<Synthesis, ManifestError> {
        let plan = plan(&self.options.layout, paths);
        let mut result = SyncResult::default();
        for warning in plan.warnings.iter().cloned() {
            result.warn(warning);
        }

        let mut index = self.options.template.build_skeleton(&mut self.allocator, prior)?;
        let mut anchors = Anchors::resolve(&index, &self.options.template.target_name)?;
        for file in &plan.files {
            self.place(&mut index, &mut anchors, file, &mut result)?;
        }
        finish(&mut index, &anchors, &AHashSet::new(), &mut result)?;
        info!(
            "Full synthesis: {} files, {} entities",
            result.files_inserted,
            index.objects.len()
        );
        Ok(Synthesis { index, result })
    }

    /// Patch `existing` to match the path set: repair it, drop vanished
    /// paths, place new ones and re-order memberships.
    pub fn incremental(
        &mut self,
        paths: &[String],
        existing: EntityIndex,
    ) -> Result<Synthesis, ManifestError> {
        let plan = plan(&self.options.layout, paths);
        let mut result = SyncResult::default();
        for warning in plan.warnings.iter().cloned() {
            result.warn(warning);
        }

        self.allocator.seed_from(&existing);
        // groups that arrive empty belong to the user and are never pruned
        let empty_on_entry: AHashSet<ObjectId> = existing
            .groups()
            .filter(|g| g.children.is_empty())
            .map(|g| g.id.clone())
            .collect();
        let mut index = existing;
        repair(&mut index, &mut result);

        let mut anchors = Anchors::resolve(&index, &self.options.template.target_name)?;
        let planned: AHashSet<&str> = plan.files.iter().map(|f| f.path.as_str()).collect();
        remove_vanished(&mut index, &planned, &mut result);
        for file in &plan.files {
            self.place(&mut index, &mut anchors, file, &mut result)?;
        }
        finish(&mut index, &anchors, &empty_on_entry, &mut result)?;
        info!(
            "Incremental synthesis: {} inserted, {} removed, {} retained",
            result.files_inserted, result.files_removed, result.files_retained
        );
        Ok(Synthesis { index, result })
    }

    // =========================================================================
    // PLACEMENT
    // =========================================================================

    fn place(
        &mut self,
        index: &mut EntityIndex,
        anchors: &mut Anchors,
        file: &PlannedFile,
        result: &mut SyncResult,
    ) -> Result<(), ManifestError> {
        let group = self.ensure_group(index, anchors, &file.group)?;
        let existing = index
            .file_by_path(&file.path)
            .filter(|id| index.file_ref(id.as_str()).is_some_and(FileReference::is_managed))
            .cloned();

        let file_id = match existing {
            Some(id) => {
                result.files_retained += 1;
                adopt(index, &id, &group, file)?;
                id
            }
            None => {
                result.files_inserted += 1;
                let id = self.allocator.allocate()?;
                index.insert(Entity::FileReference(FileReference {
                    id: id.clone(),
                    path: file.path.clone(),
                    name: reference_name(&file.path),
                    source_tree: SOURCE_ROOT.to_string(),
                    declared_type: Some(file.classification.declared_type.to_string()),
                    explicit_type: false,
                    extra: Fields::new(),
                    relative_path: file.path.clone(),
                }))?;
                index.attach(group.as_str(), id.as_str())?;
                debug!("Added {} as {}", file.path, id);
                id
            }
        };

        if let Some(role) = file.role() {
            if index.role_wrappers(file_id.as_str(), role).next().is_none() {
                let phase = self.phase_for(index, anchors, role)?;
                let build_file = self.allocator.allocate()?;
                index.insert(Entity::BuildFile(BuildFile {
                    id: build_file.clone(),
                    file_ref: file_id,
                    extra: Fields::new(),
                }))?;
                index.append_to_phase(phase.as_str(), build_file.as_str())?;
            }
        }
        Ok(())
    }

    /// Walk (and create where missing) the group chain below the main group
    fn ensure_group(
        &mut self,
        index: &mut EntityIndex,
        anchors: &Anchors,
        segments: &[String],
    ) -> Result<ObjectId, ManifestError> {
        let mut current = anchors.main_group.clone();
        for segment in segments {
            let found = index.group(current.as_str()).and_then(|g| {
                g.children
                    .iter()
                    .filter(|c| anchors.products_group.as_ref() != Some(*c))
                    .find(|c| {
                        index
                            .group(c.as_str())
                            .is_some_and(|child| child.display_name() == Some(segment.as_str()))
                    })
                    .cloned()
            });
            current = match found {
                Some(id) => id,
                None => {
                    let id = self.allocator.allocate()?;
                    index.insert(Entity::Group(Group {
                        id: id.clone(),
                        name: Some(segment.clone()),
                        path: None,
                        source_tree: GROUP_TREE.to_string(),
                        children: Vec::new(),
                        extra: Fields::new(),
                    }))?;
                    index.attach(current.as_str(), id.as_str())?;
                    debug!("Created group {} ({})", segment, id);
                    id
                }
            };
        }
        Ok(current)
    }

    /// The target's phase for `role`, created when the target has none
    fn phase_for(
        &mut self,
        index: &mut EntityIndex,
        anchors: &mut Anchors,
        role: PhaseRole,
    ) -> Result<ObjectId, ManifestError> {
        if let Some(id) = anchors.phases.get(&role) {
            return Ok(id.clone());
        }
        let id = self.allocator.allocate()?;
        index.insert(Entity::BuildPhase(empty_phase(id.clone(), role)))?;
        if let Some(target) = index.target_mut(anchors.target.as_str()) {
            target.build_phases.push(id.clone());
        }
        debug!("Created {} phase {}", role, id);
        anchors.phases.insert(role, id.clone());
        Ok(id)
    }
}

/// Move a reused reference into its destination group and fix its type
fn adopt(
    index: &mut EntityIndex,
    id: &ObjectId,
    group: &ObjectId,
    file: &PlannedFile,
) -> Result<(), ManifestError> {
    let parent = index.parent_of(id.as_str()).cloned();
    let in_opaque_container = parent.is_none() && index.referenced_verbatim(id.as_str());
    if !in_opaque_container && parent.as_ref() != Some(group) {
        index.reparent(id.as_str(), group.as_str())?;
        let prefix = group_prefix(index, group);
        let stale = index.file_ref(id.as_str()).is_some_and(|f| {
            f.source_tree == GROUP_TREE && resolve(&prefix, GROUP_TREE, Some(&f.path)) != file.path
        });
        if stale {
            index.relocate_file(
                id.as_str(),
                &file.path,
                SOURCE_ROOT,
                reference_name(&file.path),
            )?;
            debug!("Rewrote {} to a SOURCE_ROOT reference", file.path);
        }
    }

    if let Some(f) = index.file_ref_mut(id.as_str()) {
        let wrong = match (&f.declared_type, file.role()) {
            (None, _) => true,
            (Some(declared), Some(role)) => !accepts(role, declared),
            (Some(_), None) => false,
        };
        if wrong {
            debug!(
                "Declared type of {} set to {}",
                file.path, file.classification.declared_type
            );
            f.declared_type = Some(file.classification.declared_type.to_string());
            f.explicit_type = false;
        }
    }
    Ok(())
}

/// Resolved path prefix of a group, from the main group down
fn group_prefix(index: &EntityIndex, group: &ObjectId) -> String {
    let mut chain = vec![group.clone()];
    while let Some(parent) = chain.last().and_then(|id| index.parent_of(id.as_str())) {
        if chain.len() > index.objects.len() {
            break;
        }
        chain.push(parent.clone());
    }
    chain.iter().rev().fold(String::new(), |prefix, id| match index.group(id.as_str()) {
        Some(g) => resolve(&prefix, &g.source_tree, g.path.as_deref()),
        None => prefix,
    })
}

/// Remove managed references whose path left the set. Matching is by
/// resolved path only, so a file sharing a basename is never touched.
fn remove_vanished(index: &mut EntityIndex, planned: &AHashSet<&str>, result: &mut SyncResult) {
    let vanished: Vec<(ObjectId, String)> = index
        .file_refs()
        .filter(|f| f.is_managed() && !planned.contains(f.relative_path.as_str()))
        .filter(|f| !index.referenced_verbatim(f.id.as_str()))
        .map(|f| (f.id.clone(), f.relative_path.clone()))
        .collect();
    for (id, path) in vanished {
        let removed = index.remove_file(id.as_str());
        debug!("Removed {} ({} entities)", path, removed.len());
        result.files_removed += 1;
    }
}

// =============================================================================
// REPAIR
// =============================================================================

fn repaired(result: &mut SyncResult, action: String) {
    result.warn(SyncWarning::Repaired { action });
}

/// Fix structural damage in a parsed document before placement
fn repair(index: &mut EntityIndex, result: &mut SyncResult) {
    for entity in std::mem::take(&mut index.shadowed) {
        repaired(
            result,
            format!("dropped second declaration of {} {}", entity.isa(), entity.id()),
        );
    }
    drop_dangling(index, result);
    index.rebuild_indexes();
    repair_group_tree(index, result);
    index.rebuild_indexes();
    repair_duplicate_paths(index, result);
    repair_build_files(index, result);
    index.rebuild_indexes();
    repair_stray_files(index, result);
    index.rebuild_indexes();
}

/// Drop list entries that point at nothing
fn drop_dangling(index: &mut EntityIndex, result: &mut SyncResult) {
    let present: AHashSet<ObjectId> = index.declared_ids().cloned().collect();
    let build_files: AHashSet<ObjectId> = index
        .declared_ids()
        .filter(|id| {
            index.build_file(id.as_str()).is_some() || index.is_opaque_build_file(id.as_str())
        })
        .cloned()
        .collect();

    let mut actions = Vec::new();
    for entity in &mut index.objects {
        let id = entity.id().clone();
        let (list, allowed, what) = match entity {
            Entity::Group(g) => (&mut g.children, &present, "children"),
            Entity::BuildPhase(p) => (&mut p.files, &build_files, "phase members"),
            Entity::NativeTarget(t) => (&mut t.build_phases, &present, "target phases"),
            Entity::Project(p) => (&mut p.targets, &present, "project targets"),
            Entity::ConfigurationList(l) => {
                (&mut l.build_configurations, &present, "configurations")
            }
            _ => continue,
        };
        let before = list.len();
        list.retain(|id| allowed.contains(id));
        if list.len() < before {
            actions.push(format!(
                "dropped {} dangling {} of {}",
                before - list.len(),
                what,
                id
            ));
        }
    }
    for action in actions {
        repaired(result, action);
    }
}

/// Keep the first parent of every child in a walk from the main group,
/// dropping back edges, then remove groups the walk never reached.
fn repair_group_tree(index: &mut EntityIndex, result: &mut SyncResult) {
    let Some((main, products)) = index
        .project()
        .map(|p| (p.main_group.clone(), p.product_ref_group.clone()))
    else {
        return;
    };

    let mut claimed: AHashSet<ObjectId> = AHashSet::new();
    claimed.insert(main.clone());
    let mut stack = vec![main.clone()];
    let mut rewritten: Vec<(ObjectId, Vec<ObjectId>)> = Vec::new();
    while let Some(id) = stack.pop() {
        let Some(group) = index.group(id.as_str()) else {
            continue;
        };
        let mut kept = Vec::with_capacity(group.children.len());
        let mut subgroups = Vec::new();
        for child in &group.children {
            if claimed.insert(child.clone()) {
                kept.push(child.clone());
                if index.group(child.as_str()).is_some() {
                    subgroups.push(child.clone());
                }
            }
        }
        // preorder: the first subgroup is walked next
        stack.extend(subgroups.into_iter().rev());
        if kept.len() < group.children.len() {
            rewritten.push((id, kept));
        }
    }
    for (id, kept) in rewritten {
        if let Some(group) = index.group_mut(id.as_str()) {
            let dropped = group.children.len() - kept.len();
            group.children = kept;
            repaired(
                result,
                format!("dropped {} repeated or cyclic children of group {}", dropped, id),
            );
        }
    }

    let unreachable: Vec<ObjectId> = index
        .groups()
        .map(|g| g.id.clone())
        .filter(|id| !claimed.contains(id) && products.as_ref() != Some(id))
        .collect();
    for id in unreachable {
        index.remove(id.as_str());
        repaired(result, format!("removed unreachable group {}", id));
    }
    if let Some(products) = products {
        if index.group(products.as_str()).is_some() && !claimed.contains(&products) {
            index.detach(products.as_str());
            if index.attach(main.as_str(), products.as_str()).is_ok() {
                repaired(result, "moved the products group under the main group".to_string());
            }
        }
    }
}

/// Of the references claiming one path, keep one reachable from the group
/// tree, then one that is built, then the first in document order
fn repair_duplicate_paths(index: &mut EntityIndex, result: &mut SyncResult) {
    let reachable: AHashSet<ObjectId> = index.group_preorder().into_iter().collect();
    let mut order: Vec<String> = Vec::new();
    let mut claims: AHashMap<String, Vec<ObjectId>> = AHashMap::new();
    for f in index.file_refs() {
        let ids = claims.entry(f.relative_path.clone()).or_insert_with(|| {
            order.push(f.relative_path.clone());
            Vec::new()
        });
        ids.push(f.id.clone());
    }

    let mut duplicates: Vec<(ObjectId, String)> = Vec::new();
    for path in order {
        let Some(ids) = claims.remove(&path).filter(|ids| ids.len() > 1) else {
            continue;
        };
        let keep = ids
            .iter()
            .min_by_key(|id| {
                let grouped = index
                    .parent_of(id.as_str())
                    .is_some_and(|p| reachable.contains(p));
                (!grouped, index.wrappers_of(id.as_str()).is_empty())
            })
            .cloned();
        duplicates.extend(
            ids.into_iter()
                .filter(|id| Some(id) != keep.as_ref())
                .map(|id| (id, path.clone())),
        );
    }
    for (id, path) in duplicates {
        index.remove_file(id.as_str());
        repaired(result, format!("removed duplicate reference {} for {}", id, path));
    }
}

fn repair_build_files(index: &mut EntityIndex, result: &mut SyncResult) {
    // a build file listed by two phases stays in the first
    let mut listed: AHashSet<ObjectId> = AHashSet::new();
    let mut shared = 0;
    for entity in &mut index.objects {
        if let Entity::BuildPhase(p) = entity {
            let before = p.files.len();
            p.files.retain(|m| listed.insert(m.clone()));
            shared += before - p.files.len();
        }
    }
    if shared > 0 {
        index.rebuild_indexes();
        repaired(result, format!("dropped {} build files listed by two phases", shared));
    }

    let build_files: Vec<ObjectId> = index.build_files().map(|b| b.id.clone()).collect();
    for id in build_files {
        let Some(file_ref) = index.build_file(id.as_str()).map(|b| b.file_ref.clone()) else {
            continue;
        };
        let dangling =
            index.file_ref(file_ref.as_str()).is_none() && !index.is_opaque_file(file_ref.as_str());
        let unlisted = index.phase_of(id.as_str()).is_none() && !index.referenced_verbatim(id.as_str());
        if dangling || unlisted {
            index.remove(id.as_str());
            let why = if dangling { "a missing file" } else { "no phase" };
            repaired(result, format!("removed build file {} pointing at {}", id, why));
        }
    }

    repair_illegal_members(index, result);

    let mut duplicates: Vec<(ObjectId, String)> = Vec::new();
    for file in index.file_refs() {
        for role in [PhaseRole::Sources, PhaseRole::Frameworks, PhaseRole::Resources] {
            duplicates.extend(
                index
                    .role_wrappers(file.id.as_str(), role)
                    .skip(1)
                    .map(|w| (w.clone(), format!("{} in {}", file.relative_path, role))),
            );
        }
    }
    for (id, what) in duplicates {
        index.remove(id.as_str());
        repaired(result, format!("removed extra build file {} for {}", id, what));
    }
}

/// A member whose declared type the phase cannot build is retyped when its
/// extension says it belongs there, otherwise removed
fn repair_illegal_members(index: &mut EntityIndex, result: &mut SyncResult) {
    let mut illegal: Vec<(ObjectId, ObjectId, PhaseRole)> = Vec::new();
    for phase in index.phases() {
        for member in &phase.files {
            let Some(file) = index
                .build_file(member.as_str())
                .and_then(|b| index.file_ref(b.file_ref.as_str()))
            else {
                continue;
            };
            if !accepts(phase.role, file.declared_type.as_deref().unwrap_or("")) {
                illegal.push((member.clone(), file.id.clone(), phase.role));
            }
        }
    }

    for (member, file_id, role) in illegal {
        let retype = index.file_ref(file_id.as_str()).and_then(|f| {
            classify(&f.relative_path)
                .filter(|c| f.is_managed() && accepts(role, c.declared_type))
                .map(|c| (f.relative_path.clone(), c.declared_type))
        });
        match retype {
            Some((path, declared)) => {
                if let Some(f) = index.file_ref_mut(file_id.as_str()) {
                    f.declared_type = Some(declared.to_string());
                    f.explicit_type = false;
                }
                repaired(result, format!("declared type of {} set to {}", path, declared));
            }
            None => {
                let path = index.path_label(file_id.as_str());
                index.remove(member.as_str());
                repaired(result, format!("removed {} from the {} phase", path, role));
            }
        }
    }
}

/// Unmanaged references outside the group tree: the product goes back to
/// Products, anything still built goes to the main group, the rest is dropped
fn repair_stray_files(index: &mut EntityIndex, result: &mut SyncResult) {
    let Some((main, products)) = index
        .project()
        .map(|p| (p.main_group.clone(), p.product_ref_group.clone()))
    else {
        return;
    };
    let product_refs: AHashSet<ObjectId> = index
        .targets()
        .filter_map(|t| t.product_reference.clone())
        .collect();
    let reachable: AHashSet<ObjectId> = index.group_preorder().into_iter().collect();

    let stray: Vec<ObjectId> = index
        .file_refs()
        .filter(|f| !f.is_managed())
        .filter(|f| {
            !index
                .parent_of(f.id.as_str())
                .is_some_and(|p| reachable.contains(p))
        })
        .filter(|f| !index.referenced_verbatim(f.id.as_str()))
        .map(|f| f.id.clone())
        .collect();
    for id in stray {
        index.detach(id.as_str());
        let home = if product_refs.contains(&id) {
            products.clone().filter(|p| index.group(p.as_str()).is_some())
        } else if !index.wrappers_of(id.as_str()).is_empty() {
            Some(main.clone())
        } else {
            None
        };
        let attached = match &home {
            Some(group) => index.attach(group.as_str(), id.as_str()).is_ok(),
            None => false,
        };
        match home {
            Some(group) if attached => {
                repaired(result, format!("re-attached {} to group {}", id, group));
            }
            _ => {
                let label = index.path_label(id.as_str());
                index.remove_file(id.as_str());
                repaired(result, format!("removed unreachable reference {}", label));
            }
        }
    }
}

// =============================================================================
// ORDERING
// =============================================================================

/// Order memberships, prune groups this run left empty and check the result
fn finish(
    index: &mut EntityIndex,
    anchors: &Anchors,
    kept_empty: &AHashSet<ObjectId>,
    result: &mut SyncResult,
) -> Result<(), ManifestError> {
    let protected = [Some(&anchors.main_group), anchors.products_group.as_ref()];
    result.groups_pruned = prune_empty_groups(index, &protected, kept_empty);
    order_children(index, anchors.products_group.as_ref());
    order_phase_members(index);
    index.rebuild_indexes();
    index.verify()
}

/// Remove empty groups until none is left, keeping the anchors and the
/// groups in `kept_empty`
fn prune_empty_groups(
    index: &mut EntityIndex,
    protected: &[Option<&ObjectId>],
    kept_empty: &AHashSet<ObjectId>,
) -> usize {
    let mut pruned = 0;
    loop {
        let empty: Vec<ObjectId> = index
            .groups()
            .filter(|g| g.children.is_empty())
            .filter(|g| !protected.contains(&Some(&g.id)) && !kept_empty.contains(&g.id))
            .filter(|g| !index.referenced_verbatim(g.id.as_str()))
            .map(|g| g.id.clone())
            .collect();
        if empty.is_empty() {
            return pruned;
        }
        for id in empty {
            index.remove(id.as_str());
            debug!("Pruned empty group {}", id);
            pruned += 1;
        }
    }
}

/// Subgroups by name, then managed files by path, then everything else in
/// its original order, with the products group last
fn order_children(index: &mut EntityIndex, products: Option<&ObjectId>) {
    let groups: Vec<ObjectId> = index.groups().map(|g| g.id.clone()).collect();
    for id in groups {
        let Some(group) = index.group(id.as_str()) else {
            continue;
        };
        let mut subgroups: Vec<(String, ObjectId)> = Vec::new();
        let mut files: Vec<(String, ObjectId)> = Vec::new();
        let mut others: Vec<ObjectId> = Vec::new();
        let mut tail: Vec<ObjectId> = Vec::new();
        for child in &group.children {
            if products == Some(child) {
                tail.push(child.clone());
            } else if let Some(g) = index.group(child.as_str()) {
                subgroups.push((g.display_name().unwrap_or("").to_string(), child.clone()));
            } else if let Some(f) = index.file_ref(child.as_str()).filter(|f| f.is_managed()) {
                files.push((f.relative_path.clone(), child.clone()));
            } else {
                others.push(child.clone());
            }
        }
        subgroups.sort();
        files.sort();
        let ordered: Vec<ObjectId> = subgroups
            .into_iter()
            .map(|(_, id)| id)
            .chain(files.into_iter().map(|(_, id)| id))
            .chain(others)
            .chain(tail)
            .collect();
        if let Some(group) = index.group_mut(id.as_str()) {
            group.children = ordered;
        }
    }
}

/// Unmanaged members first in their original order, then managed members
/// by the preorder position of their group, then by path
fn order_phase_members(index: &mut EntityIndex) {
    let rank: AHashMap<ObjectId, usize> = index
        .group_preorder()
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let phases: Vec<ObjectId> = index.phases().map(|p| p.id.clone()).collect();
    for id in phases {
        let Some(phase) = index.phase(id.as_str()) else {
            continue;
        };
        let mut fixed: Vec<ObjectId> = Vec::new();
        let mut managed: Vec<(usize, String, ObjectId)> = Vec::new();
        for member in &phase.files {
            let file = index
                .build_file(member.as_str())
                .and_then(|b| index.file_ref(b.file_ref.as_str()))
                .filter(|f| f.is_managed());
            match file {
                Some(f) => {
                    let position = index
                        .parent_of(f.id.as_str())
                        .and_then(|g| rank.get(g))
                        .copied()
                        .unwrap_or(usize::MAX);
                    managed.push((position, f.relative_path.clone(), member.clone()));
                }
                None => fixed.push(member.clone()),
            }
        }
        managed.sort();
        fixed.extend(managed.into_iter().map(|(_, _, m)| m));
        if let Some(phase) = index.phase_mut(id.as_str()) {
            phase.files = fixed;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures::{parse_fixture, SAMPLE_PROJECT};
    use crate::ident::IdAllocator;
    use crate::layout::{GroupLayout, GroupRule};
    use crate::manifest_writer::write_document;
    use crate::parser::parse_document;
    use crate::sync::*;
    use crate::types::Entity;
    use proptest::prelude::*;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn engine(seed: u64) -> SyncEngine {
        SyncEngine::new(SyncOptions {
            layout: GroupLayout::default(),
            template: ProjectTemplate::new("Reverb"),
        })
        .with_allocator(IdAllocator::deterministic(seed))
    }

    fn managed(index: &EntityIndex) -> Vec<&FileReference> {
        index.file_refs().filter(|f| f.is_managed()).collect()
    }

    fn sources_paths(index: &EntityIndex) -> Vec<String> {
        index
            .phases()
            .filter(|p| p.role == PhaseRole::Sources)
            .flat_map(|p| p.files.iter())
            .filter_map(|m| index.build_file(m.as_str()))
            .map(|b| index.path_label(b.file_ref.as_str()))
            .collect()
    }

    fn id_of(index: &EntityIndex, path: &str) -> Option<ObjectId> {
        index.file_by_path(path).cloned()
    }

    #[test]
    fn test_fresh_synthesis_scenario_a() {
        let Ok(out) = engine(1).full(&paths(&["Services/Audio.swift", "ContentView.swift"]), None)
        else {
            panic!("synthesis should succeed");
        };
        let index = &out.index;
        assert_eq!(managed(index).len(), 2);
        assert_eq!(index.build_files().count(), 2);
        assert_eq!(
            index
                .groups()
                .filter(|g| g.display_name() == Some("Services"))
                .count(),
            1
        );
        assert_eq!(
            sources_paths(index),
            vec!["ContentView.swift".to_string(), "Services/Audio.swift".to_string()]
        );
        assert!(out.result.warnings.is_empty());
    }

    #[test]
    fn test_removed_path_scenario_b() {
        let Ok(first) = engine(1).full(&paths(&["ContentView.swift", "Services/Audio.swift"]), None)
        else {
            panic!("synthesis should succeed");
        };
        let reparsed = parse_document(&write_document(&first.index));
        let Ok(reparsed) = reparsed else {
            panic!("output should parse");
        };
        let before = first.index.objects.len();
        let content_id = id_of(&first.index, "ContentView.swift");
        let content_wrappers = content_id
            .as_ref()
            .map(|id| first.index.wrappers_of(id.as_str()).to_vec());

        let Ok(second) = engine(2).incremental(&paths(&["ContentView.swift"]), reparsed.index)
        else {
            panic!("incremental synthesis should succeed");
        };
        let index = &second.index;
        // reference, build file and the emptied Services group
        assert_eq!(index.objects.len(), before - 3);
        assert!(id_of(index, "Services/Audio.swift").is_none());
        assert!(index.groups().all(|g| g.display_name() != Some("Services")));
        assert_eq!(id_of(index, "ContentView.swift"), content_id);
        assert_eq!(
            content_id.map(|id| index.wrappers_of(id.as_str()).to_vec()),
            content_wrappers
        );
        assert_eq!(second.result.files_removed, 1);
        assert_eq!(second.result.files_retained, 1);
        assert_eq!(second.result.groups_pruned, 1);
    }

    #[test]
    fn test_shared_basename_scenario_c() {
        let Ok(out) = engine(3).full(&paths(&["Services/Audio.swift", "Testing/Audio.swift"]), None)
        else {
            panic!("synthesis should succeed");
        };
        let a = id_of(&out.index, "Services/Audio.swift");
        let b = id_of(&out.index, "Testing/Audio.swift");
        assert!(a.is_some() && b.is_some());
        assert_ne!(a, b);
        let shared: Vec<&SyncWarning> = out
            .result
            .warnings
            .iter()
            .filter(|w| matches!(w, SyncWarning::DuplicateBasename { .. }))
            .collect();
        assert_eq!(shared.len(), 1);
        assert!(shared[0].to_string().contains("Audio.swift"));
    }

    #[test]
    fn test_removing_one_of_two_same_named_files_keeps_the_other() {
        let set = paths(&["Services/Audio.swift", "Testing/Audio.swift"]);
        let Ok(first) = engine(3).full(&set, None) else {
            panic!("synthesis should succeed");
        };
        let kept = id_of(&first.index, "Testing/Audio.swift");
        let Ok(second) = engine(4).incremental(&paths(&["Testing/Audio.swift"]), first.index)
        else {
            panic!("incremental synthesis should succeed");
        };
        assert_eq!(id_of(&second.index, "Testing/Audio.swift"), kept);
        assert!(id_of(&second.index, "Services/Audio.swift").is_none());
        assert_eq!(second.index.build_files().count(), 1);
    }

    #[test]
    fn test_full_synthesis_is_byte_identical_across_runs() {
        let set = paths(&["ContentView.swift", "Services/Audio.swift", "Assets.xcassets"]);
        let first = engine(9).full(&set, None).map(|s| write_document(&s.index));
        let second = engine(9).full(&set, None).map(|s| write_document(&s.index));
        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("synthesis should succeed");
        };
        assert_eq!(first, second);

        // regenerating over its own output carries the same settings back
        let Ok(prior) = parse_document(&first) else {
            panic!("output should parse");
        };
        let again = engine(9).full(&set, Some(&prior.index)).map(|s| write_document(&s.index));
        assert!(again.is_ok_and(|text| text == first));
    }

    #[test]
    fn test_incremental_is_idempotent_on_sample() {
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(first) = engine(5).incremental(&set, parse_fixture(SAMPLE_PROJECT)) else {
            panic!("incremental synthesis should succeed");
        };
        assert_eq!(first.result.files_inserted, 0);
        assert_eq!(first.result.repairs, 0);
        let text = write_document(&first.index);
        let Ok(again) = engine(6).incremental(&set, parse_fixture(&text)) else {
            panic!("second run should succeed");
        };
        assert_eq!(write_document(&again.index), text);
        // the shell script phase passes through untouched
        assert!(text.contains("shellScript = \"echo \\\"lint\\\"\\n\";"));
    }

    #[test]
    fn test_new_file_lands_in_existing_group() {
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Services/Mixer.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, parse_fixture(SAMPLE_PROJECT)) else {
            panic!("incremental synthesis should succeed");
        };
        let index = &out.index;
        let Some(mixer) = id_of(index, "Reverb/Services/Mixer.swift") else {
            panic!("Mixer.swift should be placed");
        };
        let parent = index.parent_of(mixer.as_str()).and_then(|g| index.group(g.as_str()));
        assert_eq!(parent.and_then(|g| g.display_name()), Some("Services"));
        assert_eq!(
            sources_paths(index),
            vec![
                "Reverb/ContentView.swift".to_string(),
                "Reverb/Services/Audio.swift".to_string(),
                "Reverb/Services/Mixer.swift".to_string(),
            ]
        );
    }

    #[test]
    fn test_layout_rule_moves_group_reference() {
        let mut e = SyncEngine::new(SyncOptions {
            layout: GroupLayout {
                default: crate::layout::DefaultGroup::Directory,
                rules: vec![GroupRule {
                    prefix: "Reverb/Services".to_string(),
                    group: "Reverb/Audio".to_string(),
                    extensions: Vec::new(),
                }],
            },
            template: ProjectTemplate::new("Reverb"),
        })
        .with_allocator(IdAllocator::deterministic(8));
        let set = paths(&["Reverb/ContentView.swift", "Reverb/Services/Audio.swift"]);
        let Ok(out) = e.incremental(&set, parse_fixture(SAMPLE_PROJECT)) else {
            panic!("incremental synthesis should succeed");
        };
        let index = &out.index;
        let Some(audio) = index.file_ref("2B0000000000000000000002") else {
            panic!("Audio.swift keeps its identifier");
        };
        assert_eq!(audio.source_tree, SOURCE_ROOT);
        assert_eq!(audio.relative_path, "Reverb/Services/Audio.swift");
        let parent = index.parent_of(audio.id.as_str()).and_then(|g| index.group(g.as_str()));
        assert_eq!(parent.and_then(|g| g.display_name()), Some("Audio"));
    }

    #[test]
    fn test_repairs_duplicate_path_and_stray_build_file() {
        let damaged = SAMPLE_PROJECT
            .replace(
                "/* End PBXBuildFile section */",
                "\t\t1A0000000000000000000009 /* Gone.swift in Sources */ = {isa = PBXBuildFile; fileRef = 2B0000000000000000000009 /* Gone.swift */; };\n/* End PBXBuildFile section */",
            )
            .replace(
                "/* End PBXFileReference section */",
                "\t\t2B0000000000000000000008 /* Audio.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = Audio.swift; sourceTree = \"<group>\"; };\n/* End PBXFileReference section */",
            )
            .replace(
                "\t\t\t\t2B0000000000000000000002 /* Audio.swift */,\n",
                "\t\t\t\t2B0000000000000000000002 /* Audio.swift */,\n\t\t\t\t2B0000000000000000000008 /* Audio.swift */,\n",
            );
        let Ok(doc) = parse_document(&damaged) else {
            panic!("damaged document should still parse");
        };
        assert!(doc.index.verify().is_err());

        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, doc.index) else {
            panic!("repair should succeed");
        };
        assert!(out.index.get("2B0000000000000000000008").is_none());
        assert!(out.index.get("1A0000000000000000000009").is_none());
        assert!(out.index.get("2B0000000000000000000002").is_some());
        assert!(out.result.repairs >= 2);
    }

    #[test]
    fn test_duplicate_path_keeps_the_grouped_built_reference() {
        let damaged = SAMPLE_PROJECT.replace(
            "\t\t2B0000000000000000000001 /* ContentView.swift */ = {",
            "\t\t2B0000000000000000000000 /* ContentView.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = Reverb/ContentView.swift; sourceTree = SOURCE_ROOT; };\n\t\t2B0000000000000000000001 /* ContentView.swift */ = {",
        );
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, parse_fixture(&damaged)) else {
            panic!("repair should succeed");
        };
        let index = &out.index;
        assert_eq!(
            id_of(index, "Reverb/ContentView.swift"),
            Some(ObjectId::from("2B0000000000000000000001"))
        );
        assert!(index.get("2B0000000000000000000000").is_none());
        assert!(index.get("1A0000000000000000000001").is_some());
        assert_eq!(out.result.files_inserted, 0);
        assert!(out
            .result
            .warnings
            .iter()
            .any(|w| w.to_string().contains("2B0000000000000000000000")));
    }

    #[test]
    fn test_empty_user_group_survives_unchanged_patch() {
        let with_notes = SAMPLE_PROJECT
            .replace(
                "\t\t\t\t3C0000000000000000000003 /* Products */,\n",
                "\t\t\t\t3C0000000000000000000009 /* Notes */,\n\t\t\t\t3C0000000000000000000003 /* Products */,\n",
            )
            .replace(
                "/* End PBXGroup section */",
                "\t\t3C0000000000000000000009 /* Notes */ = {\n\t\t\tisa = PBXGroup;\n\t\t\tchildren = (\n\t\t\t);\n\t\t\tname = Notes;\n\t\t\tsourceTree = \"<group>\";\n\t\t};\n/* End PBXGroup section */",
            );
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, parse_fixture(&with_notes)) else {
            panic!("incremental synthesis should succeed");
        };
        assert!(out.index.group("3C0000000000000000000009").is_some());
        assert_eq!(out.result.groups_pruned, 0);

        // a group emptied by this run is still pruned
        let shrunk = paths(&["Reverb/ContentView.swift", "Reverb/Assets.xcassets", "Reverb/Info.plist"]);
        let Ok(out) = engine(6).incremental(&shrunk, parse_fixture(&with_notes)) else {
            panic!("incremental synthesis should succeed");
        };
        assert!(out.index.group("3C0000000000000000000009").is_some());
        assert!(out.index.group("3C0000000000000000000004").is_none());
        assert_eq!(out.result.groups_pruned, 1);
    }

    #[test]
    fn test_repairs_second_parent_and_illegal_member() {
        let damaged = SAMPLE_PROJECT
            .replace(
                "\t\t\t\t2B0000000000000000000005 /* Reverb.app */,\n",
                "\t\t\t\t2B0000000000000000000005 /* Reverb.app */,\n\t\t\t\t2B0000000000000000000001 /* ContentView.swift */,\n",
            )
            .replace(
                "\t\t\t\t1A0000000000000000000003 /* Assets.xcassets in Resources */,\n\t\t\t);\n\t\t\trunOnlyForDeploymentPostprocessing = 0;\n\t\t};\n/* End PBXResourcesBuildPhase",
                "\t\t\t\t1A0000000000000000000003 /* Assets.xcassets in Resources */,\n\t\t\t\t1A0000000000000000000001 /* ContentView.swift in Sources */,\n\t\t\t);\n\t\t\trunOnlyForDeploymentPostprocessing = 0;\n\t\t};\n/* End PBXResourcesBuildPhase",
            );
        let Ok(doc) = parse_document(&damaged) else {
            panic!("damaged document should still parse");
        };
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, doc.index) else {
            panic!("repair should succeed");
        };
        let index = &out.index;
        let products = index.groups().find(|g| g.display_name() == Some("Products"));
        assert!(products.is_some_and(|g| g.children.len() == 1));
        assert_eq!(
            sources_paths(index),
            vec![
                "Reverb/ContentView.swift".to_string(),
                "Reverb/Services/Audio.swift".to_string()
            ]
        );
    }

    #[test]
    fn test_unclassified_paths_are_dropped_with_warning() {
        let Ok(out) = engine(1).full(&paths(&["README.md", "App.swift", "App.swift"]), None) else {
            panic!("synthesis should succeed");
        };
        assert_eq!(managed(&out.index).len(), 1);
        assert_eq!(
            out.result.warnings,
            vec![SyncWarning::Unclassified {
                path: "README.md".to_string()
            }]
        );
    }

    #[test]
    fn test_headers_and_plists_are_listed_but_not_built() {
        let Ok(out) = engine(1).full(&paths(&["Engine/DSP.h", "Info.plist", "Engine/DSP.cpp"]), None)
        else {
            panic!("synthesis should succeed");
        };
        assert_eq!(managed(&out.index).len(), 3);
        assert_eq!(out.index.build_files().count(), 1);
        assert_eq!(sources_paths(&out.index), vec!["Engine/DSP.cpp".to_string()]);
    }

    #[test]
    fn test_missing_phase_is_created_on_target() {
        let mut index = parse_fixture(SAMPLE_PROJECT);
        let resources: Vec<ObjectId> = index
            .phases()
            .filter(|p| p.role == PhaseRole::Resources)
            .map(|p| p.id.clone())
            .collect();
        for id in resources {
            index.remove(id.as_str());
        }
        let set = paths(&[
            "Reverb/ContentView.swift",
            "Reverb/Services/Audio.swift",
            "Reverb/Assets.xcassets",
            "Reverb/Info.plist",
        ]);
        let Ok(out) = engine(5).incremental(&set, index) else {
            panic!("incremental synthesis should succeed");
        };
        let target = out.index.targets().next();
        let has_resources = target.is_some_and(|t| {
            t.build_phases
                .iter()
                .any(|p| out.index.phase(p.as_str()).is_some_and(|p| p.role == PhaseRole::Resources))
        });
        assert!(has_resources);
        assert!(out
            .index
            .objects
            .iter()
            .any(|e| matches!(e, Entity::BuildPhase(p) if p.role == PhaseRole::Resources && p.files.len() == 1)));
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        let dirs = prop::sample::select(vec!["", "Services/", "Views/", "Testing/", "Reverb/Audio/"]);
        let exts = prop::sample::select(vec![
            "swift", "m", "h", "cpp", "xcassets", "png", "plist", "json", "framework",
        ]);
        (dirs, "[A-Z][a-z]{0,5}", exts).prop_map(|(dir, stem, ext)| format!("{}{}.{}", dir, stem, ext))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_synthesis_holds_invariants_and_round_trips(
            set in prop::collection::vec(path_strategy(), 0..24),
            keep in prop::collection::vec(any::<bool>(), 24),
        ) {
            let Ok(first) = engine(11).full(&set, None) else {
                panic!("full synthesis should succeed");
            };
            prop_assert!(first.index.violations().is_empty());

            let text = write_document(&first.index);
            let Ok(reparsed) = parse_document(&text) else {
                panic!("output should parse");
            };
            prop_assert!(reparsed.diagnostics.is_empty());
            prop_assert_eq!(&reparsed.index, &first.index);

            let subset: Vec<String> = set
                .iter()
                .zip(keep.iter())
                .filter(|(_, k)| **k)
                .map(|(p, _)| p.clone())
                .collect();
            let Ok(second) = engine(12).incremental(&subset, reparsed.index) else {
                panic!("incremental synthesis should succeed");
            };
            prop_assert!(second.index.violations().is_empty());
            for path in &subset {
                if classify(path).is_some() {
                    prop_assert_eq!(id_of(&second.index, path), id_of(&first.index, path));
                }
            }
        }
    }
}
