//! Entity index operations - lookups, derived indexes and checked mutations
//!
//! Every mutation keeps the derived indexes current and refuses changes that
//! would break an invariant locally (identifier reuse, path reuse, a second
//! parent, an illegal phase member). Whole-document checks live in
//! `verify.rs`.

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::classify::accepts;
use crate::errors::{InvariantViolation, ManifestError};
use crate::ident::looks_like_id;
use crate::types::{
    BuildFile, BuildPhase, Entity, EntityIndex, FileReference, Group, NativeTarget, ObjectId,
    OpaqueObject, PhaseRole, Project, GROUP_TREE, SOURCE_ROOT,
};

fn violation(v: InvariantViolation) -> ManifestError {
    ManifestError::Invariant(vec![v])
}

/// Join path segments, collapsing `.` and `..` and empty components
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        normalize_path(path)
    } else {
        normalize_path(&format!("{}/{}", prefix, path))
    }
}

/// Resolve a `(sourceTree, path)` pair under a parent prefix
pub(crate) fn resolve(prefix: &str, source_tree: &str, path: Option<&str>) -> String {
    let path = path.unwrap_or("");
    match source_tree {
        GROUP_TREE => join(prefix, path),
        SOURCE_ROOT => normalize_path(path),
        tree => format!("$({})/{}", tree.trim_start_matches("$(").trim_end_matches(')'), path),
    }
}

impl EntityIndex {
    /// Empty document whose root object is `root`
    pub fn new(root: ObjectId) -> Self {
        EntityIndex {
            archive_version: "1".to_string(),
            object_version: "56".to_string(),
            root_object: root,
            ..Default::default()
        }
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    #[inline]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.object_index.get(id).map(|&idx| &self.objects[idx])
    }

    #[inline]
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.object_index
            .get(id)
            .copied()
            .map(move |idx| &mut self.objects[idx])
    }

    /// Identifier declared inside a verbatim region
    pub fn opaque(&self, id: &str) -> Option<&OpaqueObject> {
        self.opaque_index
            .get(id)
            .map(|&(region, decl)| &self.verbatim[region].declared[decl])
    }

    /// Whether `id` resolves to anything at all, typed or opaque
    pub fn contains(&self, id: &str) -> bool {
        self.object_index.contains_key(id) || self.opaque_index.contains_key(id)
    }

    /// Opaque identifier of the given kind
    fn opaque_is(&self, id: &str, kinds: &[&str]) -> bool {
        self.opaque(id)
            .and_then(|o| o.isa.as_deref())
            .is_some_and(|isa| kinds.contains(&isa))
    }

    /// Opaque entries that stand in for a file (variant groups and the like)
    pub fn is_opaque_file(&self, id: &str) -> bool {
        self.opaque_is(
            id,
            &[
                "PBXFileReference",
                "PBXVariantGroup",
                "XCVersionGroup",
                "PBXReferenceProxy",
            ],
        )
    }

    pub fn is_opaque_build_file(&self, id: &str) -> bool {
        self.opaque_is(id, &["PBXBuildFile"])
    }

    pub fn is_opaque_group(&self, id: &str) -> bool {
        self.opaque_is(id, &["PBXGroup", "PBXFileSystemSynchronizedRootGroup"])
    }

    pub fn file_ref(&self, id: &str) -> Option<&FileReference> {
        match self.get(id) {
            Some(Entity::FileReference(f)) => Some(f),
            _ => None,
        }
    }

    pub fn file_ref_mut(&mut self, id: &str) -> Option<&mut FileReference> {
        match self.get_mut(id) {
            Some(Entity::FileReference(f)) => Some(f),
            _ => None,
        }
    }

    pub fn build_file(&self, id: &str) -> Option<&BuildFile> {
        match self.get(id) {
            Some(Entity::BuildFile(b)) => Some(b),
            _ => None,
        }
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        match self.get(id) {
            Some(Entity::Group(g)) => Some(g),
            _ => None,
        }
    }

    pub fn group_mut(&mut self, id: &str) -> Option<&mut Group> {
        match self.get_mut(id) {
            Some(Entity::Group(g)) => Some(g),
            _ => None,
        }
    }

    pub fn phase(&self, id: &str) -> Option<&BuildPhase> {
        match self.get(id) {
            Some(Entity::BuildPhase(p)) => Some(p),
            _ => None,
        }
    }

    pub fn phase_mut(&mut self, id: &str) -> Option<&mut BuildPhase> {
        match self.get_mut(id) {
            Some(Entity::BuildPhase(p)) => Some(p),
            _ => None,
        }
    }

    pub fn target(&self, id: &str) -> Option<&NativeTarget> {
        match self.get(id) {
            Some(Entity::NativeTarget(t)) => Some(t),
            _ => None,
        }
    }

    pub fn target_mut(&mut self, id: &str) -> Option<&mut NativeTarget> {
        match self.get_mut(id) {
            Some(Entity::NativeTarget(t)) => Some(t),
            _ => None,
        }
    }

    /// The root project entity
    pub fn project(&self) -> Option<&Project> {
        match self.get(self.root_object.as_str()) {
            Some(Entity::Project(p)) => Some(p),
            _ => None,
        }
    }

    pub fn file_refs(&self) -> impl Iterator<Item = &FileReference> {
        self.objects.iter().filter_map(|e| match e {
            Entity::FileReference(f) => Some(f),
            _ => None,
        })
    }

    pub fn build_files(&self) -> impl Iterator<Item = &BuildFile> {
        self.objects.iter().filter_map(|e| match e {
            Entity::BuildFile(b) => Some(b),
            _ => None,
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.objects.iter().filter_map(|e| match e {
            Entity::Group(g) => Some(g),
            _ => None,
        })
    }

    pub fn phases(&self) -> impl Iterator<Item = &BuildPhase> {
        self.objects.iter().filter_map(|e| match e {
            Entity::BuildPhase(p) => Some(p),
            _ => None,
        })
    }

    pub fn targets(&self) -> impl Iterator<Item = &NativeTarget> {
        self.objects.iter().filter_map(|e| match e {
            Entity::NativeTarget(t) => Some(t),
            _ => None,
        })
    }

    /// Every identifier the document declares, typed, opaque or shadowed
    pub fn declared_ids(&self) -> impl Iterator<Item = &ObjectId> {
        self.objects
            .iter()
            .map(Entity::id)
            .chain(self.verbatim.iter().flat_map(|v| v.declared.iter().map(|o| &o.id)))
            .chain(self.shadowed.iter().map(Entity::id))
    }

    /// File reference claiming a resolved path
    pub fn file_by_path(&self, path: &str) -> Option<&ObjectId> {
        self.path_index.get(path)
    }

    pub fn parent_of(&self, id: &str) -> Option<&ObjectId> {
        self.parent_index.get(id)
    }

    pub fn phase_of(&self, build_file: &str) -> Option<&ObjectId> {
        self.phase_index.get(build_file)
    }

    pub fn wrappers_of(&self, file_ref: &str) -> &[ObjectId] {
        self.wrapper_index
            .get(file_ref)
            .map_or(&[], |wrappers| wrappers.as_slice())
    }

    /// Whether verbatim text mentions `id`
    pub fn referenced_verbatim(&self, id: &str) -> bool {
        self.verbatim_refs.contains(id)
    }

    /// Groups in the main-group subtree, in preorder. Each group is visited once.
    pub fn group_preorder(&self) -> Vec<ObjectId> {
        let mut order = Vec::new();
        let Some(project) = self.project() else {
            return order;
        };
        let mut seen = AHashSet::new();
        let mut stack = vec![project.main_group.clone()];
        while let Some(id) = stack.pop() {
            let Some(group) = self.group(id.as_str()) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id);
            for child in group.children.iter().rev() {
                if self.group(child.as_str()).is_some() {
                    stack.push(child.clone());
                }
            }
        }
        order
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    /// Comment written after an identifier, as the IDE does
    pub fn comment_for(&self, id: &str) -> Option<String> {
        if id == self.root_object.as_str() {
            return Some("Project object".to_string());
        }
        match self.get(id) {
            Some(Entity::BuildFile(b)) => {
                let file = self.display_name(b.file_ref.as_str())?;
                match self.phase_of(id).and_then(|p| self.phase(p.as_str())) {
                    Some(phase) => Some(format!("{} in {}", file, phase.role)),
                    None => Some(file),
                }
            }
            Some(Entity::FileReference(f)) => Some(f.display_name().to_string()),
            Some(Entity::Group(g)) => g.display_name().map(str::to_string),
            Some(Entity::BuildPhase(p)) => Some(p.role.name().to_string()),
            Some(Entity::NativeTarget(t)) => Some(t.name.clone()),
            Some(Entity::Project(_)) => Some("Project object".to_string()),
            Some(Entity::BuildConfiguration(c)) => Some(c.name.clone()),
            Some(Entity::ConfigurationList(_)) => self.config_list_comment(id),
            None => self.opaque(id).and_then(|o| o.comment.clone()),
        }
    }

    fn display_name(&self, id: &str) -> Option<String> {
        match self.get(id) {
            Some(Entity::FileReference(f)) => Some(f.display_name().to_string()),
            Some(_) => None,
            None => self.opaque(id).and_then(|o| o.comment.clone()),
        }
    }

    fn config_list_comment(&self, id: &str) -> Option<String> {
        if let Some(project) = self.project() {
            if project.build_configuration_list.as_str() == id {
                return Some(format!(
                    "Build configuration list for PBXProject \"{}\"",
                    self.project_name
                ));
            }
        }
        self.targets()
            .find(|t| t.build_configuration_list.as_str() == id)
            .map(|t| format!("Build configuration list for PBXNativeTarget \"{}\"", t.name))
    }

    // =========================================================================
    // DERIVED INDEXES
    // =========================================================================

    /// Rebuild every runtime index from `objects` and `verbatim`
    pub fn rebuild_indexes(&mut self) {
        self.object_index.clear();
        for (idx, entity) in self.objects.iter().enumerate() {
            self.object_index.entry(entity.id().clone()).or_insert(idx);
        }

        self.opaque_index.clear();
        for (region, verbatim) in self.verbatim.iter().enumerate() {
            for (decl, opaque) in verbatim.declared.iter().enumerate() {
                if !self.object_index.contains_key(&opaque.id) {
                    self.opaque_index
                        .entry(opaque.id.clone())
                        .or_insert((region, decl));
                }
            }
        }

        self.parent_index.clear();
        self.phase_index.clear();
        self.wrapper_index.clear();
        for entity in &self.objects {
            match entity {
                Entity::Group(g) => {
                    for child in &g.children {
                        self.parent_index
                            .entry(child.clone())
                            .or_insert_with(|| g.id.clone());
                    }
                }
                Entity::BuildPhase(p) => {
                    for member in &p.files {
                        self.phase_index
                            .entry(member.clone())
                            .or_insert_with(|| p.id.clone());
                    }
                }
                Entity::BuildFile(b) => {
                    self.wrapper_index
                        .entry(b.file_ref.clone())
                        .or_default()
                        .push(b.id.clone());
                }
                _ => {}
            }
        }

        self.verbatim_refs.clear();
        for verbatim in &self.verbatim {
            for token in verbatim
                .text
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|t| looks_like_id(t))
            {
                self.verbatim_refs.insert(ObjectId::from(token));
            }
        }

        self.resolve_paths();
    }

    fn rebuild_object_index(&mut self) {
        self.object_index.clear();
        for (idx, entity) in self.objects.iter().enumerate() {
            self.object_index.entry(entity.id().clone()).or_insert(idx);
        }
    }

    /// Recompute each file reference's project-relative path from the group tree
    pub fn resolve_paths(&mut self) {
        let mut prefixes: AHashMap<ObjectId, String> = AHashMap::new();
        if let Some(project) = self.project() {
            let main = project.main_group.clone();
            let mut stack = vec![(main, String::new())];
            let mut seen = AHashSet::new();
            while let Some((id, parent_prefix)) = stack.pop() {
                let Some(group) = self.group(id.as_str()) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }
                let prefix = resolve(&parent_prefix, &group.source_tree, group.path.as_deref());
                for child in &group.children {
                    if self.group(child.as_str()).is_some() {
                        stack.push((child.clone(), prefix.clone()));
                    } else {
                        prefixes.insert(child.clone(), prefix.clone());
                    }
                }
            }
        }

        self.path_index.clear();
        for entity in &mut self.objects {
            if let Entity::FileReference(f) = entity {
                let prefix = prefixes.get(&f.id).map_or("", String::as_str);
                f.relative_path = resolve(prefix, &f.source_tree, Some(&f.path));
                self.path_index
                    .entry(f.relative_path.clone())
                    .or_insert_with(|| f.id.clone());
            }
        }
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Add an entity. Fails if its identifier is taken or, for a file
    /// reference, if its resolved path is already claimed.
    pub fn insert(&mut self, entity: Entity) -> Result<(), ManifestError> {
        let id = entity.id().clone();
        if self.contains(id.as_str()) {
            return Err(violation(InvariantViolation::DuplicateIdentifier(id)));
        }
        match &entity {
            Entity::FileReference(f) => {
                if let Some(first) = self.path_index.get(&f.relative_path) {
                    return Err(violation(InvariantViolation::DuplicatePath {
                        path: f.relative_path.clone(),
                        first: first.clone(),
                        second: id,
                    }));
                }
                self.path_index.insert(f.relative_path.clone(), id.clone());
            }
            Entity::BuildFile(b) => {
                if self.file_ref(b.file_ref.as_str()).is_none()
                    && !self.is_opaque_file(b.file_ref.as_str())
                {
                    return Err(violation(InvariantViolation::DanglingFileRef {
                        build_file: id,
                        file_ref: b.file_ref.clone(),
                    }));
                }
                self.wrapper_index
                    .entry(b.file_ref.clone())
                    .or_default()
                    .push(id.clone());
            }
            Entity::Group(g) => {
                for child in &g.children {
                    self.parent_index.insert(child.clone(), id.clone());
                }
            }
            Entity::BuildPhase(p) => {
                for member in &p.files {
                    self.phase_index.insert(member.clone(), id.clone());
                }
            }
            _ => {}
        }
        self.object_index.insert(id, self.objects.len());
        self.objects.push(entity);
        Ok(())
    }

    /// Remove an entity and every membership that lists it
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let idx = self.object_index.get(id).copied()?;
        let entity = self.objects.remove(idx);
        self.rebuild_object_index();

        self.detach(id);
        if let Some(phase) = self.phase_index.remove(id) {
            if let Some(p) = self.phase_mut(phase.as_str()) {
                p.files.retain(|m| m.as_str() != id);
            }
        }

        match &entity {
            Entity::FileReference(f) => {
                if self.path_index.get(&f.relative_path).is_some_and(|o| o.as_str() == id) {
                    self.path_index.remove(&f.relative_path);
                }
            }
            Entity::BuildFile(b) => {
                if let Some(wrappers) = self.wrapper_index.get_mut(&b.file_ref) {
                    wrappers.retain(|w| w.as_str() != id);
                }
            }
            Entity::Group(g) => {
                for child in &g.children {
                    if self.parent_index.get(child).is_some_and(|p| p.as_str() == id) {
                        self.parent_index.remove(child);
                    }
                }
            }
            Entity::BuildPhase(p) => {
                for member in &p.files {
                    if self.phase_index.get(member).is_some_and(|ph| ph.as_str() == id) {
                        self.phase_index.remove(member);
                    }
                }
                for entity in &mut self.objects {
                    if let Entity::NativeTarget(t) = entity {
                        t.build_phases.retain(|ph| ph.as_str() != id);
                    }
                }
            }
            _ => {}
        }
        debug!("Removed {} {}", entity.isa(), id);
        Some(entity)
    }

    /// Remove a file reference together with its build files
    pub fn remove_file(&mut self, id: &str) -> Vec<Entity> {
        let wrappers: SmallVec<[ObjectId; 2]> = self.wrappers_of(id).iter().cloned().collect();
        let mut removed: Vec<Entity> = wrappers
            .iter()
            .filter_map(|w| self.remove(w.as_str()))
            .collect();
        removed.extend(self.remove(id));
        self.wrapper_index.remove(id);
        removed
    }

    /// Take `child` out of its parent group, if it has one
    pub fn detach(&mut self, child: &str) -> Option<ObjectId> {
        let parent = self.parent_index.remove(child)?;
        if let Some(group) = self.group_mut(parent.as_str()) {
            group.children.retain(|c| c.as_str() != child);
        }
        Some(parent)
    }

    /// Append `child` to `group`. The child must exist, have no parent yet
    /// and, when it is a group, must not be an ancestor of `group`.
    pub fn attach(&mut self, group: &str, child: &str) -> Result<(), ManifestError> {
        let group_id = ObjectId::from(group);
        let child_id = ObjectId::from(child);
        if self.group(group).is_none() {
            return Err(violation(InvariantViolation::DanglingChild {
                group: group_id,
                child: child_id,
            }));
        }
        if !self.contains(child) {
            return Err(violation(InvariantViolation::DanglingChild {
                group: group_id,
                child: child_id,
            }));
        }
        if let Some(existing) = self.parent_index.get(child) {
            return Err(violation(InvariantViolation::MultipleParents {
                child: child_id,
                first: existing.clone(),
                second: group_id,
            }));
        }
        if self.is_ancestor(child, group) {
            return Err(violation(InvariantViolation::GroupCycle { group: child_id }));
        }
        if let Some(g) = self.group_mut(group) {
            g.children.push(child_id.clone());
        }
        self.parent_index.insert(child_id, group_id);
        Ok(())
    }

    /// Move `child` under `group`
    pub fn reparent(&mut self, child: &str, group: &str) -> Result<(), ManifestError> {
        if self.parent_of(child).is_some_and(|p| p.as_str() == group) {
            return Ok(());
        }
        let previous = self.detach(child);
        let result = self.attach(group, child);
        if result.is_err() {
            if let Some(previous) = previous {
                // restore the old membership before reporting
                if let Some(g) = self.group_mut(previous.as_str()) {
                    g.children.push(ObjectId::from(child));
                }
                self.parent_index.insert(ObjectId::from(child), previous);
            }
        }
        result
    }

    /// Whether `ancestor` lies on the parent chain of `node` (or is `node`)
    fn is_ancestor(&self, ancestor: &str, node: &str) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.objects.len() {
                return true;
            }
            current = self.parent_index.get(id).map(ObjectId::as_str);
        }
        false
    }

    /// Append a build file to a phase, checking that the file type is legal
    /// for the phase and that the file has no other build file in this role.
    pub fn append_to_phase(&mut self, phase: &str, build_file: &str) -> Result<(), ManifestError> {
        let Some(role) = self.phase(phase).map(|p| p.role) else {
            return Err(violation(InvariantViolation::DanglingReference {
                from: ObjectId::from(build_file),
                to: ObjectId::from(phase),
            }));
        };
        let Some(file_ref) = self.build_file(build_file).map(|b| b.file_ref.clone()) else {
            return Err(violation(InvariantViolation::DanglingPhaseMember {
                phase: ObjectId::from(phase),
                member: ObjectId::from(build_file),
            }));
        };
        if self.phase_index.contains_key(build_file) {
            return Err(violation(InvariantViolation::SharedBuildFile {
                build_file: ObjectId::from(build_file),
            }));
        }
        if let Some(file) = self.file_ref(file_ref.as_str()) {
            let declared = file.declared_type.as_deref().unwrap_or("");
            if !accepts(role, declared) {
                return Err(violation(InvariantViolation::IllegalPhaseMember {
                    phase: ObjectId::from(phase),
                    role: role.to_string(),
                    path: file.relative_path.clone(),
                    declared_type: declared.to_string(),
                }));
            }
        }
        if self.role_wrappers(file_ref.as_str(), role).next().is_some() {
            return Err(violation(InvariantViolation::DuplicateMembership {
                path: self.path_label(file_ref.as_str()),
                role: role.to_string(),
            }));
        }
        if let Some(p) = self.phase_mut(phase) {
            p.files.push(ObjectId::from(build_file));
        }
        self.phase_index
            .insert(ObjectId::from(build_file), ObjectId::from(phase));
        Ok(())
    }

    /// Build files of `file_ref` listed by a typed phase of `role`
    pub fn role_wrappers<'a>(
        &'a self,
        file_ref: &str,
        role: PhaseRole,
    ) -> impl Iterator<Item = &'a ObjectId> + 'a {
        self.wrappers_of(file_ref).iter().filter(move |w| {
            self.phase_of(w.as_str())
                .and_then(|p| self.phase(p.as_str()))
                .is_some_and(|p| p.role == role)
        })
    }

    /// Path of a file for messages, falling back to its identifier
    pub fn path_label(&self, id: &str) -> String {
        match self.file_ref(id) {
            Some(f) => f.relative_path.clone(),
            None => id.to_string(),
        }
    }

    /// Point a file reference at a new location and refresh its path index entry
    pub fn relocate_file(
        &mut self,
        id: &str,
        path: &str,
        source_tree: &str,
        name: Option<String>,
    ) -> Result<(), ManifestError> {
        let resolved = resolve("", source_tree, Some(path));
        if let Some(owner) = self.path_index.get(&resolved) {
            if owner.as_str() != id {
                return Err(violation(InvariantViolation::DuplicatePath {
                    path: resolved,
                    first: owner.clone(),
                    second: ObjectId::from(id),
                }));
            }
        }
        let Some(file) = self.file_ref_mut(id) else {
            return Ok(());
        };
        let old = std::mem::replace(&mut file.relative_path, resolved.clone());
        file.path = path.to_string();
        file.source_tree = source_tree.to_string();
        file.name = name;
        if self.path_index.get(&old).is_some_and(|o| o.as_str() == id) {
            self.path_index.remove(&old);
        }
        self.path_index.insert(resolved, ObjectId::from(id));
        Ok(())
    }
}
