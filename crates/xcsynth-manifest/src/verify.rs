//! Whole-document invariant check
//!
//! Walks the graph once and reports every broken invariant rather than
//! stopping at the first one. Run after synthesis and before every write.

use ahash::{AHashMap, AHashSet};

use crate::classify::accepts;
use crate::errors::{InvariantViolation, ManifestError};
use crate::types::{Entity, EntityIndex, ObjectId, PhaseRole};

impl EntityIndex {
    /// Check I1..I5 over the whole document
    pub fn verify(&self) -> Result<(), ManifestError> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ManifestError::Invariant(violations))
        }
    }

    /// Every broken invariant, in a stable order
    pub fn violations(&self) -> Vec<InvariantViolation> {
        let mut out = Vec::new();
        self.check_identifiers(&mut out);
        self.check_build_files(&mut out);
        self.check_phases(&mut out);
        self.check_group_tree(&mut out);
        self.check_paths(&mut out);
        self.check_anchors(&mut out);
        out
    }

    fn check_identifiers(&self, out: &mut Vec<InvariantViolation>) {
        let mut seen: AHashSet<&ObjectId> = AHashSet::new();
        for id in self.declared_ids() {
            if !seen.insert(id) {
                out.push(InvariantViolation::DuplicateIdentifier(id.clone()));
            }
        }
        for id in &self.id_conflicts {
            out.push(InvariantViolation::DuplicateIdentifier(id.clone()));
        }

        if self.project().is_none() {
            out.push(InvariantViolation::MissingProject(self.root_object.clone()));
        }
        for entity in &self.objects {
            if let Entity::Project(p) = entity {
                if p.id != self.root_object {
                    out.push(InvariantViolation::ExtraProject(p.id.clone()));
                }
            }
        }
    }

    fn check_build_files(&self, out: &mut Vec<InvariantViolation>) {
        for build_file in self.build_files() {
            let target = build_file.file_ref.as_str();
            if self.file_ref(target).is_none() && !self.is_opaque_file(target) {
                out.push(InvariantViolation::DanglingFileRef {
                    build_file: build_file.id.clone(),
                    file_ref: build_file.file_ref.clone(),
                });
            }
        }
    }

    fn check_phases(&self, out: &mut Vec<InvariantViolation>) {
        let mut listed: AHashSet<&ObjectId> = AHashSet::new();
        let mut memberships: AHashSet<(&ObjectId, PhaseRole)> = AHashSet::new();
        for phase in self.phases() {
            for member in &phase.files {
                if !listed.insert(member) {
                    out.push(InvariantViolation::SharedBuildFile {
                        build_file: member.clone(),
                    });
                    continue;
                }
                let Some(build_file) = self.build_file(member.as_str()) else {
                    if !self.is_opaque_build_file(member.as_str()) {
                        out.push(InvariantViolation::DanglingPhaseMember {
                            phase: phase.id.clone(),
                            member: member.clone(),
                        });
                    }
                    continue;
                };
                let Some(file) = self.file_ref(build_file.file_ref.as_str()) else {
                    // dangling file refs are reported under I1; opaque files are not typed
                    continue;
                };
                let declared = file.declared_type.as_deref().unwrap_or("");
                if !accepts(phase.role, declared) {
                    out.push(InvariantViolation::IllegalPhaseMember {
                        phase: phase.id.clone(),
                        role: phase.role.to_string(),
                        path: file.relative_path.clone(),
                        declared_type: declared.to_string(),
                    });
                }
                if !memberships.insert((&file.id, phase.role)) {
                    out.push(InvariantViolation::DuplicateMembership {
                        path: file.relative_path.clone(),
                        role: phase.role.to_string(),
                    });
                }
            }
        }
    }

    fn check_group_tree(&self, out: &mut Vec<InvariantViolation>) {
        let mut parents: AHashMap<&ObjectId, &ObjectId> = AHashMap::new();
        for group in self.groups() {
            for child in &group.children {
                if !self.contains(child.as_str()) {
                    out.push(InvariantViolation::DanglingChild {
                        group: group.id.clone(),
                        child: child.clone(),
                    });
                    continue;
                }
                match parents.get(child) {
                    Some(first) => out.push(InvariantViolation::MultipleParents {
                        child: child.clone(),
                        first: (*first).clone(),
                        second: group.id.clone(),
                    }),
                    None => {
                        parents.insert(child, &group.id);
                    }
                }
            }
        }

        let Some(project) = self.project() else {
            return;
        };
        if self.group(project.main_group.as_str()).is_none()
            && !self.is_opaque_group(project.main_group.as_str())
        {
            out.push(InvariantViolation::MissingMainGroup(
                project.main_group.clone(),
            ));
            return;
        }

        // depth-first walk; a child already on the stack is a back edge
        let mut reached: AHashSet<&ObjectId> = AHashSet::new();
        let mut on_path: AHashSet<&ObjectId> = AHashSet::new();
        let mut stack: Vec<(&ObjectId, usize)> = vec![(&project.main_group, 0)];
        reached.insert(&project.main_group);
        on_path.insert(&project.main_group);
        while let Some((id, next)) = stack.pop() {
            let children = self
                .group(id.as_str())
                .map_or(&[][..], |g| g.children.as_slice());
            let Some(child) = children.get(next) else {
                on_path.remove(id);
                continue;
            };
            stack.push((id, next + 1));
            if on_path.contains(child) {
                out.push(InvariantViolation::GroupCycle {
                    group: child.clone(),
                });
                continue;
            }
            if reached.insert(child) && self.group(child.as_str()).is_some() {
                on_path.insert(child);
                stack.push((child, 0));
            }
        }

        // files inside an opaque container (variant groups) are listed by verbatim text
        for entity in &self.objects {
            match entity {
                Entity::FileReference(f)
                    if !reached.contains(&f.id) && !self.referenced_verbatim(f.id.as_str()) =>
                {
                    out.push(InvariantViolation::Unreachable {
                        id: f.id.clone(),
                        path: f.relative_path.clone(),
                    });
                }
                Entity::Group(g) if !reached.contains(&g.id) => {
                    out.push(InvariantViolation::Unreachable {
                        id: g.id.clone(),
                        path: g.display_name().unwrap_or("").to_string(),
                    });
                }
                _ => {}
            }
        }
    }

    fn check_paths(&self, out: &mut Vec<InvariantViolation>) {
        let mut claimed: AHashMap<&str, &ObjectId> = AHashMap::new();
        for file in self.file_refs() {
            match claimed.get(file.relative_path.as_str()) {
                Some(first) => out.push(InvariantViolation::DuplicatePath {
                    path: file.relative_path.clone(),
                    first: (*first).clone(),
                    second: file.id.clone(),
                }),
                None => {
                    claimed.insert(&file.relative_path, &file.id);
                }
            }
        }
    }

    /// Project, target and configuration-list references must resolve
    fn check_anchors(&self, out: &mut Vec<InvariantViolation>) {
        for entity in &self.objects {
            let refs: Vec<&ObjectId> = match entity {
                Entity::Project(_) | Entity::NativeTarget(_) | Entity::ConfigurationList(_) => {
                    entity.references()
                }
                _ => continue,
            };
            for to in refs {
                if !self.contains(to.as_str()) {
                    out.push(InvariantViolation::DanglingReference {
                        from: entity.id().clone(),
                        to: to.clone(),
                    });
                }
            }
        }
    }
}
