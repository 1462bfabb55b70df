//! Conversion between raw dictionary entries and typed entities

use crate::plist::Value;
use crate::types::{
    BuildConfiguration, BuildFile, BuildPhase, ConfigurationList, Entity, Fields, FileReference,
    Group, Isa, NativeTarget, ObjectId, PhaseRole, Project,
};

/// Dictionary body of one entry with its `isa` removed
struct Record(Fields);

impl Record {
    fn new(entries: Vec<(String, Value)>) -> Self {
        Record(entries.into_iter().collect())
    }

    /// Take a string field. A present field of the wrong shape is a mismatch.
    fn string(&mut self, key: &str) -> Result<Option<String>, ()> {
        match self.0.remove(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => {
                self.0.insert(key.to_string(), other);
                Err(())
            }
        }
    }

    fn required(&mut self, key: &str) -> Result<String, ()> {
        self.string(key)?.ok_or(())
    }

    fn id(&mut self, key: &str) -> Result<ObjectId, ()> {
        self.required(key).map(ObjectId::from)
    }

    fn ids(&mut self, key: &str) -> Result<Vec<ObjectId>, ()> {
        let list = match self.0.get(key) {
            Some(value) => value.as_string_list().ok_or(())?,
            None => return Err(()),
        };
        self.0.remove(key);
        Ok(list.into_iter().map(ObjectId::from).collect())
    }

    fn finish(self) -> Fields {
        self.0
    }
}

/// Build a typed entity from a dictionary entry.
///
/// Returns `None` when the entry does not match the template of its kind;
/// the caller keeps such entries verbatim.
pub fn entity_from_record(id: &str, isa: Isa, entries: Vec<(String, Value)>) -> Option<Entity> {
    let mut record = Record::new(entries);
    record.0.remove("isa");
    let id = ObjectId::from(id);
    let entity = match isa {
        Isa::BuildFile => Entity::BuildFile(BuildFile {
            id,
            file_ref: record.id("fileRef").ok()?,
            extra: record.finish(),
        }),
        Isa::FileReference => {
            let path = record.required("path").ok()?;
            let source_tree = record.required("sourceTree").ok()?;
            let name = record.string("name").ok()?;
            let (declared_type, explicit_type) = match record.string("explicitFileType").ok()? {
                Some(t) => (Some(t), true),
                None => (record.string("lastKnownFileType").ok()?, false),
            };
            Entity::FileReference(FileReference {
                id,
                relative_path: path.clone(),
                path,
                name,
                source_tree,
                declared_type,
                explicit_type,
                extra: record.finish(),
            })
        }
        Isa::Group => Entity::Group(Group {
            id,
            children: record.ids("children").ok()?,
            name: record.string("name").ok()?,
            path: record.string("path").ok()?,
            source_tree: record.required("sourceTree").ok()?,
            extra: record.finish(),
        }),
        Isa::SourcesBuildPhase | Isa::FrameworksBuildPhase | Isa::ResourcesBuildPhase => {
            Entity::BuildPhase(BuildPhase {
                id,
                role: PhaseRole::from_isa(isa)?,
                files: record.ids("files").ok()?,
                extra: record.finish(),
            })
        }
        Isa::NativeTarget => Entity::NativeTarget(NativeTarget {
            id,
            name: record.required("name").ok()?,
            build_configuration_list: record.id("buildConfigurationList").ok()?,
            build_phases: record.ids("buildPhases").ok()?,
            product_reference: record.string("productReference").ok()?.map(ObjectId::from),
            extra: record.finish(),
        }),
        Isa::Project => Entity::Project(Project {
            id,
            build_configuration_list: record.id("buildConfigurationList").ok()?,
            main_group: record.id("mainGroup").ok()?,
            product_ref_group: record.string("productRefGroup").ok()?.map(ObjectId::from),
            targets: record.ids("targets").ok()?,
            extra: record.finish(),
        }),
        Isa::BuildConfiguration => Entity::BuildConfiguration(BuildConfiguration {
            id,
            name: record.required("name").ok()?,
            extra: record.finish(),
        }),
        Isa::ConfigurationList => Entity::ConfigurationList(ConfigurationList {
            id,
            build_configurations: record.ids("buildConfigurations").ok()?,
            extra: record.finish(),
        }),
    };
    Some(entity)
}

fn id_list(ids: &[ObjectId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::string(id.as_str())).collect())
}

/// Dictionary body for an entity: `isa` first, remaining keys sorted
pub fn entity_to_record(entity: &Entity) -> Vec<(String, Value)> {
    let mut fields: Fields = Fields::new();
    let mut put = |key: &str, value: Value| {
        fields.insert(key.to_string(), value);
    };
    let extra = match entity {
        Entity::BuildFile(e) => {
            put("fileRef", Value::string(e.file_ref.as_str()));
            &e.extra
        }
        Entity::FileReference(e) => {
            put("path", Value::string(&e.path));
            put("sourceTree", Value::string(&e.source_tree));
            if let Some(name) = &e.name {
                put("name", Value::string(name));
            }
            if let Some(declared) = &e.declared_type {
                let key = if e.explicit_type {
                    "explicitFileType"
                } else {
                    "lastKnownFileType"
                };
                put(key, Value::string(declared));
            }
            &e.extra
        }
        Entity::Group(e) => {
            put("children", id_list(&e.children));
            put("sourceTree", Value::string(&e.source_tree));
            if let Some(name) = &e.name {
                put("name", Value::string(name));
            }
            if let Some(path) = &e.path {
                put("path", Value::string(path));
            }
            &e.extra
        }
        Entity::BuildPhase(e) => {
            put("files", id_list(&e.files));
            &e.extra
        }
        Entity::NativeTarget(e) => {
            put("name", Value::string(&e.name));
            put(
                "buildConfigurationList",
                Value::string(e.build_configuration_list.as_str()),
            );
            put("buildPhases", id_list(&e.build_phases));
            if let Some(product) = &e.product_reference {
                put("productReference", Value::string(product.as_str()));
            }
            &e.extra
        }
        Entity::Project(e) => {
            put(
                "buildConfigurationList",
                Value::string(e.build_configuration_list.as_str()),
            );
            put("mainGroup", Value::string(e.main_group.as_str()));
            if let Some(products) = &e.product_ref_group {
                put("productRefGroup", Value::string(products.as_str()));
            }
            put("targets", id_list(&e.targets));
            &e.extra
        }
        Entity::BuildConfiguration(e) => {
            put("name", Value::string(&e.name));
            &e.extra
        }
        Entity::ConfigurationList(e) => {
            put("buildConfigurations", id_list(&e.build_configurations));
            &e.extra
        }
    };
    for (key, value) in extra {
        fields
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    let mut record = Vec::with_capacity(fields.len() + 1);
    record.push(("isa".to_string(), Value::string(entity.isa().as_str())));
    record.extend(fields);
    record
}
