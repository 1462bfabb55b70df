//! Project document serializer plus file helpers
//!
//! Output follows the IDE's own layout: tab indentation, one section per
//! kind in alphabetical order, `isa` first then sorted keys, single-line
//! build files and file references, and a `/* comment */` after every value
//! that names an object. Output depends only on the index, so equal indexes
//! serialize to identical bytes.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::ManifestError;
use crate::parser::{parse_document, ParsedDocument};
use crate::plist::{quote, Value};
use crate::record::entity_to_record;
use crate::types::{Entity, EntityIndex};

fn tabs(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push('\t');
    }
}

struct Writer<'a> {
    index: &'a EntityIndex,
    out: String,
}

impl<'a> Writer<'a> {
    fn comment(&mut self, s: &str) {
        if let Some(comment) = self.index.comment_for(s) {
            let _ = write!(self.out, " /* {} */", comment);
        }
    }

    fn string(&mut self, s: &str) {
        self.out.push_str(&quote(s));
        self.comment(s);
    }

    fn inline(&mut self, value: &Value) {
        match value {
            Value::String(s) => self.string(s),
            Value::Array(items) => {
                self.out.push('(');
                for item in items {
                    self.inline(item);
                    self.out.push_str(", ");
                }
                self.out.push(')');
            }
            Value::Dict(entries) => {
                self.out.push('{');
                for (key, item) in entries {
                    self.out.push_str(&quote(key));
                    self.out.push_str(" = ");
                    self.inline(item);
                    self.out.push_str("; ");
                }
                self.out.push('}');
            }
        }
    }

    fn block(&mut self, value: &Value, level: usize) {
        match value {
            Value::String(s) => self.string(s),
            Value::Array(items) => {
                self.out.push_str("(\n");
                for item in items {
                    tabs(&mut self.out, level + 1);
                    self.block(item, level + 1);
                    self.out.push_str(",\n");
                }
                tabs(&mut self.out, level);
                self.out.push(')');
            }
            Value::Dict(entries) => {
                self.out.push_str("{\n");
                for (key, item) in entries {
                    tabs(&mut self.out, level + 1);
                    self.out.push_str(&quote(key));
                    self.out.push_str(" = ");
                    self.block(item, level + 1);
                    self.out.push_str(";\n");
                }
                tabs(&mut self.out, level);
                self.out.push('}');
            }
        }
    }

    fn entity(&mut self, entity: &Entity) {
        let id = entity.id().as_str();
        self.out.push_str("\t\t");
        self.out.push_str(&quote(id));
        self.comment(id);
        self.out.push_str(" = ");
        let record = Value::Dict(entity_to_record(entity));
        if entity.isa().is_inline() {
            self.inline(&record);
        } else {
            self.block(&record, 2);
        }
        self.out.push_str(";\n");
    }

    fn document(mut self) -> String {
        let index = self.index;
        self.out.push_str("// !$*UTF8*$!\n{\n");
        let _ = writeln!(self.out, "\tarchiveVersion = {};", quote(&index.archive_version));
        self.out.push_str("\tclasses = {\n\t};\n");
        let _ = writeln!(self.out, "\tobjectVersion = {};", quote(&index.object_version));
        self.out.push_str("\tobjects = {\n");

        let sections: BTreeSet<&str> = index
            .objects
            .iter()
            .map(|e| e.isa().as_str())
            .chain(index.verbatim.iter().filter_map(|v| v.section.as_deref()))
            .collect();
        for section in sections {
            let _ = write!(self.out, "\n/* Begin {} section */\n", section);
            for entity in index.objects.iter().filter(|e| e.isa().as_str() == section) {
                self.entity(entity);
            }
            for region in index
                .verbatim
                .iter()
                .filter(|v| v.section.as_deref() == Some(section))
            {
                self.out.push_str(&region.text);
                self.out.push('\n');
            }
            let _ = writeln!(self.out, "/* End {} section */", section);
        }
        // entries found outside any section stay outside
        for region in index.verbatim.iter().filter(|v| v.section.is_none()) {
            self.out.push_str(&region.text);
            self.out.push('\n');
        }

        self.out.push_str("\t};\n\trootObject = ");
        self.string(index.root_object.as_str());
        self.out.push_str(";\n}\n");
        self.out
    }
}

/// Render an index as project document text
pub fn write_document(index: &EntityIndex) -> String {
    let writer = Writer {
        index,
        out: String::with_capacity(256 * (index.objects.len() + 8)),
    };
    writer.document()
}

/// Verify, then write a document to a custom path with an atomic rename
pub fn write_to_path(index: &EntityIndex, output_path: &Path) -> Result<(), ManifestError> {
    debug!("Writing project document to: {:?}", output_path);
    index.verify()?;
    let content = write_document(index);

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = output_path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);
    {
        let file = fs::File::create(&temp_path)?;
        let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
    }
    fs::rename(&temp_path, output_path)?;

    info!("Project document written to: {:?}", output_path);
    info!("Total entities: {}", index.objects.len());
    Ok(())
}

/// Read and parse a document from a custom path
pub fn read_from_path(document_path: &Path) -> Result<ParsedDocument, ManifestError> {
    debug!("Reading project document from: {:?}", document_path);
    let content = fs::read_to_string(document_path)?;
    let parsed = parse_document(&content)?;
    info!(
        "Project document loaded: {} entities, {} diagnostics",
        parsed.index.objects.len(),
        parsed.diagnostics.len()
    );
    Ok(parsed)
}
