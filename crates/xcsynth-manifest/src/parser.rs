//! Project document reader
//!
//! Recognizes the section delimiters and per-kind entry shapes the
//! serializer writes. It is not a general plist grammar: anything that does
//! not fit is kept verbatim and reported as a non-fatal [`ParseError`].

use ahash::{AHashMap, AHashSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::errors::{ManifestError, ParseError, ParseErrorKind};
use crate::plist::{ReadError, Reader, Value};
use crate::record::entity_from_record;
use crate::types::{Entity, EntityIndex, Isa, ObjectId, OpaqueObject, Verbatim};

/// A parsed document plus the recoverable problems found while reading it
#[derive(Debug)]
pub struct ParsedDocument {
    pub index: EntityIndex,
    pub diagnostics: Vec<ParseError>,
}

/// Parse a project document. Fails only when the `objects` block or the root
/// project cannot be located.
pub fn parse_document(text: &str) -> Result<ParsedDocument, ManifestError> {
    let parser = Parser {
        lines: text.lines().collect(),
        index: EntityIndex::default(),
        diagnostics: Vec::new(),
        seen: AHashSet::new(),
        comments: AHashMap::new(),
    };
    parser.run()
}

fn section_begin(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("/* Begin ")
        .and_then(|rest| rest.strip_suffix(" section */"))
}

fn section_end(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("/* End ")
        .and_then(|rest| rest.strip_suffix(" section */"))
}

/// The `};` closing the objects block sits one level in; entry closers sit deeper
fn is_objects_close(line: &str) -> bool {
    line.trim() == "};" && !line.starts_with("\t\t") && !line.starts_with("    ")
}

/// Net nesting change of one line, ignoring quoted strings and comments
fn nesting_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            '/' if chars.peek() == Some(&'/') => break,
            '{' | '(' => delta += 1,
            '}' | ')' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Leading identifier-like token of an entry, if any
fn leading_token(raw: &str) -> Option<&str> {
    let token = raw
        .trim_start()
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .next()?;
    (!token.is_empty()).then_some(token)
}

/// Project name out of `Build configuration list for PBXProject "Name"`
fn quoted_name(comment: &str) -> Option<&str> {
    let start = comment.find('"')?;
    let end = comment.rfind('"')?;
    (end > start).then(|| &comment[start + 1..end])
}

struct Entry {
    id: String,
    comment: Option<String>,
    body: Value,
}

fn read_entry(raw: &str) -> Result<Entry, ReadError> {
    let mut reader = Reader::new(raw);
    let id = reader.read_string()?;
    let comment = reader.take_comment();
    reader.expect('=')?;
    let body = reader.read_value()?;
    reader.expect(';')?;
    if !reader.at_end() {
        return Err(ReadError {
            offset: reader.position(),
            message: "trailing text after entry".to_string(),
        });
    }
    Ok(Entry { id, comment, body })
}

fn read_root_line(line: &str) -> Result<String, ReadError> {
    let mut reader = Reader::new(line);
    reader.read_string()?;
    reader.expect('=')?;
    reader.read_string()
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    index: EntityIndex,
    diagnostics: Vec<ParseError>,
    /// Every identifier declared so far, typed or opaque
    seen: AHashSet<ObjectId>,
    /// Comments found after typed entry identifiers
    comments: AHashMap<ObjectId, String>,
}

impl<'a> Parser<'a> {
    fn diagnose(&mut self, line: usize, kind: ParseErrorKind) {
        let error = ParseError::new(line, kind);
        warn!("{}", error);
        self.diagnostics.push(error);
    }

    fn run(mut self) -> Result<ParsedDocument, ManifestError> {
        if !self
            .lines
            .first()
            .is_some_and(|l| l.starts_with("// !$*UTF8*$!"))
        {
            self.diagnose(1, ParseErrorKind::MissingHeader);
        }

        let Some(objects_line) = self.lines.iter().position(|l| l.trim() == "objects = {") else {
            return Err(ManifestError::Parse(ParseError::new(
                self.lines.len().max(1),
                ParseErrorKind::MissingObjects,
            )));
        };
        self.read_header(objects_line);
        let tail = self.read_objects(objects_line + 1);
        self.read_root(tail)?;

        self.index.rebuild_indexes();
        if self.index.project().is_none() {
            return Err(ManifestError::Parse(ParseError::new(
                tail + 1,
                ParseErrorKind::UnresolvedRootObject(self.index.root_object.to_string()),
            )));
        }
        self.index.project_name = self.project_name();

        debug!(
            "Parsed {} typed entities, {} verbatim regions, {} diagnostics",
            self.index.objects.len(),
            self.index.verbatim.len(),
            self.diagnostics.len()
        );
        Ok(ParsedDocument {
            index: self.index,
            diagnostics: self.diagnostics,
        })
    }

    fn read_header(&mut self, objects_line: usize) {
        self.index.archive_version = "1".to_string();
        self.index.object_version = "56".to_string();
        for line in &self.lines[..objects_line] {
            let Some((key, value)) = line.trim().trim_end_matches(';').split_once(" = ") else {
                continue;
            };
            match key {
                "archiveVersion" => self.index.archive_version = value.trim_matches('"').to_string(),
                "objectVersion" => self.index.object_version = value.trim_matches('"').to_string(),
                _ => {}
            }
        }
    }

    /// Read the objects block; returns the line where reading stopped
    fn read_objects(&mut self, start: usize) -> usize {
        let mut section: Option<(String, usize)> = None;
        let mut i = start;
        while i < self.lines.len() {
            let line = self.lines[i];
            let trimmed = line.trim();
            if trimmed.is_empty() {
                i += 1;
                continue;
            }
            if let Some(name) = section_begin(trimmed) {
                if let Some((open, at)) = section.take() {
                    self.diagnose(at + 1, ParseErrorKind::UnterminatedSection(open));
                }
                section = Some((name.to_string(), i));
                i += 1;
                continue;
            }
            if let Some(name) = section_end(trimmed) {
                match section.take() {
                    Some((open, _)) if open == name => {}
                    Some((open, _)) => self.diagnose(
                        i + 1,
                        ParseErrorKind::MismatchedSectionEnd {
                            open,
                            found: name.to_string(),
                        },
                    ),
                    None => self.diagnose(
                        i + 1,
                        ParseErrorKind::MismatchedSectionEnd {
                            open: String::new(),
                            found: name.to_string(),
                        },
                    ),
                }
                i += 1;
                continue;
            }
            if is_objects_close(line) {
                i += 1;
                break;
            }
            if trimmed.starts_with("rootObject = ") {
                // objects block was never closed
                break;
            }

            let (end, complete) = self.entry_extent(i);
            let raw = self.lines[i..end].join("\n");
            let current = section.as_ref().map(|(name, _)| name.clone());
            self.read_entry_text(raw, i + 1, current, complete);
            i = end;
        }
        if let Some((open, at)) = section {
            self.diagnose(at + 1, ParseErrorKind::UnterminatedSection(open));
        }
        i
    }

    /// Lines `[start, end)` of one entry, and whether its braces balanced
    fn entry_extent(&self, start: usize) -> (usize, bool) {
        let mut depth = 0;
        for j in start..self.lines.len() {
            let line = self.lines[j];
            if j > start && depth > 0 {
                let trimmed = line.trim();
                if section_begin(trimmed).is_some()
                    || section_end(trimmed).is_some()
                    || is_objects_close(line)
                {
                    return (j, false);
                }
            }
            depth += nesting_delta(line);
            if depth <= 0 {
                return (j + 1, true);
            }
        }
        (self.lines.len(), false)
    }

    fn read_entry_text(&mut self, raw: String, line: usize, section: Option<String>, complete: bool) {
        let parsed = if complete {
            read_entry(&raw).map_err(|e| e.message)
        } else {
            Err("entry is not terminated".to_string())
        };
        let entry = match parsed {
            Ok(entry) => entry,
            Err(reason) => {
                self.diagnose(line, ParseErrorKind::UnparseableEntry(reason));
                let declared = leading_token(&raw).map(|id| OpaqueObject {
                    id: ObjectId::from(id),
                    isa: None,
                    comment: None,
                });
                self.keep_verbatim(section, raw, declared, line);
                return;
            }
        };

        let isa_name = entry.body.get("isa").and_then(Value::as_str).map(str::to_string);
        let opaque = OpaqueObject {
            id: ObjectId::from(entry.id.as_str()),
            isa: isa_name.clone(),
            comment: entry.comment.clone(),
        };
        let (Some(isa_name), Value::Dict(fields)) = (isa_name, entry.body) else {
            self.diagnose(
                line,
                ParseErrorKind::UnparseableEntry("entry has no isa".to_string()),
            );
            self.keep_verbatim(section, raw, Some(opaque), line);
            return;
        };
        let Some(isa) = Isa::parse(&isa_name) else {
            // kinds outside the typed set pass through untouched
            self.keep_verbatim(section, raw, Some(opaque), line);
            return;
        };
        match entity_from_record(&entry.id, isa, fields) {
            Some(entity) => {
                if let Some(comment) = entry.comment {
                    self.comments.insert(entity.id().clone(), comment);
                }
                self.keep_typed(entity, line);
            }
            None => {
                self.diagnose(
                    line,
                    ParseErrorKind::UnrecognizedEntry {
                        id: entry.id.clone(),
                        isa: isa_name,
                    },
                );
                self.keep_verbatim(section, raw, Some(opaque), line);
            }
        }
    }

    fn keep_typed(&mut self, entity: Entity, line: usize) {
        let id = entity.id().clone();
        if self.seen.insert(id.clone()) {
            self.index.objects.push(entity);
        } else {
            self.diagnose(line, ParseErrorKind::DuplicateIdentifier(id.to_string()));
            self.index.shadowed.push(entity);
        }
    }

    fn keep_verbatim(
        &mut self,
        section: Option<String>,
        text: String,
        declared: Option<OpaqueObject>,
        line: usize,
    ) {
        let mut region = Verbatim {
            section,
            text,
            declared: SmallVec::new(),
        };
        if let Some(opaque) = declared {
            if self.seen.insert(opaque.id.clone()) {
                region.declared.push(opaque);
            } else {
                self.diagnose(
                    line,
                    ParseErrorKind::DuplicateIdentifier(opaque.id.to_string()),
                );
                self.index.id_conflicts.push(opaque.id);
            }
        }
        self.index.verbatim.push(region);
    }

    fn read_root(&mut self, from: usize) -> Result<(), ManifestError> {
        let found = self.lines[from.min(self.lines.len())..]
            .iter()
            .enumerate()
            .find(|(_, l)| l.trim().starts_with("rootObject"));
        let Some((offset, line)) = found else {
            return Err(ManifestError::Parse(ParseError::new(
                self.lines.len().max(1),
                ParseErrorKind::MissingRootObject,
            )));
        };
        match read_root_line(line) {
            Ok(id) => {
                self.index.root_object = ObjectId::from(id);
                Ok(())
            }
            Err(_) => Err(ManifestError::Parse(ParseError::new(
                from + offset + 1,
                ParseErrorKind::MissingRootObject,
            ))),
        }
    }

    fn project_name(&self) -> String {
        let from_comment = self.index.project().and_then(|p| {
            self.comments
                .get(&p.build_configuration_list)
                .and_then(|c| quoted_name(c))
                .map(str::to_string)
        });
        from_comment
            .or_else(|| self.index.targets().next().map(|t| t.name.clone()))
            .unwrap_or_else(|| "Project".to_string())
    }
}
