//! File classification by extension
//!
//! Maps a path to the declared type the IDE would record for it and to the
//! build phase (if any) that should carry it.

use serde::Serialize;

use crate::types::PhaseRole;

/// What a file is for, independent of its exact type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Header,
    Resource,
    Supporting,
    Framework,
}

impl FileKind {
    /// Phase role the file is built in, `None` for files that are only listed
    pub fn phase(self) -> Option<PhaseRole> {
        match self {
            FileKind::Source => Some(PhaseRole::Sources),
            FileKind::Resource => Some(PhaseRole::Resources),
            FileKind::Framework => Some(PhaseRole::Frameworks),
            FileKind::Header | FileKind::Supporting => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub declared_type: &'static str,
    pub kind: FileKind,
}

const TABLE: &[(&str, &str, FileKind)] = &[
    ("swift", "sourcecode.swift", FileKind::Source),
    ("m", "sourcecode.c.objc", FileKind::Source),
    ("mm", "sourcecode.cpp.objcpp", FileKind::Source),
    ("cpp", "sourcecode.cpp.cpp", FileKind::Source),
    ("cc", "sourcecode.cpp.cpp", FileKind::Source),
    ("cxx", "sourcecode.cpp.cpp", FileKind::Source),
    ("c", "sourcecode.c.c", FileKind::Source),
    ("metal", "sourcecode.metal", FileKind::Source),
    ("h", "sourcecode.c.h", FileKind::Header),
    ("hpp", "sourcecode.cpp.h", FileKind::Header),
    ("hh", "sourcecode.cpp.h", FileKind::Header),
    ("xcassets", "folder.assetcatalog", FileKind::Resource),
    ("storyboard", "file.storyboard", FileKind::Resource),
    ("xib", "file.xib", FileKind::Resource),
    ("strings", "text.plist.strings", FileKind::Resource),
    ("json", "text.json", FileKind::Resource),
    ("wav", "audio.wav", FileKind::Resource),
    ("mp3", "audio.mp3", FileKind::Resource),
    ("m4a", "audio.m4a", FileKind::Resource),
    ("caf", "audio.caf", FileKind::Resource),
    ("aiff", "audio.aiff", FileKind::Resource),
    ("png", "image.png", FileKind::Resource),
    ("jpg", "image.jpeg", FileKind::Resource),
    ("jpeg", "image.jpeg", FileKind::Resource),
    ("plist", "text.plist.xml", FileKind::Supporting),
    ("entitlements", "text.plist.entitlements", FileKind::Supporting),
    ("xcconfig", "text.xcconfig", FileKind::Supporting),
    ("framework", "wrapper.framework", FileKind::Framework),
];

/// Classify a path by its extension. Unknown extensions yield `None`.
pub fn classify(path: &str) -> Option<Classification> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(e, _, _)| *e == ext)
        .map(|&(_, declared_type, kind)| Classification {
            declared_type,
            kind,
        })
}

fn is_header_type(declared_type: &str) -> bool {
    declared_type.ends_with(".h")
}

fn is_framework_type(declared_type: &str) -> bool {
    matches!(
        declared_type,
        "wrapper.framework" | "sourcecode.text-based-dylib-definition" | "compiled.mach-o.dylib"
    )
}

/// Whether a phase of `role` may build a file of `declared_type`
pub fn accepts(role: PhaseRole, declared_type: &str) -> bool {
    match role {
        PhaseRole::Sources => {
            declared_type.starts_with("sourcecode.")
                && !is_header_type(declared_type)
                && !is_framework_type(declared_type)
        }
        PhaseRole::Frameworks => is_framework_type(declared_type),
        PhaseRole::Resources => {
            !declared_type.is_empty()
                && !declared_type.starts_with("sourcecode.")
                && !is_framework_type(declared_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::classify::*;

    #[test]
    fn test_classify_known_extensions() {
        let swift = classify("Reverb/Views/ContentView.swift");
        assert_eq!(
            swift,
            Some(Classification {
                declared_type: "sourcecode.swift",
                kind: FileKind::Source
            })
        );
        assert_eq!(
            classify("Reverb/Audio/Engine/ReverbBridge.mm").map(|c| c.declared_type),
            Some("sourcecode.cpp.objcpp")
        );
        assert_eq!(
            classify("Reverb/Assets.xcassets").map(|c| c.kind),
            Some(FileKind::Resource)
        );
        assert_eq!(
            classify("Reverb/Info.plist").and_then(|c| c.kind.phase()),
            None
        );
        assert_eq!(classify("README.MD"), None);
        assert_eq!(classify("Makefile"), None);
        assert_eq!(classify(".swift"), None);
    }

    #[test]
    fn test_phase_legality() {
        assert!(accepts(PhaseRole::Sources, "sourcecode.swift"));
        assert!(!accepts(PhaseRole::Sources, "sourcecode.c.h"));
        assert!(!accepts(PhaseRole::Sources, "folder.assetcatalog"));
        assert!(accepts(PhaseRole::Resources, "folder.assetcatalog"));
        assert!(!accepts(PhaseRole::Resources, "sourcecode.swift"));
        assert!(accepts(PhaseRole::Frameworks, "wrapper.framework"));
        assert!(!accepts(PhaseRole::Frameworks, "sourcecode.swift"));
    }
}
