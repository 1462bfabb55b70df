use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration or locating the project document
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Project root not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("More than one .xcodeproj in {root}: {}", list(.candidates))]
    AmbiguousProject {
        root: PathBuf,
        candidates: Vec<PathBuf>,
    },
}

fn list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use crate::errors::*;

    #[test]
    fn test_ambiguous_project_lists_candidates() {
        let err = ConfigError::AmbiguousProject {
            root: PathBuf::from("/work"),
            candidates: vec![
                PathBuf::from("/work/A.xcodeproj"),
                PathBuf::from("/work/B.xcodeproj"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "More than one .xcodeproj in /work: /work/A.xcodeproj, /work/B.xcodeproj"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let err: ConfigError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
