use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One resolved package, as handed to downstream license detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Where the package's metadata directory (and license text) is expected
    /// on disk. Inferred from installed metadata, never verified here;
    /// existence is the license detector's concern.
    pub path: PathBuf,
    /// Which source produced this record.
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub homepage: Option<String>,
}

/// Package-management ecosystems a source can speak for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pip,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Pip => write!(f, "pip"),
        }
    }
}
