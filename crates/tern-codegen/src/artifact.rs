//! The compiled artifact handed back to the build pipeline.

use crate::unit::UNIT_FILE_SUFFIX;

/// One emitted binary unit of the artifact.
#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    /// Artifact-relative file name (`<unit name>.tbu`).
    pub name: String,
    /// Encoded unit bytes. Empty when the unit failed to encode and a
    /// placeholder was recorded alongside a diagnostic.
    pub bytes: Vec<u8>,
}

impl ArtifactEntry {
    /// Create an entry for a unit name, applying the file suffix.
    pub fn new(unit_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: format!("{unit_name}{UNIT_FILE_SUFFIX}"),
            bytes,
        }
    }

    /// Whether this entry is an empty placeholder for a failed unit.
    pub fn is_placeholder(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The ordered output of one module-emission call.
#[derive(Debug)]
pub struct CompiledArtifact {
    /// Name of the module's entry/init unit.
    pub entry_unit: String,
    /// Emitted units, entry unit first.
    pub entries: Vec<ArtifactEntry>,
}

impl CompiledArtifact {
    /// Find an entry by unit name (without the file suffix).
    pub fn entry(&self, unit_name: &str) -> Option<&ArtifactEntry> {
        let file = format!("{unit_name}{UNIT_FILE_SUFFIX}");
        self.entries.iter().find(|e| e.name == file)
    }

    /// Number of emitted entries, placeholders included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the artifact holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
