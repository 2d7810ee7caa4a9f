//! The container root.

use crate::limits::FORMAT_VERSION;
use crate::model::{Material, ResDict, SkeletalAnim, UserData};

/// Raw file embedded in a container (textures, shader binaries, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExternalFile {
    pub data: Vec<u8>,
}

impl ExternalFile {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// A resource container.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct ResFile {
    pub name: String,
    pub version: u32,
    pub materials: ResDict<Material>,
    pub skeletal_anims: ResDict<SkeletalAnim>,
    pub external_files: ResDict<ExternalFile>,
    pub user_data: ResDict<UserData>,
}

impl Default for ResFile {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: FORMAT_VERSION,
            materials: ResDict::new(),
            skeletal_anims: ResDict::new(),
            external_files: ResDict::new(),
            user_data: ResDict::new(),
        }
    }
}

impl ResFile {
    /// Creates an empty container at the current format version.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the major format version.
    pub fn major_version(&self) -> u32 {
        self.version >> 24
    }
}
