//! Update kinds and their resource paths

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::lwm2m::path::{firmware, software};
use crate::lwm2m::ResourcePath;

/// Which LwM2M object an update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Firmware,
    Software,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 2] = [UpdateKind::Firmware, UpdateKind::Software];

    pub fn object_id(&self) -> u16 {
        match self {
            UpdateKind::Firmware => firmware::OBJECT_ID,
            UpdateKind::Software => software::OBJECT_ID,
        }
    }

    /// Kind owning an object id, if any
    pub fn from_object_id(object: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.object_id() == object)
    }

    fn path(&self, resource: u16) -> ResourcePath {
        ResourcePath::new(self.object_id(), 0, resource)
    }

    /// Resource the package binary is written to
    pub fn package_path(&self) -> ResourcePath {
        match self {
            UpdateKind::Firmware => self.path(firmware::PACKAGE),
            UpdateKind::Software => self.path(software::PACKAGE),
        }
    }

    pub fn state_path(&self) -> ResourcePath {
        match self {
            UpdateKind::Firmware => self.path(firmware::STATE),
            UpdateKind::Software => self.path(software::UPDATE_STATE),
        }
    }

    pub fn result_path(&self) -> ResourcePath {
        match self {
            UpdateKind::Firmware => self.path(firmware::UPDATE_RESULT),
            UpdateKind::Software => self.path(software::UPDATE_RESULT),
        }
    }

    pub fn version_path(&self) -> ResourcePath {
        match self {
            UpdateKind::Firmware => self.path(firmware::PKG_VERSION),
            UpdateKind::Software => self.path(software::PKG_VERSION),
        }
    }

    pub fn name_path(&self) -> ResourcePath {
        match self {
            UpdateKind::Firmware => self.path(firmware::PKG_NAME),
            UpdateKind::Software => self.path(software::PKG_NAME),
        }
    }

    /// Paths that must be freshly read before a push is evaluated
    pub fn observed_paths(&self) -> [ResourcePath; 4] {
        [
            self.state_path(),
            self.result_path(),
            self.version_path(),
            self.name_path(),
        ]
    }

    /// Whether a path carries status information for this kind
    pub fn is_status_path(&self, path: &ResourcePath) -> bool {
        *path == self.state_path() || *path == self.result_path()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Firmware => "firmware",
            UpdateKind::Software => "software",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "firmware" | "fw" => Ok(UpdateKind::Firmware),
            "software" | "sw" => Ok(UpdateKind::Software),
            _ => Err(format!("Invalid update kind: {}", s)),
        }
    }
}
