//! Object/instance/resource paths

use std::fmt;
use std::str::FromStr;

use crate::errors::OtaError;

/// Firmware Update object (5)
pub mod firmware {
    pub const OBJECT_ID: u16 = 5;

    pub const PACKAGE: u16 = 0;
    pub const PACKAGE_URI: u16 = 1;
    pub const UPDATE: u16 = 2;
    pub const STATE: u16 = 3;
    pub const UPDATE_RESULT: u16 = 5;
    pub const PKG_NAME: u16 = 6;
    pub const PKG_VERSION: u16 = 7;
}

/// Software Management object (9)
pub mod software {
    pub const OBJECT_ID: u16 = 9;

    pub const PKG_NAME: u16 = 0;
    pub const PKG_VERSION: u16 = 1;
    pub const PACKAGE: u16 = 2;
    pub const PACKAGE_URI: u16 = 3;
    pub const INSTALL: u16 = 4;
    pub const UPDATE_STATE: u16 = 7;
    pub const UPDATE_RESULT: u16 = 9;
}

/// Path to a single resource, e.g. `/5/0/3`
///
/// Paths may arrive in the object-versioned form `/5_1.0/0/3`. The version
/// suffix is dropped on parse so both forms address the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath {
    pub object: u16,
    pub instance: u16,
    pub resource: u16,
}

impl ResourcePath {
    pub const fn new(object: u16, instance: u16, resource: u16) -> Self {
        Self {
            object,
            instance,
            resource,
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/{}", self.object, self.instance, self.resource)
    }
}

impl FromStr for ResourcePath {
    type Err = OtaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OtaError::InvalidPath(s.to_string());

        let parts: Vec<&str> = s.trim_start_matches('/').split('/').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let object = parts[0].split('_').next().unwrap_or_default();
        let object = object.parse::<u16>().map_err(|_| invalid())?;
        let instance = parts[1].parse::<u16>().map_err(|_| invalid())?;
        let resource = parts[2].parse::<u16>().map_err(|_| invalid())?;

        Ok(Self::new(object, instance, resource))
    }
}

impl serde::Serialize for ResourcePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ResourcePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
