//! LwM2M resource addressing and values

pub mod endpoint;
pub mod path;
pub mod value;

pub use endpoint::DeviceId;
pub use path::ResourcePath;
pub use value::{ContentFormat, ResourceValue};
