//! Package binary cache

pub mod package;
