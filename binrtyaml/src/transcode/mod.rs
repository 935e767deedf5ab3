//! Conversions from loaded YAML values to other formats.

pub mod json;
