//! Core data models for the code archive service.
//!
//! These types describe stored archives and the file tree built from an
//! extracted archive. They serialize naturally as JSON via `serde`.

pub mod archive;
pub mod language;
pub mod tree;
