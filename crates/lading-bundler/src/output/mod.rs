//! Artifact output.

pub mod writer;

pub use writer::{write_bundle_to, write_vendor_artifact};
