//! Nut lifecycle: records, registry, ancestry.

mod registry;

pub use registry::{NutRecord, NutRegistry, RegistryStats};
