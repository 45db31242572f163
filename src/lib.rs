//! Asynchronous asset loading with aggregated progress
//!
//! This crate provides:
//! - A loadable resource contract with a one-way load state machine
//! - Named, nestable bundles of resources
//! - An asset manager that dispatches loads and reports progress events
//! - File-backed resources read on a tokio runtime

pub mod assets;
pub mod core;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use tokio;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        AssetBundle, AssetError, AssetManager, AssetManifest, AssetRef, AssetScope, FileResource,
        LoadState, Progressable, Resource, ResourceDescriptor,
    };
    pub use crate::core::{AssetEvent, AssetEventKind, EventBus, ManagerConfig};
}
