//! Asynchronous asset loading and progress tracking
//!
//! Provides:
//! - A [`Resource`] contract for anything that loads asynchronously
//! - Named [`AssetBundle`]s that track progress as one unit
//! - An [`AssetManager`] that aggregates progress and reports completion once
//! - Manifests describing a loading session in RON or JSON

mod bundle;
mod error;
mod file;
mod handle;
mod manager;
mod manifest;
mod progress;
mod resource;

pub use bundle::AssetBundle;
pub use error::{AssetError, DataError, ResourceLoadError};
pub use file::FileResource;
pub use handle::{AssetRef, ResourceId};
pub use manager::{AssetManager, Session};
pub use manifest::{AssetManifest, BundleManifest, ResourceDescriptor};
pub use progress::{FailurePolicy, LoadStats, Progressable, percent};
pub use resource::{AssetScope, Completion, LoadSignal, LoadState, Resource, Settlement, Watcher};
