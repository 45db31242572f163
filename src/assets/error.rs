//! Error types for asset registration, loading and data files

use super::resource::AssetScope;

/// Errors returned synchronously by registering calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// A resource with this name already exists in the scope
    DuplicateName {
        /// Colliding resource name
        name: String,
        /// Scope the collision happened in
        scope: AssetScope,
    },
    /// A bundle with this name is already attached
    DuplicateBundleName {
        /// Colliding bundle name
        name: String,
    },
    /// No resource with this name in the scope
    UnknownAsset(String),
    /// No bundle with this name
    UnknownBundle(String),
}

impl std::fmt::Display for AssetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name, scope } => {
                write!(f, "Duplicate asset name '{name}' in {scope}")
            }
            Self::DuplicateBundleName { name } => write!(f, "Duplicate bundle name '{name}'"),
            Self::UnknownAsset(name) => write!(f, "Unknown asset '{name}'"),
            Self::UnknownBundle(name) => write!(f, "Unknown bundle '{name}'"),
        }
    }
}

impl std::error::Error for AssetError {}

/// Why a single resource failed to load.
///
/// Never returned from the manager; it travels with the resource's
/// `Failed` state and the `AssetFailed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLoadError {
    reason: String,
}

impl ResourceLoadError {
    /// Create a load error with a human readable reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The failure reason
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for ResourceLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Load error: {}", self.reason)
    }
}

impl std::error::Error for ResourceLoadError {}

/// Errors from reading or writing config and manifest files
#[derive(Debug, Clone)]
pub enum DataError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
    /// Registering manifest contents failed
    Asset(AssetError),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
            Self::Asset(e) => write!(f, "Asset error: {e}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Asset(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AssetError> for DataError {
    fn from(e: AssetError) -> Self {
        Self::Asset(e)
    }
}
