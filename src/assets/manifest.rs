//! Asset manifests
//!
//! Describe global assets and (nested) bundles in RON (Rusty Object Notation)
//! or JSON, then register them with a manager in one call.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::bundle::AssetBundle;
use super::error::DataError;
use super::handle::AssetRef;
use super::manager::AssetManager;

/// Configuration of a single resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Name, unique within its scope
    pub name: String,
    /// Locator of the data
    pub source: String,
    /// Start loading on construction
    #[serde(default)]
    pub auto_load: bool,
}

impl ResourceDescriptor {
    /// Create a descriptor for a manually loaded resource
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            auto_load: false,
        }
    }

    /// Set auto-load
    #[must_use]
    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }
}

/// A named bundle and its contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// Bundle name
    pub name: String,
    /// Resources of this bundle
    #[serde(default)]
    pub assets: Vec<ResourceDescriptor>,
    /// Nested bundles
    #[serde(default)]
    pub bundles: Vec<BundleManifest>,
}

impl BundleManifest {
    /// Create an empty bundle description
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build the bundle, creating resources through `factory`
    fn build<F>(&self, factory: &mut F) -> Result<AssetBundle, DataError>
    where
        F: FnMut(&ResourceDescriptor) -> AssetRef,
    {
        let mut bundle = AssetBundle::new();
        for descriptor in &self.assets {
            bundle.add_asset(factory(descriptor))?;
        }
        for child in &self.bundles {
            bundle.add_bundle(child.build(factory)?, child.name.clone())?;
        }
        Ok(bundle)
    }

    fn asset_count(&self) -> usize {
        self.assets.len() + self.bundles.iter().map(Self::asset_count).sum::<usize>()
    }
}

/// Everything a loading session should register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    /// Manifest name
    pub name: String,
    /// Manifest version for compatibility
    pub version: u32,
    /// Global, un-bundled resources
    #[serde(default)]
    pub assets: Vec<ResourceDescriptor>,
    /// Top-level bundles
    #[serde(default)]
    pub bundles: Vec<BundleManifest>,
}

impl AssetManifest {
    /// Create a new empty manifest
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            assets: Vec::new(),
            bundles: Vec::new(),
        }
    }

    /// Number of resource descriptors at any depth
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.len()
            + self
                .bundles
                .iter()
                .map(BundleManifest::asset_count)
                .sum::<usize>()
    }

    /// Register every described resource and bundle with `manager`.
    ///
    /// `factory` turns each descriptor into a concrete resource.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Asset`] on the first name collision. Entries
    /// registered before the collision stay registered.
    pub fn populate<F>(&self, manager: &mut AssetManager, mut factory: F) -> Result<(), DataError>
    where
        F: FnMut(&ResourceDescriptor) -> AssetRef,
    {
        for descriptor in &self.assets {
            manager.add_asset(factory(descriptor))?;
        }
        for bundle in &self.bundles {
            manager.add_bundle(bundle.build(&mut factory)?, bundle.name.clone())?;
        }
        log::info!(
            "Registered manifest '{}' ({} assets, {} bundles)",
            self.name,
            self.asset_count(),
            self.bundles.len()
        );
        Ok(())
    }

    /// Parse a manifest from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid manifest
    pub fn from_ron_str(content: &str) -> Result<Self, DataError> {
        ron::from_str(content).map_err(|e| DataError::DeserializeError(e.to_string()))
    }

    /// Save the manifest to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| DataError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| DataError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a manifest from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let content = fs::read_to_string(path).map_err(|e| DataError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Save the manifest to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), DataError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| DataError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| DataError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load a manifest from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let content = fs::read_to_string(path).map_err(|e| DataError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| DataError::DeserializeError(e.to_string()))
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
