//! Asset capability catalog
//!
//! The pipeline resolves `asset_id → AssetCapability` through the
//! [`CapabilityCatalog`] trait so the catalog can be injected (in-memory,
//! file-backed or remote) without the pipeline knowing which.

use crate::loader;
use crate::model::{AssetCapability, AssetType};
use crate::{PlannerError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

#[async_trait]
pub trait CapabilityCatalog: Send + Sync {
    /// Fails with [`PlannerError::CapabilityNotFound`] for unknown assets
    async fn resolve(&self, asset_id: &str) -> Result<AssetCapability>;

    async fn list(&self) -> Result<Vec<AssetCapability>>;
}

/// In-memory catalog keyed by asset id
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: BTreeMap<String, AssetCapability>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One reference profile per asset type
    pub fn with_reference_assets() -> Self {
        let mut registry = Self::new();
        registry.load_reference_assets();
        registry
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for asset in loader::load_assets(path)? {
            registry.insert(asset)?;
        }
        info!("Loaded {} assets from {:?}", registry.len(), path);
        Ok(registry)
    }

    fn load_reference_assets(&mut self) {
        let bands = |names: &[&str]| -> BTreeSet<String> {
            names.iter().map(|n| n.to_string()).collect()
        };

        // (id, type, min size m, detection limit, resolution m, bands, revisit h, swath km)
        let reference = vec![
            (
                "env-monitor-01",
                AssetType::EnvironmentalMonitoring,
                10.0,
                5.0,
                10.0,
                bands(&["blue", "green", "red", "nir", "swir"]),
                24.0,
                185.0,
            ),
            (
                "infra-watch-01",
                AssetType::Infrastructure,
                2.0,
                1.0,
                0.5,
                bands(&["pan", "red", "green", "blue"]),
                12.0,
                15.0,
            ),
            (
                "agri-survey-01",
                AssetType::Agriculture,
                20.0,
                10.0,
                5.0,
                bands(&["green", "red", "red-edge", "nir"]),
                48.0,
                77.0,
            ),
            (
                "custom-01",
                AssetType::Custom,
                5.0,
                2.0,
                3.0,
                bands(&["red", "green", "blue", "nir"]),
                24.0,
                100.0,
            ),
        ];

        for (id, asset_type, min_size, limit, resolution, spectral_bands, revisit, swath) in reference {
            self.assets.insert(
                id.to_string(),
                AssetCapability {
                    asset_id: id.to_string(),
                    asset_type,
                    min_detectable_size_m: min_size,
                    detection_limit: limit,
                    resolution_m: resolution,
                    spectral_bands,
                    revisit_time_hours: revisit,
                    swath_width_km: swath,
                },
            );
        }
    }

    /// Validate and add (or replace) an asset
    pub fn insert(&mut self, asset: AssetCapability) -> Result<()> {
        asset.validate()?;
        self.assets.insert(asset.asset_id.clone(), asset);
        Ok(())
    }

    pub fn get(&self, asset_id: &str) -> Option<&AssetCapability> {
        self.assets.get(asset_id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[async_trait]
impl CapabilityCatalog for AssetRegistry {
    async fn resolve(&self, asset_id: &str) -> Result<AssetCapability> {
        self.get(asset_id)
            .cloned()
            .ok_or_else(|| PlannerError::CapabilityNotFound(asset_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<AssetCapability>> {
        Ok(self.assets.values().cloned().collect())
    }
}
