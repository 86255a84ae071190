use std::collections::HashMap;

use anyhow::Context;

use crate::{
    configuration::RegionSettings,
    domain::sub_region::{GeoClassifier, SubRegionTable},
};

pub struct RegionReference {
    pub key: String,
    pub settings: RegionSettings,
    /// Present only for regions with a sub-region table.
    pub classifier: Option<GeoClassifier>,
}

/// Static per-region data, loaded once at startup and shared by every job.
pub struct ReferenceData {
    regions: HashMap<String, RegionReference>,
}

impl ReferenceData {
    pub fn load(regions: &HashMap<String, RegionSettings>) -> anyhow::Result<Self> {
        let mut loaded = Vec::with_capacity(regions.len());

        for (key, settings) in regions {
            let classifier = match &settings.sub_regions_file {
                Some(path) => {
                    let table = SubRegionTable::from_file(path).with_context(|| {
                        format!("Failed to load sub-regions for {} from {}", key, path.display())
                    })?;
                    log::info!(
                        "Loaded {} sub-regions for region {}",
                        table.sub_regions.len(),
                        key
                    );
                    Some(GeoClassifier::new(table))
                }
                None => None,
            };

            loaded.push(RegionReference {
                key: key.to_lowercase(),
                settings: settings.clone(),
                classifier,
            });
        }

        Ok(Self::from_regions(loaded))
    }

    pub fn from_regions(regions: Vec<RegionReference>) -> Self {
        ReferenceData {
            regions: regions.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    pub fn region(&self, key: &str) -> Option<&RegionReference> {
        self.regions.get(&key.trim().to_lowercase())
    }
}
