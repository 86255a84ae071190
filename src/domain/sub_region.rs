use std::{fs, path::Path};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

/// A point whose sub-region is known and must not be derived from the
/// rectangles. `tolerance` is measured in degrees on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PointOverride {
    pub lat: f64,
    pub lon: f64,
    pub tolerance: f64,
}

impl PointOverride {
    fn matches(&self, lat: f64, lon: f64) -> bool {
        (lat - self.lat).abs() <= self.tolerance && (lon - self.lon).abs() <= self.tolerance
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubRegion {
    pub code: String,
    pub name: String,
    pub bounds: BoundingBox,
    #[serde(default)]
    pub overrides: Vec<PointOverride>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubRegionTable {
    pub sub_regions: Vec<SubRegion>,
    /// Codes of small regions fully surrounded by a larger one, checked in
    /// order when rectangles overlap.
    #[serde(default)]
    pub enclave_priority: Vec<String>,
}

impl SubRegionTable {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

pub struct GeoClassifier {
    table: SubRegionTable,
}

impl GeoClassifier {
    pub fn new(table: SubRegionTable) -> Self {
        GeoClassifier { table }
    }

    pub fn knows(&self, code: &str) -> bool {
        self.table
            .sub_regions
            .iter()
            .any(|sr| sr.code.eq_ignore_ascii_case(code))
    }

    pub fn classify(&self, lat: f64, lon: f64) -> Option<&str> {
        let forced = self.table.sub_regions.iter().find(|sr| {
            sr.overrides
                .iter()
                .any(|point_override| point_override.matches(lat, lon))
        });
        if let Some(sr) = forced {
            return Some(sr.code.as_str());
        }

        let candidates: Vec<&SubRegion> = self
            .table
            .sub_regions
            .iter()
            .filter(|sr| sr.bounds.contains(lat, lon))
            .collect();

        match candidates.as_slice() {
            [] => None,
            [only] => Some(only.code.as_str()),
            _ => {
                let enclave = self.table.enclave_priority.iter().find_map(|code| {
                    candidates.iter().find(|sr| &sr.code == code).copied()
                });

                enclave
                    .or_else(|| {
                        candidates
                            .iter()
                            .min_by(|a, b| {
                                center_distance(&a.bounds, lat, lon)
                                    .total_cmp(&center_distance(&b.bounds, lat, lon))
                            })
                            .copied()
                    })
                    .map(|sr| sr.code.as_str())
            }
        }
    }
}

fn center_distance(bounds: &BoundingBox, lat: f64, lon: f64) -> f64 {
    let (center_lat, center_lon) = bounds.center();
    ((lat - center_lat).powi(2) + (lon - center_lon).powi(2)).sqrt()
}
