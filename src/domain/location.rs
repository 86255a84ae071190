use std::{fs, io, path::Path};

use serde::Serialize;

use super::sub_region::GeoClassifier;

/// Weight given to rows that carry no population column.
pub const DEFAULT_WEIGHT: u64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    /// Place name, or the cell code for grid tables.
    pub label: String,
    pub lat: f64,
    pub lon: f64,
    pub weight: u64,
    pub sub_region: Option<String>,
    pub is_grid_cell: bool,
}

impl Location {
    /// Named places get the place name appended, grid cells rely on the
    /// coordinate bias alone.
    pub fn localized_query(&self, query: &str) -> String {
        match self.is_grid_cell {
            true => query.to_string(),
            false => format!("{} in {}", query, self.label),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Location table {path} for region '{region}' not found")]
    NotFound { region: String, path: String },
    #[error("Failed to read location table {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Which sub-regions to keep. An empty filter keeps everything.
pub struct SubRegionFilter<'a> {
    pub codes: &'a [String],
    pub classifier: Option<&'a GeoClassifier>,
}

impl<'a> SubRegionFilter<'a> {
    pub fn none() -> Self {
        SubRegionFilter {
            codes: &[],
            classifier: None,
        }
    }

    fn is_active(&self) -> bool {
        !self.codes.is_empty() && self.classifier.is_some()
    }

    fn keeps(&self, code: Option<&str>) -> bool {
        match code {
            Some(code) => self.codes.iter().any(|c| c.eq_ignore_ascii_case(code)),
            None => false,
        }
    }
}

/// Named places (`name,latitude,longitude[,population]`), heaviest first.
pub fn load_locations(
    region: &str,
    path: &Path,
    min_weight: u64,
    filter: &SubRegionFilter,
) -> Result<Vec<Location>, SourceError> {
    let content = read_table(region, path)?;

    let mut locations: Vec<Location> = content
        .lines()
        .filter_map(|line| parse_row(line, false))
        .filter(|location| location.weight >= min_weight)
        .filter_map(|location| classify(location, filter))
        .collect();

    // Stable, so equal weights keep their table order.
    locations.sort_by(|a, b| b.weight.cmp(&a.weight));

    log::info!(
        "Loaded {} locations for region {} from {}",
        locations.len(),
        region,
        path.display()
    );

    Ok(locations)
}

/// Dense grid cells (`code,latitude,longitude`) in table order.
pub fn load_grid(
    region: &str,
    path: &Path,
    filter: &SubRegionFilter,
) -> Result<Vec<Location>, SourceError> {
    let content = read_table(region, path)?;

    let cells: Vec<Location> = content
        .lines()
        .filter_map(|line| parse_row(line, true))
        .filter_map(|location| classify(location, filter))
        .collect();

    log::info!(
        "Loaded {} grid cells for region {} from {}",
        cells.len(),
        region,
        path.display()
    );

    Ok(cells)
}

fn read_table(region: &str, path: &Path) -> Result<String, SourceError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content
            .strip_prefix('\u{feff}')
            .map(str::to_string)
            .unwrap_or(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SourceError::NotFound {
            region: region.to_string(),
            path: path.display().to_string(),
        }),
        Err(source) => Err(SourceError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn parse_row(line: &str, is_grid_cell: bool) -> Option<Location> {
    let line = line.trim();
    let lowered = line.to_lowercase();
    if line.is_empty()
        || lowered.starts_with("name,latitude")
        || lowered.starts_with("code,latitude")
    {
        return None;
    }

    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    let [label, lat, lon, rest @ ..] = parts.as_slice() else {
        log::debug!("Skipping malformed location row: {}", line);
        return None;
    };

    let (Ok(lat), Ok(lon)) = (lat.parse::<f64>(), lon.parse::<f64>()) else {
        log::debug!("Skipping location row with bad coordinates: {}", line);
        return None;
    };
    if label.is_empty() {
        return None;
    }

    let weight = rest
        .first()
        .and_then(|w| w.parse::<u64>().ok())
        .unwrap_or(DEFAULT_WEIGHT);

    Some(Location {
        label: label.to_string(),
        lat,
        lon,
        weight,
        sub_region: None,
        is_grid_cell,
    })
}

fn classify(mut location: Location, filter: &SubRegionFilter) -> Option<Location> {
    let Some(classifier) = filter.classifier else {
        return Some(location);
    };

    location.sub_region = classifier
        .classify(location.lat, location.lon)
        .map(str::to_string);

    match !filter.is_active() || filter.keeps(location.sub_region.as_deref()) {
        true => Some(location),
        false => None,
    }
}
