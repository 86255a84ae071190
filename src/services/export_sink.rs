use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::place::NormalizedRecord;

const HEADER: [&str; 14] = [
    "Search Term",
    "City",
    "Sub Region",
    "Name",
    "Address",
    "Phone",
    "Website",
    "Rating",
    "Reviews",
    "Category",
    "Opening Hours",
    "Place ID",
    "Lat",
    "Lon",
];
const PHONE_COLUMN: usize = 5;
const WEBSITE_COLUMN: usize = 6;

/// Per-job CSV export. Every row is flushed so a crash leaves a valid
/// partial file behind.
pub struct ExportWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
}

impl ExportWriter {
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;

        Ok(ExportWriter {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn append(&mut self, record: &NormalizedRecord) -> Result<(), csv::Error> {
        let rating = record.rating.map(|r| r.to_string()).unwrap_or_default();
        let reviews = record
            .review_count
            .map(|r| r.to_string())
            .unwrap_or_default();

        self.writer.write_record([
            record.search_term.as_str(),
            record.location_label.as_str(),
            record.sub_region.as_deref().unwrap_or_default(),
            record.name.as_str(),
            record.address.as_deref().unwrap_or_default(),
            record.phone.as_deref().unwrap_or_default(),
            record.website.as_deref().unwrap_or_default(),
            rating.as_str(),
            reviews.as_str(),
            record.category.as_deref().unwrap_or_default(),
            record.opening_hours.as_deref().unwrap_or_default(),
            record.place_id.as_str(),
            record.latitude.to_string().as_str(),
            record.longitude.to_string().as_str(),
        ])?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRequirement {
    pub require_phone: bool,
    pub require_website: bool,
}

/// Copies `source` to `destination` keeping only rows with the requested
/// contact fields. Returns the number of data rows kept.
pub fn filter_export(
    source: &Path,
    destination: &Path,
    requirement: ContactRequirement,
) -> Result<u64, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(source)?;
    let mut writer = csv::Writer::from_path(destination)?;
    writer.write_record(reader.headers()?)?;

    let mut kept = 0;
    for row in reader.records() {
        let row = row?;
        let present = |column: usize| row.get(column).is_some_and(|v| !v.trim().is_empty());

        if (!requirement.require_phone || present(PHONE_COLUMN))
            && (!requirement.require_website || present(WEBSITE_COLUMN))
        {
            writer.write_record(&row)?;
            kept += 1;
        }
    }
    writer.flush()?;

    Ok(kept)
}

/// `leads_de_1.csv` -> `leads_de_1_filtered.csv`
pub fn filtered_name(filename: &str) -> String {
    match filename.strip_suffix(".csv") {
        Some(stem) => format!("{}_filtered.csv", stem),
        None => format!("{}_filtered", filename),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{filter_export, filtered_name, ContactRequirement, ExportWriter};
    use crate::domain::place::NormalizedRecord;

    fn record(id: &str, phone: Option<&str>, website: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            place_id: id.to_string(),
            region: "de".to_string(),
            search_term: "\"Steuerberater\"".to_string(),
            location_label: "Leipzig".to_string(),
            sub_region: Some("SN".to_string()),
            name: format!("Kanzlei {}, Partner", id),
            address: Some("Markt 1, 04109 Leipzig".to_string()),
            phone: phone.map(str::to_string),
            website: website.map(str::to_string),
            rating: Some(4.8),
            review_count: Some(12),
            category: None,
            opening_hours: None,
            price_level: None,
            description: None,
            latitude: 51.34,
            longitude: 12.37,
        }
    }

    #[test]
    fn header_is_written_before_any_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exports").join("empty.csv");
        let writer = ExportWriter::create(&path).unwrap();

        assert_eq!(writer.rows(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Search Term,City,Sub Region,Name"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn rows_are_visible_immediately() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut writer = ExportWriter::create(&path).unwrap();
        writer.append(&record("1", Some("0341 1"), None)).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][3], "Kanzlei 1, Partner");
        assert_eq!(&rows[0][11], "1");
        assert_eq!(writer.rows(), 1);
    }

    #[test]
    fn filter_keeps_rows_with_required_contacts() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("leads.csv");
        let mut writer = ExportWriter::create(&source).unwrap();
        writer.append(&record("1", Some("0341 1"), None)).unwrap();
        writer
            .append(&record("2", Some("0341 2"), Some("https://two.example")))
            .unwrap();
        writer.append(&record("3", None, Some("https://three.example"))).unwrap();

        let destination = dir.path().join(filtered_name("leads.csv"));
        let kept = filter_export(
            &source,
            &destination,
            ContactRequirement {
                require_phone: true,
                require_website: false,
            },
        )
        .unwrap();
        assert_eq!(kept, 2);

        let both = filter_export(
            &source,
            &dir.path().join("both.csv"),
            ContactRequirement {
                require_phone: true,
                require_website: true,
            },
        )
        .unwrap();
        assert_eq!(both, 1);

        let content = std::fs::read_to_string(&destination).unwrap();
        assert!(content.starts_with("Search Term"));
    }

    #[test]
    fn filtered_name_appends_suffix() {
        assert_eq!(filtered_name("leads_de_1.csv"), "leads_de_1_filtered.csv");
        assert_eq!(filtered_name("leads"), "leads_filtered");
    }
}
