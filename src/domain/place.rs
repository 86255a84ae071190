use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::location::Location;

/// A place as returned by the provider. Every field is optional and a
/// field of the wrong type reads as absent instead of failing the record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub rating_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    pub opening_hours: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cid: Option<String>,
    #[serde(default, alias = "place_id", deserialize_with = "lenient_string")]
    pub place_id: Option<String>,
}

impl RawRecord {
    pub fn identifier(&self) -> Option<&str> {
        [self.cid.as_deref(), self.place_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }
}

/// Canonical shape written to the export file and the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub place_id: String,
    pub region: String,
    pub search_term: String,
    pub location_label: String,
    pub sub_region: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub category: Option<String>,
    pub opening_hours: Option<String>,
    pub price_level: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl NormalizedRecord {
    /// `None` when the record has no identifier to dedup or persist by.
    pub fn from_raw(
        raw: RawRecord,
        region: &str,
        search_term: &str,
        location: &Location,
    ) -> Option<Self> {
        let place_id = raw.identifier()?.to_string();

        Some(NormalizedRecord {
            place_id,
            region: region.to_string(),
            search_term: search_term.to_string(),
            location_label: location.label.clone(),
            sub_region: location.sub_region.clone(),
            name: non_blank(raw.title).unwrap_or_else(|| "Unknown".to_string()),
            address: non_blank(raw.address),
            phone: non_blank(raw.phone_number),
            website: non_blank(raw.website),
            rating: raw.rating,
            review_count: raw.rating_count,
            category: non_blank(raw.category),
            opening_hours: raw.opening_hours.as_ref().and_then(render_hours),
            price_level: non_blank(raw.price_level),
            description: non_blank(raw.description),
            latitude: raw.latitude.unwrap_or(location.lat),
            longitude: raw.longitude.unwrap_or(location.lon),
        })
    }

    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }

    pub fn has_website(&self) -> bool {
        self.website.is_some()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn render_hours(hours: &Value) -> Option<String> {
    let rendered = match hours {
        Value::String(s) => s.trim().to_string(),
        Value::Object(days) => days
            .iter()
            .map(|(day, time)| match time {
                Value::String(t) => format!("{}: {}", day, t),
                other => format!("{}: {}", day, other),
            })
            .collect::<Vec<String>>()
            .join("; "),
        Value::Array(entries) => entries
            .iter()
            .filter_map(render_hours)
            .collect::<Vec<String>>()
            .join("; "),
        _ => String::new(),
    };

    Some(rendered).filter(|r| !r.is_empty())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
