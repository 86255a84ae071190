use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::domain::{pagination::RadiusLevel, place::RawRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub lat: f64,
    pub lon: f64,
    pub country_code: String,
    /// Zero based page index.
    pub page: u32,
    pub radius: RadiusLevel,
}

/// Location-biased places search. `None` means the call failed and the
/// caller should treat it as "no results".
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Option<Vec<RawRecord>>;
}

pub struct SerperClient {
    client: Client,
    api_key: String,
    url: Url,
}

#[derive(Serialize)]
struct PlacesQuery<'a> {
    q: &'a str,
    gl: &'a str,
    hl: &'a str,
    ll: String,
    page: u32,
}

#[derive(Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    places: Vec<Value>,
}

impl PlacesResponse {
    /// Places are decoded one by one so a malformed entry cannot take the
    /// rest of the page with it. Undecodable entries come back without an
    /// identifier and are dropped downstream.
    fn into_records(self) -> Vec<RawRecord> {
        self.places
            .into_iter()
            .map(|place| {
                serde_json::from_value::<RawRecord>(place).unwrap_or_else(|e| {
                    log::debug!("Undecodable place in provider response: {:?}", e);
                    RawRecord::default()
                })
            })
            .collect()
    }
}

impl SerperClient {
    pub fn new(api_key: String, url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(SerperClient {
            client,
            api_key,
            url,
        })
    }
}

/// The provider knows the United Kingdom as `gb`.
fn provider_country(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "uk" => "gb".to_string(),
        other => other.to_string(),
    }
}

fn location_bias(request: &SearchRequest) -> String {
    format!("@{},{},{}z", request.lat, request.lon, request.radius.0)
}

#[async_trait]
impl PlacesProvider for SerperClient {
    async fn search(&self, request: &SearchRequest) -> Option<Vec<RawRecord>> {
        let country = provider_country(&request.country_code);
        let body = PlacesQuery {
            q: &request.query,
            gl: &country,
            hl: &country,
            ll: location_bias(request),
            page: request.page + 1,
        };

        let response = match self
            .client
            .post(self.url.clone())
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                log::error!("No response from places provider, error: {:?}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            log::error!(
                "Places provider returned {} for query: {}",
                response.status(),
                request.query
            );
            return None;
        }

        match response.json::<PlacesResponse>().await {
            Ok(json) => {
                log::info!(
                    "Found {} places on page {} for query: {}",
                    json.places.len(),
                    request.page + 1,
                    request.query
                );
                Some(json.into_records())
            }
            Err(e) => {
                log::error!("Error when deserializing places response: {:?}", e);
                None
            }
        }
    }
}
