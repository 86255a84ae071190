use std::{collections::HashMap, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use url::Url;

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub api_keys: ApiKeySettings,
    pub provider: ProviderSettings,
    pub crawler: CrawlerSettings,
    pub regions: HashMap<String, RegionSettings>,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone)]
pub struct ApiKeySettings {
    pub serper: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub enabled: bool,
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = match self.require_ssl {
            true => PgSslMode::Require,
            false => PgSslMode::Prefer,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Clone)]
pub struct CrawlerSettings {
    pub export_dir: PathBuf,
    pub history_file: PathBuf,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub page_delay_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub grid_page_ceiling: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub grid_radius_level: u8,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_pending_logs: usize,
}

impl CrawlerSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

/// Reference tables and provider country for one crawlable region.
#[derive(Deserialize, Clone)]
pub struct RegionSettings {
    pub locations_file: PathBuf,
    pub grid_file: Option<PathBuf>,
    pub sub_regions_file: Option<PathBuf>,
    pub country_code: String,
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path};

    use super::{Environment, RegionSettings};

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Environment = "PRODUCTION".to_string().try_into().unwrap();
        assert_eq!(env.as_str(), "production");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let env: Result<Environment, String> = "staging".to_string().try_into();
        assert!(env.is_err());
    }

    #[test]
    fn every_configured_region_table_ships() {
        let regions: HashMap<String, RegionSettings> = config::Config::builder()
            .add_source(config::File::from(Path::new("configuration/base.yaml")))
            .build()
            .unwrap()
            .get("regions")
            .unwrap();

        assert!(!regions.is_empty());
        for (key, region) in &regions {
            let files = [
                Some(&region.locations_file),
                region.grid_file.as_ref(),
                region.sub_regions_file.as_ref(),
            ];
            for file in files.into_iter().flatten() {
                assert!(file.is_file(), "{}: missing {}", key, file.display());
            }
        }
    }
}
