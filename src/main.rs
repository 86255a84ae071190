use std::{net::TcpListener, sync::Arc, time::Duration};

use actix_web::web::Data;
use env_logger::Env;
use geocrawl::{
    configuration::get_configuration,
    dal::place_db::{NoopPlaceStore, PgPlaceStore, PlaceStore},
    domain::query::QueryCatalog,
    services::{CrawlContext, JobController, ReferenceData, SerperClient},
    startup::run,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().expect("Failed to read configuration.");

    let store: Arc<dyn PlaceStore> = match configuration.database.enabled {
        true => {
            let connection_pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
                .connect_lazy_with(configuration.database.with_db());
            sqlx::migrate!("./migrations").run(&connection_pool).await?;
            Arc::new(PgPlaceStore::new(connection_pool))
        }
        false => {
            log::warn!("Database disabled, known places are not remembered between runs");
            Arc::new(NoopPlaceStore)
        }
    };

    if configuration.api_keys.serper.is_empty() {
        log::warn!("No places provider API key configured, every search will come back empty");
    }
    let provider = SerperClient::new(
        configuration.api_keys.serper,
        configuration.provider.url()?,
        configuration.provider.timeout(),
    )?;
    let reference = ReferenceData::load(&configuration.regions)?;

    let controller = JobController::new(CrawlContext {
        provider: Arc::new(provider),
        store: store.clone(),
        reference: Arc::new(reference),
        catalog: QueryCatalog::default(),
        settings: configuration.crawler,
    });

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!("Listening on {}", address);

    run(listener, Data::new(controller), Data::from(store))?.await?;
    Ok(())
}
