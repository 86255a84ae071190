use std::net::TcpListener;

use actix_web::{
    dev::Server,
    error::InternalError,
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use serde_json::json;

use crate::{
    dal::place_db::PlaceStore,
    routes::{crawl_route, default_route, export_route, place_route},
    services::JobController,
};

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = HttpResponse::BadRequest()
            .json(json!({"status": "error", "message": err.to_string()}));
        InternalError::from_response(err, response).into()
    })
}

/// Every route of the service. Expects `Data<JobController>` and
/// `Data<dyn PlaceStore>` to be registered on the app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(default_route::health_check)
        .service(
            web::scope("/crawl")
                .service(crawl_route::start_crawl)
                .service(crawl_route::stop_crawl)
                .service(crawl_route::crawl_status)
                .service(crawl_route::crawl_history)
                .service(crawl_route::crawl_categories),
        )
        .service(
            web::scope("/exports")
                .service(export_route::download_export)
                .service(export_route::filter_existing_export),
        )
        .service(place_route::list_places);
}

pub fn run(
    listener: TcpListener,
    controller: Data<JobController>,
    store: Data<dyn PlaceStore>,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(controller.clone())
            .app_data(store.clone())
            .configure(configure)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
