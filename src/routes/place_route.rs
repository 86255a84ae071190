use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::dal::place_db::{PlaceQuery, PlaceStore};

#[get("/places")]
pub async fn list_places(
    store: web::Data<dyn PlaceStore>,
    query: web::Query<PlaceQuery>,
) -> HttpResponse {
    match store.browse(&query).await {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            log::error!("Failed to list places for {}: {:?}", query.region, e);
            HttpResponse::InternalServerError()
                .json(json!({"status": "error", "message": "Failed to list places."}))
        }
    }
}
