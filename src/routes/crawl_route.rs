use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use crate::{
    domain::job::CrawlParameters,
    services::{JobController, SubmitError},
};

#[post("/start")]
pub async fn start_crawl(
    controller: web::Data<JobController>,
    body: web::Json<CrawlParameters>,
) -> HttpResponse {
    match controller.submit(body.into_inner()) {
        Ok(ticket) => HttpResponse::Accepted().json(json!({
            "status": "success",
            "job_id": ticket.job_id,
            "filename": ticket.filename,
        })),
        Err(e @ SubmitError::AlreadyRunning) => {
            log::warn!("Rejected crawl request: {}", e);
            HttpResponse::Conflict().json(json!({"status": "error", "message": e.to_string()}))
        }
        Err(e @ SubmitError::Invalid(_)) => {
            HttpResponse::BadRequest().json(json!({"status": "error", "message": e.to_string()}))
        }
    }
}

#[post("/stop")]
pub async fn stop_crawl(controller: web::Data<JobController>) -> HttpResponse {
    controller.stop();
    HttpResponse::Accepted().json(json!({"status": "success", "message": "Stop requested."}))
}

#[get("/status")]
pub async fn crawl_status(controller: web::Data<JobController>) -> HttpResponse {
    HttpResponse::Ok().json(controller.snapshot())
}

#[get("/history")]
pub async fn crawl_history(controller: web::Data<JobController>) -> HttpResponse {
    HttpResponse::Ok().json(controller.history())
}

#[get("/categories")]
pub async fn crawl_categories(controller: web::Data<JobController>) -> HttpResponse {
    HttpResponse::Ok().json(controller.categories())
}
