use std::{sync::Arc, time::Duration};

use actix_web::{
    http::{header, StatusCode},
    test,
    web::Data,
    App,
};
use async_trait::async_trait;
use geocrawl::{
    configuration::{CrawlerSettings, RegionSettings},
    dal::place_db::{NoopPlaceStore, PlaceStore},
    domain::{place::RawRecord, query::QueryCatalog},
    services::{
        CrawlContext, JobController, PlacesProvider, ReferenceData, RegionReference,
        SearchRequest,
    },
    startup::configure,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

/// Never answers, so a submitted job stays running.
struct Hanging;

#[async_trait]
impl PlacesProvider for Hanging {
    async fn search(&self, _request: &SearchRequest) -> Option<Vec<RawRecord>> {
        std::future::pending::<()>().await;
        None
    }
}

/// Two places per page, one with a phone number.
struct TwoPerPage;

#[async_trait]
impl PlacesProvider for TwoPerPage {
    async fn search(&self, request: &SearchRequest) -> Option<Vec<RawRecord>> {
        let place = |n: u32, phone: Option<&str>| RawRecord {
            title: Some(format!("Friseur {}", n)),
            phone_number: phone.map(str::to_string),
            cid: Some(format!("{}-{}-{}", request.lat, request.page, n)),
            ..RawRecord::default()
        };
        Some(vec![place(1, Some("089 1234")), place(2, None)])
    }
}

fn controller(dir: &TempDir, provider: Arc<dyn PlacesProvider>) -> JobController {
    let locations_file = dir.path().join("cities.txt");
    std::fs::write(
        &locations_file,
        "name,latitude,longitude,population\n\
         München,48.1351,11.582,1500000\n\
         Augsburg,48.3705,10.8978,300000\n",
    )
    .unwrap();

    let region = RegionReference {
        key: "de".to_string(),
        settings: RegionSettings {
            locations_file,
            grid_file: None,
            sub_regions_file: None,
            country_code: "de".to_string(),
        },
        classifier: None,
    };

    JobController::new(CrawlContext {
        provider,
        store: Arc::new(NoopPlaceStore),
        reference: Arc::new(ReferenceData::from_regions(vec![region])),
        catalog: QueryCatalog::default(),
        settings: CrawlerSettings {
            export_dir: dir.path().join("exports"),
            history_file: dir.path().join("history.json"),
            page_delay_ms: 0,
            grid_page_ceiling: 20,
            grid_radius_level: 14,
            max_pending_logs: 100,
        },
    })
}

macro_rules! app {
    ($controller:expr) => {{
        let store: Arc<dyn PlaceStore> = Arc::new(NoopPlaceStore);
        test::init_service(
            App::new()
                .app_data($controller.clone())
                .app_data(Data::from(store))
                .configure(configure),
        )
        .await
    }};
}

fn start_body(target: u64) -> Value {
    json!({"region": "de", "search_term": "hairdresser", "target": target})
}

#[actix_web::test]
async fn health_check_works() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(Hanging)));
    let app = app!(controller);

    let req = test::TestRequest::get().uri("/health_check").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn second_start_is_rejected_while_running() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(Hanging)));
    let app = app!(controller);

    let req = test::TestRequest::post()
        .uri("/crawl/start")
        .set_json(start_body(5))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let started: Value = test::read_body_json(resp).await;
    assert_eq!(started["status"], "success");
    let filename = started["filename"].as_str().unwrap().to_string();
    assert!(filename.starts_with("hairdresser_de_"));

    let req = test::TestRequest::post()
        .uri("/crawl/start")
        .set_json(start_body(5))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let rejected: Value = test::read_body_json(resp).await;
    assert_eq!(rejected["message"], "Job already running.");

    let req = test::TestRequest::get().uri("/crawl/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["is_running"], true);
    assert_eq!(status["state"], "running");
    assert_eq!(status["current_filename"], filename.as_str());
    assert_eq!(status["job_id"], started["job_id"]);

    let req = test::TestRequest::post().uri("/crawl/stop").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[actix_web::test]
async fn invalid_start_requests_are_bad_requests() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(Hanging)));
    let app = app!(controller);

    let req = test::TestRequest::post()
        .uri("/crawl/start")
        .set_json(start_body(0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/crawl/start")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"region\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "error");

    let req = test::TestRequest::get().uri("/crawl/status").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["state"], "idle");
}

#[actix_web::test]
async fn finished_job_is_downloadable_and_in_history() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(TwoPerPage)));
    let app = app!(controller);

    let req = test::TestRequest::get().uri("/crawl/history").to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history, json!([]));

    let req = test::TestRequest::post()
        .uri("/crawl/start")
        .set_json(start_body(3))
        .to_request();
    let started: Value = test::call_and_read_body_json(&app, req).await;
    let filename = started["filename"].as_str().unwrap().to_string();

    let mut status = Value::Null;
    for _ in 0..200 {
        let req = test::TestRequest::get().uri("/crawl/status").to_request();
        status = test::call_and_read_body_json(&app, req).await;
        if status["is_running"] == false {
            break;
        }
        actix_web::rt::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status["state"], "limit_reached");
    assert_eq!(status["status_message"], "Limit reached.");
    assert_eq!(status["total_leads"], 3);

    let req = test::TestRequest::get().uri("/crawl/history").to_request();
    let history: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(history[0]["filename"], filename.as_str());
    assert_eq!(history[0]["leads_found"], 3);
    assert_eq!(history[0]["outcome"], "limit_reached");

    let req = test::TestRequest::get()
        .uri(&format!("/exports/{}", filename))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    let body = test::read_body(resp).await;
    let content = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(content.lines().count(), 4);
    assert!(content.contains("Friseur 1"));

    let req = test::TestRequest::post()
        .uri(&format!("/exports/{}/filter", filename))
        .set_json(json!({"require_phone": true}))
        .to_request();
    let filtered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(filtered["status"], "success");
    assert_eq!(filtered["rows"], 2);
    assert!(filtered["filename"]
        .as_str()
        .unwrap()
        .ends_with("_filtered.csv"));
}

#[actix_web::test]
async fn missing_exports_are_not_found() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(Hanging)));
    let app = app!(controller);

    let req = test::TestRequest::get()
        .uri("/exports/nothing_de_1.csv")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/exports/nothing_de_1.csv/filter")
        .set_json(json!({"require_website": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn places_are_empty_without_a_database() {
    let dir = tempdir().unwrap();
    let controller = Data::new(controller(&dir, Arc::new(Hanging)));
    let app = app!(controller);

    let req = test::TestRequest::get()
        .uri("/places?region=de&require_phone=true")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rows: Value = test::read_body_json(resp).await;
    assert_eq!(rows, json!([]));
}
