use std::path::{Component, Path, PathBuf};

use actix_files::NamedFile;
use actix_web::{
    get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, web, HttpRequest, HttpResponse,
};
use serde_json::json;

use crate::services::{filter_export, filtered_name, ContactRequirement, JobController};

/// Resolves `filename` inside the export directory. Anything that is not a
/// single plain file name is refused.
fn resolve_export(export_dir: &Path, filename: &str) -> Option<PathBuf> {
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Some(export_dir.join(name)),
        _ => None,
    }
}

fn invalid_name(filename: &str) -> HttpResponse {
    log::warn!("Refusing export file name: {}", filename);
    HttpResponse::BadRequest().json(json!({"status": "error", "message": "Invalid file name."}))
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({"status": "error", "message": "File not found."}))
}

#[get("/{filename}")]
pub async fn download_export(
    req: HttpRequest,
    controller: web::Data<JobController>,
    filename: web::Path<String>,
) -> HttpResponse {
    let Some(path) = resolve_export(&controller.export_dir(), &filename) else {
        return invalid_name(&filename);
    };

    match NamedFile::open_async(&path).await {
        Ok(file) => file
            .set_content_disposition(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(filename.into_inner())],
            })
            .into_response(&req),
        Err(e) => {
            log::info!("Export {} not available: {:?}", path.display(), e);
            not_found()
        }
    }
}

#[post("/{filename}/filter")]
pub async fn filter_existing_export(
    controller: web::Data<JobController>,
    filename: web::Path<String>,
    body: web::Json<ContactRequirement>,
) -> HttpResponse {
    let export_dir = controller.export_dir();
    let Some(source) = resolve_export(&export_dir, &filename) else {
        return invalid_name(&filename);
    };
    if !source.is_file() {
        return not_found();
    }

    let output_name = filtered_name(&filename);
    let destination = export_dir.join(&output_name);
    let requirement = body.into_inner();

    match web::block(move || filter_export(&source, &destination, requirement)).await {
        Ok(Ok(rows)) => {
            log::info!("Filtered {} into {} with {} rows", filename, output_name, rows);
            HttpResponse::Ok().json(json!({
                "status": "success",
                "filename": output_name,
                "rows": rows,
            }))
        }
        Ok(Err(e)) => {
            log::error!("Failed to filter {}: {:?}", filename, e);
            HttpResponse::InternalServerError()
                .json(json!({"status": "error", "message": "Failed to filter export."}))
        }
        Err(e) => {
            log::error!("Filter task for {} did not finish: {:?}", filename, e);
            HttpResponse::InternalServerError()
                .json(json!({"status": "error", "message": "Failed to filter export."}))
        }
    }
}
