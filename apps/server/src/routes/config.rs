use actix_web::http::StatusCode;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::Value;
use vigil::{Format, Submission};

use super::{submission, success};
use crate::AppState;
use crate::error::AppError;

macros_utils::routes! {
    route get_config,
    route save_config,
    route reset_config,
    route import_config,
    route export_config,
    route get_config_section,
}

#[derive(Debug, Deserialize)]
pub struct FormatQuery {
    format: Option<String>,
}

impl FormatQuery {
    fn format(&self) -> Result<Option<Format>, AppError> {
        self.format
            .as_deref()
            .map(|name| Format::parse(name).ok_or_else(|| AppError::BadRequest(format!("Unknown format '{name}'"))))
            .transpose()
    }
}

#[get("/config")]
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    success(StatusCode::OK, "Current settings", "config", &state.service.settings())
}

/// Save one settings section. The body names the section and carries its
/// values under `data`; without `data` every other field is taken as a value.
#[post("/config")]
pub async fn save_config(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let mut fields = submission(&req, &body)?.into_map();

    let section = match fields.remove("section") {
        Some(Value::String(section)) => section,
        _ => return Err(vigil::ValidationError::required("section").into()),
    };
    let data = match fields.remove("data") {
        Some(Value::Object(data)) => data,
        Some(Value::String(text)) => Submission::from_json_slice(text.as_bytes())?.into_map(),
        _ => fields,
    };

    let settings = state.service.save_section(&section, &Submission::from_map(data)).await?;
    success(StatusCode::OK, format!("Settings '{section}' saved"), "config", &settings)
}

/// Restore the default settings, keeping every endpoint
#[post("/config/reset")]
pub async fn reset_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let settings = state.service.reset_settings().await?;
    success(StatusCode::OK, "Settings reset to defaults", "config", &settings)
}

/// One settings section, e.g. `/config/email` or `/config/notifications.webhook`
#[get("/config/{section}")]
pub async fn get_config_section(
    state: web::Data<AppState>,
    section: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let data = state.service.settings_section(&section)?;
    success(StatusCode::OK, format!("Settings '{section}'"), "config", &data)
}

/// Replace the whole configuration with the uploaded document
#[post("/import-config")]
pub async fn import_config(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<FormatQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let format = match query.format()? {
        Some(format) => format,
        None if req.content_type().to_ascii_lowercase().contains("yaml") => Format::Yaml,
        None => Format::Json,
    };

    let summary = state.service.import(&body, format).await?;
    success(StatusCode::OK, format!("Imported {} endpoints", summary.endpoints), "import", &summary)
}

#[get("/config/export")]
pub async fn export_config(
    state: web::Data<AppState>,
    query: web::Query<FormatQuery>,
) -> Result<HttpResponse, AppError> {
    let format = query.format()?.unwrap_or_default();
    let document = state.service.export(format)?;

    let filename = match format {
        Format::Json => "vigil-config.json",
        Format::Yaml => "vigil-config.yaml",
    };

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, format.content_type()))
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename.to_string())],
        })
        .body(document))
}
