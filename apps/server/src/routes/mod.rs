use actix_web::http::StatusCode;
use actix_web::web::{self, ServiceConfig};
use actix_web::{HttpMessage, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::{Map, Value};
use vigil::Submission;

use crate::error::AppError;

mod config;
mod endpoints;
mod health;
mod notifications;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    cfg.service(
        web::scope("/api")
            .configure(endpoints::routes)
            .configure(config::routes)
            .configure(notifications::routes),
    );
}

/// Success envelope: `{status: "success", message, <key>: data}`
pub(crate) fn success(
    status: StatusCode,
    message: impl Into<String>,
    key: &str,
    data: &impl Serialize,
) -> Result<HttpResponse, AppError> {
    let data = serde_json::to_value(data).map_err(|e| AppError::Internal(e.to_string()))?;

    let mut body = Map::new();
    body.insert("status".into(), Value::from("success"));
    body.insert("message".into(), Value::from(message.into()));
    body.insert(key.into(), data);

    Ok(HttpResponse::build(status).json(Value::Object(body)))
}

/// Success envelope without a payload
pub(crate) fn done(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "success", "message": message.into()}))
}

/// Read a request body as form-encoded or JSON, depending on its content type
pub(crate) fn submission(req: &HttpRequest, body: &[u8]) -> Result<Submission, AppError> {
    let submission = if req.content_type().eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
        Submission::from_form_encoded(body)?
    } else {
        Submission::from_json_slice(body)?
    };
    Ok(submission)
}
