use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};

use super::{done, submission, success};
use crate::AppState;
use crate::error::AppError;

macros_utils::routes! {
    route list_endpoints,
    route create_endpoint,
    route get_endpoint,
    route update_endpoint,
    route delete_endpoint,
    route endpoint_history,
}

#[get("/endpoints")]
pub async fn list_endpoints(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let endpoints = state.service.list_endpoints().to_vec();
    success(StatusCode::OK, format!("{} endpoints", endpoints.len()), "endpoints", &endpoints)
}

#[post("/endpoints")]
pub async fn create_endpoint(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let submission = submission(&req, &body)?;
    let endpoint = state.service.create_endpoint(&submission).await?;
    success(StatusCode::CREATED, "Endpoint created", "endpoint", &endpoint)
}

#[get("/endpoints/{id}")]
pub async fn get_endpoint(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let endpoint = state.service.get_endpoint(&id)?;
    success(StatusCode::OK, "Endpoint found", "endpoint", &endpoint)
}

#[put("/endpoints/{id}")]
pub async fn update_endpoint(
    state: web::Data<AppState>,
    id: web::Path<String>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let submission = submission(&req, &body)?;
    let endpoint = state.service.update_endpoint(&id, &submission).await?;
    success(StatusCode::OK, "Endpoint updated", "endpoint", &endpoint)
}

#[delete("/endpoints/{id}")]
pub async fn delete_endpoint(state: web::Data<AppState>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    state.service.delete_endpoint(&id).await?;
    Ok(done(format!("Endpoint {id} deleted")))
}

#[get("/endpoints/{id}/history")]
pub async fn endpoint_history(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let history = state.service.history(&id)?;
    success(StatusCode::OK, format!("{} probes", history.len()), "history", &history)
}
