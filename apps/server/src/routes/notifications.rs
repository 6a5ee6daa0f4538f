use actix_web::http::StatusCode;
use actix_web::{HttpResponse, post, web};
use serde_json::json;
use tracing::warn;

use crate::AppState;

macros_utils::routes! {
    route test_notification,
}

/// Send a test notification through every active notifier
#[post("/notifications/test")]
pub async fn test_notification(state: web::Data<AppState>) -> HttpResponse {
    let deliveries = state.dispatcher.send_test().await;
    let failed = deliveries.iter().filter(|delivery| !delivery.delivered).count();

    if failed == 0 {
        HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!("Test notification sent through {} notifiers", deliveries.len()),
            "deliveries": deliveries,
        }))
    } else {
        warn!(failed, "test notification was not delivered everywhere");
        HttpResponse::build(StatusCode::BAD_GATEWAY).json(json!({
            "status": "error",
            "message": format!("{failed} of {} notifiers failed", deliveries.len()),
            "deliveries": deliveries,
        }))
    }
}
