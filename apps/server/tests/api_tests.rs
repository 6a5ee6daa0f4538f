//! HTTP API over an in-memory store.

use std::sync::Arc;

use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::http::header;
use actix_web::{App, test, web};
use serde_json::{Value, json};
use vigil::{ConfigService, Dispatcher, MemoryStore, Registry};
use vigil_server::{AppState, configure};

async fn state() -> (web::Data<AppState>, Arc<MemoryStore>) {
    let _ = tracing_subscriber::fmt::try_init();

    let store = Arc::new(MemoryStore::new());
    let service = ConfigService::open(Arc::new(Registry::new()), store.clone()).await.unwrap();
    let dispatcher = Dispatcher::new(service.subscribe_settings()).unwrap();

    (web::Data::new(AppState { service: Arc::new(service), dispatcher }), store)
}

async fn app(
    state: web::Data<AppState>,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error> {
    test::init_service(App::new().configure(move |cfg| configure(cfg, state))).await
}

fn post_json(uri: &str, body: Value) -> actix_http::Request {
    test::TestRequest::post().uri(uri).set_json(body).to_request()
}

#[actix_web::test]
async fn test_health_route() {
    let (state, _) = state().await;
    let app = app(state).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_endpoint_lifecycle() {
    let (state, store) = state().await;
    let app = app(state).await;

    let req = post_json(
        "/api/endpoints",
        json!({"name": "Billing", "url": "https://billing.example.com/health", "interval_minutes": "5"}),
    );
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["endpoint"]["id"], json!("Billing"));
    assert_eq!(body["endpoint"]["interval_minutes"], json!(5));
    assert_eq!(body["endpoint"]["status"], json!("unknown"));

    let req = test::TestRequest::get().uri("/api/endpoints").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["endpoints"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::put()
        .uri("/api/endpoints/Billing")
        .set_json(json!({"name": "Billing v2", "url": "https://v2.example.com", "enabled": false}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["endpoint"]["id"], json!("Billing"));
    assert_eq!(body["endpoint"]["enabled"], json!(false));

    let req = test::TestRequest::get().uri("/api/endpoints/Billing/history").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["history"], json!([]));

    let req = test::TestRequest::delete().uri("/api/endpoints/Billing").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/endpoints/Billing").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], json!("error"));

    let document = store.document().await.unwrap();
    assert_eq!(document["service_checks"]["endpoints"], json!([]));
}

#[actix_web::test]
async fn test_form_encoded_create() {
    let (state, _) = state().await;
    let app = app(state).await;

    let req = test::TestRequest::post()
        .uri("/api/endpoints")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(
            "name=API&url=https%3A%2F%2Fapi.example.com&method=post\
             &headers%5B%5D=Accept%3A%20text%2Fplain&enabled=on",
        )
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["endpoint"]["method"], json!("POST"));
    assert_eq!(body["endpoint"]["headers"], json!({"Accept": "text/plain"}));
    assert_eq!(body["endpoint"]["enabled"], json!(true));
}

#[actix_web::test]
async fn test_error_statuses() {
    let (state, _) = state().await;
    let app = app(state).await;

    let req = post_json("/api/endpoints", json!({"name": "api", "url": "https://api.example.com", "interval_minutes": 0}));
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], json!("error"));
    assert_eq!(body["error"], json!("out_of_range:interval_minutes"));
    assert_eq!(body["field"], json!("interval_minutes"));

    let req = post_json("/api/endpoints", json!({"name": "api", "url": "https://api.example.com"}));
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    let req = post_json("/api/endpoints", json!({"name": "api", "url": "https://other.example.com"}));
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::put()
        .uri("/api/endpoints/missing")
        .set_json(json!({"name": "x", "url": "https://x.example.com"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/endpoints")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"], json!("invalid_json:submission"));
}

#[actix_web::test]
async fn test_import_and_export() {
    let (state, _) = state().await;
    let app = app(state).await;

    let yaml = "\
service_checks:
  endpoints:
    - name: one
      url: https://one.example.com
    - name: two
      url: https://two.example.com
      expected_status: 204
";
    let req = test::TestRequest::post()
        .uri("/api/import-config")
        .insert_header((header::CONTENT_TYPE, "application/x-yaml"))
        .set_payload(yaml)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["import"]["endpoints"], json!(2));

    let bad = json!({"endpoints": [{"name": "three", "url": "ftp://three.example.com"}]});
    let res = test::call_service(&app, post_json("/api/import-config", bad)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"], json!("invalid_url:endpoints[0].url"));

    let req = test::TestRequest::get().uri("/api/config/export?format=yaml").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "application/yaml");
    let disposition = res.headers().get(header::CONTENT_DISPOSITION).unwrap().to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment"), "{disposition}");

    let exported = test::read_body(res).await;
    let document: Value = serde_yaml::from_slice(&exported).unwrap();
    let names: Vec<&str> = document["service_checks"]["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["one", "two"]);

    let req = test::TestRequest::get().uri("/api/config/export?format=xml").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_settings_sections() {
    let (state, _) = state().await;
    let app = app(state.clone()).await;

    let req = post_json(
        "/api/config",
        json!({"section": "notificationSettingsForm", "data": {"notify_on_status": "always"}}),
    );
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["notifications"]["notify_on_status"], json!("always"));
    assert_eq!(state.dispatcher.policy(), vigil::NotifyPolicy::Always);

    let req = test::TestRequest::post()
        .uri("/api/config")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("section=telegramSettingsForm&enabled=true&chat_ids%5B%5D=42&chat_ids%5B%5D=43")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["notifications"]["telegram"]["chat_ids"], json!(["42", "43"]));

    let req = post_json("/api/config", json!({"section": "webhookSettingsForm", "data": {"url": "not a url"}}));
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let req = post_json("/api/config", json!({"data": {}}));
    let res = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"], json!("required:section"));

    let req = test::TestRequest::get().uri("/api/config").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["general"]["app_name"], json!("Vigil"));
    assert_eq!(body["config"]["notifications"]["telegram"]["enabled"], json!(true));
}

#[actix_web::test]
async fn test_notification_test_route() {
    let (state, _) = state().await;
    let app = app(state).await;

    let req = test::TestRequest::post().uri("/api/notifications/test").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["deliveries"][0]["notifier"], json!("log"));

    let req = post_json(
        "/api/config",
        json!({"section": "notifications.webhook", "data": {"enabled": true, "url": "http://127.0.0.1:9/hook"}}),
    );
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post().uri("/api/notifications/test").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], json!("error"));
    assert_eq!(body["deliveries"][1]["notifier"], json!("webhook"));
    assert_eq!(body["deliveries"][1]["delivered"], json!(false));
}

#[actix_web::test]
async fn test_config_sections_and_reset() {
    let (state, _) = state().await;
    let app = app(state.clone()).await;

    let req = post_json("/api/config", json!({"section": "general", "data": {"app_name": "Ops"}}));
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/api/config/general").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["app_name"], json!("Ops"));

    let req = test::TestRequest::get().uri("/api/config/email").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["smtp_port"], json!(587));

    let req = test::TestRequest::get().uri("/api/config/bogus").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = post_json("/api/endpoints", json!({"name": "api", "url": "https://api.example.com"}));
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post().uri("/api/config/reset").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["config"]["general"]["app_name"], json!("Vigil"));

    let req = test::TestRequest::get().uri("/api/config/general").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["config"]["app_name"], json!("Vigil"));
    assert!(state.service.get_endpoint("api").is_ok());

    // the export route is not taken for a section name
    let req = test::TestRequest::get().uri("/api/config/export").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "application/json");
}
