//! End-to-end tests through the full router.

use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};
use serde_json::json;
use sqlx::PgPool;
use tempfile::TempDir;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use crate::{
    Application,
    api::handlers::{
        auth::{INCORRECT_CREDENTIALS, LOGGED_OUT},
        discover::FETCH_FAILED,
    },
    auth::session::InMemorySessionStore,
    discovery::TicketmasterClient,
    test_utils::{
        FailingSessionStore, create_test_config, create_test_server, install_crypto_provider, location, login_as,
        server_for, session_cookie, test_state,
    },
};

fn credentials(username: &str, password: &str) -> serde_json::Value {
    json!({ "username": username, "password": password })
}

/// Register, log in, browse, log out, and be locked out again.
#[test_log::test(tokio::test)]
async fn test_full_session_lifecycle() {
    let (config, _uploads) = create_test_config();
    let (server, _state) = create_test_server(config);

    let response = server.post("/register").form(&credentials("alice", "Secret1")).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = server.post("/login").form(&credentials("alice", "Secret1")).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/discover");
    let cookie = session_cookie(&response).expect("session cookie");

    let response = server.get("/discover").add_header("cookie", cookie.clone()).await;
    response.assert_status_ok();

    let response = server.get("/logout").add_header("cookie", cookie.clone()).await;
    response.assert_status_ok();
    assert!(response.text().contains(LOGGED_OUT));
    assert!(session_cookie(&response).is_none());

    // the old cookie no longer opens the gate
    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_wrong_password_stays_anonymous() {
    let (config, _uploads) = create_test_config();
    let (server, _state) = create_test_server(config);
    server.post("/register").form(&credentials("alice", "Secret1")).await;

    let response = server.post("/login").form(&credentials("alice", "Secret2")).await;
    response.assert_status_ok();
    assert!(response.text().contains(INCORRECT_CREDENTIALS));
    assert!(session_cookie(&response).is_none());

    let response = server.get("/discover").await;
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_tampered_cookie_is_anonymous() {
    let (config, _uploads) = create_test_config();
    let (server, _state) = create_test_server(config);
    let cookie = login_as(&server, "alice", "Secret1").await;

    // change the first character of the signature
    let (unsigned, signature) = cookie.rsplit_once('.').unwrap();
    let first = if signature.starts_with('A') { 'B' } else { 'A' };
    let tampered = format!("{unsigned}.{first}{}", &signature[1..]);

    let response = server.get("/discover").add_header("cookie", tampered).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    // an unsigned session id is rejected too
    let (name, value) = cookie.split_once('=').unwrap();
    let (id, _) = value.rsplit_once('.').unwrap();
    let response = server.get("/discover").add_header("cookie", format!("{name}={id}")).await;
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_cookie_signed_with_other_secret_is_anonymous() {
    let (config, _uploads) = create_test_config();
    let (server, _state) = create_test_server(config);
    login_as(&server, "alice", "Secret1").await;

    let (mut other, _other_uploads) = create_test_config();
    other.session.secret = Some("a-completely-different-secret".to_string());
    let (other_server, _other_state) = create_test_server(other);
    let foreign = login_as(&other_server, "alice", "Secret1").await;

    let response = server.get("/discover").add_header("cookie", foreign).await;
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_expired_session_is_anonymous() {
    let (config, _uploads) = create_test_config();
    let mut state = test_state(config);
    state.sessions = Arc::new(InMemorySessionStore::new(Duration::ZERO));
    let server = server_for(state);

    let cookie = login_as(&server, "alice", "Secret1").await;
    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_session_store_outage_is_anonymous() {
    let (config, _uploads) = create_test_config();
    let (server, state) = create_test_server(config);
    let cookie = login_as(&server, "alice", "Secret1").await;

    let mut broken = state.clone();
    broken.sessions = Arc::new(FailingSessionStore);
    let server = server_for(broken);

    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[test_log::test(tokio::test)]
async fn test_session_snapshot_is_not_refreshed() {
    let (config, _uploads) = create_test_config();
    let (server, state) = create_test_server(config);
    let cookie = login_as(&server, "alice", "Secret1").await;

    // a second, unrelated account does not change alice's page
    server.post("/register").form(&credentials("bob", "Secret2")).await;
    assert!(state.users.find_user_by_username("bob").await.unwrap().is_some());

    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status_ok();
    assert!(response.text().contains("alice"));
}

async fn discovery_server(upstream: &MockServer) -> (TestServer, TempDir) {
    let (mut config, uploads) = create_test_config();
    config.discovery.base_url = Url::parse(&format!("{}/discovery/v2/events.json", upstream.uri())).unwrap();
    config.discovery.api_key = Some("test-key".to_string());
    config.discovery.keyword = "music".to_string();
    config.discovery.size = 5;

    install_crypto_provider();
    let mut state = test_state(config.clone());
    state.events = Arc::new(TicketmasterClient::new(&config.discovery).unwrap());
    (server_for(state), uploads)
}

#[test_log::test(tokio::test)]
async fn test_discover_proxies_upstream_events() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discovery/v2/events.json"))
        .and(query_param("apikey", "test-key"))
        .and(query_param("keyword", "music"))
        .and(query_param("size", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_embedded": {"events": [
                {
                    "name": "Jazz Night",
                    "url": "https://tickets.example/jazz",
                    "dates": {"start": {"localDate": "2026-11-02", "localTime": "20:00:00"}},
                    "_embedded": {"venues": [{"name": "Blue Room", "city": {"name": "Denver"}}]}
                },
                {"name": "Rock Show"}
            ]}
        })))
        .mount(&upstream)
        .await;

    let (server, _uploads) = discovery_server(&upstream).await;
    let cookie = login_as(&server, "alice", "Secret1").await;

    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("Jazz Night"));
    assert!(body.contains("Rock Show"));
    assert!(body.contains("Blue Room, Denver"));
    assert!(body.contains("2026-11-02"));
    assert!(!body.contains(FETCH_FAILED));
}

#[test_log::test(tokio::test)]
async fn test_discover_upstream_without_embedded() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"page": {"size": 5, "totalElements": 0}})))
        .mount(&upstream)
        .await;

    let (server, _uploads) = discovery_server(&upstream).await;
    let cookie = login_as(&server, "alice", "Secret1").await;

    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("No events found."));
    assert!(!body.contains(FETCH_FAILED));
}

#[test_log::test(tokio::test)]
async fn test_discover_upstream_server_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&upstream)
        .await;

    let (server, _uploads) = discovery_server(&upstream).await;
    let cookie = login_as(&server, "alice", "Secret1").await;

    let response = server.get("/discover").add_header("cookie", cookie).await;
    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains(FETCH_FAILED));
    assert!(!body.contains("upstream exploded"));
}

#[test_log::test(tokio::test)]
async fn test_register_with_profile_image() {
    let (config, _uploads) = create_test_config();
    let (server, state) = create_test_server(config);
    let png: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    let form = MultipartForm::new()
        .add_text("username", "alice")
        .add_text("password", "Secret1")
        .add_part("file", Part::bytes(png.clone()).file_name("me.png").mime_type("image/png"));
    let response = server.post("/register").multipart(form).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let user = state.users.find_user_by_username("alice").await.unwrap().unwrap();
    let image = user.profile_image.expect("profile image recorded");
    assert!(image.starts_with("/uploads/"));
    assert!(image.ends_with("-me.png"));

    // served back from the uploads directory
    let response = server.get(&image).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().to_vec(), png);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");

    // and shown on the discover page
    let login = server.post("/login").form(&credentials("alice", "Secret1")).await;
    let cookie = session_cookie(&login).unwrap();
    let response = server.get("/discover").add_header("cookie", cookie).await;
    let file_name = image.trim_start_matches("/uploads/");
    assert!(response.text().contains(file_name));
}

#[test_log::test(tokio::test)]
async fn test_register_multipart_without_file() {
    let (config, _uploads) = create_test_config();
    let (server, state) = create_test_server(config);

    let form = MultipartForm::new().add_text("username", "alice").add_text("password", "Secret1");
    let response = server.post("/register").multipart(form).await;
    assert_eq!(location(&response), "/login");

    let user = state.users.find_user_by_username("alice").await.unwrap().unwrap();
    assert!(user.profile_image.is_none());
}

#[test_log::test(tokio::test)]
async fn test_register_rejects_non_image_upload() {
    let (config, _uploads) = create_test_config();
    let upload_dir = config.uploads.dir.clone();
    let (server, state) = create_test_server(config);

    let form = MultipartForm::new()
        .add_text("username", "alice")
        .add_text("password", "Secret1")
        .add_part(
            "file",
            Part::bytes(b"#!/bin/sh\necho hi\n".to_vec()).file_name("run.sh").mime_type("text/x-shellscript"),
        );
    let response = server.post("/register").multipart(form).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/register");

    assert!(state.users.find_user_by_username("alice").await.unwrap().is_none());
    assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_register_rejects_markup_declared_as_image() {
    let (config, _uploads) = create_test_config();
    let upload_dir = config.uploads.dir.clone();
    let (server, state) = create_test_server(config);

    let form = MultipartForm::new()
        .add_text("username", "mallory")
        .add_text("password", "Secret1")
        .add_part(
            "file",
            Part::bytes(b"<script>document.location='https://evil.example'</script>".to_vec())
                .file_name("evil.html")
                .mime_type("image/png"),
        );
    let response = server.post("/register").multipart(form).await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/register");

    assert!(state.users.find_user_by_username("mallory").await.unwrap().is_none());
    assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_register_rejects_oversized_upload() {
    let (mut config, _uploads) = create_test_config();
    config.uploads.max_file_size = 16;
    let (server, state) = create_test_server(config);

    let form = MultipartForm::new()
        .add_text("username", "alice")
        .add_text("password", "Secret1")
        .add_part("file", Part::bytes(vec![0u8; 64]).file_name("big.png").mime_type("image/png"));
    let response = server.post("/register").multipart(form).await;
    assert_eq!(location(&response), "/register");
    assert!(state.users.find_user_by_username("alice").await.unwrap().is_none());
}

#[test_log::test(tokio::test)]
async fn test_duplicate_registration_keeps_upload_dir_clean() {
    let (config, _uploads) = create_test_config();
    let upload_dir = config.uploads.dir.clone();
    let (server, _state) = create_test_server(config);

    server.post("/register").form(&credentials("alice", "Secret1")).await;

    let form = MultipartForm::new()
        .add_text("username", "alice")
        .add_text("password", "Secret2")
        .add_part("file", Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("me.png").mime_type("image/png"));
    let response = server.post("/register").multipart(form).await;
    assert_eq!(location(&response), "/register");

    assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
}

#[test]
fn test_upload_dir_removed_after_test() {
    let (config, uploads) = create_test_config();
    assert!(config.uploads.dir.is_dir());

    drop(uploads);
    assert!(!config.uploads.dir.exists());
}

#[test_log::test(tokio::test)]
async fn test_welcome_and_healthz() {
    let (config, _uploads) = create_test_config();
    let (server, _state) = create_test_server(config);

    let response = server.get("/welcome").await;
    response.assert_status_ok();
    response.assert_json(&json!({"status": "success", "message": "Welcome!"}));

    server.get("/healthz").await.assert_text("OK");
}

/// The same lifecycle against PostgreSQL-backed stores.
#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_full_session_lifecycle_postgres(pool: PgPool) {
    let (mut config, _uploads) = create_test_config();
    config.session.store = crate::config::SessionStoreKind::Postgres;
    install_crypto_provider();

    let server = Application::with_pool(config, pool.clone()).await.unwrap().into_test_server();

    let cookie = login_as(&server, "alice", "Secret1").await;
    server.get("/discover").add_header("cookie", cookie.clone()).await.assert_status_ok();

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions").fetch_one(&pool).await.unwrap();
    assert_eq!(sessions, 1);

    server.get("/logout").add_header("cookie", cookie.clone()).await.assert_status_ok();
    let response = server.get("/discover").add_header("cookie", cookie).await;
    assert_eq!(location(&response), "/login");

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions").fetch_one(&pool).await.unwrap();
    assert_eq!(sessions, 0);
}
