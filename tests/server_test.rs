mod common;

use std::{collections::HashMap, sync::Arc, time::Duration};

use common::{FakeSpotify, FakeState, FixedRandom, ManualClock};
use myspotbackup::{
    api::{AppState, TokenSink, token_delivery_page},
    config::Config,
    management::{AUTH_STATE_TTL, AuthStateStore},
    server::{router, shutdown_on},
    utils,
};
use reqwest::{StatusCode, Url, header, redirect::Policy};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::Mutex};

struct TestServer {
    base: String,
    store: Arc<AuthStateStore>,
    clock: Arc<ManualClock>,
    sink: TokenSink,
    http: reqwest::Client,
}

impl TestServer {
    async fn start(config: Config) -> Self {
        let clock = Arc::new(ManualClock::at(1_000_000));
        let store = Arc::new(AuthStateStore::new(AUTH_STATE_TTL, clock.clone()));
        let sink: TokenSink = Arc::new(Mutex::new(None));
        let state = AppState::new(Arc::new(config), store.clone())
            .with_random(Arc::new(FixedRandom))
            .with_token_sink(sink.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap();

        Self {
            base,
            store,
            clock,
            sink,
            http,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
    }
}

fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn query_of(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_health() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["name"], "myspotbackup");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_config_endpoint() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let body: Value = server.get("/config").await.json().await.unwrap();

    assert_eq!(body["client_id"], "test-client");
    assert_eq!(body["callback_uri"], "http://localhost:8080/callback");
    assert!(body.get("accounts_url").is_none());
}

#[tokio::test]
async fn test_index_page() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("/login"));
}

#[tokio::test]
async fn test_login_redirects_to_authorize_with_pkce() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/login").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    let target = location(&response);
    assert!(target.starts_with(&format!("{}/authorize?", fake.base_url)));

    let verifier = utils::generate_code_verifier(&FixedRandom);
    let params = query_of(&target);
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["client_id"], "test-client");
    assert_eq!(params["redirect_uri"], "http://localhost:8080/callback");
    assert_eq!(params["state"], "YWFhYWFhYWFhYWFh");
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["code_challenge"], utils::generate_code_challenge(&verifier));
    assert!(params["scope"].contains("playlist-read-private"));
    assert!(params["scope"].contains("user-library-modify"));

    assert_eq!(server.store.len(), 1);
}

#[tokio::test]
async fn test_login_with_read_scope_only() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/login?scopeType=read").await;

    let params = query_of(&location(&response));
    assert!(params["scope"].contains("user-library-read"));
    assert!(!params["scope"].contains("modify"));
}

#[tokio::test]
async fn test_login_without_client_id() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let mut config = fake.config();
    config.client_id = String::new();
    let server = TestServer::start(config).await;

    let response = server.get("/login").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text().await.unwrap(),
        "Missing CLIENT_ID configuration"
    );
    assert!(server.store.is_empty());
}

#[tokio::test]
async fn test_callback_without_code_redirects_home() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/callback?state=abc").await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/#error=missing_code");
}

#[tokio::test]
async fn test_callback_without_state_is_rejected() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;

    let response = server.get("/callback?code=abc").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("OAuth state is missing or invalid")
    );
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn test_callback_with_unknown_state_is_rejected() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;
    server
        .store
        .store_state("known".to_string(), "verifier".to_string());

    let response = server.get("/callback?code=abc&state=forged").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fake.requests().is_empty());
    assert_eq!(server.store.len(), 1);
}

#[tokio::test]
async fn test_callback_with_expired_state_is_rejected() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;
    server
        .store
        .store_state("old".to_string(), "verifier".to_string());
    server
        .clock
        .advance(AUTH_STATE_TTL + Duration::from_secs(1));

    let response = server.get("/callback?code=abc&state=old").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        response
            .text()
            .await
            .unwrap()
            .contains("OAuth state is expired")
    );
    assert!(fake.requests().is_empty());
}

#[tokio::test]
async fn test_callback_exchanges_code_and_delivers_token() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let server = TestServer::start(fake.config()).await;
    server
        .store
        .store_state("good".to_string(), "the-verifier".to_string());

    let response = server.get("/callback?code=auth-code&state=good").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-store, max-age=0"
    );
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    let body = response.text().await.unwrap();
    assert!(body.contains("\"fresh-access-token\""));
    assert!(body.contains("\"http://localhost:8080\""));
    assert!(body.contains("/#token=fresh-access-token"));

    let token_requests = fake.requests_to(reqwest::Method::POST, "/api/token");
    assert_eq!(token_requests.len(), 1);
    let form = &token_requests[0].body;
    assert!(form.contains("grant_type=authorization_code"));
    assert!(form.contains("code=auth-code"));
    assert!(form.contains("code_verifier=the-verifier"));
    assert!(form.contains("client_id=test-client"));

    let delivered = server.sink.lock().await.clone().unwrap();
    assert_eq!(delivered.access_token, "fresh-access-token");
    assert_eq!(delivered.refresh_token, "fresh-refresh-token");

    // the state is single use
    let replay = server.get("/callback?code=auth-code&state=good").await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_reports_token_endpoint_error() {
    let state = FakeState {
        token_response: (
            400,
            json!({"error": "invalid_grant", "error_description": "Invalid authorization code"}),
        ),
        ..Default::default()
    };
    let fake = FakeSpotify::start(state).await;
    let server = TestServer::start(fake.config()).await;
    server
        .store
        .store_state("good".to_string(), "verifier".to_string());

    let response = server.get("/callback?code=bad&state=good").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("Error during token exchange: Invalid authorization code"));
    assert!(body.contains("<a href=\"/\">Home Page</a>"));
    assert!(server.sink.lock().await.is_none());
}

async fn callback_with_token_body(status: u16, body: &str) -> (TestServer, reqwest::Response) {
    let state = FakeState {
        token_raw: Some((status, body.to_string())),
        ..Default::default()
    };
    let fake = FakeSpotify::start(state).await;
    let server = TestServer::start(fake.config()).await;
    server
        .store
        .store_state("good".to_string(), "verifier".to_string());

    let response = server.get("/callback?code=abc&state=good").await;
    (server, response)
}

#[tokio::test]
async fn test_callback_with_non_json_token_body() {
    let (server, response) = callback_with_token_body(502, "<html>Bad Gateway</html>").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("Error during token exchange: token endpoint returned 502"));
    assert!(server.sink.lock().await.is_none());
}

#[tokio::test]
async fn test_callback_with_token_response_missing_access_token() {
    let (server, response) = callback_with_token_body(200, r#"{"token_type":"Bearer"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("token endpoint response has no access_token"));
    assert!(server.sink.lock().await.is_none());
}

#[tokio::test]
async fn test_callback_fallback_origin_drops_path_of_public_uri() {
    let fake = FakeSpotify::start(FakeState::default()).await;
    let mut config = fake.config();
    config.uri = "http://localhost:8080/my-sub-path".to_string();
    let server = TestServer::start(config).await;
    server
        .store
        .store_state("good".to_string(), "verifier".to_string());

    let response = server.get("/callback?code=abc&state=good").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains(r#"let targetOrigin = "http://localhost:8080";"#));
    assert!(!body.contains("my-sub-path"));
}

#[test]
fn test_delivery_page_builds_token_fragment() {
    let page = token_delivery_page("abc", "http://localhost:8080");

    assert!(page.contains(r##"const hash = "#token=" + encodeURIComponent(token);"##));
    assert!(page.contains(r#"let targetOrigin = "http://localhost:8080";"#));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_signal() {
    let fired = tokio::time::timeout(Duration::from_secs(5), shutdown_on(async { Ok(()) })).await;
    assert!(fired.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_signal_error_keeps_serving() {
    let failing = async { Err(std::io::Error::other("no signal handler")) };

    let fired = tokio::time::timeout(Duration::from_secs(3600), shutdown_on(failing)).await;

    assert!(fired.is_err());
}

#[test]
fn test_delivery_page_escapes_token() {
    let page = token_delivery_page("a</script>b", "http://localhost:8080");

    assert!(!page.contains("a</script>b"));
    assert!(page.contains(r#""a\u003c/script\u003eb""#));
    assert!(page.contains("/#token=a%3C%2Fscript%3Eb"));
    assert!(page.contains("postMessage"));
}
