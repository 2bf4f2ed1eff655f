#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use myspotbackup::{
    config::Config,
    spotify::Delay,
    types::Track,
    utils::{Clock, RandomSource},
};
use reqwest::Url;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const USER_ID: &str = "fake_user";

pub fn track_id(n: usize) -> String {
    format!("{:0>22}", n)
}

pub fn track(n: usize) -> Track {
    Track::from_id(&track_id(n))
}

pub fn tracks(range: std::ops::Range<usize>) -> Vec<Track> {
    range.map(track).collect()
}

/// Fills every requested byte with `b'a'`.
pub struct FixedRandom;

impl RandomSource for FixedRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        dest.fill(b'a');
    }
}

#[derive(Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn at(ms: u64) -> Self {
        ManualClock(AtomicU64::new(ms))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Delay that returns immediately and records what was asked for.
pub fn recording_delay() -> (Delay, Arc<Mutex<Vec<Duration>>>) {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    let delay: Delay = Arc::new(move |duration| {
        sink.lock().unwrap().push(duration);
        Box::pin(async {})
    });
    (delay, recorded)
}

pub fn test_config(base_url: &str) -> Config {
    Config {
        port: 8080,
        uri: "http://localhost:8080".to_string(),
        login_url: "http://localhost:8080/login".to_string(),
        callback_uri: "http://localhost:8080/callback".to_string(),
        client_id: "test-client".to_string(),
        slowdown_import: 0,
        slowdown_export: 0,
        api_url: format!("{base_url}/v1"),
        accounts_url: base_url.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct FakePlaylist {
    pub id: String,
    pub name: String,
    /// Tracks with an empty id are served as local files (`"id": null`).
    pub tracks: Vec<Track>,
}

impl FakePlaylist {
    pub fn new(id: &str, name: &str, tracks: Vec<Track>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tracks,
        }
    }
}

/// In-memory account behind the fake Web API and accounts service.
pub struct FakeState {
    pub base: String,
    pub playlists: Vec<FakePlaylist>,
    pub saved: Vec<Track>,
    pub page_size: usize,
    /// Each entry answers one request with 429, with the given `Retry-After`.
    pub rate_limits: VecDeque<Option<u64>>,
    /// Answers requests whose method and path match with this status.
    pub failure: Option<(Method, String, u16)>,
    pub token_response: (u16, Value),
    /// Served by the token endpoint instead of `token_response` when set.
    pub token_raw: Option<(u16, String)>,
    pub requests: Vec<RecordedRequest>,
    pub created: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            base: String::new(),
            playlists: Vec::new(),
            saved: Vec::new(),
            page_size: 50,
            rate_limits: VecDeque::new(),
            failure: None,
            token_response: (
                200,
                json!({
                    "access_token": "fresh-access-token",
                    "refresh_token": "fresh-refresh-token",
                    "scope": "user-library-read",
                    "expires_in": 3600,
                    "token_type": "Bearer"
                }),
            ),
            token_raw: None,
            requests: Vec::new(),
            created: 0,
        }
    }
}

pub struct FakeSpotify {
    pub base_url: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeSpotify {
    pub async fn start(mut state: FakeState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        state.base = base_url.clone();

        let state = Arc::new(Mutex::new(state));
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn api_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    pub fn config(&self) -> Config {
        test_config(&self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Recorded requests with the given method and path.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn playlist(&self, name: &str) -> Option<FakePlaylist> {
        self.state
            .lock()
            .unwrap()
            .playlists
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    pub fn saved(&self) -> Vec<Track> {
        self.state.lock().unwrap().saved.clone()
    }
}

async fn handle(
    State(state): State<Arc<Mutex<FakeState>>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    let path = uri.path().to_string();
    let query = uri.query().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&body).to_string();

    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        body: body.clone(),
    });

    if let Some(retry_after) = state.rate_limits.pop_front() {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(json!({"error": {"status": 429, "message": "API rate limit exceeded"}})),
        )
            .into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, secs.to_string().parse().unwrap());
        }
        return response;
    }

    if let Some((fail_method, fail_path, status)) = &state.failure {
        if *fail_method == method && *fail_path == path {
            let status = StatusCode::from_u16(*status).unwrap();
            return (
                status,
                axum::Json(json!({"error": {"status": status.as_u16(), "message": "Injected failure"}})),
            )
                .into_response();
        }
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("POST", ["api", "token"]) => {
            if let Some((status, body)) = state.token_raw.clone() {
                return (StatusCode::from_u16(status).unwrap(), body).into_response();
            }
            let (status, body) = state.token_response.clone();
            (StatusCode::from_u16(status).unwrap(), axum::Json(body)).into_response()
        }
        ("GET", ["v1", "me"]) => {
            axum::Json(json!({"id": USER_ID, "display_name": "Fake User"})).into_response()
        }
        ("GET", ["v1", "me", "tracks"]) => {
            let items: Vec<Value> = state.saved.iter().map(track_item).collect();
            let url = format!("{}/v1/me/tracks", state.base);
            page(&url, &query, items, state.page_size)
        }
        ("PUT", ["v1", "me", "tracks"]) => {
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            for id in request["ids"].as_array().cloned().unwrap_or_default() {
                if let Some(id) = id.as_str() {
                    state.saved.push(Track::from_id(id));
                }
            }
            StatusCode::OK.into_response()
        }
        ("GET", ["v1", "users", _, "playlists"]) => {
            let base = state.base.clone();
            let items: Vec<Value> = state
                .playlists
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "name": p.name,
                        "tracks": {
                            "href": format!("{base}/v1/playlists/{}/tracks", p.id),
                            "total": p.tracks.len()
                        }
                    })
                })
                .collect();
            let url = format!("{base}{path}");
            page(&url, &query, items, state.page_size)
        }
        ("POST", ["v1", "users", _, "playlists"]) => {
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            state.created += 1;
            let id = format!("created{}", state.created);
            let name = request["name"].as_str().unwrap_or_default().to_string();
            state
                .playlists
                .push(FakePlaylist::new(&id, &name, Vec::new()));
            (
                StatusCode::CREATED,
                axum::Json(json!({"id": id, "name": name, "public": false})),
            )
                .into_response()
        }
        ("GET", ["v1", "playlists", id, "tracks"]) => {
            let Some(playlist) = state.playlists.iter().find(|p| p.id == *id) else {
                return not_found();
            };
            let items: Vec<Value> = playlist.tracks.iter().map(track_item).collect();
            let url = format!("{}{}", state.base, path);
            page(&url, &query, items, state.page_size)
        }
        ("POST", ["v1", "playlists", id, "tracks"]) => {
            let id = id.to_string();
            let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let Some(playlist) = state.playlists.iter_mut().find(|p| p.id == id) else {
                return not_found();
            };
            for uri in request["uris"].as_array().cloned().unwrap_or_default() {
                if let Some(uri) = uri.as_str() {
                    let id = uri.trim_start_matches("spotify:track:");
                    playlist.tracks.push(Track::from_id(id));
                }
            }
            (
                StatusCode::CREATED,
                axum::Json(json!({"snapshot_id": "snapshot"})),
            )
                .into_response()
        }
        _ => not_found(),
    }
}

fn track_item(track: &Track) -> Value {
    if track.id.is_empty() {
        json!({"track": {"id": null, "uri": "spotify:local:artist:album:title:1"}})
    } else {
        json!({"track": {"id": track.id, "uri": track.uri}})
    }
}

fn page(url: &str, query: &str, items: Vec<Value>, page_size: usize) -> Response {
    let params = Url::parse(&format!("http://fake/?{query}")).unwrap();
    let param = |key: &str| {
        params
            .query_pairs()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse::<usize>().ok())
    };
    let offset = param("offset").unwrap_or(0);
    let limit = param("limit").unwrap_or(page_size).min(page_size);

    let total = items.len();
    let end = (offset + limit).min(total);
    let slice: Vec<Value> = items.into_iter().skip(offset).take(end.saturating_sub(offset)).collect();
    let next = if end < total {
        Value::from(format!("{url}?offset={end}&limit={limit}"))
    } else {
        Value::Null
    };

    axum::Json(json!({
        "items": slice,
        "next": next,
        "total": total,
        "offset": offset,
        "limit": limit
    }))
    .into_response()
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({"error": {"status": 404, "message": "Not found"}})),
    )
        .into_response()
}
