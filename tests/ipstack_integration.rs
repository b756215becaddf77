//! ipstack client integration tests
//!
//! A local axum server stands in for api.ipstack.com so the real HTTP client
//! is exercised for every upstream outcome, and the full stack is driven
//! from the router down to the socket.

use axum::{
    body::Body,
    extract::{connect_info::MockConnectInfo, Path, Query},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use visit_tracker::api::{create_router, AppState};
use visit_tracker::config::{ClientIpConfig, IpStackConfig};
use visit_tracker::geo::{GeoLookup, IpStackClient, LocationInfo, LookupError};
use visit_tracker::tracker::VisitTracker;

const TEST_ACCESS_KEY: &str = "test-key";

/// Mock upstream keyed on the requested IP
async fn mock_ipstack(
    Path(ip): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("access_key").map(String::as_str) != Some(TEST_ACCESS_KEY) {
        return Json(json!({
            "success": false,
            "error": {
                "code": 101,
                "type": "invalid_access_key",
                "info": "You have not supplied a valid API Access Key."
            }
        }))
        .into_response();
    }

    match ip.as_str() {
        "8.8.8.8" => Json(json!({
            "ip": "8.8.8.8",
            "type": "ipv4",
            "country_code": "US",
            "country_name": "United States",
            "region_name": "California",
            "city": "Mountain View"
        }))
        .into_response(),
        "1.1.1.1" => Json(json!({
            "ip": "1.1.1.1",
            "country_name": "Australia",
            "region_name": "Queensland",
            "city": "Brisbane"
        }))
        .into_response(),
        "10.0.0.1" => Json(json!({
            "ip": "10.0.0.1",
            "country_name": null,
            "region_name": null,
            "city": null
        }))
        .into_response(),
        "192.0.2.1" => (
            [("content-type", "application/json")],
            "{\"country_name\": \"Fr",
        )
            .into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
    }
}

/// Spawn the mock upstream and return its base URL
async fn spawn_mock_upstream() -> String {
    let app = Router::new().route("/{ip}", get(mock_ipstack));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn create_client(base_url: &str, api_key: &str) -> IpStackClient {
    IpStackClient::from_config(&IpStackConfig {
        api_key: api_key.to_string(),
        base_url: base_url.to_string(),
    })
    .unwrap()
}

#[tokio::test]
async fn test_lookup_success() {
    let base_url = spawn_mock_upstream().await;
    let client = create_client(&base_url, TEST_ACCESS_KEY);

    let location = client.lookup("8.8.8.8").await.unwrap();

    assert_eq!(
        location,
        LocationInfo {
            country_name: "United States".to_string(),
            region_name: "California".to_string(),
            city: "Mountain View".to_string(),
        }
    );
}

#[tokio::test]
async fn test_lookup_null_fields() {
    let base_url = spawn_mock_upstream().await;
    let client = create_client(&base_url, TEST_ACCESS_KEY);

    let location = client.lookup("10.0.0.1").await.unwrap();
    assert_eq!(location, LocationInfo::default());
}

#[tokio::test]
async fn test_lookup_non_200_status() {
    let base_url = spawn_mock_upstream().await;
    let client = create_client(&base_url, TEST_ACCESS_KEY);

    let err = client.lookup("203.0.113.1").await.unwrap_err();
    assert!(
        matches!(err, LookupError::Status(status) if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_lookup_malformed_json() {
    let base_url = spawn_mock_upstream().await;
    let client = create_client(&base_url, TEST_ACCESS_KEY);

    let err = client.lookup("192.0.2.1").await.unwrap_err();
    assert!(matches!(err, LookupError::Decode(_)), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_lookup_invalid_key_envelope() {
    let base_url = spawn_mock_upstream().await;
    let client = create_client(&base_url, "wrong-key");

    let err = client.lookup("8.8.8.8").await.unwrap_err();
    assert!(
        matches!(err, LookupError::Api { code: 101, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_lookup_connection_failure_hides_key() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = create_client(&format!("http://{}", addr), "very-secret-key");

    let err = client.lookup("8.8.8.8").await.unwrap_err();
    assert!(matches!(err, LookupError::Transport(_)), "unexpected error: {err:?}");
    assert!(!err.to_string().contains("very-secret-key"));
    assert!(!format!("{err:?}").contains("very-secret-key"));
}

fn create_app(base_url: &str) -> (Router, Arc<VisitTracker>) {
    let tracker = Arc::new(VisitTracker::new());
    let state = Arc::new(AppState {
        geo: Arc::new(create_client(base_url, TEST_ACCESS_KEY)),
        tracker: Arc::clone(&tracker),
        client_ip: ClientIpConfig::default(),
    });

    let app = create_router(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50000))));
    (app, tracker)
}

async fn get_root(app: &Router, client_ip: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri("/")
        .header("x-forwarded-for", client_ip)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_end_to_end_success_and_failure() {
    let base_url = spawn_mock_upstream().await;
    let (app, tracker) = create_app(&base_url);

    let (status, body) = get_root(&app, "8.8.8.8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "ip": "8.8.8.8",
            "country": "United States",
            "region": "California",
            "city": "Mountain View"
        })
    );

    for failing_ip in ["203.0.113.1", "192.0.2.1"] {
        let (status, body) = get_root(&app, failing_ip).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Internal Server Error"}));
    }

    let stats = tracker.stats().await;
    assert_eq!(stats.us_requests, 1);
    assert_eq!(stats.non_us_requests, 0);
    assert_eq!(tracker.visits().await.len(), 1);
}

#[tokio::test]
async fn test_end_to_end_concurrent_requests() {
    let base_url = spawn_mock_upstream().await;
    let (app, tracker) = create_app(&base_url);

    let mut handles = vec![];
    for i in 0..100 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let ip = if i % 2 == 0 { "8.8.8.8" } else { "1.1.1.1" };
            get_root(&app, ip).await.0
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let stats = tracker.stats().await;
    assert_eq!(stats.us_requests, 50);
    assert_eq!(stats.non_us_requests, 50);

    let visits = tracker.visits().await;
    assert_eq!(visits.len(), 100);
    assert_eq!(
        visits.iter().filter(|v| v.country == "United States").count() as u64,
        stats.us_requests
    );
}
