use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::ip_extractor::extract_client_ip;
use crate::config::ClientIpConfig;
use crate::geo::{GeoLookup, LookupError};
use crate::tracker::{VisitRecord, VisitStats, VisitTracker};

pub struct AppState {
    pub geo: Arc<dyn GeoLookup>,
    pub tracker: Arc<VisitTracker>,
    pub client_ip: ClientIpConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to get location info for {client_ip}: {source}")]
    Lookup {
        client_ip: String,
        #[source]
        source: LookupError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Lookup { client_ip, source } => {
                error!(client_ip = %client_ip, error = %source, "Failed to get location info");
            }
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "Internal Server Error".to_string(),
            }),
        )
            .into_response()
    }
}

/// Resolve the caller's location and record the visit
pub async fn locate_visitor(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<LocationResponse>, ApiError> {
    let client_ip = extract_client_ip(&headers, addr.ip(), &state.client_ip).to_string();

    let location = match state.geo.lookup(&client_ip).await {
        Ok(location) => location,
        Err(source) => return Err(ApiError::Lookup { client_ip, source }),
    };

    let bucket = state.tracker.record(&client_ip, &location).await;
    debug!(client_ip = %client_ip, country = %location.country_name, ?bucket, "recorded visit");

    Ok(Json(LocationResponse {
        ip: client_ip,
        country: location.country_name,
        region: location.region_name,
        city: location.city,
    }))
}

/// List every recorded visit
pub async fn list_visits(State(state): State<Arc<AppState>>) -> Json<Vec<VisitRecord>> {
    Json(state.tracker.visits().await)
}

/// US / non-US request counters
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<VisitStats> {
    Json(state.tracker.stats().await)
}
