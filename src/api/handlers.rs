//! Request handlers

use super::error::ApiResult;
use super::types::{HealthResponse, VersionResponse};
use super::AppState;
use crate::engine::Identity;
use crate::error::Error;
use crate::model::FactRow;
use crate::query::{AggregationResult, MembersResult, QueryContext, API_VERSION};
use crate::request::RequestParams;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, RawQuery, State},
    http::request::Parts,
    Json,
};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;

/// Identity taken from the configured request header
///
/// A missing, blank or non-UTF-8 header yields the anonymous identity.
#[derive(Debug, Clone)]
pub struct RequestIdentity(pub Identity);

impl FromRequestParts<Arc<AppState>> for RequestIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = state.config().server.identity_header.as_str();
        let identity = parts
            .headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(Identity::named)
            .unwrap_or_else(Identity::anonymous);
        Ok(RequestIdentity(identity))
    }
}

async fn context(state: &AppState, identity: Identity) -> ApiResult<QueryContext> {
    let workspace = state.workspace().await?;
    Ok(QueryContext::new(workspace, identity))
}

// ============================================================================
// Server
// ============================================================================

/// Health check
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        server_version: env!("CARGO_PKG_VERSION"),
        api_version: API_VERSION,
    })
}

pub async fn info(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
) -> ApiResult<Json<Map<String, Value>>> {
    let ctx = context(&state, identity).await?;
    Ok(Json(ctx.info()))
}

pub async fn list_cubes(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
) -> ApiResult<Json<Vec<Value>>> {
    let ctx = context(&state, identity).await?;
    Ok(Json(ctx.list_cubes().await?))
}

// ============================================================================
// Cube queries
// ============================================================================

pub async fn cube_model(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path(cube): Path<String>,
) -> ApiResult<Json<Value>> {
    let ctx = context(&state, identity).await?;
    Ok(Json(ctx.model(&cube).await?))
}

pub async fn aggregate(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path(cube): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<AggregationResult>> {
    let ctx = context(&state, identity).await?;
    let params = RequestParams::from_query(query.as_deref());
    Ok(Json(ctx.aggregate(&cube, &params).await?))
}

pub async fn cell(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path(cube): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Value>> {
    let ctx = context(&state, identity).await?;
    let params = RequestParams::from_query(query.as_deref());
    Ok(Json(ctx.cell_details(&cube, &params).await?))
}

/// Report over GET or POST; the body is a JSON object with `queries`
pub async fn report(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path(cube): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> ApiResult<Json<Map<String, Value>>> {
    let ctx = context(&state, identity).await?;
    let params = RequestParams::from_query(query.as_deref());
    let body: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::validation(format!("Invalid report body: {}", e)))?
    };
    Ok(Json(ctx.report(&cube, &params, &body).await?))
}

pub async fn facts(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path(cube): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Vec<FactRow>>> {
    let ctx = context(&state, identity).await?;
    let params = RequestParams::from_query(query.as_deref());
    Ok(Json(ctx.facts(&cube, &params).await?))
}

pub async fn fact(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path((cube, id)): Path<(String, String)>,
) -> ApiResult<Json<FactRow>> {
    let ctx = context(&state, identity).await?;
    Ok(Json(ctx.fact(&cube, &id).await?))
}

pub async fn members(
    State(state): State<Arc<AppState>>,
    RequestIdentity(identity): RequestIdentity,
    Path((cube, dimension)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<MembersResult>> {
    let ctx = context(&state, identity).await?;
    let params = RequestParams::from_query(query.as_deref());
    Ok(Json(ctx.members(&cube, &dimension, &params).await?))
}
