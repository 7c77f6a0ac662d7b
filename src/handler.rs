use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection},
};

use crate::api::{CreateRequest, InfoResponse, LastUpdatedResponse, UpdateRequest, VersionResponse};
use crate::bookmarks::Bookmarks;
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::model::CreatedSet;
use crate::store::KvStore;

#[derive(Clone)]
pub struct AppState {
    pub bookmarks: Bookmarks,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, config: Config) -> Self {
        AppState {
            bookmarks: Bookmarks::new(store),
            config: Arc::new(config),
        }
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or(SyncError::MissingInput(field))
}

pub async fn service_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse::from_app(&state.config.app))
}

pub async fn create_bookmarks(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<CreatedSet>> {
    if !state.config.app.create_enabled {
        return Err(SyncError::CreationDisabled);
    }

    let req: CreateRequest = parse_body(&body?)?;
    let version = req.version_string().ok_or(SyncError::MissingInput("version"))?;

    let created = state.bookmarks.create(&version).await?;
    Ok(Json(created))
}

/// Non-empty segments after `/bookmarks/`, so `abc/` and `abc//version` still resolve.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub async fn update_bookmarks(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<LastUpdatedResponse>> {
    let id = match segments(&path)[..] {
        [id] => id.to_string(),
        _ => return Err(SyncError::RouteNotFound),
    };

    let req: UpdateRequest = parse_body(&body?)?;
    let bookmarks = required(req.bookmarks, "bookmarks")?;
    let last_updated = required(req.last_updated, "lastUpdated")?;

    let last_updated = state.bookmarks.update(&id, &bookmarks, &last_updated).await?;
    Ok(Json(LastUpdatedResponse { last_updated }))
}

/// `GET /bookmarks/{id}[/{field}]`; unknown fields fall back to the full set.
pub async fn get_bookmarks(State(state): State<AppState>, Path(path): Path<String>) -> Result<Json<serde_json::Value>> {
    let parts = segments(&path);
    let (id, field) = match parts[..] {
        [] => return Err(SyncError::RouteNotFound),
        [id] => (id, ""),
        [id, field, ..] => (id, field),
    };

    let value = match field {
        "lastUpdated" => serde_json::to_value(LastUpdatedResponse {
            last_updated: state.bookmarks.last_updated(id).await?,
        })?,
        "version" => serde_json::to_value(VersionResponse {
            version: state.bookmarks.version(id).await?,
        })?,
        _ => serde_json::to_value(state.bookmarks.get(id).await?)?,
    };

    Ok(Json(value))
}

pub async fn not_found() -> SyncError {
    SyncError::RouteNotFound
}
