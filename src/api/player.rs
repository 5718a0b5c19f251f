//! Link status and playback handlers.
//!
//! Every handler resolves the [`SessionUser`] first; a missing session is
//! answered with `401` before any credential is looked at. Provider and link
//! failures are mapped by [`ApiError`](crate::api::error::ApiError).

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        session::SessionUser,
    },
    server::AppState,
    types::{
        DeviceRequest, PlayEvent, PlayRequest, PlayerState, PlaylistPage, Profile,
        StatusResponse,
    },
};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

/// Request bodies are optional; an empty body means "all defaults".
fn parse_body<T>(body: &Bytes) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {}", e)))
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Whether the user has a usable credential. Refreshes an expired token,
/// so a revoked refresh token shows up here as `connected: false`.
pub async fn status(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Json<StatusResponse>> {
    let token = state.link.tokens.get_valid_access_token(&user_id).await?;
    Ok(Json(StatusResponse {
        connected: token.is_some(),
    }))
}

/// `POST /disconnect`: deletes the user's credential.
///
/// # Returns
///
/// `{"message": "Disconnected from Spotify"}`, also when nothing was stored.
pub async fn disconnect(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Json<Value>> {
    state.link.tokens.disconnect(&user_id).await?;
    tracing::info!(user_id = %user_id, "spotify account disconnected");
    Ok(Json(json!({ "message": "Disconnected from Spotify" })))
}

/// `GET /player`: normalized playback state.
///
/// No active device yields `{"isPlaying": false}`. A playing track is
/// recorded in the history.
pub async fn player(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Json<PlayerState>> {
    Ok(Json(state.link.player.player_state(&user_id).await?))
}

/// `POST /play` with an optional `{"uri": ..., "deviceId": ...}` body.
///
/// # Returns
///
/// `{"success": true}` once the provider accepted the command.
///
/// # Errors
///
/// `400` for a body that is not valid JSON, otherwise as mapped from the
/// playback proxy (`401` not connected or session expired, `502` provider
/// errors).
pub async fn play(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: PlayRequest = parse_body(&body)?;
    state
        .link
        .player
        .play(&user_id, request.uri, request.device_id)
        .await?;
    Ok(success())
}

/// `POST /pause` with an optional `{"deviceId": ...}` body.
pub async fn pause(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: DeviceRequest = parse_body(&body)?;
    state.link.player.pause(&user_id, request.device_id).await?;
    Ok(success())
}

/// `POST /next` with an optional `{"deviceId": ...}` body.
pub async fn next(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: DeviceRequest = parse_body(&body)?;
    state.link.player.next(&user_id, request.device_id).await?;
    Ok(success())
}

/// `POST /previous` with an optional `{"deviceId": ...}` body.
pub async fn previous(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: DeviceRequest = parse_body(&body)?;
    state.link.player.previous(&user_id, request.device_id).await?;
    Ok(success())
}

/// `GET /playlists`: the first 50 playlists of the user.
pub async fn playlists(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Json<PlaylistPage>> {
    Ok(Json(state.link.player.playlists(&user_id).await?))
}

/// `GET /me`: the connected Spotify profile.
pub async fn profile(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.link.player.profile(&user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// `GET /history?limit=N`: newest-first play events.
///
/// `limit` defaults to 50 and is clamped to `1..=500`.
pub async fn history(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<PlayEvent>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.link.history.recent(&user_id, limit).await?))
}
