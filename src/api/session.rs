use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{api::error::ApiError, server::AppState};

/// The notes-app user a request acts for.
///
/// The notes app authenticates the session and forwards the user id in the
/// configured header. Single-user deployments can set a local user instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser(pub String);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let config = &state.link.config;
        let from_header = parts
            .headers
            .get(config.user_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        from_header
            .or_else(|| config.local_user.clone())
            .map(SessionUser)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}
