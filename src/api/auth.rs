use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    Error,
    api::{
        error::{ApiError, ApiResult},
        session::SessionUser,
    },
    server::AppState,
    spotify::authorize::CallbackParams,
};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl From<CallbackQuery> for CallbackParams {
    fn from(query: CallbackQuery) -> Self {
        Self {
            code: query.code,
            state: query.state,
            error: query.error,
        }
    }
}

/// Sends the user agent to the Spotify consent screen.
pub async fn begin(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
) -> ApiResult<Redirect> {
    let url = state.link.authorization.begin(&user_id)?;
    Ok(Redirect::to(&url))
}

/// Completes the handshake and returns the user to the notes app.
///
/// A state mismatch is answered with `400` and nothing else happens; any
/// other failure lands on the app's error fragment.
pub async fn callback(
    State(state): State<AppState>,
    SessionUser(user_id): SessionUser,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let app_url = &state.link.config.app_url;

    match state.link.authorization.complete(&user_id, query.into()).await {
        Ok(_) => Redirect::to(&format!("{}/#spotify-connected", app_url)).into_response(),
        Err(Error::StateMismatch) => ApiError::from(Error::StateMismatch).into_response(),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "spotify callback failed");
            Redirect::to(&format!("{}/#spotify-error", app_url)).into_response()
        }
    }
}
