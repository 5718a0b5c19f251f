//! # API Module
//!
//! HTTP endpoints of the Spotify link. Every route acts for the
//! [`SessionUser`](session::SessionUser) resolved from the request; the notes
//! app is trusted to have authenticated that user.
//!
//! ## Endpoints
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | /auth/begin | [`auth::begin`] |
//! | GET | /auth/callback | [`auth::callback`] |
//! | GET | /status | [`player::status`] |
//! | POST | /disconnect | [`player::disconnect`] |
//! | GET | /player | [`player::player`] |
//! | POST | /play, /pause, /next, /previous | playback controls |
//! | GET | /playlists | [`player::playlists`] |
//! | GET | /me | [`player::profile`] |
//! | GET | /history | [`player::history`] |
//!
//! The router is nested under [`crate::config::ROUTE_PREFIX`] by
//! [`crate::server::app`]; `/health` lives at the root.

pub mod auth;
pub mod error;
mod health;
pub mod player;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::server::AppState;

pub use health::health;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/begin", get(auth::begin))
        .route("/auth/callback", get(auth::callback))
        .route("/status", get(player::status))
        .route("/disconnect", post(player::disconnect))
        .route("/player", get(player::player))
        .route("/play", post(player::play))
        .route("/pause", post(player::pause))
        .route("/next", post(player::next))
        .route("/previous", post(player::previous))
        .route("/playlists", get(player::playlists))
        .route("/me", get(player::profile))
        .route("/history", get(player::history))
}
