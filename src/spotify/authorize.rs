use std::sync::Arc;

use reqwest::Url;

use crate::{
    Error, Result,
    config::Config,
    management::{PendingAuthorization, PendingAuthorizations},
    spotify::tokens::TokenRefresher,
    types::CredentialRecord,
    utils,
};

/// Parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Three-legged OAuth handshake.
///
/// `begin` issues a state token (and a PKCE verifier for public clients) for
/// the user's session and builds the consent URL. `complete` consumes that
/// entry: a callback whose state differs in any way is rejected before the
/// provider is contacted.
pub struct AuthorizationFlow {
    config: Arc<Config>,
    tokens: Arc<TokenRefresher>,
    pending: PendingAuthorizations,
}

impl AuthorizationFlow {
    pub fn new(config: Arc<Config>, tokens: Arc<TokenRefresher>) -> Self {
        let pending = PendingAuthorizations::new(config.auth_state_ttl);
        Self {
            config,
            tokens,
            pending,
        }
    }

    /// Starts a handshake for `user_id` and returns the consent screen URL.
    ///
    /// Any handshake still pending for the user is replaced.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The session user the callback must come back for
    ///
    /// # Returns
    ///
    /// The provider's authorize URL with `response_type`, `client_id`,
    /// `scope`, `redirect_uri` and `state` (plus `code_challenge` and
    /// `code_challenge_method=S256` when PKCE is used).
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the configured authorize URL does not parse.
    pub fn begin(&self, user_id: &str) -> Result<String> {
        let state = utils::generate_state_token();
        let code_verifier = self
            .config
            .uses_pkce()
            .then(utils::generate_code_verifier);

        let mut params: Vec<(&str, String)> = vec![
            ("response_type", "code".into()),
            ("client_id", self.config.client_id.clone()),
            ("scope", self.config.scope.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("state", state.clone()),
        ];
        if let Some(verifier) = &code_verifier {
            params.push(("code_challenge", utils::generate_code_challenge(verifier)));
            params.push(("code_challenge_method", "S256".into()));
        }

        let url = Url::parse_with_params(&self.config.auth_url, &params)
            .map_err(|e| Error::Config(format!("invalid SPOTIFY_API_AUTH_URL: {}", e)))?;

        self.pending
            .issue(user_id, PendingAuthorization::new(state, code_verifier));
        tracing::info!(user_id, pkce = self.config.uses_pkce(), "authorization started");

        Ok(url.into())
    }

    /// Finishes the handshake and stores the initial token pair.
    ///
    /// # Errors
    ///
    /// - [`Error::StateMismatch`] when no handshake is pending for the user,
    ///   it expired, or the returned state is not the issued one
    /// - [`Error::AuthorizationDenied`] when the provider reports an error
    /// - [`Error::ProviderExchange`] when the code is missing or the exchange
    ///   fails; nothing is persisted in that case
    pub async fn complete(&self, user_id: &str, params: CallbackParams) -> Result<CredentialRecord> {
        let pending = self.pending.take(user_id);
        let issued = pending.as_ref().map(|p| p.state.as_str());

        match (issued, params.state.as_deref()) {
            (Some(issued), Some(returned)) if issued == returned => {}
            _ => {
                tracing::warn!(user_id, "authorization callback rejected: state mismatch");
                return Err(Error::StateMismatch);
            }
        }

        if let Some(reason) = params.error {
            tracing::info!(user_id, reason = %reason, "authorization denied");
            return Err(Error::AuthorizationDenied(reason));
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            return Err(Error::ProviderExchange {
                status: None,
                body: "callback did not include an authorization code".into(),
            });
        };

        let verifier = pending.as_ref().and_then(|p| p.code_verifier.as_deref());
        let exchanged = self
            .tokens
            .exchange_authorization_code(&code, &self.config.redirect_uri, verifier)
            .await?;

        let record = self.tokens.store_authorized(user_id, &exchanged).await?;
        tracing::info!(user_id, expires_at = %record.expires_at, "spotify account connected");

        Ok(record)
    }

    /// Handshakes currently waiting for their callback.
    pub fn pending(&self) -> &PendingAuthorizations {
        &self.pending
    }
}
