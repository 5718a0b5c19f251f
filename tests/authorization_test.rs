mod common;

use std::{collections::HashMap, time::Duration};

use notevibes::{
    Error, config::Config, management::CredentialStore, spotify::authorize::CallbackParams,
    utils::generate_code_challenge,
};
use reqwest::Url;

use common::{USER, harness, harness_with, test_config};

fn query_of(url: &str) -> HashMap<String, String> {
    Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn callback(code: &str, state: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.to_string()),
        state: Some(state.to_string()),
        error: None,
    }
}

#[test]
fn test_begin_builds_consent_url() {
    let h = harness();

    let url = h.link.authorization.begin(USER).unwrap();
    let query = query_of(&url);

    assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], "client-id");
    assert_eq!(
        query["redirect_uri"],
        "http://127.0.0.1:5000/api/spotify/auth/callback"
    );
    assert!(query["scope"].contains("user-modify-playback-state"));
    assert!(query["state"].len() >= 22);
    assert!(!query.contains_key("code_challenge"));
    assert_eq!(h.link.authorization.pending().len(), 1);
}

#[test]
fn test_begin_issues_fresh_state_each_time() {
    let h = harness();

    let first = query_of(&h.link.authorization.begin(USER).unwrap());
    let second = query_of(&h.link.authorization.begin(USER).unwrap());

    assert_ne!(first["state"], second["state"]);
    assert_eq!(h.link.authorization.pending().len(), 1);
}

#[tokio::test]
async fn test_complete_exchanges_code_and_stores_credential() {
    let h = harness();
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();
    h.fake.push_token("access-1", Some("refresh-1"), 3600);

    let record = h
        .link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap();

    assert_eq!(record.user_id, USER);
    assert_eq!(record.access_token, "access-1");
    assert_eq!(record.refresh_token, "refresh-1");
    assert_eq!(h.credentials.get(USER).await.unwrap(), Some(record));

    let grants = h.fake.grants();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].code.as_deref(), Some("code-1"));
    assert_eq!(
        grants[0].redirect_uri.as_deref(),
        Some("http://127.0.0.1:5000/api/spotify/auth/callback")
    );
    assert!(grants[0].code_verifier.is_none());
}

#[tokio::test]
async fn test_state_mismatch_never_contacts_provider() {
    let h = harness();
    h.link.authorization.begin(USER).unwrap();

    let err = h
        .link
        .authorization
        .complete(USER, callback("code-1", "forged"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 0);
    assert!(h.credentials.get(USER).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_state_is_a_mismatch() {
    let h = harness();
    h.link.authorization.begin(USER).unwrap();

    let params = CallbackParams {
        code: Some("code-1".into()),
        ..Default::default()
    };
    let err = h.link.authorization.complete(USER, params).await.unwrap_err();

    assert!(matches!(err, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 0);
}

#[tokio::test]
async fn test_callback_without_pending_handshake_is_rejected() {
    let h = harness();

    let err = h
        .link
        .authorization
        .complete(USER, callback("code-1", "anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 0);
}

#[tokio::test]
async fn test_state_issued_to_another_user_is_rejected() {
    let h = harness();
    let state = query_of(&h.link.authorization.begin("someone-else").unwrap())["state"].clone();

    let err = h
        .link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 0);
}

#[tokio::test]
async fn test_state_is_single_use() {
    let h = harness();
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();
    h.fake.push_token("access-1", Some("refresh-1"), 3600);

    h.link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap();
    let replay = h
        .link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap_err();

    assert!(matches!(replay, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 1);
}

#[tokio::test]
async fn test_expired_state_is_rejected() {
    let config = Config {
        auth_state_ttl: Duration::ZERO,
        ..test_config()
    };
    let h = harness_with(config);
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();

    let err = h
        .link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StateMismatch));
    assert_eq!(h.fake.token_calls(), 0);
}

#[tokio::test]
async fn test_provider_error_is_reported_as_denied() {
    let h = harness();
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();

    let params = CallbackParams {
        code: None,
        state: Some(state),
        error: Some("access_denied".into()),
    };
    let err = h.link.authorization.complete(USER, params).await.unwrap_err();

    assert!(matches!(err, Error::AuthorizationDenied(reason) if reason == "access_denied"));
    assert_eq!(h.fake.token_calls(), 0);
}

#[tokio::test]
async fn test_failed_exchange_leaves_existing_credential_untouched() {
    let h = harness();
    h.connect_valid().await;
    let before = h.credentials.get(USER).await.unwrap();
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();
    h.fake.push_token_error(400, r#"{"error":"invalid_grant"}"#);

    let err = h
        .link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProviderExchange { status: Some(400), .. }));
    assert_eq!(h.credentials.get(USER).await.unwrap(), before);
}

#[tokio::test]
async fn test_reconnect_overwrites_credential() {
    let h = harness();
    h.connect_valid().await;
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();
    h.fake.push_token("access-9", Some("refresh-9"), 3600);

    h.link
        .authorization
        .complete(USER, callback("code-1", &state))
        .await
        .unwrap();

    let record = h.credentials.get(USER).await.unwrap().unwrap();
    assert_eq!(record.access_token, "access-9");
    assert_eq!(record.refresh_token, "refresh-9");
}

#[tokio::test]
async fn test_public_client_uses_pkce() {
    let h = harness_with(Config::new("client-id", None));

    let query = query_of(&h.link.authorization.begin(USER).unwrap());
    assert_eq!(query["code_challenge_method"], "S256");
    let challenge = query["code_challenge"].clone();

    h.fake.push_token("access-1", Some("refresh-1"), 3600);
    h.link
        .authorization
        .complete(USER, callback("code-1", &query["state"]))
        .await
        .unwrap();

    let verifier = h.fake.grants()[0].code_verifier.clone().unwrap();
    assert_eq!(generate_code_challenge(&verifier), challenge);
}

#[tokio::test]
async fn test_reconnect_during_failing_refresh_keeps_new_credential() {
    let h = harness();
    h.connect_expired().await;
    let state = query_of(&h.link.authorization.begin(USER).unwrap())["state"].clone();
    let gate = h.fake.gate_next_refresh();
    h.fake.push_token_error(400, r#"{"error":"invalid_grant"}"#);
    h.fake
        .push_token("access-new", Some("refresh-new"), 3600);

    let reconnect = async {
        h.fake.refresh_parked().await;
        let (record, ()) = tokio::join!(
            h.link
                .authorization
                .complete(USER, callback("code-2", &state)),
            async {
                tokio::task::yield_now().await;
                gate.notify_one();
            },
        );
        record
    };
    let (token, record) = tokio::join!(h.link.tokens.get_valid_access_token(USER), reconnect);

    assert!(token.unwrap().is_none());
    assert_eq!(record.unwrap().access_token, "access-new");
    let stored = h.credentials.get(USER).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-new");
    assert_eq!(stored.refresh_token, "refresh-new");
}
