use super::{build_link, resolve_user, spinner};
use crate::{config::Config, error, info, success, warning};

pub async fn status(config: Config, user: Option<String>) {
    let user_id = resolve_user(&config, user);
    let link = build_link(config).await;

    let pb = spinner("Checking Spotify link...");
    let token = link.tokens.get_valid_access_token(&user_id).await;
    pb.finish_and_clear();

    match token {
        Ok(Some(_)) => {
            success!("User {} is connected to Spotify.", user_id);
            if let Ok(Some(record)) = link.tokens.store().get(&user_id).await {
                info!(
                    "Access token valid until {}",
                    record.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                if let Some(scope) = record.scope {
                    info!("Granted scope: {}", scope);
                }
            }
        }
        Ok(None) => warning!(
            "User {} is not connected. Run notevibes connect --user {}",
            user_id,
            user_id
        ),
        Err(e) => error!("Failed to check Spotify link: {}", e),
    }
}

pub async fn disconnect(config: Config, user: Option<String>) {
    let user_id = resolve_user(&config, user);
    let link = build_link(config).await;

    match link.tokens.disconnect(&user_id).await {
        Ok(true) => success!("Disconnected user {} from Spotify.", user_id),
        Ok(false) => info!("User {} was not connected.", user_id),
        Err(e) => error!("Failed to disconnect: {}", e),
    }
}
