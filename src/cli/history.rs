use tabled::Table;

use super::{build_link, resolve_user};
use crate::{config::Config, error, info, types::HistoryTableRow};

pub async fn history(config: Config, user: Option<String>, limit: usize) {
    let user_id = resolve_user(&config, user);
    let link = build_link(config).await;

    let events = match link.history.recent(&user_id, limit).await {
        Ok(events) => events,
        Err(e) => error!("Failed to load playback history: {}", e),
    };

    if events.is_empty() {
        info!("No playback history for user {}.", user_id);
        return;
    }

    let rows: Vec<HistoryTableRow> = events.iter().map(HistoryTableRow::from).collect();
    println!("{}", Table::new(rows));
}
