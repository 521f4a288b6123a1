//! Background maintenance: SMTP daily counters reset at each UTC midnight.

use chrono::{DateTime, Days, Utc};
use leadforge_db::{smtp_credentials, Database};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Time from `now` until the next UTC midnight. Never zero.
#[must_use]
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc());
    match next {
        Some(next) => (next - now)
            .to_std()
            .unwrap_or(Duration::from_secs(1))
            .max(Duration::from_secs(1)),
        None => Duration::from_secs(24 * 60 * 60),
    }
}

/// Spawn the midnight reset loop.
pub fn spawn_daily_reset(db: Arc<Database>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_utc_midnight(Utc::now());
            tracing::debug!(target: "campaign", "Next daily limit reset in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;
            if let Err(e) = smtp_credentials::reset_daily_limits(db.pool()).await {
                tracing::error!(target: "campaign", "Daily limit reset failed: {}", e);
            }
        }
    })
}
