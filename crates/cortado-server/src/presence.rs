//! The presence/status reporter.
//!
//! A background task that periodically summarizes how many requests are open
//! and publishes a presence line the gateway (and the ops endpoint) can
//! display. Purely a consumer of the request registry; errors are logged and
//! never fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use cortado_core::RequestRegistry;
use cortado_store::ListScope;

/// Render the presence line for an open-request count.
pub fn status_line(open: u64) -> String {
    match open {
        0 => "No open chat requests".to_string(),
        1 => "1 chat request open".to_string(),
        n => format!("{n} chat requests open"),
    }
}

/// Spawn the periodic reporter. The returned receiver always holds the most
/// recently published line.
pub fn spawn_reporter(
    registry: Arc<RequestRegistry>,
    interval_secs: u64,
) -> watch::Receiver<String> {
    let (tx, rx) = watch::channel(status_line(0));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match registry.open_request_count(ListScope::Global).await {
                Ok(open) => {
                    let line = status_line(open);
                    info!(open, line = %line, "presence updated");
                    if tx.send(line).is_err() {
                        // Every receiver is gone; stop reporting.
                        return;
                    }
                }
                Err(e) => {
                    error!(error = %e, "could not count open requests");
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortado_core::{shared_db, Visibility};
    use cortado_shared::{GroupId, UserId};
    use cortado_store::Database;

    #[test]
    fn status_line_counts() {
        assert_eq!(status_line(0), "No open chat requests");
        assert_eq!(status_line(1), "1 chat request open");
        assert_eq!(status_line(12), "12 chat requests open");
    }

    #[tokio::test]
    async fn reporter_publishes_the_current_count() {
        let db = shared_db(Database::open_in_memory().unwrap());
        {
            let guard = db.lock().await;
            guard.upsert_user(UserId(1), "ada").unwrap();
        }
        let registry = Arc::new(RequestRegistry::new(db));
        registry
            .create_request(
                UserId(1),
                Some(GroupId(7)),
                "Rust vs Go",
                None,
                Visibility::Global,
            )
            .await
            .unwrap();

        let mut rx = spawn_reporter(registry, 1);

        // The first tick fires immediately.
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("reporter did not publish in time")
            .unwrap();
        assert_eq!(*rx.borrow(), "1 chat request open");
    }
}
