use crate::resources::{union_configs_updated, ConfigsUpdated};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Coalesces a burst of `ConfigsUpdated` notifications into one flush per
/// quiet window: fires after `debounce_after` of silence, or after
/// `debounce_max` since the first unflushed event, whichever comes first.
pub fn spawn_debouncer(
    mut raw_rx: mpsc::UnboundedReceiver<ConfigsUpdated>,
    debounce_after: Duration,
    debounce_max: Duration,
) -> mpsc::UnboundedReceiver<ConfigsUpdated> {
    let (flush_tx, flush_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut pending: Option<ConfigsUpdated> = None;
        let mut first_event_at = Instant::now();

        loop {
            let wait = match &pending {
                None => None,
                Some(_) => {
                    let since_first = first_event_at.elapsed();
                    let quiet_deadline = debounce_after;
                    let max_deadline = debounce_max.saturating_sub(since_first);
                    Some(quiet_deadline.min(max_deadline))
                }
            };

            let event = match wait {
                None => raw_rx.recv().await,
                Some(timeout) => match tokio::time::timeout(timeout, raw_rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        // Quiet window (or max window) elapsed: flush.
                        if let Some(merged) = pending.take() {
                            if flush_tx.send(merged).is_err() {
                                return;
                            }
                        }
                        continue;
                    }
                },
            };

            match event {
                Some(update) => {
                    match &mut pending {
                        Some(merged) => union_configs_updated(merged, update),
                        None => {
                            pending = Some(update);
                            first_event_at = Instant::now();
                        }
                    }
                }
                None => {
                    if let Some(merged) = pending.take() {
                        let _ = flush_tx.send(merged);
                    }
                    return;
                }
            }
        }
    });

    flush_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;
    use std::time::Duration;

    fn updated(type_url: &str, names: &[&str]) -> ConfigsUpdated {
        let mut map = ConfigsUpdated::default();
        map.insert(type_url.to_string(), names.iter().map(|s| s.to_string()).collect::<AHashSet<_>>());
        map
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn quiet_window_merges_bursts_into_one_flush() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut flush_rx = spawn_debouncer(raw_rx, Duration::from_millis(20), Duration::from_millis(200));

        raw_tx.send(updated("type.a", &["r1"])).unwrap();
        raw_tx.send(updated("type.a", &["r2"])).unwrap();

        let merged = tokio::time::timeout(Duration::from_secs(1), flush_rx.recv()).await.unwrap().unwrap();
        let names = &merged["type.a"];
        assert!(names.contains("r1"));
        assert!(names.contains("r2"));
    }
}
