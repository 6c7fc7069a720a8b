use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

const MAX_ATTEMPTS: usize = 5;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);
const GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Written,
    /// Object never showed up within the grace period; treated as deleted.
    Dropped,
    /// Ran out of attempts without success or a clean not-found.
    Failed,
}

/// Runs `apply` with a fixed back-off, applying the "drop after 5s if the
/// object is still missing" grace period from the first attempt rather than
/// from each individual call. `apply` returns `Ok(true)` on a successful
/// write, `Ok(false)` when the target object was not found, and `Err` for
/// anything else (conflict, timeout, ...), which is retried.
pub async fn apply_with_retry<F, Fut, E>(first_attempt_at: Instant, apply: F) -> ApplyOutcome
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    for attempt in 0..MAX_ATTEMPTS {
        match apply().await {
            Ok(true) => return ApplyOutcome::Written,
            Ok(false) => {
                if first_attempt_at.elapsed() >= GRACE_PERIOD {
                    return ApplyOutcome::Dropped;
                }
            }
            Err(error) => {
                tracing::warn!(%error, attempt, "status write failed, retrying");
            }
        }
        if attempt + 1 < MAX_ATTEMPTS {
            sleep(RETRY_BACKOFF).await;
        }
    }
    ApplyOutcome::Failed
}

/// Fetches the live object, builds the patch from it, and applies a merge
/// patch to its status subresource. Returns `Ok(false)` on a 404 so the
/// caller can apply the grace period instead of treating it as a retryable
/// error.
pub async fn get_and_patch_status<K>(
    api: &kube::Api<K>,
    name: &str,
    controller_name: &str,
    build_patch: impl Fn(&K) -> serde_json::Value,
) -> Result<bool, kube::Error>
where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let live = match api.get(name).await {
        Ok(obj) => obj,
        Err(kube::Error::Api(err)) if err.code == 404 => return Ok(false),
        Err(err) => return Err(err),
    };
    let patch = build_patch(&live);
    let params = kube::api::PatchParams::apply(controller_name);
    api.patch_status(name, &params, &kube::api::Patch::Merge(patch)).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let outcome = apply_with_retry(Instant::now(), || async { Ok::<bool, &str>(true) }).await;
        assert_eq!(outcome, ApplyOutcome::Written);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let outcome = apply_with_retry(Instant::now(), move || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient error")
                } else {
                    Ok(true)
                }
            }
        })
        .await;
        assert_eq!(outcome, ApplyOutcome::Written);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_past_grace_period_drops() {
        let started = Instant::now() - Duration::from_secs(6);
        let outcome = apply_with_retry(started, || async { Ok::<bool, &str>(false) }).await;
        assert_eq!(outcome, ApplyOutcome::Dropped);
    }
}
