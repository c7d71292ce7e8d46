use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use backoff::{future::retry, ExponentialBackoff};
use log::warn;

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 5000;

/// run a fallible async operation, retrying with exponential backoff up to
/// `max_retries` extra attempts before the last error becomes permanent
pub async fn retry_wrapper<I, E, F, Fut>(max_retries: usize, f: F) -> Result<I, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<I, E>>,
{
    let attempts = AtomicUsize::new(0);
    retry(backoff_config(), || async {
        let attempt = attempts.fetch_add(1, Ordering::AcqRel) + 1;
        if attempt > 1 {
            warn!("retry attempt [{}]", attempt);
        }
        f().await
            .map_err(|err| classify_backoff_err(err, attempt, max_retries))
    })
        .await
}

fn classify_backoff_err<E>(err: E, attempt: usize, max_retries: usize) -> backoff::Error<E> {
    if attempt > max_retries {
        backoff::Error::permanent(err)
    } else {
        backoff::Error::transient(err)
    }
}

#[inline]
fn backoff_config() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(INITIAL_BACKOFF_MS),
        max_interval: Duration::from_millis(MAX_BACKOFF_MS),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, &str> = retry_wrapper(3, || async {
            calls.fetch_add(1, Ordering::AcqRel);
            Ok(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, &str> = retry_wrapper(1, || async {
            calls.fetch_add(1, Ordering::AcqRel);
            Err("still down")
        })
        .await;
        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::Acquire), 2);
    }
}
