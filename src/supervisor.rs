use crate::error::{PipelineError, Result};
use crate::pipeline::{Pipeline, RunReport, RunSpec};
use log::{error, info, warn};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// `initial * 2^(attempt - 1)`, capped at `cap`.
pub fn backoff_delay(initial: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    initial.saturating_mul(factor).min(cap)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Restarts a run from the top until it succeeds, fails fatally or runs out
/// of attempts.
#[derive(Debug, Clone)]
pub struct Supervisor {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Supervisor {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: MAX_BACKOFF,
        }
    }

    /// Each attempt runs `worker` on its own task; the join handle carries
    /// its outcome back.
    pub async fn supervise<T, F, Fut>(&self, key: &str, mut worker: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let mut last_failure = String::new();
        for attempt in 1..=self.max_attempts {
            info!("[{}] attempt {}/{}", key, attempt, self.max_attempts);

            match tokio::spawn(worker()).await {
                Ok(Ok(value)) => {
                    info!("[{}] succeeded, no restart needed", key);
                    return Ok(value);
                }
                Ok(Err(e)) if e.is_fatal() => {
                    error!("[{}] fatal: {}", key, e);
                    return Err(e);
                }
                Ok(Err(e)) => last_failure = e.to_string(),
                Err(join) if join.is_panic() => {
                    last_failure = format!("worker panicked: {}", panic_message(&*join.into_panic()));
                }
                Err(_) => last_failure = "worker task was cancelled".to_string(),
            }

            if attempt < self.max_attempts {
                let delay = backoff_delay(self.initial_backoff, attempt, self.max_backoff);
                warn!(
                    "[{}] crashed: process terminated unexpectedly ({}). Restarting in {:?}...",
                    key, last_failure, delay
                );
                tokio::time::sleep(delay).await;
            } else {
                warn!("[{}] crashed on final attempt: {}", key, last_failure);
            }
        }
        Err(PipelineError::RunAttemptsExhausted {
            key: key.to_string(),
            attempts: self.max_attempts,
            last: last_failure,
        })
    }

    pub async fn run(&self, pipeline: Arc<Pipeline>, spec: RunSpec) -> Result<RunReport> {
        let key = spec.key.clone();
        let spec = Arc::new(spec);
        self.supervise(&key, move || {
            let pipeline = Arc::clone(&pipeline);
            let spec = Arc::clone(&spec);
            async move { pipeline.run(&spec).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> Supervisor {
        Supervisor::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let initial = Duration::from_secs(2);
        assert_eq!(backoff_delay(initial, 1, MAX_BACKOFF), Duration::from_secs(2));
        assert_eq!(backoff_delay(initial, 2, MAX_BACKOFF), Duration::from_secs(4));
        assert_eq!(backoff_delay(initial, 4, MAX_BACKOFF), Duration::from_secs(16));
        assert_eq!(backoff_delay(initial, 10, MAX_BACKOFF), MAX_BACKOFF);
        assert_eq!(backoff_delay(initial, 64, MAX_BACKOFF), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn restarts_after_retryable_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let value = quick(5)
            .supervise("1C8K", move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(PipelineError::stage("download", "1C8K", anyhow::anyhow!("reset")))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panic_counts_as_crash() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let value = quick(3)
            .supervise("1C8K", move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("worker blew up");
                    }
                    Ok("done")
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let err = quick(5)
            .supervise("1C8K", move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PipelineError::Template("missing __fill seq info__".into()))
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Template(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let err = quick(3)
            .supervise("1C8K", || async {
                Err::<(), _>(PipelineError::stage("docking", "1C8K", anyhow::anyhow!("vina exited 1")))
            })
            .await
            .unwrap_err();
        match err {
            PipelineError::RunAttemptsExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("vina exited 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
