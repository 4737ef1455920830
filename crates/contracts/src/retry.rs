//! Exponential backoff for idempotent chain reads.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::warn;

use river_common::{Error, Result};
use river_core::RegistryReaderConfig;

/// Backoff schedule. Delays grow by `multiplier` up to `max_interval`,
/// each randomized by +/- `randomization` of its value.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub randomization: f64,
    pub max_interval: Duration,
    /// Give up once this much time has passed since the first attempt,
    /// zero means no elapsed-time bound
    pub max_elapsed: Duration,
    /// Give up after this many retries, 0 means unbounded
    pub max_retries: u32,
    /// Timeout applied to each attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            multiplier: 1.5,
            randomization: 0.2,
            max_interval: Duration::from_secs(5),
            max_elapsed: Duration::from_secs(300),
            max_retries: 0,
            attempt_timeout: None,
        }
    }
}

impl From<&RegistryReaderConfig> for Backoff {
    fn from(config: &RegistryReaderConfig) -> Self {
        Self {
            max_elapsed: config.max_retry_elapsed(),
            max_retries: config.max_retries,
            attempt_timeout: config.single_call_timeout(),
            ..Default::default()
        }
    }
}

impl Backoff {
    /// Un-randomized delay before retry number `retry` (1-based)
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_interval.as_millis() as f64 * factor;
        let capped = millis.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.randomization <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = base.as_millis() as f64 * self.randomization;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((base.as_millis() as f64 + offset).max(0.0) as u64)
    }

    /// Run `op` until it succeeds or the schedule is exhausted, returning the
    /// last error in that case.
    pub async fn retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut retries = 0u32;

        loop {
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::generic(format!("{} timed out after {:?}", what, limit))),
                },
                None => op().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            retries += 1;
            if self.max_retries > 0 && retries > self.max_retries {
                return Err(err);
            }
            let delay = self.jittered(self.base_delay(retries));
            if !self.max_elapsed.is_zero() && started.elapsed() + delay > self.max_elapsed {
                return Err(err);
            }

            warn!(operation = what, retry = retries, delay_ms = delay.as_millis() as u64, error = %err, "Retrying after error");
            tokio::time::sleep(delay).await;
        }
    }
}
