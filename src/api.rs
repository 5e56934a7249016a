//! LLM transport for the sentiment classifier, with retry and backoff.
//!
//! - [`AskAsync`]: send a prompt, get a reply
//! - [`AskFnWrapper`]: the `awful_aj` client behind that trait
//! - [`RetryAsk`]: decorator that retries any [`AskAsync`] per a [`RetryPolicy`]
//!
//! The LLM classifier holds a [`RetryAsk`] over [`AskFnWrapper`], built by
//! [`with_backoff`].

use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Async prompt → reply.
///
/// Implemented by the real client, by [`RetryAsk`] around it, and by stubs
/// in tests.
pub trait AskAsync {
    /// What a successful call returns; a `String` for chat completions.
    type Response;

    /// Send `text` and wait for the reply.
    ///
    /// # Arguments
    ///
    /// * `text` - The full prompt
    ///
    /// # Returns
    ///
    /// The model's reply, or the error that ended the request.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// How [`RetryAsk`] spaces out attempts.
///
/// ```text
/// delay(n) = min(base_delay * 2^(n-1), max_delay) + jitter(0..=max_jitter)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt before giving up.
    pub max_retries: usize,
    /// Delay before the first retry; doubles each time.
    pub base_delay: Duration,
    /// Ceiling on the doubled delay.
    pub max_delay: Duration,
    /// Upper bound of the random extra added to each delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), without jitter.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_secs(1));
    /// assert_eq!(policy.backoff(3), Duration::from_secs(4));
    /// assert_eq!(policy.backoff(10), Duration::from_secs(30));
    /// ```
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    fn jittered(&self, attempt: usize) -> Duration {
        let cap = self.max_jitter.as_millis() as u64;
        let jitter_ms = if cap == 0 { 0 } else { rng().random_range(0..=cap) };
        self.backoff(attempt) + Duration::from_millis(jitter_ms)
    }
}

/// Retries the wrapped [`AskAsync`] until it succeeds or the policy runs out.
pub struct RetryAsk<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner` so failed calls are retried per `policy`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config, template };
    /// let api = RetryAsk::new(client, RetryPolicy::default());
    /// ```
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.policy.max_retries {
                        error!(
                            attempt,
                            max = self.policy.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "Classifier request exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.jittered(attempt);
                    warn!(
                        attempt,
                        max = self.policy.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                        ?delay,
                        error = %e,
                        "Classifier request failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// `awful_aj::api::ask` behind [`AskAsync`].
///
/// Owns the loaded config and template so a classifier can hold it for the
/// life of the process.
#[derive(Debug)]
pub struct AskFnWrapper {
    /// Endpoint, model and sampling settings.
    pub config: AwfulJadeConfig,
    /// System prompt and conversation scaffold.
    pub template: ChatTemplate,
}

impl AskAsync for AskFnWrapper {
    type Response = String;

    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        match &res {
            Ok(reply) => debug!(
                elapsed_ms = t0.elapsed().as_millis(),
                reply_bytes = reply.len(),
                "API call succeeded"
            ),
            Err(e) => warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API call failed"),
        }
        res
    }
}

/// Wrap the `awful_aj` client in the default [`RetryPolicy`].
///
/// # Arguments
///
/// * `config` - Loaded model configuration
/// * `template` - Chat template the prompt is sent through
///
/// # Returns
///
/// A client that retries failed calls up to five times with backoff.
///
/// # Example
///
/// ```ignore
/// let api = with_backoff(config, template);
/// let reply = api.ask("Classify these headlines ...").await?;
/// ```
pub fn with_backoff(config: AwfulJadeConfig, template: ChatTemplate) -> RetryAsk<AskFnWrapper> {
    RetryAsk::new(AskFnWrapper { config, template }, RetryPolicy::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails the first `failures` calls, then echoes the prompt.
    struct FlakyAsk {
        failures: usize,
        calls: Cell<usize>,
    }

    impl AskAsync for FlakyAsk {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.failures {
                Err(format!("transient failure {n}").into())
            } else {
                Ok(text.to_uppercase())
            }
        }
    }

    fn quick_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = quick_policy(5);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(400));
        assert_eq!(policy.backoff(60), Duration::from_millis(400));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(6), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let api = RetryAsk::new(
            FlakyAsk { failures: 2, calls: Cell::new(0) },
            quick_policy(3),
        );
        let reply = api.ask("positive").await.unwrap();
        assert_eq!(reply, "POSITIVE");
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_retries() {
        let api = RetryAsk::new(
            FlakyAsk { failures: 10, calls: Cell::new(0) },
            quick_policy(2),
        );
        let err = api.ask("anything").await.unwrap_err();
        assert!(err.to_string().contains("transient failure 3"));
        assert_eq!(api.inner.calls.get(), 3);
    }
}
