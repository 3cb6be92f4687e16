//! Resilient policy client wrapper
//!
//! Wraps any `PolicyPort` with a per-call timeout, a bounded retry for
//! transient unavailability and a circuit breaker, so a dead backend costs one
//! fast `CircuitOpen` instead of a timeout per teleport.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use warpgate_domain::{ActorRef, Position};

use crate::infrastructure::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::infrastructure::ports::{PolicyError, PolicyPort, Ruleset};

/// Configuration for retry and timeout behavior
#[derive(Debug, Clone)]
pub struct PolicyRetryConfig {
    /// Retries after the initial attempt (only for `Unavailable`)
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further retry
    pub base_delay_ms: u64,
    /// Upper bound for a single backend call
    pub call_timeout_ms: u64,
}

impl Default for PolicyRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 50,
            call_timeout_ms: 1_000,
        }
    }
}

pub struct ResilientPolicyClient {
    inner: Arc<dyn PolicyPort>,
    config: PolicyRetryConfig,
    breaker: CircuitBreaker,
}

impl ResilientPolicyClient {
    pub fn new(
        inner: Arc<dyn PolicyPort>,
        config: PolicyRetryConfig,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            inner,
            config,
            breaker: CircuitBreaker::new(breaker),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.config.base_delay_ms.saturating_mul(factor))
    }

    async fn attempt(
        &self,
        actor: ActorRef,
        destination: Position,
        ruleset: Ruleset,
    ) -> Result<bool, PolicyError> {
        let call = self.inner.evaluate(actor, destination, ruleset);
        match tokio::time::timeout(Duration::from_millis(self.config.call_timeout_ms), call).await {
            Ok(result) => result,
            Err(_) => Err(PolicyError::Timeout {
                after_ms: self.config.call_timeout_ms,
            }),
        }
    }
}

#[async_trait]
impl PolicyPort for ResilientPolicyClient {
    async fn evaluate(
        &self,
        actor: ActorRef,
        destination: Position,
        ruleset: Ruleset,
    ) -> Result<bool, PolicyError> {
        // Dropping this future mid-call settles the permit as a failure.
        let permit = match self.breaker.acquire() {
            Ok(permit) => permit,
            Err(open) => {
                return Err(PolicyError::CircuitOpen {
                    retry_after_ms: u64::try_from(open.retry_after.as_millis())
                        .unwrap_or(u64::MAX),
                })
            }
        };

        let mut retry = 0;
        loop {
            match self.attempt(actor, destination, ruleset.clone()).await {
                Ok(allowed) => {
                    permit.succeeded();
                    if retry > 0 {
                        tracing::info!(actor = %actor, retry, "Policy evaluation succeeded after retry");
                    }
                    return Ok(allowed);
                }
                Err(PolicyError::Unavailable(msg)) if retry < self.config.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        actor = %actor,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "Policy backend unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    permit.failed();
                    tracing::error!(actor = %actor, error = %e, "Policy evaluation failed");
                    return Err(e);
                }
            }
        }
    }
}
