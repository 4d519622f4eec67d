use crate::domain::model::PollStatus;
use crate::domain::ports::StatusSource;
use crate::utils::error::{DemoError, Result};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Sleep before the first check as well as between checks.
    pub wait_first: bool,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            wait_first: false,
        }
    }

    pub fn wait_first(mut self, wait_first: bool) -> Self {
        self.wait_first = wait_first;
        self
    }

    /// 文件分析：先等 1.5 秒再查詢，最多 15 次
    pub fn document() -> Self {
        Self::new(Duration::from_millis(1500), 15).wait_first(true)
    }

    /// 影片索引：每 10 秒查詢一次，最多 90 次
    pub fn video() -> Self {
        Self::new(Duration::from_secs(10), 90)
    }
}

/// Polls `source` until it reports a terminal state.
///
/// Returns the payload on success, fails immediately on a terminal failure
/// or a transport error, and fails with [`DemoError::PollTimeout`] once
/// `max_attempts` checks have all come back pending.
pub async fn poll_until_complete<S>(
    source: &S,
    policy: &PollPolicy,
    operation: &str,
) -> Result<S::Output>
where
    S: StatusSource + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        if policy.wait_first || attempt > 1 {
            tokio::time::sleep(policy.interval).await;
        }

        match source.check().await? {
            PollStatus::Succeeded(payload) => {
                tracing::info!("✅ {} completed after {} checks", operation, attempt);
                return Ok(payload);
            }
            PollStatus::Failed(message) => {
                tracing::error!("❌ {} failed: {}", operation, message);
                return Err(DemoError::OperationFailed {
                    operation: operation.to_string(),
                    message,
                });
            }
            PollStatus::Pending { state, progress } => match progress {
                Some(pct) => tracing::debug!(
                    "⏳ {} {} ({}%), check {}/{}",
                    operation,
                    state,
                    pct,
                    attempt,
                    policy.max_attempts
                ),
                None => tracing::debug!(
                    "⏳ {} {}, check {}/{}",
                    operation,
                    state,
                    attempt,
                    policy.max_attempts
                ),
            },
        }
    }

    tracing::warn!(
        "⏰ {} still pending after {} checks",
        operation,
        policy.max_attempts
    );
    Err(DemoError::PollTimeout {
        operation: operation.to_string(),
        attempts: policy.max_attempts,
    })
}
