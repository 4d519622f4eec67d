use crate::core::correlation::CorrelationId;
use crate::utils::error::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::future::Future;

/// One batch item's outcome, positioned by its input index.
#[derive(Debug)]
pub struct ItemOutcome<T> {
    pub index: usize,
    pub correlation_id: CorrelationId,
    pub result: Result<T>,
}

impl<T> ItemOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error_message(&self) -> Option<String> {
        self.result.as_ref().err().map(|e| e.client_message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_outcomes<T>(outcomes: &[ItemOutcome<T>]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

/// 對每個輸入並行呼叫 `op`，依輸入順序回傳結果。
///
/// Each item is tagged with its own correlation id. `concurrency` caps the
/// number of in-flight calls; `None` runs the whole batch at once. A failing
/// item never aborts the others.
pub async fn fan_out<I, T, F, Fut>(
    inputs: Vec<I>,
    concurrency: Option<usize>,
    op: F,
) -> Vec<ItemOutcome<T>>
where
    F: Fn(I, CorrelationId) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = inputs.len();
    if total == 0 {
        return Vec::new();
    }
    let limit = concurrency.unwrap_or(total).clamp(1, total);
    tracing::debug!("🔀 Fanning out {} calls (concurrency {})", total, limit);

    stream::iter(inputs.into_iter().enumerate())
        .map(|(index, input)| {
            let correlation_id = CorrelationId::generate();
            let call = op(input, correlation_id.clone());
            async move {
                let result = call.await;
                if let Err(e) = &result {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        "⚠️ Batch item {} failed: {}",
                        index,
                        e
                    );
                }
                ItemOutcome {
                    index,
                    correlation_id,
                    result,
                }
            }
        })
        .buffered(limit)
        .collect()
        .await
}
