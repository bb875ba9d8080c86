use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use shared::llm::{LlmReliabilityConfig, RetryPolicy, UpstreamCall, call_upstream};
use shared::postcard::PipelineError;
use tokio::sync::Mutex;

#[derive(Clone)]
struct ScriptedCall {
    outcomes: Arc<Mutex<VecDeque<Result<&'static str, PipelineError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedCall {
    fn with_outcomes(outcomes: Vec<Result<&'static str, PipelineError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::from(outcomes))),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    async fn invoke(&self) -> Result<&'static str, PipelineError> {
        *self.calls.lock().await += 1;
        self.outcomes.lock().await.pop_front().unwrap_or_else(|| {
            Err(PipelineError::UpstreamGeneration(
                "missing_scripted_outcome".to_string(),
            ))
        })
    }

    async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

#[tokio::test]
async fn retries_transient_upstream_failures_before_succeeding() {
    let call = ScriptedCall::with_outcomes(vec![
        Err(PipelineError::UpstreamAnalysis("status=503".to_string())),
        Ok("analysis"),
    ]);

    let result = call_upstream(&fast_config(2, 1), UpstreamCall::Analysis, || call.invoke())
        .await
        .expect("second attempt should succeed");

    assert_eq!(result, "analysis");
    assert_eq!(call.calls().await, 2);
}

#[tokio::test]
async fn gives_up_once_attempts_are_exhausted() {
    let call = ScriptedCall::with_outcomes(vec![
        Err(PipelineError::UpstreamGeneration("status=500".to_string())),
        Err(PipelineError::UpstreamGeneration("status=502".to_string())),
        Ok("never reached"),
    ]);

    let err = call_upstream(&fast_config(2, 1), UpstreamCall::Caption, || call.invoke())
        .await
        .expect_err("attempt budget should run out");

    assert!(matches!(err, PipelineError::UpstreamGeneration(ref message) if message.contains("502")));
    assert_eq!(call.calls().await, 2);
}

#[tokio::test]
async fn permanent_errors_are_never_retried() {
    let call = ScriptedCall::with_outcomes(vec![
        Err(PipelineError::InvalidInput("bad photo".to_string())),
        Ok("never reached"),
    ]);

    let err = call_upstream(&fast_config(5, 5), UpstreamCall::Analysis, || call.invoke())
        .await
        .expect_err("invalid input should fail immediately");

    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(call.calls().await, 1);
}

#[tokio::test]
async fn slow_calls_time_out_without_retry_by_default() {
    let mut config = fast_config(3, 1);
    config.image_timeout_ms = 20;
    let calls = Arc::new(Mutex::new(0_usize));

    let err = call_upstream(&config, UpstreamCall::ImageSynthesis, || {
        let calls = Arc::clone(&calls);
        async move {
            *calls.lock().await += 1;
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, PipelineError>("too late")
        }
    })
    .await
    .expect_err("call should time out");

    assert!(matches!(err, PipelineError::UpstreamTimeout("image_synthesis")));
    assert_eq!(*calls.lock().await, 1);
}

#[tokio::test]
async fn timeouts_are_retried_when_configured() {
    let mut config = fast_config(1, 2);
    config.caption_timeout_ms = 20;
    let calls = Arc::new(Mutex::new(0_usize));

    let result = call_upstream(&config, UpstreamCall::Caption, || {
        let calls = Arc::clone(&calls);
        async move {
            let attempt = {
                let mut guard = calls.lock().await;
                *guard += 1;
                *guard
            };
            if attempt == 1 {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            Ok::<_, PipelineError>("caption")
        }
    })
    .await
    .expect("second attempt should beat the timeout");

    assert_eq!(result, "caption");
    assert_eq!(*calls.lock().await, 2);
}

fn fast_config(upstream_max_attempts: u32, timeout_max_attempts: u32) -> LlmReliabilityConfig {
    LlmReliabilityConfig {
        retry: RetryPolicy {
            analysis_max_attempts: upstream_max_attempts,
            generation_max_attempts: upstream_max_attempts,
            timeout_max_attempts,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
        },
        ..LlmReliabilityConfig::default()
    }
}
