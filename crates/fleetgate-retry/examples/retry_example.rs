use fleetgate_retry::{RetryController, RetryPolicy, UpstreamErrorKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("FleetGate Retry Controller Example");
    println!("===================================\n");

    // Example 1: transient failure on the first instance, fallback succeeds.
    println!("Example 1: fallback to a second instance after a 503");
    let controller = RetryController::new(
        RetryPolicy::builder()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(10))
            .jitter(false)
            .build(),
    );

    let result: Result<&str, UpstreamErrorKind> = controller
        .execute(UpstreamErrorKind::is_retryable, |excl, attempt| async move {
            println!("  attempt {attempt}, excluded so far: {}", excl.len());
            if excl.contains("gpt4-east-1") {
                Ok(("gpt4-west-1".to_string(), "200 OK from gpt4-west-1"))
            } else {
                Err(("gpt4-east-1".to_string(), UpstreamErrorKind::Status(503)))
            }
        })
        .await;
    println!("  result: {result:?}\n");

    // Example 2: non-retryable auth error stops immediately.
    println!("Example 2: auth error is not retried");
    let controller = RetryController::new(RetryPolicy::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = Arc::clone(&calls);
    let result: Result<&str, UpstreamErrorKind> = controller
        .execute(UpstreamErrorKind::is_retryable, move |_excl, _attempt| {
            let calls = Arc::clone(&calls2);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(("gpt4-east-1".to_string(), UpstreamErrorKind::Auth))
            }
        })
        .await;
    println!("  result: {result:?}, calls made: {}\n", calls.load(Ordering::SeqCst));

    // Example 3: every instance exhausted.
    println!("Example 3: retries exhausted, most recent error surfaced");
    let controller = RetryController::new(
        RetryPolicy::builder()
            .max_attempts(3)
            .initial_delay(Duration::from_millis(1))
            .build(),
    );
    let result: Result<&str, UpstreamErrorKind> = controller
        .execute(UpstreamErrorKind::is_retryable, |_excl, attempt| async move {
            Err((format!("inst-{attempt}"), UpstreamErrorKind::Timeout))
        })
        .await;
    println!("  result: {result:?}");
}
