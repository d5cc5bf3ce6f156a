// Panic isolation for job handlers
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Poll `future` to completion, converting a panic into `Panicked`
///
/// Keeps a faulty handler from taking the tick loop or other jobs down.
pub async fn execute_guarded_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(panic_info) => PanicGuardResult::Panicked(panic_message(panic_info.as_ref())),
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let result = execute_guarded_async(async { 42 }).await;
        assert!(matches!(result, PanicGuardResult::Success(42)));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let result = execute_guarded_async(async {
            tokio::task::yield_now().await;
            panic!("boom at {}", 7);
        })
        .await;
        match result {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "boom at 7"),
            PanicGuardResult::Success(()) => panic!("panic was not caught"),
        }
    }
}
