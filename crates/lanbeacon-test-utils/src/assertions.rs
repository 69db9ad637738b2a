//! Custom assertion helpers for common test patterns.
//!
//! Discovery is asynchronous and UDP delivery is not instantaneous even on
//! loopback, so most assertions here poll until a condition holds or a
//! deadline passes.

use std::time::Duration;
use tokio::time::Instant;

/// How often polling assertions re-check their condition.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `condition` until it returns true or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Assert that `condition` becomes true within `timeout`.
///
/// # Example
///
/// ```rust
/// use lanbeacon_test_utils::assertions::assert_eventually;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// assert_eventually(Duration::from_millis(50), "always true", || true).await;
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, description: &str, condition: F)
where
    F: FnMut() -> bool,
{
    assert!(
        wait_until(timeout, condition).await,
        "Condition not met within {:?}: {}",
        timeout,
        description
    );
}

/// Assert that `condition` stays false for the whole of `window`.
pub async fn assert_never<F>(window: Duration, description: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + window;
    while Instant::now() < deadline {
        assert!(!condition(), "Condition unexpectedly met: {}", description);
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    assert!(!condition(), "Condition unexpectedly met: {}", description);
}

/// Assert that a result is Ok and extract the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => panic!("{}: {:?}", $msg, value),
            Err(e) => e,
        }
    };
}
