//! Testing utilities, fixtures, and mocks for lanbeacon.
//!
//! This crate provides common testing infrastructure used across the lanbeacon workspace:
//!
//! - **Fixtures**: Loopback UDP peers and temporary config files
//! - **Mocks**: A recording permission guard and a callback recorder
//! - **Assertions**: Polling assertions for asynchronous outcomes
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use lanbeacon_test_utils::{LoopbackPeer, RecordingGuard};
//!
//! #[tokio::test]
//! async fn test_advertiser_replies() {
//!     let guard = RecordingGuard::new();
//!     let peer = LoopbackPeer::bind().await;
//!     // Start an advertiser with `guard`, then talk to it through `peer`.
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use assertions::{assert_eventually, assert_never, wait_until};
pub use fixtures::{loopback_ip, LoopbackPeer, TestConfig};
pub use mocks::{CallRecorder, RecordingGuard};
