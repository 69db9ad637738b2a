//! Platform capabilities the engine consults but does not implement.

/// Capability that must be held while listening on some networks, such as
/// a mobile multicast lock.
///
/// Both methods must be idempotent.
pub trait PermissionGuard: Send + Sync + 'static {
    fn acquire(&self);

    fn release(&self);
}

/// Guard for platforms without such a concept.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGuard;

impl PermissionGuard for NoopGuard {
    fn acquire(&self) {}

    fn release(&self) {}
}

/// Predicate deciding whether discovery may run at all.
pub type PlatformCheck = fn() -> bool;

/// Default platform check: raw UDP sockets are unavailable on wasm targets.
pub fn discovery_supported() -> bool {
    !cfg!(target_family = "wasm")
}
