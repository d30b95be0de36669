//! Live OS permission status
//!
//! The state machine asks the oracle on every read and never caches the answer,
//! so a grant revoked from system settings is noticed on the next query.

use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether the OS-level P2P permission is currently granted
pub trait PermissionOracle: Send + Sync {
    /// Query the live grant status. Must be side-effect free.
    fn is_granted(&self) -> bool;
}

impl<F> PermissionOracle for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_granted(&self) -> bool {
        self()
    }
}

/// Oracle with a switchable answer, for tests and manual overrides
#[derive(Debug, Default)]
pub struct StaticOracle {
    granted: AtomicBool,
}

impl StaticOracle {
    /// Create an oracle that reports `granted`
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    /// Oracle that always reports granted until changed
    pub fn granted() -> Self {
        Self::new(true)
    }

    /// Oracle that always reports not granted until changed
    pub fn denied() -> Self {
        Self::new(false)
    }

    /// Change the reported status, as if the user toggled it in system settings
    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionOracle for StaticOracle {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_oracle_flips() {
        let oracle = StaticOracle::denied();
        assert!(!oracle.is_granted());
        oracle.set_granted(true);
        assert!(oracle.is_granted());
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = || true;
        assert!(oracle.is_granted());
    }
}
