//! Permission state machine
//!
//! The machine is the only writer of the `state` key. It never keeps the state
//! in memory between calls: every query re-reads the store and reconciles it
//! against the live oracle, so revocations made in system settings heal on the
//! next read.

use std::sync::Arc;

use super::error::{PermissionError, PermissionResult};
use super::oracle::PermissionOracle;
use super::presenter::{
    AdvisoryPresenter, NotificationPresenter, NullAdvisoryPresenter, NullNotificationPresenter,
};
use super::presets::{PermissionConfig, PermissionMessages};
use super::state::PermissionState;
use super::store::PreferenceStore;
use crate::audit::{self, AuditEvent, AuditSink, NullAuditSink};

/// Store key holding the persisted [`PermissionState`]
pub const STATE_KEY: &str = "state";

/// Store key holding whether the rationale was ever warranted
pub const RATIONALE_KEY: &str = "permissionRationale";

/// Raw persisted values, without oracle reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedFlags {
    pub state: PermissionState,
    pub rationale_shown: bool,
}

/// Owns P2P permission state transitions
pub struct PermissionStateMachine {
    store: Arc<dyn PreferenceStore>,
    oracle: Arc<dyn PermissionOracle>,
    notifier: Arc<dyn NotificationPresenter>,
    advisory: Arc<dyn AdvisoryPresenter>,
    audit: Arc<dyn AuditSink>,
    messages: PermissionMessages,
}

impl PermissionStateMachine {
    /// Create a machine with null presenters and no audit
    pub fn new(store: Arc<dyn PreferenceStore>, oracle: Arc<dyn PermissionOracle>) -> Self {
        Self {
            store,
            oracle,
            notifier: Arc::new(NullNotificationPresenter),
            advisory: Arc::new(NullAdvisoryPresenter),
            audit: Arc::new(NullAuditSink),
            messages: PermissionMessages::default(),
        }
    }

    /// Create a machine from a configuration bundle
    pub fn from_config(config: PermissionConfig) -> Self {
        Self {
            store: config.store,
            oracle: config.oracle,
            notifier: config.notifier,
            advisory: config.advisory,
            audit: config.audit,
            messages: config.messages,
        }
    }

    /// Set the notification presenter
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationPresenter>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set the advisory presenter
    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryPresenter>) -> Self {
        self.advisory = advisory;
        self
    }

    /// Set the audit sink
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Set user-visible text
    pub fn with_messages(mut self, messages: PermissionMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Return the current state, reconciled against the live grant status
    pub fn get_state(&self) -> PermissionResult<PermissionState> {
        let state = self.stored_state()?;

        if state == PermissionState::Disabled {
            // Disabled is sticky; do no further checking
            return Ok(state);
        }

        let allowed = self.oracle.is_granted();
        if allowed && state != PermissionState::Allowed {
            self.set_state(PermissionState::Allowed)?;
            Ok(PermissionState::Allowed)
        } else if !allowed && state == PermissionState::Allowed {
            self.set_state(PermissionState::Denied)?;
            Ok(PermissionState::Denied)
        } else {
            Ok(state)
        }
    }

    /// Overwrite the persisted state. Any state may follow any other.
    pub fn set_state(&self, state: PermissionState) -> PermissionResult<()> {
        let previous = self.store.get(STATE_KEY).ok().flatten();
        tracing::debug!(
            from = previous.as_deref().unwrap_or("?"),
            to = %state,
            "Permission state change"
        );

        self.store
            .set(STATE_KEY, state.as_str())
            .map_err(PermissionError::PersistenceWriteFailed)?;

        let from = previous.and_then(|s| s.parse().ok());
        self.record(audit::state_changed(from, state));
        Ok(())
    }

    /// Reset any session-only mode so the next request prompts again
    pub fn reset(&self) -> PermissionResult<()> {
        if self.get_state()? == PermissionState::TemporarilyDisabled {
            self.set_state(PermissionState::Denied)?;
        }
        Ok(())
    }

    /// Return true if P2P features are enabled
    pub fn is_enabled(&self) -> PermissionResult<bool> {
        Ok(self.get_state()? == PermissionState::Allowed)
    }

    /// Record the outcome of a permissions-related user choice
    ///
    /// Called after the OS prompt returns, after the user comes back from system
    /// settings, or when a notification action is taken. `permanent` selects a
    /// durable opt-out over a session-only one.
    pub fn apply_permission_change(&self, permanent: bool) -> PermissionResult<()> {
        self.close_notification();

        if self.oracle.is_granted() {
            return self.set_state(PermissionState::Allowed);
        }

        if self.get_state()? == PermissionState::Disabled {
            return Ok(());
        }

        if permanent {
            self.set_state(PermissionState::Disabled)
        } else {
            // Inform the user and don't try again for the rest of this session
            self.set_state(PermissionState::TemporarilyDisabled)?;
            self.advisory.show_advisory(&self.messages.rationale);
            self.record(audit::advisory_shown(&self.messages.rationale));
            Ok(())
        }
    }

    /// Persisted values as stored, without reconciliation
    pub fn flags(&self) -> PermissionResult<PersistedFlags> {
        Ok(PersistedFlags {
            state: self.stored_state()?,
            rationale_shown: self.rationale_shown()?,
        })
    }

    /// Whether the rationale flag has been set before
    pub fn rationale_shown(&self) -> PermissionResult<bool> {
        self.store
            .get_bool(RATIONALE_KEY, false)
            .map_err(PermissionError::PersistenceReadFailed)
    }

    /// Remember that the OS asked for a rationale, so later requests explain
    /// even after the user chose "don't ask again"
    pub fn mark_rationale_shown(&self) -> PermissionResult<()> {
        self.store
            .set_bool(RATIONALE_KEY, true)
            .map_err(PermissionError::PersistenceWriteFailed)
    }

    /// Close any outstanding notification
    pub fn close_notification(&self) {
        self.notifier.cancel();
    }

    /// Backing preference store
    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    /// Live OS grant check
    pub fn oracle(&self) -> &Arc<dyn PermissionOracle> {
        &self.oracle
    }

    /// Presenter for the background notification
    pub fn notifier(&self) -> &Arc<dyn NotificationPresenter> {
        &self.notifier
    }

    /// User-visible text for dialogs and notifications
    pub fn messages(&self) -> &PermissionMessages {
        &self.messages
    }

    pub(crate) fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    fn stored_state(&self) -> PermissionResult<PermissionState> {
        match self
            .store
            .get(STATE_KEY)
            .map_err(PermissionError::PersistenceReadFailed)?
        {
            Some(raw) => raw.parse(),
            None => Ok(PermissionState::Denied),
        }
    }
}

impl std::fmt::Debug for PermissionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionStateMachine")
            .field("stored", &self.store.get(STATE_KEY).ok().flatten())
            .finish_non_exhaustive()
    }
}
