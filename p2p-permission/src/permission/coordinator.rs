//! Permission request coordination
//!
//! A request resolves at once when the state is already terminal. Otherwise it
//! subscribes to the preference store, presents the right UI for the caller's
//! context, and tells the listener the outcome on the first change that leaves
//! the state terminal.
//!
//! ```text
//! request() ──► terminal? ──yes──► listener(allowed) ──► finished handle
//!                  │
//!                  no
//!                  ▼
//!            subscribe(store) ──► present(context) ──► pending handle
//!                  │                                        │
//!          store change, terminal                        close()
//!                  ▼                                        ▼
//!        listener(allowed), unsubscribe         cancel notification, unsubscribe
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::oneshot;

use super::error::PermissionResult;
use super::machine::{PermissionStateMachine, RATIONALE_KEY};
use super::presenter::{
    FixAction, InteractivePrompt, NotificationAction, PermissionNotification, RationaleDialog,
};
use super::store::SubscriptionId;
use crate::audit::{self, AuditEventType};

/// Single-shot completion callback for a permission request
pub trait PermissionListener: Send {
    /// Invoked once it is known whether the user allowed or denied P2P
    fn on_complete(self: Box<Self>, allowed: bool);
}

impl<F> PermissionListener for F
where
    F: FnOnce(bool) + Send,
{
    fn on_complete(self: Box<Self>, allowed: bool) {
        (*self)(allowed)
    }
}

/// Where a request may present UI, resolved once per request
#[derive(Clone)]
pub enum PresentationContext {
    /// A foreground context that can show dialogs and OS prompts
    Interactive(Arc<dyn InteractivePrompt>),
    /// No foreground context; fall back to a notification
    Background,
}

impl PresentationContext {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive(_))
    }
}

impl std::fmt::Debug for PresentationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interactive(_) => f.write_str("Interactive"),
            Self::Background => f.write_str("Background"),
        }
    }
}

// ============================================================================
// Request handle
// ============================================================================

struct PendingSlot {
    listener: Option<Box<dyn PermissionListener>>,
    subscription: Option<SubscriptionId>,
    closed: bool,
}

struct PendingRequest {
    id: u64,
    machine: Weak<PermissionStateMachine>,
    slot: Mutex<PendingSlot>,
}

impl PendingRequest {
    fn on_store_change(&self, key: &str) {
        if key == RATIONALE_KEY {
            return;
        }
        if self.slot.lock().unwrap().listener.is_none() {
            return;
        }
        let Some(machine) = self.machine.upgrade() else {
            return;
        };

        let state = match machine.get_state() {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(request = self.id, error = %e, "Failed to re-evaluate permission state");
                return;
            }
        };
        if !state.is_terminal() {
            return;
        }

        let (listener, subscription) = {
            let mut slot = self.slot.lock().unwrap();
            (slot.listener.take(), slot.subscription.take())
        };
        if let Some(id) = subscription {
            machine.store().unsubscribe(id);
        }
        if let Some(listener) = listener {
            tracing::debug!(request = self.id, state = %state, "Permission request complete");
            machine.record(audit::request_resolved(self.id, state.is_allowed(), false));
            listener.on_complete(state.is_allowed());
        }
    }

    /// Store the subscription unless the listener already fired during registration
    fn attach(&self, machine: &PermissionStateMachine, id: SubscriptionId) {
        let fired = {
            let mut slot = self.slot.lock().unwrap();
            if slot.listener.is_some() {
                slot.subscription = Some(id);
                false
            } else {
                true
            }
        };
        if fired {
            machine.store().unsubscribe(id);
        }
    }

    fn close(&self) {
        let subscription = {
            let mut slot = self.slot.lock().unwrap();
            if slot.closed {
                return;
            }
            slot.closed = true;
            slot.listener = None;
            slot.subscription.take()
        };

        let Some(machine) = self.machine.upgrade() else {
            return;
        };
        machine.close_notification();
        if let Some(id) = subscription {
            machine.store().unsubscribe(id);
        }
        tracing::debug!(request = self.id, "Permission request closed");
        machine.record(audit::request_closed(self.id));
    }

    fn is_finished(&self) -> bool {
        let slot = self.slot.lock().unwrap();
        slot.closed || slot.listener.is_none()
    }
}

/// A closeable request for grant of P2P permission
///
/// Closing dismisses any notification shown for the request and stops
/// listening for a decision. Closing is idempotent.
#[must_use = "an unclosed request keeps its store subscription until a decision is made"]
pub struct PermissionRequest {
    pending: Option<Arc<PendingRequest>>,
}

impl PermissionRequest {
    /// A request that resolved synchronously; closing it does nothing
    pub fn finished() -> Self {
        Self { pending: None }
    }

    /// Request id used in logs and audit events, if a flow was started
    pub fn id(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.id)
    }

    /// True once the listener fired or the request was closed
    pub fn is_finished(&self) -> bool {
        self.pending.as_ref().map_or(true, |p| p.is_finished())
    }

    /// Allow the caller to close this request if it no longer cares about the result
    pub fn close(&self) {
        if let Some(pending) = &self.pending {
            pending.close();
        }
    }
}

impl std::fmt::Debug for PermissionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRequest")
            .field("id", &self.id())
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ============================================================================
// Notification responder
// ============================================================================

/// Routes notification actions back to the state machine
///
/// Handed to [`NotificationPresenter::show`](super::NotificationPresenter::show);
/// the presenter calls [`respond`](Self::respond) when the user acts.
#[derive(Clone)]
pub struct NotificationResponder {
    machine: Weak<PermissionStateMachine>,
}

impl NotificationResponder {
    pub fn new(machine: &Arc<PermissionStateMachine>) -> Self {
        Self {
            machine: Arc::downgrade(machine),
        }
    }

    /// Apply the user's response to the notification
    pub fn respond(&self, action: NotificationAction) -> PermissionResult<()> {
        let Some(machine) = self.machine.upgrade() else {
            return Ok(());
        };
        tracing::debug!(?action, "Permission notification action");
        match action {
            NotificationAction::Fix => {
                machine.notifier().open_remediation();
                Ok(())
            }
            NotificationAction::Disable => machine.apply_permission_change(true),
            NotificationAction::Dismiss => machine.apply_permission_change(false),
        }
    }
}

impl std::fmt::Debug for NotificationResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationResponder")
            .field("alive", &(self.machine.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Orchestrates P2P permission consent flows
pub struct PermissionRequestCoordinator {
    machine: Arc<PermissionStateMachine>,
    next_id: AtomicU64,
}

impl PermissionRequestCoordinator {
    pub fn new(machine: Arc<PermissionStateMachine>) -> Self {
        Self {
            machine,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn machine(&self) -> &Arc<PermissionStateMachine> {
        &self.machine
    }

    /// Request P2P permission from the user, until the user makes a selection
    /// or the returned [`PermissionRequest`] is closed
    ///
    /// With an interactive context the host must call
    /// [`apply_permission_change`](PermissionStateMachine::apply_permission_change)
    /// whenever the OS prompt returns or the user comes back from settings.
    pub fn request(
        &self,
        explain: bool,
        context: &PresentationContext,
        listener: impl PermissionListener + 'static,
    ) -> PermissionResult<PermissionRequest> {
        self.request_boxed(explain, context, Box::new(listener))
    }

    /// Same as [`request`](Self::request), delivering the outcome on a channel
    ///
    /// The receiver reports an error if the request is closed before a decision.
    pub fn request_async(
        &self,
        explain: bool,
        context: &PresentationContext,
    ) -> PermissionResult<(PermissionRequest, oneshot::Receiver<bool>)> {
        let (tx, rx) = oneshot::channel();
        let request = self.request(explain, context, move |allowed: bool| {
            let _ = tx.send(allowed);
        })?;
        Ok((request, rx))
    }

    fn request_boxed(
        &self,
        explain: bool,
        context: &PresentationContext,
        listener: Box<dyn PermissionListener>,
    ) -> PermissionResult<PermissionRequest> {
        let state = self.machine.get_state()?;
        tracing::debug!(state = %state, explain, ?context, "Permission request");

        if state.is_terminal() {
            // Nothing to close because no listener is registered
            listener.on_complete(state.is_allowed());
            return Ok(PermissionRequest::finished());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.machine.record(audit::permission_requested(
            id,
            explain,
            context.is_interactive(),
        ));

        let pending = Arc::new(PendingRequest {
            id,
            machine: Arc::downgrade(&self.machine),
            slot: Mutex::new(PendingSlot {
                listener: Some(listener),
                subscription: None,
                closed: false,
            }),
        });

        let callback_pending = Arc::clone(&pending);
        let subscription = self
            .machine
            .store()
            .subscribe(Arc::new(move |key: &str| callback_pending.on_store_change(key)));
        pending.attach(&self.machine, subscription);

        if let Err(e) = self.present(id, explain, context) {
            pending.close();
            return Err(e);
        }

        Ok(PermissionRequest {
            pending: Some(pending),
        })
    }

    fn present(
        &self,
        id: u64,
        explain: bool,
        context: &PresentationContext,
    ) -> PermissionResult<()> {
        match context {
            PresentationContext::Interactive(prompt) => {
                if self.machine.oracle().is_granted() {
                    return Ok(());
                }

                let rationale = prompt.should_show_rationale();
                if explain && (rationale || self.machine.rationale_shown()?) {
                    self.explain(id, prompt, rationale);
                } else {
                    prompt.request_permission();
                    self.machine.record(audit::presentation_shown(
                        id,
                        AuditEventType::PromptIssued,
                        None,
                    ));
                }

                if rationale {
                    // Remembered for the "don't ask again" case, where the OS
                    // stops reporting that a rationale is warranted
                    self.machine.mark_rationale_shown()?;
                }
                Ok(())
            }
            PresentationContext::Background => {
                self.show_notification(id);
                Ok(())
            }
        }
    }

    /// User denied but asked for P2P, so explain then re-prompt or redirect to settings
    fn explain(&self, id: u64, prompt: &Arc<dyn InteractivePrompt>, rationale: bool) {
        let messages = self.machine.messages();
        let fix_action = if rationale {
            FixAction::RequestPermission
        } else {
            FixAction::OpenSettings
        };
        let dialog = RationaleDialog {
            message: messages.rationale.clone(),
            fix_label: messages.fix_label.clone(),
            fix_action,
        };

        let prompt_for_fix = Arc::clone(prompt);
        prompt.show_rationale(
            dialog,
            Box::new(move || match fix_action {
                FixAction::RequestPermission => prompt_for_fix.request_permission(),
                FixAction::OpenSettings => prompt_for_fix.redirect_to_settings(),
            }),
        );
        self.machine.record(audit::presentation_shown(
            id,
            AuditEventType::RationaleShown,
            Some(fix_action),
        ));
    }

    fn show_notification(&self, id: u64) {
        let messages = self.machine.messages();
        let notification = PermissionNotification {
            title: messages.notification_title.clone(),
            body: messages.notification_body.clone(),
            fix_label: messages.fix_label.clone(),
            disable_label: messages.disable_label.clone(),
        };
        self.machine
            .notifier()
            .show(notification, NotificationResponder::new(&self.machine));
        self.machine.record(audit::presentation_shown(
            id,
            AuditEventType::NotificationShown,
            None,
        ));
    }
}

impl std::fmt::Debug for PermissionRequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionRequestCoordinator")
            .field("machine", &self.machine)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::permission::machine::STATE_KEY;
    use crate::permission::oracle::StaticOracle;
    use crate::permission::presenter::{
        PromptEvent, RecordingAdvisoryPresenter, RecordingNotificationPresenter, RecordingPrompt,
    };
    use crate::permission::state::PermissionState;
    use crate::permission::store::{MemoryPreferenceStore, PreferenceStore};

    struct Fixture {
        store: Arc<MemoryPreferenceStore>,
        oracle: Arc<StaticOracle>,
        notifier: Arc<RecordingNotificationPresenter>,
        advisory: Arc<RecordingAdvisoryPresenter>,
        audit: Arc<MemoryAuditSink>,
        coordinator: PermissionRequestCoordinator,
    }

    fn fixture(granted: bool) -> Fixture {
        let store = Arc::new(MemoryPreferenceStore::new());
        let oracle = Arc::new(StaticOracle::new(granted));
        let notifier = Arc::new(RecordingNotificationPresenter::new());
        let advisory = Arc::new(RecordingAdvisoryPresenter::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let machine = PermissionStateMachine::new(store.clone(), oracle.clone())
            .with_notifier(notifier.clone())
            .with_advisory(advisory.clone())
            .with_audit(audit.clone());
        Fixture {
            store,
            oracle,
            notifier,
            advisory,
            audit,
            coordinator: PermissionRequestCoordinator::new(Arc::new(machine)),
        }
    }

    type Outcomes = Arc<Mutex<Vec<bool>>>;

    fn recorder() -> (Outcomes, impl FnOnce(bool) + Send + 'static) {
        let outcomes: Outcomes = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&outcomes);
        (outcomes, move |allowed: bool| clone.lock().unwrap().push(allowed))
    }

    fn interactive(prompt: &Arc<RecordingPrompt>) -> PresentationContext {
        PresentationContext::Interactive(prompt.clone())
    }

    #[test]
    fn test_disabled_resolves_synchronously() {
        let f = fixture(false);
        f.coordinator
            .machine()
            .set_state(PermissionState::Disabled)
            .unwrap();

        let (outcomes, listener) = recorder();
        let request = f
            .coordinator
            .request(true, &PresentationContext::Background, listener)
            .unwrap();

        assert_eq!(*outcomes.lock().unwrap(), vec![false]);
        assert!(request.is_finished());
        assert_eq!(request.id(), None);
        assert_eq!(f.store.subscriber_count(), 0);
        assert!(f.notifier.shown().is_empty());
    }

    #[test]
    fn test_allowed_resolves_synchronously() {
        let f = fixture(true);
        let prompt = Arc::new(RecordingPrompt::new(false));
        let (outcomes, listener) = recorder();

        let request = f
            .coordinator
            .request(false, &interactive(&prompt), listener)
            .unwrap();

        assert_eq!(*outcomes.lock().unwrap(), vec![true]);
        assert!(prompt.events().is_empty());
        request.close();
        assert_eq!(f.notifier.cancel_count(), 0);
    }

    #[test]
    fn test_external_allow_fires_once_and_unsubscribes() {
        let f = fixture(false);
        let prompt = Arc::new(RecordingPrompt::new(false));
        let (outcomes, listener) = recorder();

        let request = f
            .coordinator
            .request(true, &interactive(&prompt), listener)
            .unwrap();
        assert!(outcomes.lock().unwrap().is_empty());
        assert_eq!(f.store.subscriber_count(), 1);

        f.oracle.set_granted(true);
        f.store.set(STATE_KEY, "ALLOWED").unwrap();
        f.store.set(STATE_KEY, "ALLOWED").unwrap();

        assert_eq!(*outcomes.lock().unwrap(), vec![true]);
        assert_eq!(f.store.subscriber_count(), 0);
        assert!(request.is_finished());
    }

    #[test]
    fn test_rationale_key_changes_are_ignored() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();
        let _request = f
            .coordinator
            .request(false, &PresentationContext::Background, listener)
            .unwrap();

        // Make the state terminal without notifying, then touch only the rationale key
        f.oracle.set_granted(true);
        f.store.set(RATIONALE_KEY, "true").unwrap();
        assert!(outcomes.lock().unwrap().is_empty());
        assert_eq!(f.store.subscriber_count(), 1);
    }

    #[test]
    fn test_non_terminal_change_keeps_waiting() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();
        let _request = f
            .coordinator
            .request(false, &PresentationContext::Background, listener)
            .unwrap();

        f.store.set(STATE_KEY, "DENIED").unwrap();
        assert!(outcomes.lock().unwrap().is_empty());

        f.coordinator
            .machine()
            .apply_permission_change(false)
            .unwrap();
        assert_eq!(*outcomes.lock().unwrap(), vec![false]);
        assert_eq!(f.advisory.count(), 1);
    }

    #[test]
    fn test_direct_prompt_without_rationale() {
        let f = fixture(false);
        let prompt = Arc::new(RecordingPrompt::new(false));
        let (_outcomes, listener) = recorder();

        let _request = f
            .coordinator
            .request(true, &interactive(&prompt), listener)
            .unwrap();

        assert_eq!(prompt.events(), vec![PromptEvent::RequestPermission]);
        assert!(!f.coordinator.machine().rationale_shown().unwrap());
    }

    #[test]
    fn test_os_rationale_shows_dialog_that_reprompts() {
        let f = fixture(false);
        let prompt = Arc::new(RecordingPrompt::new(true));
        let (_outcomes, listener) = recorder();

        let _request = f
            .coordinator
            .request(true, &interactive(&prompt), listener)
            .unwrap();

        assert_eq!(prompt.rationale_dialogs(), 1);
        assert_eq!(prompt.permission_requests(), 0);
        match &prompt.events()[0] {
            PromptEvent::Rationale(dialog) => {
                assert_eq!(dialog.fix_action, FixAction::RequestPermission)
            }
            other => panic!("Expected rationale dialog, got {:?}", other),
        }
        assert!(f.coordinator.machine().rationale_shown().unwrap());

        assert!(prompt.press_fix());
        assert_eq!(prompt.permission_requests(), 1);
    }

    #[test]
    fn test_remembered_rationale_redirects_to_settings() {
        let f = fixture(false);
        f.coordinator.machine().mark_rationale_shown().unwrap();
        let prompt = Arc::new(RecordingPrompt::new(false));
        let (_outcomes, listener) = recorder();

        let _request = f
            .coordinator
            .request(true, &interactive(&prompt), listener)
            .unwrap();

        assert_eq!(prompt.rationale_dialogs(), 1);
        assert!(prompt.press_fix());
        assert_eq!(
            prompt.events()[1],
            PromptEvent::RedirectToSettings
        );
    }

    #[test]
    fn test_no_explain_prompts_directly_but_remembers_rationale() {
        let f = fixture(false);
        let prompt = Arc::new(RecordingPrompt::new(true));
        let (_outcomes, listener) = recorder();

        let _request = f
            .coordinator
            .request(false, &interactive(&prompt), listener)
            .unwrap();

        assert_eq!(prompt.events(), vec![PromptEvent::RequestPermission]);
        assert!(f.coordinator.machine().rationale_shown().unwrap());
    }

    #[test]
    fn test_background_notification_actions() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();

        let request = f
            .coordinator
            .request(true, &PresentationContext::Background, listener)
            .unwrap();
        assert_eq!(f.notifier.shown().len(), 1);
        assert_eq!(
            f.notifier.shown()[0].disable_label,
            f.coordinator.machine().messages().disable_label
        );

        let responder = f.notifier.take_responder().unwrap();
        responder.respond(NotificationAction::Fix).unwrap();
        assert_eq!(f.notifier.remediation_count(), 1);
        assert!(outcomes.lock().unwrap().is_empty());

        responder.respond(NotificationAction::Disable).unwrap();
        assert_eq!(*outcomes.lock().unwrap(), vec![false]);
        assert_eq!(
            f.coordinator.machine().get_state().unwrap(),
            PermissionState::Disabled
        );
        assert!(request.is_finished());
    }

    #[test]
    fn test_notification_dismiss_is_session_only() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();
        let _request = f
            .coordinator
            .request(true, &PresentationContext::Background, listener)
            .unwrap();

        let responder = f.notifier.take_responder().unwrap();
        responder.respond(NotificationAction::Dismiss).unwrap();

        assert_eq!(*outcomes.lock().unwrap(), vec![false]);
        assert_eq!(
            f.coordinator.machine().get_state().unwrap(),
            PermissionState::TemporarilyDisabled
        );
        assert_eq!(f.advisory.count(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_cancels() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();
        let request = f
            .coordinator
            .request(false, &PresentationContext::Background, listener)
            .unwrap();

        request.close();
        request.close();
        assert_eq!(f.store.subscriber_count(), 0);
        assert_eq!(f.notifier.cancel_count(), 1);

        // A decision after closing is not delivered
        f.coordinator
            .machine()
            .apply_permission_change(true)
            .unwrap();
        assert!(outcomes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_close_after_fire() {
        let f = fixture(false);
        let (outcomes, listener) = recorder();
        let request = f
            .coordinator
            .request(false, &PresentationContext::Background, listener)
            .unwrap();

        f.coordinator
            .machine()
            .set_state(PermissionState::Disabled)
            .unwrap();
        assert_eq!(*outcomes.lock().unwrap(), vec![false]);

        request.close();
        request.close();
        assert_eq!(f.store.subscriber_count(), 0);
        assert_eq!(
            f.audit
                .find_by_type(AuditEventType::RequestClosed)
                .len(),
            1
        );
    }

    #[test]
    fn test_concurrent_requests_are_independent() {
        let f = fixture(false);
        let (first, first_listener) = recorder();
        let (second, second_listener) = recorder();

        let request_a = f
            .coordinator
            .request(false, &PresentationContext::Background, first_listener)
            .unwrap();
        let request_b = f
            .coordinator
            .request(false, &PresentationContext::Background, second_listener)
            .unwrap();
        assert_ne!(request_a.id(), request_b.id());
        assert_eq!(f.store.subscriber_count(), 2);

        request_a.close();
        f.oracle.set_granted(true);
        f.coordinator
            .machine()
            .apply_permission_change(false)
            .unwrap();

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![true]);
        assert_eq!(f.store.subscriber_count(), 0);
    }

    #[test]
    fn test_close_from_inside_listener() {
        let f = fixture(false);
        let slot: Arc<Mutex<Option<PermissionRequest>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);

        let request = f
            .coordinator
            .request(false, &PresentationContext::Background, move |_allowed: bool| {
                if let Some(request) = slot_clone.lock().unwrap().as_ref() {
                    request.close();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(request);

        f.coordinator
            .machine()
            .apply_permission_change(true)
            .unwrap();
        assert_eq!(f.store.subscriber_count(), 0);
    }

    #[test]
    fn test_close_racing_decision_on_other_thread() {
        for _ in 0..200 {
            let f = fixture(false);
            let (outcomes, listener) = recorder();
            let request = f
                .coordinator
                .request(false, &PresentationContext::Background, listener)
                .unwrap();
            let machine = f.coordinator.machine();

            std::thread::scope(|s| {
                s.spawn(|| machine.apply_permission_change(true).unwrap());
                s.spawn(|| request.close());
            });

            assert!(outcomes.lock().unwrap().len() <= 1);
            assert_eq!(f.store.subscriber_count(), 0);
            assert!(request.is_finished());
        }
    }

    #[test]
    fn test_write_failure_during_presentation_cleans_up() {
        use crate::permission::store::ReadOnlyPreferenceStore;

        let inner = Arc::new(MemoryPreferenceStore::new());
        let store: Arc<dyn PreferenceStore> =
            Arc::new(ReadOnlyPreferenceStore::new(Arc::clone(&inner)));
        let machine =
            PermissionStateMachine::new(store, Arc::new(StaticOracle::denied()));
        let coordinator = PermissionRequestCoordinator::new(Arc::new(machine));
        let prompt = Arc::new(RecordingPrompt::new(true));

        let result = coordinator.request(false, &interactive(&prompt), |_allowed: bool| {});
        assert!(result.is_err());
        assert_eq!(inner.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_request_async() {
        let f = fixture(false);
        let (request, rx) = f
            .coordinator
            .request_async(false, &PresentationContext::Background)
            .unwrap();

        let responder = f.notifier.take_responder().unwrap();
        let handle = tokio::task::spawn_blocking(move || {
            responder.respond(NotificationAction::Disable).unwrap();
        });
        handle.await.unwrap();

        assert!(!rx.await.unwrap());
        assert!(request.is_finished());
    }

    #[tokio::test]
    async fn test_request_async_closed_before_decision() {
        let f = fixture(false);
        let (request, rx) = f
            .coordinator
            .request_async(false, &PresentationContext::Background)
            .unwrap();

        request.close();
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_resolution_is_audited() {
        let f = fixture(false);
        let (_outcomes, listener) = recorder();
        let request = f
            .coordinator
            .request(false, &PresentationContext::Background, listener)
            .unwrap();
        let id = request.id().unwrap();

        f.coordinator
            .machine()
            .apply_permission_change(true)
            .unwrap();

        let types: Vec<AuditEventType> = f
            .audit
            .find_by_request(id)
            .iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                AuditEventType::PermissionRequested,
                AuditEventType::NotificationShown,
                AuditEventType::RequestResolved,
            ]
        );
    }
}
