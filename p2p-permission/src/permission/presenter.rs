//! User-facing presentation collaborators
//!
//! The core never renders anything itself. It hands dialogs, notifications and
//! advisories to these traits, and user choices come back asynchronously through
//! callbacks or a [`NotificationResponder`].
//!
//! # Example
//!
//! ```rust
//! use p2p_permission::permission::{FixCallback, InteractivePrompt, RationaleDialog};
//!
//! struct LoggingPrompt;
//!
//! impl InteractivePrompt for LoggingPrompt {
//!     fn request_permission(&self) {
//!         println!("asking the OS for the nearby devices permission");
//!     }
//!
//!     fn should_show_rationale(&self) -> bool {
//!         false
//!     }
//!
//!     fn show_rationale(&self, dialog: RationaleDialog, on_fix: FixCallback) {
//!         println!("{}", dialog.message);
//!         on_fix();
//!     }
//!
//!     fn redirect_to_settings(&self) {}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::coordinator::NotificationResponder;

/// What the rationale dialog's fix button does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    /// Ask the OS for the permission again
    RequestPermission,
    /// Send the user to the system settings page for this app
    OpenSettings,
}

/// Explanatory dialog shown before re-requesting a denied permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationaleDialog {
    /// Explanation shown to the user
    pub message: String,
    /// Label of the single positive button
    pub fix_label: String,
    /// What pressing the button will do
    pub fix_action: FixAction,
}

/// Invoked when the user presses the rationale dialog's fix button
pub type FixCallback = Box<dyn FnOnce() + Send>;

/// Prompting capability of a foreground, interactive context
pub trait InteractivePrompt: Send + Sync {
    /// Issue the OS permission prompt; the result is reported later through
    /// `apply_permission_change`
    fn request_permission(&self);

    /// Whether the OS says the user denied before without blocking re-prompts
    fn should_show_rationale(&self) -> bool;

    /// Present the rationale dialog
    fn show_rationale(&self, dialog: RationaleDialog, on_fix: FixCallback);

    /// Open the system settings page for this app
    fn redirect_to_settings(&self);
}

/// Background notification describing the permission problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionNotification {
    pub title: String,
    pub body: String,
    /// Label for [`NotificationAction::Fix`]
    pub fix_label: String,
    /// Label for [`NotificationAction::Disable`]
    pub disable_label: String,
}

/// User response to a [`PermissionNotification`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// Open the in-app remediation flow
    Fix,
    /// Permanently disable P2P
    Disable,
    /// Notification swiped away; disable for this session only
    Dismiss,
}

/// Presents notifications when no interactive context exists
pub trait NotificationPresenter: Send + Sync {
    /// Show (or replace) the permission notification
    fn show(&self, notification: PermissionNotification, responder: NotificationResponder);

    /// Remove the permission notification if shown
    fn cancel(&self);

    /// Launch the in-app flow that fixes the permission interactively
    fn open_remediation(&self);
}

/// Shows a short, one-time advisory (a toast or status line)
pub trait AdvisoryPresenter: Send + Sync {
    fn show_advisory(&self, message: &str);
}

// ============================================================================
// Null presenters
// ============================================================================

/// Notification presenter that shows nothing
#[derive(Debug, Default)]
pub struct NullNotificationPresenter;

impl NotificationPresenter for NullNotificationPresenter {
    fn show(&self, notification: PermissionNotification, _responder: NotificationResponder) {
        tracing::debug!(title = %notification.title, "Dropping permission notification");
    }

    fn cancel(&self) {}

    fn open_remediation(&self) {}
}

/// Advisory presenter that only logs
#[derive(Debug, Default)]
pub struct NullAdvisoryPresenter;

impl AdvisoryPresenter for NullAdvisoryPresenter {
    fn show_advisory(&self, message: &str) {
        tracing::info!(message, "Permission advisory");
    }
}

// ============================================================================
// Recording presenters (for testing)
// ============================================================================

/// A recorded interactive prompt call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    RequestPermission,
    Rationale(RationaleDialog),
    RedirectToSettings,
}

/// Interactive prompt that records calls for testing
#[derive(Default)]
pub struct RecordingPrompt {
    events: Mutex<Vec<PromptEvent>>,
    pending_fix: Mutex<Option<FixCallback>>,
    rationale: bool,
}

impl RecordingPrompt {
    /// Create a prompt whose OS rationale hint is `should_show_rationale`
    pub fn new(should_show_rationale: bool) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            pending_fix: Mutex::new(None),
            rationale: should_show_rationale,
        }
    }

    /// Get all recorded calls
    pub fn events(&self) -> Vec<PromptEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Number of direct OS prompts issued
    pub fn permission_requests(&self) -> usize {
        self.count(|e| matches!(e, PromptEvent::RequestPermission))
    }

    /// Number of rationale dialogs shown
    pub fn rationale_dialogs(&self) -> usize {
        self.count(|e| matches!(e, PromptEvent::Rationale(_)))
    }

    /// Simulate the user pressing the fix button of the last dialog
    pub fn press_fix(&self) -> bool {
        let callback = self.pending_fix.lock().unwrap().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    fn count(&self, pred: impl Fn(&PromptEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl InteractivePrompt for RecordingPrompt {
    fn request_permission(&self) {
        self.events.lock().unwrap().push(PromptEvent::RequestPermission);
    }

    fn should_show_rationale(&self) -> bool {
        self.rationale
    }

    fn show_rationale(&self, dialog: RationaleDialog, on_fix: FixCallback) {
        self.events
            .lock()
            .unwrap()
            .push(PromptEvent::Rationale(dialog));
        *self.pending_fix.lock().unwrap() = Some(on_fix);
    }

    fn redirect_to_settings(&self) {
        self.events
            .lock()
            .unwrap()
            .push(PromptEvent::RedirectToSettings);
    }
}

impl std::fmt::Debug for RecordingPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPrompt")
            .field("events", &self.events.lock().unwrap().len())
            .field("rationale", &self.rationale)
            .finish()
    }
}

/// Notification presenter that records calls for testing
#[derive(Default)]
pub struct RecordingNotificationPresenter {
    shown: Mutex<Vec<PermissionNotification>>,
    responder: Mutex<Option<NotificationResponder>>,
    cancels: Mutex<usize>,
    remediations: Mutex<usize>,
}

impl RecordingNotificationPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications shown so far
    pub fn shown(&self) -> Vec<PermissionNotification> {
        self.shown.lock().unwrap().clone()
    }

    /// Number of cancel calls
    pub fn cancel_count(&self) -> usize {
        *self.cancels.lock().unwrap()
    }

    /// Number of remediation launches
    pub fn remediation_count(&self) -> usize {
        *self.remediations.lock().unwrap()
    }

    /// Take the responder of the most recent notification
    pub fn take_responder(&self) -> Option<NotificationResponder> {
        self.responder.lock().unwrap().take()
    }
}

impl NotificationPresenter for RecordingNotificationPresenter {
    fn show(&self, notification: PermissionNotification, responder: NotificationResponder) {
        self.shown.lock().unwrap().push(notification);
        *self.responder.lock().unwrap() = Some(responder);
    }

    fn cancel(&self) {
        *self.cancels.lock().unwrap() += 1;
    }

    fn open_remediation(&self) {
        *self.remediations.lock().unwrap() += 1;
    }
}

impl std::fmt::Debug for RecordingNotificationPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingNotificationPresenter")
            .field("shown", &self.shown.lock().unwrap().len())
            .field("cancels", &self.cancel_count())
            .finish()
    }
}

/// Advisory presenter that records messages for testing
#[derive(Debug, Default)]
pub struct RecordingAdvisoryPresenter {
    messages: Mutex<Vec<String>>,
}

impl RecordingAdvisoryPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl AdvisoryPresenter for RecordingAdvisoryPresenter {
    fn show_advisory(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_recording_prompt() {
        let prompt = RecordingPrompt::new(true);
        assert!(prompt.should_show_rationale());

        prompt.request_permission();
        prompt.redirect_to_settings();
        assert_eq!(
            prompt.events(),
            vec![PromptEvent::RequestPermission, PromptEvent::RedirectToSettings]
        );
        assert_eq!(prompt.permission_requests(), 1);
    }

    #[test]
    fn test_press_fix_runs_callback_once() {
        let prompt = RecordingPrompt::new(false);
        let pressed = Arc::new(AtomicBool::new(false));
        let pressed_clone = Arc::clone(&pressed);

        prompt.show_rationale(
            RationaleDialog {
                message: "why".into(),
                fix_label: "Fix".into(),
                fix_action: FixAction::OpenSettings,
            },
            Box::new(move || pressed_clone.store(true, Ordering::SeqCst)),
        );

        assert_eq!(prompt.rationale_dialogs(), 1);
        assert!(prompt.press_fix());
        assert!(pressed.load(Ordering::SeqCst));
        assert!(!prompt.press_fix());
    }

    #[test]
    fn test_recording_advisory() {
        let advisory = RecordingAdvisoryPresenter::new();
        advisory.show_advisory("try again later");
        assert_eq!(advisory.messages(), vec!["try again later"]);
    }

    #[test]
    fn test_notification_action_serialization() {
        let json = serde_json::to_string(&NotificationAction::Dismiss).unwrap();
        assert_eq!(json, "\"dismiss\"");
    }
}
