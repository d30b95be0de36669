//! Public entry point bundling the state machine and request coordinator

use std::sync::Arc;
use tokio::sync::oneshot;

use super::coordinator::{
    NotificationResponder, PermissionListener, PermissionRequest, PermissionRequestCoordinator,
    PresentationContext,
};
use super::error::PermissionResult;
use super::machine::{PermissionStateMachine, PersistedFlags};
use super::presenter::NotificationAction;
use super::presets::PermissionConfig;
use super::state::PermissionState;

/// Manage Wi-Fi Direct (P2P) permission state and consent flows
///
/// Cheap to share: wrap in an `Arc` and hand clones to every component that
/// needs to query or request the permission.
pub struct P2pPermissionManager {
    coordinator: PermissionRequestCoordinator,
}

impl P2pPermissionManager {
    pub fn new(machine: PermissionStateMachine) -> Self {
        Self {
            coordinator: PermissionRequestCoordinator::new(Arc::new(machine)),
        }
    }

    pub fn from_config(config: PermissionConfig) -> Self {
        Self::new(PermissionStateMachine::from_config(config))
    }

    /// See [`PermissionStateMachine::get_state`]
    pub fn get_state(&self) -> PermissionResult<PermissionState> {
        self.machine().get_state()
    }

    pub fn set_state(&self, state: PermissionState) -> PermissionResult<()> {
        self.machine().set_state(state)
    }

    /// Reset any temporary disable so the user is prompted again
    pub fn reset(&self) -> PermissionResult<()> {
        self.machine().reset()
    }

    pub fn is_enabled(&self) -> PermissionResult<bool> {
        self.machine().is_enabled()
    }

    /// See [`PermissionStateMachine::apply_permission_change`]
    pub fn apply_permission_change(&self, permanent: bool) -> PermissionResult<()> {
        self.machine().apply_permission_change(permanent)
    }

    /// See [`PermissionRequestCoordinator::request`]
    pub fn request(
        &self,
        explain: bool,
        context: &PresentationContext,
        listener: impl PermissionListener + 'static,
    ) -> PermissionResult<PermissionRequest> {
        self.coordinator.request(explain, context, listener)
    }

    /// See [`PermissionRequestCoordinator::request_async`]
    pub fn request_async(
        &self,
        explain: bool,
        context: &PresentationContext,
    ) -> PermissionResult<(PermissionRequest, oneshot::Receiver<bool>)> {
        self.coordinator.request_async(explain, context)
    }

    /// Apply a notification action without going through a shown notification
    pub fn handle_notification_action(&self, action: NotificationAction) -> PermissionResult<()> {
        self.responder().respond(action)
    }

    /// Responder bound to this manager's state machine
    pub fn responder(&self) -> NotificationResponder {
        NotificationResponder::new(self.machine())
    }

    pub fn flags(&self) -> PermissionResult<PersistedFlags> {
        self.machine().flags()
    }

    pub fn machine(&self) -> &Arc<PermissionStateMachine> {
        self.coordinator.machine()
    }
}

impl std::fmt::Debug for P2pPermissionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("P2pPermissionManager")
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
