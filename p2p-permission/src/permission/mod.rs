//! Wi-Fi Direct (P2P) permission management
//!
//! Tracks whether the user has allowed P2P discovery, persists that decision,
//! reconciles it against the live OS grant, and runs the consent flow when a
//! feature needs the permission.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         P2pPermissionManager                          │
//! │  ┌──────────────────────────────┐  ┌────────────────────────────────┐ │
//! │  │  PermissionRequestCoordinator│─►│     PermissionStateMachine     │ │
//! │  │                              │  │                                │ │
//! │  │ - rationale / prompt         │  │ - get_state (reconciles)       │ │
//! │  │ - notification               │  │ - set_state / reset            │ │
//! │  │ - single-shot listeners      │  │ - apply_permission_change      │ │
//! │  └──────────────────────────────┘  └────────────────────────────────┘ │
//! │  ┌─────────────┐ ┌─────────────┐ ┌──────────────────┐ ┌────────────┐ │
//! │  │    Store    │ │   Oracle    │ │    Presenters    │ │   Audit    │ │
//! │  │ - File      │ │ - Static    │ │ - Interactive    │ │ - File     │ │
//! │  │ - Memory    │ │ - Fn() bool │ │ - Notification   │ │ - Memory   │ │
//! │  │ - ReadOnly  │ │             │ │ - Advisory       │ │ - Null     │ │
//! │  └─────────────┘ └─────────────┘ └──────────────────┘ └────────────┘ │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # States
//!
//! | State | Terminal | Meaning |
//! |-------|----------|---------|
//! | `DENIED` | No | Not granted; the user may still be asked |
//! | `TEMPORARILY_DISABLED` | Yes | Declined for this session |
//! | `DISABLED` | Yes | Declined permanently; never overridden by the OS grant |
//! | `ALLOWED` | Yes | Granted |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use p2p_permission::permission::{
//!     P2pPermissionManager, PermissionPresets, PresentationContext,
//! };
//!
//! let config = PermissionPresets::file_backed("myapp", || os_permission_granted())?;
//! let manager = P2pPermissionManager::from_config(config);
//!
//! let request = manager.request(true, &PresentationContext::Background, |allowed: bool| {
//!     println!("P2P allowed: {allowed}");
//! })?;
//!
//! // Later, when the caller no longer cares
//! request.close();
//! ```

pub mod coordinator;
pub mod error;
pub mod machine;
pub mod manager;
pub mod oracle;
pub mod presenter;
pub mod presets;
pub mod state;
pub mod store;

// Re-exports for convenience
pub use coordinator::{
    NotificationResponder, PermissionListener, PermissionRequest, PermissionRequestCoordinator,
    PresentationContext,
};
pub use error::{PermissionError, PermissionResult};
pub use machine::{PermissionStateMachine, PersistedFlags, RATIONALE_KEY, STATE_KEY};
pub use manager::P2pPermissionManager;
pub use oracle::{PermissionOracle, StaticOracle};
pub use presenter::{
    AdvisoryPresenter, FixAction, FixCallback, InteractivePrompt, NotificationAction,
    NotificationPresenter, NullAdvisoryPresenter, NullNotificationPresenter,
    PermissionNotification, RationaleDialog,
};
pub use presenter::{
    PromptEvent, RecordingAdvisoryPresenter, RecordingNotificationPresenter, RecordingPrompt,
};
pub use presets::{
    PermissionConfig, PermissionConfigBuilder, PermissionMessages, PermissionPresets, PresetError,
};
pub use state::PermissionState;
pub use store::{
    ChangeCallback, ChangeListeners, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore,
    ReadOnlyPreferenceStore, StoreError, SubscriptionId,
};
