//! Configuration bundles for the permission manager
//!
//! Provides ready-to-use configurations that framework users can use
//! directly or as starting points for customization.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::oracle::{PermissionOracle, StaticOracle};
use super::presenter::{
    AdvisoryPresenter, NotificationPresenter, NullAdvisoryPresenter, NullNotificationPresenter,
};
use super::store::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
use crate::audit::{AuditSink, FileAuditSink, MemoryAuditSink, NullAuditSink};

/// User-visible text used by dialogs, notifications and advisories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionMessages {
    /// Explanation shown in the rationale dialog and the session-only advisory
    pub rationale: String,
    /// Notification title
    pub notification_title: String,
    /// Notification body
    pub notification_body: String,
    /// Label of the fix button / action
    pub fix_label: String,
    /// Label of the disable action
    pub disable_label: String,
}

impl Default for PermissionMessages {
    fn default() -> Self {
        Self {
            rationale: "Wi-Fi Direct printing needs permission to find nearby devices. \
                        Without it, only printers on your network are shown."
                .into(),
            notification_title: "Connections".into(),
            notification_body: "Wi-Fi Direct printers can't be found without \
                                permission to access nearby devices."
                .into(),
            fix_label: "Fix".into(),
            disable_label: "Disable Wi-Fi Direct".into(),
        }
    }
}

impl PermissionMessages {
    /// Load messages from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PresetError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| PresetError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }
}

/// Complete permission configuration bundle
pub struct PermissionConfig {
    /// Persisted state storage
    pub store: Arc<dyn PreferenceStore>,
    /// Live OS grant status
    pub oracle: Arc<dyn PermissionOracle>,
    /// Background notification surface
    pub notifier: Arc<dyn NotificationPresenter>,
    /// Session-only advisory surface
    pub advisory: Arc<dyn AdvisoryPresenter>,
    /// Audit sink
    pub audit: Arc<dyn AuditSink>,
    /// User-visible text
    pub messages: PermissionMessages,
}

impl std::fmt::Debug for PermissionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionConfig")
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

/// Builder for permission configurations
pub struct PermissionConfigBuilder {
    store: Option<Arc<dyn PreferenceStore>>,
    oracle: Option<Arc<dyn PermissionOracle>>,
    notifier: Option<Arc<dyn NotificationPresenter>>,
    advisory: Option<Arc<dyn AdvisoryPresenter>>,
    audit: Option<Arc<dyn AuditSink>>,
    messages: PermissionMessages,
    app_name: Option<String>,
}

impl PermissionConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            store: None,
            oracle: None,
            notifier: None,
            advisory: None,
            audit: None,
            messages: PermissionMessages::default(),
            app_name: None,
        }
    }

    /// Set the application name (used for the default store path)
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the preference store
    pub fn store(mut self, store: impl PreferenceStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set an already shared preference store
    pub fn shared_store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the permission oracle
    pub fn oracle(mut self, oracle: impl PermissionOracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    /// Set an already shared permission oracle
    pub fn shared_oracle(mut self, oracle: Arc<dyn PermissionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the notification presenter
    pub fn notifier(mut self, notifier: impl NotificationPresenter + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    /// Set an already shared notification presenter
    pub fn shared_notifier(mut self, notifier: Arc<dyn NotificationPresenter>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the advisory presenter
    pub fn advisory(mut self, advisory: impl AdvisoryPresenter + 'static) -> Self {
        self.advisory = Some(Arc::new(advisory));
        self
    }

    /// Set an already shared advisory presenter
    pub fn shared_advisory(mut self, advisory: Arc<dyn AdvisoryPresenter>) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Set the audit sink
    pub fn audit(mut self, audit: impl AuditSink + 'static) -> Self {
        self.audit = Some(Arc::new(audit));
        self
    }

    /// Set an already shared audit sink
    pub fn shared_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Set user-visible text
    pub fn messages(mut self, messages: PermissionMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PermissionConfig, PresetError> {
        let oracle = self
            .oracle
            .ok_or_else(|| PresetError::InvalidConfig("a permission oracle is required".into()))?;

        let app_name = self.app_name.as_deref().unwrap_or("p2p-permission");

        let store: Arc<dyn PreferenceStore> = match self.store {
            Some(s) => s,
            None => {
                let store = FilePreferenceStore::default_for_app(app_name)
                    .map_err(|e| PresetError::StoreInit(e.to_string()))?;
                Arc::new(store)
            }
        };

        Ok(PermissionConfig {
            store,
            oracle,
            notifier: self
                .notifier
                .unwrap_or_else(|| Arc::new(NullNotificationPresenter)),
            advisory: self
                .advisory
                .unwrap_or_else(|| Arc::new(NullAdvisoryPresenter)),
            audit: self.audit.unwrap_or_else(|| Arc::new(NullAuditSink)),
            messages: self.messages,
        })
    }
}

impl Default for PermissionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for preset initialization
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Failed to initialize store: {0}")]
    StoreInit(String),

    #[error("Failed to initialize audit: {0}")]
    AuditInit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// Preset Configurations
// ============================================================================

/// Preset configurations for common use cases
pub struct PermissionPresets;

impl PermissionPresets {
    /// File-backed configuration for an application
    ///
    /// - File-based preference store, watched for writes from other processes
    /// - File-based audit log next to it
    /// - Null presenters (replace with real UI surfaces)
    pub fn file_backed(
        app_name: &str,
        oracle: impl PermissionOracle + 'static,
    ) -> Result<PermissionConfig, PresetError> {
        let store_path = FilePreferenceStore::default_path(app_name);
        Self::file_backed_at(store_path, oracle)
    }

    /// File-backed configuration with an explicit store location
    pub fn file_backed_at(
        store_path: impl Into<PathBuf>,
        oracle: impl PermissionOracle + 'static,
    ) -> Result<PermissionConfig, PresetError> {
        let store_path = store_path.into();

        let store = FilePreferenceStore::new(&store_path)
            .map_err(|e| PresetError::StoreInit(e.to_string()))?;
        store
            .watch()
            .map_err(|e| PresetError::StoreInit(e.to_string()))?;

        let audit = FileAuditSink::new(store_path.with_file_name("p2p_permission_audit.jsonl"))
            .map_err(|e| PresetError::AuditInit(e.to_string()))?;

        Ok(PermissionConfig {
            store: Arc::new(store),
            oracle: Arc::new(oracle),
            notifier: Arc::new(NullNotificationPresenter),
            advisory: Arc::new(NullAdvisoryPresenter),
            audit: Arc::new(audit),
            messages: PermissionMessages::default(),
        })
    }

    /// Testing mode (in-memory, no persistence)
    ///
    /// - In-memory storage
    /// - Oracle reporting not granted
    /// - Null presenters
    /// - Memory-based audit
    pub fn testing() -> PermissionConfig {
        PermissionConfig {
            store: Arc::new(MemoryPreferenceStore::new()),
            oracle: Arc::new(StaticOracle::denied()),
            notifier: Arc::new(NullNotificationPresenter),
            advisory: Arc::new(NullAdvisoryPresenter),
            audit: Arc::new(MemoryAuditSink::new()),
            messages: PermissionMessages::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = PermissionConfigBuilder::new()
            .app_name("test-app")
            .store(MemoryPreferenceStore::new())
            .oracle(StaticOracle::granted())
            .audit(NullAuditSink)
            .build()
            .unwrap();

        assert!(config.oracle.is_granted());
        assert_eq!(config.messages, PermissionMessages::default());
    }

    #[test]
    fn test_builder_requires_oracle() {
        let result = PermissionConfigBuilder::new()
            .store(MemoryPreferenceStore::new())
            .build();
        assert!(matches!(result, Err(PresetError::InvalidConfig(_))));
    }

    #[test]
    fn test_testing_preset() {
        let config = PermissionPresets::testing();
        assert!(!config.oracle.is_granted());
        assert!(config.store.get("state").unwrap().is_none());
    }

    #[test]
    fn test_file_backed_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app").join("p2p_permission.json");

        let config = PermissionPresets::file_backed_at(&path, StaticOracle::denied()).unwrap();
        config.store.set("state", "DISABLED").unwrap();

        assert!(path.exists());
        assert!(dir
            .path()
            .join("app")
            .join("p2p_permission_audit.jsonl")
            .exists());
    }

    #[test]
    fn test_messages_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, r#"{"fix_label": "Repair"}"#).unwrap();

        let messages = PermissionMessages::from_json_file(&path).unwrap();
        assert_eq!(messages.fix_label, "Repair");
        assert_eq!(
            messages.disable_label,
            PermissionMessages::default().disable_label
        );
    }
}
