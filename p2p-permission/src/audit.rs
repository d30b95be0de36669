//! Audit trail for permission events
//!
//! Provides a trait-based audit system that framework users can customize
//! to record state transitions and consent-flow milestones wherever they like.
//! Audit failures are logged by the callers and never fail a permission operation.

use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

use crate::permission::{FixAction, PermissionState};

/// Audit event representing a permission-related action
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// RFC 3339 timestamp of the event
    pub timestamp: String,
    /// Type of event
    pub event_type: AuditEventType,
    /// Request the event belongs to (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    /// Additional details
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType, details: AuditDetails) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event_type,
            request_id: None,
            details,
        }
    }

    /// Attach the request id
    pub fn with_request(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Type of audit event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Persisted state was written
    StateChanged,
    /// A consent flow was started
    PermissionRequested,
    /// The OS permission prompt was issued
    PromptIssued,
    /// The rationale dialog was shown
    RationaleShown,
    /// The background notification was shown
    NotificationShown,
    /// The session-only advisory was shown
    AdvisoryShown,
    /// A request listener was told the outcome
    RequestResolved,
    /// A request handle was closed by its owner
    RequestClosed,
}

/// Details about the audit event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditDetails {
    StateChange {
        #[serde(skip_serializing_if = "Option::is_none")]
        from: Option<PermissionState>,
        to: PermissionState,
    },
    Request {
        explain: bool,
        interactive: bool,
    },
    Presentation {
        #[serde(skip_serializing_if = "Option::is_none")]
        fix_action: Option<FixAction>,
    },
    Advisory {
        message: String,
    },
    Resolution {
        allowed: bool,
        synchronous: bool,
    },
    Closed,
}

/// Error type for audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize audit event: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Trait for audit event sinks
pub trait AuditSink: Send + Sync {
    /// Record an audit event
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Flush any buffered events
    fn flush(&self) -> Result<(), AuditError>;
}

// ============================================================================
// Default Implementations
// ============================================================================

/// File-based audit sink (JSONL format)
///
/// Writes audit events to a file in JSON Lines format (one JSON object per line).
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Create a new file audit sink
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;
        let mut writer = self.writer.lock().unwrap();
        writeln!(writer, "{}", json)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditSink")
            .field("path", &self.path)
            .finish()
    }
}

/// In-memory audit sink for testing
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    /// Create a new memory sink with default capacity (1000 events)
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a new memory sink with specified capacity
    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::with_capacity(max_events.min(1000))),
            max_events,
        }
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().unwrap().clone()
    }

    /// Get event count
    pub fn count(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Find events by type
    pub fn find_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Find events by request id
    pub fn find_by_request(&self, request_id: u64) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.request_id == Some(request_id))
            .cloned()
            .collect()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut events = self.events.write().unwrap();
        if events.len() >= self.max_events {
            events.remove(0); // FIFO eviction
        }
        events.push(event);
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// Null audit sink (discards all events)
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Create an audit event for a persisted state write
pub fn state_changed(from: Option<PermissionState>, to: PermissionState) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::StateChanged,
        AuditDetails::StateChange { from, to },
    )
}

/// Create an audit event for a new consent flow
pub fn permission_requested(request_id: u64, explain: bool, interactive: bool) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::PermissionRequested,
        AuditDetails::Request {
            explain,
            interactive,
        },
    )
    .with_request(request_id)
}

/// Create an audit event for a prompt, dialog or notification
pub fn presentation_shown(
    request_id: u64,
    event_type: AuditEventType,
    fix_action: Option<FixAction>,
) -> AuditEvent {
    AuditEvent::new(event_type, AuditDetails::Presentation { fix_action }).with_request(request_id)
}

/// Create an audit event for the session-only advisory
pub fn advisory_shown(message: &str) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::AdvisoryShown,
        AuditDetails::Advisory {
            message: message.to_string(),
        },
    )
}

/// Create an audit event for a listener being told the outcome
pub fn request_resolved(request_id: u64, allowed: bool, synchronous: bool) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::RequestResolved,
        AuditDetails::Resolution {
            allowed,
            synchronous,
        },
    )
    .with_request(request_id)
}

/// Create an audit event for a closed request handle
pub fn request_closed(request_id: u64) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestClosed, AuditDetails::Closed).with_request(request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();

        sink.record(permission_requested(7, true, false)).unwrap();
        sink.record(state_changed(None, PermissionState::Allowed))
            .unwrap();

        assert_eq!(sink.count(), 2);
        let events = sink.find_by_type(AuditEventType::PermissionRequested);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].request_id, Some(7));
        assert_eq!(sink.find_by_request(7).len(), 1);
    }

    #[test]
    fn test_memory_sink_eviction() {
        let sink = MemoryAuditSink::with_capacity(2);

        for i in 0..3 {
            sink.record(request_closed(i)).unwrap();
        }

        assert_eq!(sink.count(), 2);
        let events = sink.events();
        assert_eq!(events[0].request_id, Some(1));
        assert_eq!(events[1].request_id, Some(2));
    }

    #[test]
    fn test_null_sink() {
        let sink = NullAuditSink;
        assert!(sink.record(request_closed(1)).is_ok());
        assert!(sink.flush().is_ok());
    }

    #[test]
    fn test_event_serialization() {
        let event = state_changed(
            Some(PermissionState::Denied),
            PermissionState::TemporarilyDisabled,
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"state_changed\""));
        assert!(json.contains("\"from\":\"DENIED\""));
        assert!(json.contains("\"to\":\"TEMPORARILY_DISABLED\""));
        assert!(!json.contains("request_id"));
    }

    #[test]
    fn test_presentation_serialization() {
        let event = presentation_shown(
            3,
            AuditEventType::RationaleShown,
            Some(FixAction::OpenSettings),
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("rationale_shown"));
        assert!(json.contains("open_settings"));
    }

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(request_resolved(1, true, false)).unwrap();
        sink.record(advisory_shown("later")).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("request_resolved"));
    }
}
