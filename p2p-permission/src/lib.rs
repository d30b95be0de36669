//! p2p-permission: Wi-Fi Direct permission state and consent flows
//!
//! This crate persists the user's P2P permission decision and drives the
//! prompt, rationale and notification flows that obtain it.

pub mod audit;
pub mod permission;

pub use audit::{AuditEvent, AuditEventType, AuditSink, FileAuditSink, MemoryAuditSink};
pub use permission::{
    P2pPermissionManager, PermissionError, PermissionRequest, PermissionResult, PermissionState,
    PresentationContext,
};
