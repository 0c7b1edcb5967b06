// [apps/consultease-daemon/src/handlers.rs]
//! Bridges inbound MQTT topics to the Presence Engine and Consultation
//! Coordinator (spec §4.4, §6 "MQTT wire protocol"). These are the
//! only crate in the workspace that know both the wire payload shapes
//! and the domain operations they trigger.

use async_trait::async_trait;
use consultease_consultation::{ConsultationCoordinator, ResponsePayload};
use consultease_domain::NtpSyncStatus;
use consultease_presence::PresenceEngine;
use consultease_router::{MatchedMessage, RouteHandler, RouterError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

fn required_param(message: &MatchedMessage, name: &str) -> Result<i64, RouterError> {
    message
        .param(name)
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| RouterError::MalformedPayload(format!("missing or non-numeric path parameter '{name}'")))
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    present: bool,
    #[serde(default)]
    ntp_sync_status: Option<NtpSyncStatus>,
    #[serde(default)]
    in_grace_period: bool,
}

pub struct FacultyStatusHandler {
    presence: Arc<PresenceEngine>,
}

impl FacultyStatusHandler {
    pub fn new(presence: Arc<PresenceEngine>) -> Self {
        Self { presence }
    }
}

#[async_trait]
impl RouteHandler for FacultyStatusHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let faculty_id = required_param(&message, "id")?;
        let json = message.json.as_ref().ok_or_else(|| RouterError::MalformedPayload("status route requires JSON".into()))?;
        let payload: StatusPayload = serde_json::from_value(json.clone())
            .map_err(|e| RouterError::MalformedPayload(format!("status payload: {e}")))?;

        let result = if let Some(ntp) = payload.ntp_sync_status {
            self.presence.handle_grace_and_ntp(faculty_id, payload.present, payload.in_grace_period, ntp, "mqtt").await
        } else {
            self.presence.handle_status_update(faculty_id, payload.present, "mqtt").await
        };

        if let Err(err) = result {
            warn!("faculty status update for id={faculty_id} failed: {err}");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MacStatusPayload {
    status: String,
    mac: String,
}

pub struct FacultyMacStatusHandler {
    presence: Arc<PresenceEngine>,
}

impl FacultyMacStatusHandler {
    pub fn new(presence: Arc<PresenceEngine>) -> Self {
        Self { presence }
    }
}

#[async_trait]
impl RouteHandler for FacultyMacStatusHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let faculty_id = required_param(&message, "id")?;
        let json = message.json.as_ref().ok_or_else(|| RouterError::MalformedPayload("mac_status route requires JSON".into()))?;
        let payload: MacStatusPayload = serde_json::from_value(json.clone())
            .map_err(|e| RouterError::MalformedPayload(format!("mac_status payload: {e}")))?;

        let present = match payload.status.as_str() {
            "faculty_present" => true,
            "faculty_absent" => false,
            other => {
                warn!("unrecognized mac_status value '{other}' for faculty id={faculty_id}");
                return Ok(());
            }
        };

        if let Err(err) = self.presence.handle_mac_status(faculty_id, &payload.mac, present).await {
            warn!("mac status update for id={faculty_id} failed: {err}");
        }
        Ok(())
    }
}

pub struct FacultyHeartbeatHandler {
    presence: Arc<PresenceEngine>,
}

#[derive(Debug, Deserialize)]
struct HeartbeatPayload {
    #[serde(default)]
    ntp_sync_status: Option<NtpSyncStatus>,
}

impl FacultyHeartbeatHandler {
    pub fn new(presence: Arc<PresenceEngine>) -> Self {
        Self { presence }
    }
}

#[async_trait]
impl RouteHandler for FacultyHeartbeatHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let faculty_id = required_param(&message, "id")?;
        let json = message.json.as_ref().ok_or_else(|| RouterError::MalformedPayload("heartbeat route requires JSON".into()))?;
        let payload: HeartbeatPayload = serde_json::from_value(json.clone())
            .map_err(|e| RouterError::MalformedPayload(format!("heartbeat payload: {e}")))?;

        // A heartbeat implies presence; it does not change grace-period
        // state on its own, only NTP sync status when reported.
        if let Some(ntp) = payload.ntp_sync_status {
            if let Err(err) = self.presence.handle_grace_and_ntp(faculty_id, true, false, ntp, "heartbeat").await {
                warn!("heartbeat-driven presence update for id={faculty_id} failed: {err}");
            }
        }
        Ok(())
    }
}

pub struct FacultyResponseHandler {
    consultation: Arc<ConsultationCoordinator>,
}

impl FacultyResponseHandler {
    pub fn new(consultation: Arc<ConsultationCoordinator>) -> Self {
        Self { consultation }
    }
}

#[async_trait]
impl RouteHandler for FacultyResponseHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let json = message.json.as_ref().ok_or_else(|| RouterError::MalformedPayload("responses route requires JSON".into()))?;
        let payload: ResponsePayload =
            serde_json::from_value(json.clone()).map_err(|e| RouterError::MalformedPayload(format!("response payload: {e}")))?;

        if let Err(err) = self.consultation.on_response(&payload.message_id, payload.response_type).await {
            warn!("consultation response for message_id='{}' failed: {err}", payload.message_id);
        }
        Ok(())
    }
}

/// Bridges the legacy `professor/status` plain-string topic, which
/// carries no faculty id, to a single configured faculty (spec §6:
/// "maps to present=true/false for the subscriber's inferred faculty
/// id" — legacy desk units predate multi-faculty deployments and were
/// wired one-per-broker, so the id must come from configuration rather
/// than the payload).
pub struct LegacyStatusHandler {
    presence: Arc<PresenceEngine>,
    legacy_faculty_id: Option<i64>,
}

impl LegacyStatusHandler {
    pub fn new(presence: Arc<PresenceEngine>, legacy_faculty_id: Option<i64>) -> Self {
        Self { presence, legacy_faculty_id }
    }
}

#[async_trait]
impl RouteHandler for LegacyStatusHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let Some(faculty_id) = self.legacy_faculty_id else {
            warn!("legacy professor/status message dropped: no legacy faculty id configured");
            return Ok(());
        };

        let body = String::from_utf8_lossy(&message.payload);
        let present = match body.trim() {
            "keychain_connected" => true,
            "keychain_disconnected" => false,
            other => {
                warn!("unrecognized legacy status value '{other}'");
                return Ok(());
            }
        };

        if let Err(err) = self.presence.handle_status_update(faculty_id, present, "legacy-mqtt").await {
            warn!("legacy status update for id={faculty_id} failed: {err}");
        }
        Ok(())
    }
}

/// Bridges the legacy `professor/messages` topic to the same response
/// handling as [`FacultyResponseHandler`], for desk units still
/// publishing under the old topic name during migration.
pub struct LegacyMessagesHandler {
    consultation: Arc<ConsultationCoordinator>,
}

impl LegacyMessagesHandler {
    pub fn new(consultation: Arc<ConsultationCoordinator>) -> Self {
        Self { consultation }
    }
}

#[async_trait]
impl RouteHandler for LegacyMessagesHandler {
    async fn handle(&self, message: MatchedMessage) -> Result<(), RouterError> {
        let payload: ResponsePayload = match serde_json::from_slice(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("malformed legacy professor/messages payload: {e}");
                return Ok(());
            }
        };

        if let Err(err) = self.consultation.on_response(&payload.message_id, payload.response_type).await {
            warn!("legacy consultation response for message_id='{}' failed: {err}", payload.message_id);
        }
        Ok(())
    }
}
