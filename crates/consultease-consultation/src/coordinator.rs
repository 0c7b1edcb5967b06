// [crates/consultease-consultation/src/coordinator.rs]
/*!
 * Consultation Coordinator (spec §4.6): submission, desk-unit response
 * handling, and the periodic expiry sweep, all driving the state
 * machine defined in `consultease_domain::ConsultationStatus`.
 */

use crate::errors::ConsultationError;
use crate::message_id::MessageIdGenerator;
use crate::payloads::{CancellationNotification, ConsultationRequestPayload, ResponseKind};
use chrono::{Duration as ChronoDuration, Utc};
use consultease_db::{consultation as consultation_repo, student as student_repo, DbPool};
use consultease_domain::{Consultation, ConsultationSnapshot, ConsultationStatus};
use consultease_mqtt::{MqttTransport, QoS};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

/// Delay before a single retry when a response arrives for a
/// consultation that is not yet visible to this reader (spec §4.6
/// "Routing and correlation").
const UNKNOWN_ID_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default sweep interval and expiry window (spec §4.6, §6 config
/// table defaults); callers may override via `with_*`.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    Applied(ConsultationSnapshot),
    /// The `(message_id, kind)` pair had already been applied; the
    /// returned snapshot reflects the prior application and no
    /// notification was emitted again (spec §8 "Idempotent response").
    AlreadyApplied(ConsultationSnapshot),
    /// No consultation carries this message id, even after the single
    /// retry; the response is dropped, not treated as an error (spec
    /// §4.6).
    UnknownMessageId,
}

pub type ConsultationChangeCallback = Arc<dyn Fn(ConsultationSnapshot) + Send + Sync>;

pub struct ConsultationCoordinator {
    pool: DbPool,
    mqtt: Arc<MqttTransport>,
    message_ids: MessageIdGenerator,
    expiry: ChronoDuration,
    callbacks: RwLock<Vec<ConsultationChangeCallback>>,
}

impl ConsultationCoordinator {
    pub fn new(pool: DbPool, mqtt: Arc<MqttTransport>, process_epoch: u64, expiry: Duration) -> Self {
        Self {
            pool,
            mqtt,
            message_ids: MessageIdGenerator::new(process_epoch),
            expiry: ChronoDuration::from_std(expiry).unwrap_or(ChronoDuration::seconds(300)),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub fn register_callback(&self, callback: ConsultationChangeCallback) {
        self.callbacks.write().push(callback);
    }

    fn broadcast(&self, snapshot: &ConsultationSnapshot) {
        for callback in self.callbacks.read().iter() {
            callback(snapshot.clone());
        }
    }

    /// Creates a PENDING consultation and publishes it to the target
    /// desk unit (spec §4.6 `submit`).
    #[instrument(skip(self, message))]
    pub async fn submit(
        &self,
        student_id: i64,
        faculty_id: i64,
        course_code: &str,
        message: &str,
    ) -> Result<ConsultationSnapshot, ConsultationError> {
        let sanitized = Consultation::sanitize_message(message).map_err(|e| ConsultationError::Validation(e.to_string()))?;
        if course_code.trim().is_empty() {
            return Err(ConsultationError::Validation("course code must not be empty".into()));
        }

        let message_id = self.message_ids.next();
        let course_code = course_code.trim().to_string();

        let student = student_repo::get(&self.pool, student_id).await?;

        let consultation = self
            .pool
            .with_session(move |tx| {
                let (course_code, sanitized, message_id) = (course_code.clone(), sanitized.clone(), message_id.clone());
                async move { consultation_repo::insert_pending_tx(tx, student_id, faculty_id, &course_code, &sanitized, &message_id).await }
            })
            .await?;

        let payload = ConsultationRequestPayload {
            message_id: consultation.message_id.clone(),
            student_name: student.name.clone(),
            course_code: consultation.course_code.clone(),
            request_message: consultation.message.clone(),
            timestamp: consultation.requested_at.to_rfc3339(),
        };

        self.publish_to_desk(faculty_id, &payload)?;

        let snapshot = consultation.to_snapshot();
        self.broadcast(&snapshot);
        Ok(snapshot)
    }

    fn publish_to_desk<T: serde::Serialize>(&self, faculty_id: i64, payload: &T) -> Result<(), ConsultationError> {
        let topic = format!("consultease/faculty/{faculty_id}/requests");
        let bytes = serde_json::to_vec(payload).expect("consultation payloads are always serializable");
        self.mqtt
            .publish(topic, bytes, QoS::AtLeastOnce, false, true)
            .map_err(|e| ConsultationError::Validation(format!("failed to publish consultation request: {e}")))
    }

    /// Processes an `ACKNOWLEDGE`/`BUSY` desk-unit response (spec §4.6
    /// `onResponse`).
    #[instrument(skip(self))]
    pub async fn on_response(&self, message_id: &str, kind: ResponseKind) -> Result<ResponseOutcome, ConsultationError> {
        let mut consultation = match self.lookup_by_message_id(message_id).await? {
            Some(c) => c,
            None => {
                tokio::time::sleep(UNKNOWN_ID_RETRY_DELAY).await;
                match self.lookup_by_message_id(message_id).await? {
                    Some(c) => c,
                    None => {
                        warn!("response for unknown message_id '{message_id}' dropped");
                        return Ok(ResponseOutcome::UnknownMessageId);
                    }
                }
            }
        };

        let target = match kind {
            ResponseKind::Acknowledge => ConsultationStatus::Accepted,
            ResponseKind::Busy => ConsultationStatus::Busy,
        };

        if consultation.status == target {
            // Idempotent replay: same (message_id, kind) already applied.
            return Ok(ResponseOutcome::AlreadyApplied(consultation.to_snapshot()));
        }

        if consultation.status != ConsultationStatus::Pending {
            return Err(ConsultationError::InvalidTransition(format!(
                "consultation id={} is {:?}, cannot apply {:?} response",
                consultation.id, consultation.status, kind
            )));
        }

        let id = consultation.id;
        consultation = self
            .pool
            .with_session(move |tx| async move { consultation_repo::transition_tx(tx, id, ConsultationStatus::Pending, target).await })
            .await?;

        let snapshot = consultation.to_snapshot();
        self.broadcast(&snapshot);
        Ok(ResponseOutcome::Applied(snapshot))
    }

    async fn lookup_by_message_id(&self, message_id: &str) -> Result<Option<Consultation>, ConsultationError> {
        let message_id = message_id.to_string();
        match self
            .pool
            .with_session(move |tx| {
                let message_id = message_id.clone();
                async move { consultation_repo::fetch_by_message_id_tx(tx, &message_id).await }
            })
            .await
        {
            Ok(c) => Ok(Some(c)),
            Err(consultease_db::DbError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves every PENDING consultation older than the expiry window to
    /// EXPIRED and notifies the originating desk unit (spec §4.6
    /// `expireStale`). Returns the number of consultations expired.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<usize, ConsultationError> {
        let cutoff = Utc::now() - self.expiry;
        let stale = consultation_repo::list_stale_pending(&self.pool, cutoff).await?;

        let mut expired_count = 0;
        for stale_consultation in stale {
            let id = stale_consultation.id;
            let faculty_id = stale_consultation.faculty_id;
            let message_id = stale_consultation.message_id.clone();

            let result = self
                .pool
                .with_session(move |tx| async move {
                    consultation_repo::transition_tx(tx, id, ConsultationStatus::Pending, ConsultationStatus::Expired).await
                })
                .await;

            match result {
                Ok(expired) => {
                    expired_count += 1;
                    let snapshot = expired.to_snapshot();
                    self.broadcast(&snapshot);

                    let notification = CancellationNotification {
                        kind: "consultation_expired",
                        message_id: message_id.clone(),
                        reason: "consultation expired before a response was received".to_string(),
                    };
                    if let Err(e) = self.publish_to_desk(faculty_id, &notification) {
                        warn!("failed to publish expiry notification for consultation id={id}: {e}");
                    }
                }
                Err(e) => warn!("failed to expire consultation id={id}: {e}"),
            }
        }

        Ok(expired_count)
    }

    /// Administrative cancellation (spec §4.6 diagram: `cancel`, an
    /// administrator action rather than a desk-unit response).
    #[instrument(skip(self))]
    pub async fn cancel(&self, consultation_id: i64) -> Result<ConsultationSnapshot, ConsultationError> {
        let cancelled = self
            .pool
            .with_session(move |tx| async move {
                consultation_repo::transition_tx(tx, consultation_id, ConsultationStatus::Pending, ConsultationStatus::Cancelled).await
            })
            .await?;

        let snapshot = cancelled.to_snapshot();
        self.broadcast(&snapshot);
        Ok(snapshot)
    }

    /// Marks an ACCEPTED consultation COMPLETED (administrator or desk
    /// unit action once the visit concludes).
    #[instrument(skip(self))]
    pub async fn complete(&self, consultation_id: i64) -> Result<ConsultationSnapshot, ConsultationError> {
        let completed = self
            .pool
            .with_session(move |tx| async move {
                consultation_repo::transition_tx(tx, consultation_id, ConsultationStatus::Accepted, ConsultationStatus::Completed).await
            })
            .await?;

        let snapshot = completed.to_snapshot();
        self.broadcast(&snapshot);
        Ok(snapshot)
    }
}
