// [crates/consultease-db/src/repositories/consultation.rs]
/*!
 * Consultation repository. State transitions are enforced twice: once in
 * `consultease_domain::ConsultationStatus::validate_transition` (so a
 * caller is rejected before any I/O happens) and once more in the SQL
 * `WHERE status = ?` guard below (so a concurrent writer cannot race the
 * same row into an illegal state between the read and the write, spec §3
 * Invariant 2).
 */

use crate::errors::DbError;
use crate::pool::DbPool;
use chrono::Utc;
use consultease_domain::{Consultation, ConsultationStatus};
use libsql::{params, Row, Transaction};
use tracing::instrument;

fn status_to_str(status: ConsultationStatus) -> &'static str {
    match status {
        ConsultationStatus::Pending => "PENDING",
        ConsultationStatus::Accepted => "ACCEPTED",
        ConsultationStatus::Busy => "BUSY",
        ConsultationStatus::Completed => "COMPLETED",
        ConsultationStatus::Cancelled => "CANCELLED",
        ConsultationStatus::Expired => "EXPIRED",
    }
}

fn status_from_str(raw: &str) -> ConsultationStatus {
    match raw {
        "ACCEPTED" => ConsultationStatus::Accepted,
        "BUSY" => ConsultationStatus::Busy,
        "COMPLETED" => ConsultationStatus::Completed,
        "CANCELLED" => ConsultationStatus::Cancelled,
        "EXPIRED" => ConsultationStatus::Expired,
        _ => ConsultationStatus::Pending,
    }
}

const SELECT_COLUMNS: &str =
    "id, student_id, faculty_id, course_code, message, requested_at, accepted_at, completed_at, status, message_id";

fn row_to_consultation(row: Row) -> Result<Consultation, DbError> {
    let requested_raw: String = row.get(5).map_err(DbError::Query)?;
    let accepted_raw: Option<String> = row.get(6).map_err(DbError::Query)?;
    let completed_raw: Option<String> = row.get(7).map_err(DbError::Query)?;
    let status_raw: String = row.get(8).map_err(DbError::Query)?;

    Ok(Consultation {
        id: row.get(0).map_err(DbError::Query)?,
        student_id: row.get(1).map_err(DbError::Query)?,
        faculty_id: row.get(2).map_err(DbError::Query)?,
        course_code: row.get(3).map_err(DbError::Query)?,
        message: row.get(4).map_err(DbError::Query)?,
        requested_at: parse_rfc3339(&requested_raw),
        accepted_at: accepted_raw.as_deref().map(parse_rfc3339),
        completed_at: completed_raw.as_deref().map(parse_rfc3339),
        status: status_from_str(&status_raw),
        message_id: row.get(9).map_err(DbError::Query)?,
    })
}

fn parse_rfc3339(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[instrument(skip(tx))]
pub async fn fetch_by_id_tx(tx: &Transaction, id: i64) -> Result<Consultation, DbError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM consultation WHERE id = ?1");
    let mut rows = tx.query(&sql, params![id]).await.map_err(DbError::Query)?;
    match rows.next().await.map_err(DbError::Query)? {
        Some(row) => row_to_consultation(row),
        None => Err(DbError::NotFound(format!("consultation id={id}"))),
    }
}

#[instrument(skip(tx))]
pub async fn fetch_by_message_id_tx(tx: &Transaction, message_id: &str) -> Result<Consultation, DbError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM consultation WHERE message_id = ?1");
    let mut rows = tx.query(&sql, params![message_id]).await.map_err(DbError::Query)?;
    match rows.next().await.map_err(DbError::Query)? {
        Some(row) => row_to_consultation(row),
        None => Err(DbError::NotFound(format!("consultation message_id={message_id}"))),
    }
}

#[instrument(skip(tx, message, message_id))]
pub async fn insert_pending_tx(
    tx: &Transaction,
    student_id: i64,
    faculty_id: i64,
    course_code: &str,
    message: &str,
    message_id: &str,
) -> Result<Consultation, DbError> {
    tx.execute(
        "INSERT INTO consultation (student_id, faculty_id, course_code, message, status, message_id)
         VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
        params![student_id, faculty_id, course_code, message, message_id],
    )
    .await
    .map_err(DbError::Query)?;

    let mut rows = tx.query("SELECT last_insert_rowid()", ()).await.map_err(DbError::Query)?;
    let new_id: i64 = rows.next().await.map_err(DbError::Query)?.expect("insert produced a rowid").get(0).map_err(DbError::Query)?;
    fetch_by_id_tx(tx, new_id).await
}

/// Transitions a consultation, guarding in SQL against a status that has
/// already moved on. Returns `InvalidTransition` if the row is no longer
/// in the state the caller expected.
#[instrument(skip(tx))]
pub async fn transition_tx(
    tx: &Transaction,
    id: i64,
    from: ConsultationStatus,
    to: ConsultationStatus,
) -> Result<Consultation, DbError> {
    from.validate_transition(to).map_err(|e| DbError::Constraint(e.to_string()))?;

    let now = Utc::now().to_rfc3339();
    let (accepted_clause, completed_clause): (Option<String>, Option<String>) = match to {
        ConsultationStatus::Accepted => (Some(now.clone()), None),
        ConsultationStatus::Completed => (None, Some(now.clone())),
        _ => (None, None),
    };

    let sql = "
        UPDATE consultation
        SET status = ?1,
            accepted_at = COALESCE(?2, accepted_at),
            completed_at = COALESCE(?3, completed_at)
        WHERE id = ?4 AND status = ?5
    ";

    let affected = tx
        .execute(sql, params![status_to_str(to), accepted_clause, completed_clause, id, status_to_str(from)])
        .await
        .map_err(DbError::Query)?;

    if affected == 0 {
        return Err(DbError::Constraint(format!(
            "consultation id={id} was not in status {from:?} at transition time"
        )));
    }

    fetch_by_id_tx(tx, id).await
}

/// Finds PENDING consultations requested before `cutoff`, for the expiry
/// sweep (spec §4.6 `expireStale`).
pub async fn list_stale_pending(pool: &DbPool, cutoff: chrono::DateTime<Utc>) -> Result<Vec<Consultation>, DbError> {
    let cutoff_str = cutoff.to_rfc3339();
    pool.with_session(move |tx| {
        let cutoff_str = cutoff_str.clone();
        async move {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM consultation WHERE status = 'PENDING' AND requested_at <= ?1");
            let mut rows = tx.query(&sql, params![cutoff_str]).await.map_err(DbError::Query)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await.map_err(DbError::Query)? {
                out.push(row_to_consultation(row)?);
            }
            Ok(out)
        }
    })
    .await
}

pub async fn list_for_faculty(pool: &DbPool, faculty_id: i64) -> Result<Vec<Consultation>, DbError> {
    pool.with_session(move |tx| async move {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM consultation WHERE faculty_id = ?1 ORDER BY requested_at DESC");
        let mut rows = tx.query(&sql, params![faculty_id]).await.map_err(DbError::Query)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(DbError::Query)? {
            out.push(row_to_consultation(row)?);
        }
        Ok(out)
    })
    .await
}
