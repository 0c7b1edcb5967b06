// [crates/consultease-db/src/repositories/faculty.rs]
/*!
 * Faculty repository. Every method either takes a `&Transaction` (for
 * callers, like the Presence Engine, that need to compose a read and a
 * write atomically) or drives its own session through a `&DbPool` for
 * simple single-step CRUD. All reads return [`FacultySnapshot`] plain
 * values; nothing here leaks a `Connection` or `Transaction` to the
 * caller (spec §3 Invariant 5).
 */

use crate::errors::DbError;
use crate::pool::DbPool;
use consultease_domain::{Faculty, FacultySnapshot, NormalizedMac, NtpSyncStatus};
use libsql::{params, Row, Transaction};
use tracing::instrument;

fn row_to_faculty(row: Row) -> Result<Faculty, DbError> {
    let beacon_mac: Option<String> = row.get(4).map_err(DbError::Query)?;
    let ntp_raw: String = row.get(8).map_err(DbError::Query)?;
    let last_seen_raw: Option<String> = row.get(7).map_err(DbError::Query)?;

    Ok(Faculty {
        id: row.get(0).map_err(DbError::Query)?,
        name: row.get(1).map_err(DbError::Query)?,
        department: row.get(2).map_err(DbError::Query)?,
        email: row.get(3).map_err(DbError::Query)?,
        beacon_mac: beacon_mac
            .map(|raw| NormalizedMac::parse(&raw))
            .transpose()
            .map_err(|e| DbError::Constraint(e.to_string()))?,
        always_available: row.get::<i64>(5).map_err(DbError::Query)? != 0,
        present: row.get::<i64>(6).map_err(DbError::Query)? != 0,
        last_seen: last_seen_raw.and_then(|raw| {
            chrono::DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        }),
        ntp_sync_status: match ntp_raw.as_str() {
            "SYNCED" => NtpSyncStatus::Synced,
            "FAILED" => NtpSyncStatus::Failed,
            _ => NtpSyncStatus::Pending,
        },
        in_grace_period: row.get::<i64>(9).map_err(DbError::Query)? != 0,
        version: row.get(10).map_err(DbError::Query)?,
    })
}

const SELECT_COLUMNS: &str = "id, name, department, email, beacon_mac, always_available, present, last_seen, ntp_sync_status, in_grace_period, version";

/// Fetches a faculty row for update within an already-open transaction.
/// Returns `NotFound` if the id does not exist.
#[instrument(skip(tx))]
pub async fn fetch_for_update_tx(tx: &Transaction, id: i64) -> Result<Faculty, DbError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM faculty WHERE id = ?1");
    let mut rows = tx.query(&sql, params![id]).await.map_err(DbError::Query)?;
    match rows.next().await.map_err(DbError::Query)? {
        Some(row) => row_to_faculty(row),
        None => Err(DbError::NotFound(format!("faculty id={id}"))),
    }
}

/// Applies a presence update with an optimistic-concurrency guard: the
/// `WHERE version = ?` clause ensures this write only lands if no other
/// committed transaction has advanced the row since it was read inside
/// this same session (spec §3 Invariant 1, §9 "persistent version
/// column" resolution of the Open Question).
#[allow(clippy::too_many_arguments)]
#[instrument(skip(tx))]
pub async fn apply_presence_update_tx(
    tx: &Transaction,
    id: i64,
    expected_version: i64,
    present: bool,
    last_seen: chrono::DateTime<chrono::Utc>,
    ntp_sync_status: Option<NtpSyncStatus>,
    in_grace_period: Option<bool>,
) -> Result<Faculty, DbError> {
    let ntp_clause = ntp_sync_status.map(ntp_to_str);
    let sql = "
        UPDATE faculty
        SET present = ?1,
            last_seen = ?2,
            version = version + 1,
            ntp_sync_status = COALESCE(?3, ntp_sync_status),
            in_grace_period = COALESCE(?4, in_grace_period)
        WHERE id = ?5 AND version = ?6
    ";

    let affected = tx
        .execute(
            sql,
            params![
                present as i64,
                last_seen.to_rfc3339(),
                ntp_clause,
                in_grace_period.map(|b| b as i64),
                id,
                expected_version
            ],
        )
        .await
        .map_err(DbError::Query)?;

    if affected == 0 {
        return Err(DbError::Conflict { entity: "faculty", id });
    }

    fetch_for_update_tx(tx, id).await
}

/// Reconciles the stored beacon MAC when a desk unit reports a different
/// one than the row currently holds (spec §4.5 `handleMacStatus`).
#[instrument(skip(tx))]
pub async fn reconcile_beacon_mac_tx(tx: &Transaction, id: i64, mac: &NormalizedMac) -> Result<(), DbError> {
    tx.execute(
        "UPDATE faculty SET beacon_mac = ?1 WHERE id = ?2",
        params![mac.as_str(), id],
    )
    .await
    .map_err(|e| match e {
        libsql::Error::SqliteFailure(code, _) if code == 2067 || code == 1555 => {
            DbError::Constraint(format!("beacon MAC {mac} is already assigned to another faculty"))
        }
        other => DbError::Query(other),
    })?;
    Ok(())
}

fn ntp_to_str(status: NtpSyncStatus) -> &'static str {
    match status {
        NtpSyncStatus::Synced => "SYNCED",
        NtpSyncStatus::Pending => "PENDING",
        NtpSyncStatus::Failed => "FAILED",
    }
}

/// Single-faculty lookup through its own session (read path used by
/// handlers that are not otherwise inside a transaction).
pub async fn get(pool: &DbPool, id: i64) -> Result<FacultySnapshot, DbError> {
    pool.with_session(|tx| async move { fetch_for_update_tx(tx, id).await.map(|f| f.to_snapshot()) })
        .await
}

#[derive(Debug, Default, Clone)]
pub struct FacultyFilter {
    pub department: Option<String>,
    pub present_only: bool,
}

pub async fn list(pool: &DbPool, filter: FacultyFilter) -> Result<Vec<FacultySnapshot>, DbError> {
    pool.with_session(move |tx| {
        let filter = filter.clone();
        async move {
            let sql = format!("SELECT {SELECT_COLUMNS} FROM faculty WHERE (?1 IS NULL OR department = ?1) AND (?2 = 0 OR present = 1) ORDER BY name");
            let mut rows = tx
                .query(&sql, params![filter.department.clone(), filter.present_only as i64])
                .await
                .map_err(DbError::Query)?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().await.map_err(DbError::Query)? {
                out.push(row_to_faculty(row)?.to_snapshot());
            }
            Ok(out)
        }
    })
    .await
}

pub async fn create(
    pool: &DbPool,
    name: &str,
    department: &str,
    email: Option<&str>,
    beacon_mac: Option<&NormalizedMac>,
    always_available: bool,
) -> Result<FacultySnapshot, DbError> {
    consultease_domain::Faculty::validate_new(name, department)
        .map_err(|e| DbError::Constraint(e.to_string()))?;

    let name = name.to_string();
    let department = department.to_string();
    let email = email.map(str::to_string);
    let beacon_mac = beacon_mac.cloned();

    pool.with_session(move |tx| {
        let (name, department, email, beacon_mac) = (name.clone(), department.clone(), email.clone(), beacon_mac.clone());
        async move {
            tx.execute(
                "INSERT INTO faculty (name, department, email, beacon_mac, always_available, present, ntp_sync_status, in_grace_period, version) VALUES (?1, ?2, ?3, ?4, ?5, 0, 'PENDING', 0, 0)",
                params![name, department, email, beacon_mac.as_ref().map(|m| m.as_str().to_string()), always_available as i64],
            )
            .await
            .map_err(|e| match e {
                libsql::Error::SqliteFailure(code, _) if code == 2067 || code == 1555 => {
                    DbError::Constraint("beacon MAC is already assigned to another faculty".into())
                }
                other => DbError::Query(other),
            })?;

            let mut rows = tx.query("SELECT last_insert_rowid()", ()).await.map_err(DbError::Query)?;
            let new_id: i64 = rows.next().await.map_err(DbError::Query)?.expect("insert produced a rowid").get(0).map_err(DbError::Query)?;

            fetch_for_update_tx(tx, new_id).await.map(|f| f.to_snapshot())
        }
    })
    .await
}

pub async fn delete(pool: &DbPool, id: i64) -> Result<(), DbError> {
    pool.with_session(move |tx| async move {
        let affected = tx
            .execute("DELETE FROM faculty WHERE id = ?1", params![id])
            .await
            .map_err(DbError::Query)?;
        if affected == 0 {
            return Err(DbError::NotFound(format!("faculty id={id}")));
        }
        Ok(())
    })
    .await
}
