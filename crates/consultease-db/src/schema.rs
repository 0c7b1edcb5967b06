// [crates/consultease-db/src/schema.rs]
/*!
 * Sovereign schema for the single relational store backing ConsultEase
 * (spec §6 "Persisted state"). Every statement is idempotent
 * (`CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS`) so
 * applying it against an already-migrated database is a no-op.
 */

use libsql::Connection;
use tracing::{debug, info, instrument};

const TABLES: &[(&str, &str)] = &[
    ("faculty", r#"
        CREATE TABLE IF NOT EXISTS faculty (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            email TEXT,
            beacon_mac TEXT UNIQUE,
            always_available INTEGER NOT NULL DEFAULT 0,
            present INTEGER NOT NULL DEFAULT 0,
            last_seen DATETIME,
            ntp_sync_status TEXT NOT NULL DEFAULT 'PENDING',
            in_grace_period INTEGER NOT NULL DEFAULT 0,
            version INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("student", r#"
        CREATE TABLE IF NOT EXISTS student (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            rfid_uid TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL
        );
    "#),
    ("consultation", r#"
        CREATE TABLE IF NOT EXISTS consultation (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES student(id),
            faculty_id INTEGER NOT NULL REFERENCES faculty(id),
            course_code TEXT NOT NULL,
            message TEXT NOT NULL,
            requested_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            accepted_at DATETIME,
            completed_at DATETIME,
            status TEXT NOT NULL DEFAULT 'PENDING',
            message_id TEXT NOT NULL UNIQUE
        );
    "#),
    ("admin", r#"
        CREATE TABLE IF NOT EXISTS admin (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL
        );
    "#),
];

// Required indexes (spec §6 "Persisted state").
const INDEXES: &[(&str, &str)] = &[
    ("idx_student_rfid_uid", "CREATE UNIQUE INDEX IF NOT EXISTS idx_student_rfid_uid ON student(rfid_uid);"),
    ("idx_faculty_beacon_mac", "CREATE UNIQUE INDEX IF NOT EXISTS idx_faculty_beacon_mac ON faculty(beacon_mac);"),
    ("idx_consultation_student_status", "CREATE INDEX IF NOT EXISTS idx_consultation_student_status ON consultation(student_id, status);"),
    ("idx_consultation_faculty_requested", "CREATE INDEX IF NOT EXISTS idx_consultation_faculty_requested ON consultation(faculty_id, requested_at);"),
    ("idx_faculty_mac_present", "CREATE INDEX IF NOT EXISTS idx_faculty_mac_present ON faculty(beacon_mac, present);"),
    ("idx_faculty_version", "CREATE INDEX IF NOT EXISTS idx_faculty_version ON faculty(version);"),
];

/// Applies the full schema (tables then indexes) against a live
/// connection. Safe to call on every startup.
#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<(), libsql::Error> {
    for (name, statement) in TABLES {
        connection.execute(statement, ()).await?;
        debug!("schema: ensured table '{name}'");
    }
    for (name, statement) in INDEXES {
        connection.execute(statement, ()).await?;
        debug!("schema: ensured index '{name}'");
    }
    info!("schema: {} tables, {} indexes up to date", TABLES.len(), INDEXES.len());
    Ok(())
}
