// [crates/consultease-db/src/repositories/student.rs]
use crate::errors::DbError;
use crate::pool::DbPool;
use consultease_domain::Student;
use libsql::{params, Row, Transaction};
use tracing::instrument;

fn row_to_student(row: Row) -> Result<Student, DbError> {
    Ok(Student {
        id: row.get(0).map_err(DbError::Query)?,
        name: row.get(1).map_err(DbError::Query)?,
        rfid_uid: row.get(2).map_err(DbError::Query)?,
        department: row.get(3).map_err(DbError::Query)?,
    })
}

const SELECT_COLUMNS: &str = "id, name, rfid_uid, department";

#[instrument(skip(tx))]
pub async fn fetch_by_id_tx(tx: &Transaction, id: i64) -> Result<Student, DbError> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM student WHERE id = ?1");
    let mut rows = tx.query(&sql, params![id]).await.map_err(DbError::Query)?;
    match rows.next().await.map_err(DbError::Query)? {
        Some(row) => row_to_student(row),
        None => Err(DbError::NotFound(format!("student id={id}"))),
    }
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Student, DbError> {
    pool.with_session(|tx| async move { fetch_by_id_tx(tx, id).await }).await
}

/// Creates or updates a student keyed by RFID UID (administrator action,
/// spec §3). The UID is validated and normalized before the write.
pub async fn upsert(pool: &DbPool, name: &str, rfid_uid: &str, department: &str) -> Result<Student, DbError> {
    let normalized_uid = Student::validate_rfid_uid(rfid_uid).map_err(|e| DbError::Constraint(e.to_string()))?;
    let name = name.to_string();
    let department = department.to_string();

    pool.with_session(move |tx| {
        let (name, normalized_uid, department) = (name.clone(), normalized_uid.clone(), department.clone());
        async move {
            tx.execute(
                "INSERT INTO student (name, rfid_uid, department) VALUES (?1, ?2, ?3)
                 ON CONFLICT(rfid_uid) DO UPDATE SET name = excluded.name, department = excluded.department",
                params![name, normalized_uid.clone(), department],
            )
            .await
            .map_err(DbError::Query)?;

            let mut rows = tx
                .query("SELECT id, name, rfid_uid, department FROM student WHERE rfid_uid = ?1", params![normalized_uid])
                .await
                .map_err(DbError::Query)?;
            let row = rows.next().await.map_err(DbError::Query)?.expect("row just written");
            row_to_student(row)
        }
    })
    .await
}

pub async fn list(pool: &DbPool, department: Option<&str>) -> Result<Vec<Student>, DbError> {
    let department = department.map(str::to_string);
    pool.with_session(move |tx| {
        let department = department.clone();
        async move {
            let mut rows = tx
                .query(
                    "SELECT id, name, rfid_uid, department FROM student WHERE ?1 IS NULL OR department = ?1 ORDER BY name",
                    params![department],
                )
                .await
                .map_err(DbError::Query)?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await.map_err(DbError::Query)? {
                out.push(row_to_student(row)?);
            }
            Ok(out)
        }
    })
    .await
}
