// [crates/consultease-db/src/repositories/admin.rs]
//! Administrator accessors. The coordination core never authenticates an
//! admin itself (spec §1 Out-of-scope); this repository only persists
//! the account rows that an external auth collaborator looks up.

use crate::errors::DbError;
use crate::pool::DbPool;
use consultease_domain::Admin;
use libsql::{params, Row};

fn row_to_admin(row: Row) -> Result<Admin, DbError> {
    Ok(Admin {
        id: row.get(0).map_err(DbError::Query)?,
        username: row.get(1).map_err(DbError::Query)?,
        credential_hash: row.get(2).map_err(DbError::Query)?,
    })
}

pub async fn find_by_username(pool: &DbPool, username: &str) -> Result<Admin, DbError> {
    let username = username.to_string();
    pool.with_session(move |tx| {
        let username = username.clone();
        async move {
            let mut rows = tx
                .query("SELECT id, username, credential_hash FROM admin WHERE username = ?1", params![username.clone()])
                .await
                .map_err(DbError::Query)?;
            match rows.next().await.map_err(DbError::Query)? {
                Some(row) => row_to_admin(row),
                None => Err(DbError::NotFound(format!("admin username={username}"))),
            }
        }
    })
    .await
}

pub async fn create(pool: &DbPool, username: &str, credential_hash: &str) -> Result<Admin, DbError> {
    let username = username.to_string();
    let credential_hash = credential_hash.to_string();
    pool.with_session(move |tx| {
        let (username, credential_hash) = (username.clone(), credential_hash.clone());
        async move {
            tx.execute(
                "INSERT INTO admin (username, credential_hash) VALUES (?1, ?2)",
                params![username.clone(), credential_hash],
            )
            .await
            .map_err(|e| match e {
                libsql::Error::SqliteFailure(code, _) if code == 2067 || code == 1555 => {
                    DbError::Constraint(format!("admin username '{username}' already exists"))
                }
                other => DbError::Query(other),
            })?;

            let mut rows = tx
                .query("SELECT id, username, credential_hash FROM admin WHERE username = ?1", params![username])
                .await
                .map_err(DbError::Query)?;
            let row = rows.next().await.map_err(DbError::Query)?.expect("row just written");
            row_to_admin(row)
        }
    })
    .await
}
