// [crates/consultease-domain/src/admin.rs]
use serde::{Deserialize, Serialize};

/// An administrator account. Used only to authorize administrative
/// mutations (faculty/student CRUD, consultation cancellation); the
/// coordination core does not implement authentication itself (spec §1
/// Out-of-scope).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub credential_hash: String,
}
