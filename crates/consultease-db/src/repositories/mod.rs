// [crates/consultease-db/src/repositories/mod.rs]
pub mod admin;
pub mod consultation;
pub mod faculty;
pub mod student;
