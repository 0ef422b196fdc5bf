//! Context store for CourseCraft.
//!
//! Scoped session state with first-class scope rules, an audit trail on
//! every write, and per-session single-writer turn guards. The store is the
//! only place conversational state is mutated; everything above it works on
//! snapshots and staged commits.

pub mod audit;
pub mod courses;
pub mod store;

pub use audit::{Actor, AuditEntry, AuditLog, AuditSink, TracingSink};
pub use courses::CourseCatalog;
pub use store::{SessionSnapshot, SessionStore, TurnGuard, PHASE_KEY};
