//! Core domain types: lease identifiers, records, roles, audit entries.

pub mod audit;
pub mod error;
pub mod filter;
pub mod id;
pub mod record;
pub mod role;

pub use audit::{AuditAction, AuditEntry};
pub use error::{AuditError, ManagerError, ManagerResult, StoreError, ValidationError};
pub use filter::LeaseFilter;
pub use id::LeaseId;
pub use record::{LeaseRecord, LeaseState};
pub use role::AccessRole;
