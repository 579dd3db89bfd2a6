//! Typed failure taxonomy for guarded mutations.
//!
//! Every variant except `Storage` is a guard or constraint rejection scoped
//! to a single mutation attempt; `Storage` is the only kind a caller may
//! safely retry, since it implies no partial effect could have been
//! committed.

use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

/// Name of the partial unique index that enforces the bed-occupancy
/// invariant (`migrations/`: one active, non-deleted resident per bed).
pub const OCCUPANCY_CONSTRAINT: &str = "resident_active_bed_uq";

#[derive(Debug, PartialEq)]
pub enum MutationError {
    /// A referenced entity (bed, template, resident, ...) does not exist or
    /// is soft-deleted.
    ReferenceNotFound { entity: &'static str, id: Uuid },
    /// A referenced entity belongs to a different residence than the row
    /// being written. Never auto-corrected.
    CrossTenantViolation { entity: &'static str, id: Uuid },
    /// The bed-occupancy uniqueness invariant was violated, typically by a
    /// concurrent writer. The caller must re-decide; the core never retries.
    OccupancyConflict,
    /// The per-kind field-group exclusivity rule for measurements was
    /// violated.
    MalformedMeasurement {
        kind: &'static str,
        field: &'static str,
        problem: &'static str,
    },
    /// A task status index fell outside 1..=6.
    InvalidStatusIndex { index: i16 },
    /// A bounded numeric field fell outside its permitted range.
    ValueOutOfRange { field: &'static str },
    /// A uniqueness rule other than bed occupancy was violated (device MAC,
    /// residence name, bed name within room, tag name).
    DuplicateValue { constraint: String },
    /// The transactional store could not be reached or could not commit for
    /// infrastructural reasons.
    Storage { detail: String },
}

impl MutationError {
    /// Only infrastructure failures are safe to retry; every guard rejection
    /// requires the caller to change its request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MutationError::Storage { .. })
    }
}

impl Display for MutationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::ReferenceNotFound { entity, id } => {
                write!(f, "referenced {} {} not found", entity, id)
            }
            MutationError::CrossTenantViolation { entity, id } => {
                write!(f, "{} {} belongs to a different residence", entity, id)
            }
            MutationError::OccupancyConflict => {
                write!(f, "bed is already occupied by an active resident")
            }
            MutationError::MalformedMeasurement { kind, field, problem } => {
                write!(f, "malformed {} measurement: {} {}", kind, field, problem)
            }
            MutationError::InvalidStatusIndex { index } => {
                write!(f, "selected_status_index must be 1..=6, got {}", index)
            }
            MutationError::ValueOutOfRange { field } => {
                write!(f, "{} is out of range", field)
            }
            MutationError::DuplicateValue { constraint } => {
                write!(f, "unique constraint {} violated", constraint)
            }
            MutationError::Storage { detail } => write!(f, "storage error: {}", detail),
        }
    }
}

impl Error for MutationError {}

impl From<DieselError> for MutationError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                match info.constraint_name() {
                    Some(OCCUPANCY_CONSTRAINT) => MutationError::OccupancyConflict,
                    Some(other) => MutationError::DuplicateValue {
                        constraint: other.to_string(),
                    },
                    None => MutationError::DuplicateValue {
                        constraint: info.message().to_string(),
                    },
                }
            }
            other => MutationError::Storage {
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    struct FakeDbError {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for FakeDbError {
        fn message(&self) -> &str {
            self.message
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn unique_violation(constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(FakeDbError {
                message: "duplicate key value violates unique constraint",
                constraint,
            }),
        )
    }

    #[test]
    fn occupancy_constraint_maps_to_conflict() {
        let err = MutationError::from(unique_violation(Some(OCCUPANCY_CONSTRAINT)));
        assert_eq!(err, MutationError::OccupancyConflict);
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_unique_violations_map_to_duplicate() {
        let err = MutationError::from(unique_violation(Some("device_mac_uq")));
        assert_eq!(
            err,
            MutationError::DuplicateValue {
                constraint: "device_mac_uq".to_string()
            }
        );
    }

    #[test]
    fn infrastructure_errors_are_retryable() {
        let err = MutationError::from(DieselError::BrokenTransactionManager);
        assert!(matches!(err, MutationError::Storage { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn display_names_the_missing_reference() {
        let id = Uuid::nil();
        let err = MutationError::ReferenceNotFound { entity: "bed", id };
        assert_eq!(err.to_string(), format!("referenced bed {} not found", id));
    }
}
