//! History recorder and event ledger.
//!
//! Every guarded mutation of a tracked entity (resident, device, measurement,
//! task application) calls one of the `record_*_change` functions from inside
//! its transaction closure, which appends a full-snapshot history row and a
//! mirroring event row atomically with the mutation itself. Guard-derived
//! events (bed assignment, tag assignment) go to the event log only.
//!
//! Nothing in this module ever updates or deletes a ledger row.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities, ChangeKind};
use crate::models::requests::ActorContext;
use crate::schema;

fn snapshot<T: Serialize>(row: &T) -> Result<serde_json::Value, MutationError> {
    serde_json::to_value(row).map_err(|e| MutationError::Storage {
        detail: format!("snapshot serialization failed: {}", e),
    })
}

/// Event payload mirroring a history row: both snapshots, keyed `old`/`new`.
fn change_meta(
    old_row: &Option<serde_json::Value>,
    new_row: &Option<serde_json::Value>,
) -> serde_json::Value {
    json!({ "old": old_row, "new": new_row })
}

/// Payload for the guard-derived `assign_bed` event. A bed-to-bed transfer
/// produces a single event carrying both ends of the move.
pub(crate) fn bed_assignment_meta(
    old_bed_id: Option<Uuid>,
    new_bed_id: Option<Uuid>,
) -> serde_json::Value {
    json!({ "old_bed_id": old_bed_id, "new_bed_id": new_bed_id })
}

pub fn append_event(conn: &mut PgConnection, row: dbm::NewEventRow) -> Result<(), MutationError> {
    use schema::event_log::dsl as E;

    diesel::insert_into(E::event_log).values(&row).execute(conn)?;
    Ok(())
}

pub fn record_resident_change(
    conn: &mut PgConnection,
    actor: &ActorContext,
    kind: ChangeKind,
    action: &str,
    old: Option<&dbm::Resident>,
    new: Option<&dbm::Resident>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    use schema::resident_history::dsl as H;

    let anchor = new.or(old).ok_or(MutationError::Storage {
        detail: "resident history row without a snapshot".to_string(),
    })?;
    let old_row = old.map(snapshot).transpose()?;
    let new_row = new.map(snapshot).transpose()?;

    diesel::insert_into(H::resident_history)
        .values(&dbm::NewResidentHistoryRow {
            resident_id: anchor.id,
            changed_by: actor.user_id,
            change_kind: kind.as_str().to_string(),
            old_row: old_row.clone(),
            new_row: new_row.clone(),
            changed_at: at,
        })
        .execute(conn)?;

    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(anchor.residence_id),
            entity: entities::RESIDENT.to_string(),
            entity_id: Some(anchor.id),
            action: action.to_string(),
            at,
            meta: Some(change_meta(&old_row, &new_row)),
        },
    )
}

/// Guard-derived event for a changed bed reference. Written alongside (not
/// instead of) the generic history row for the update.
pub fn record_bed_assignment(
    conn: &mut PgConnection,
    actor: &ActorContext,
    resident: &dbm::Resident,
    old_bed_id: Option<Uuid>,
    new_bed_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(resident.residence_id),
            entity: entities::RESIDENT.to_string(),
            entity_id: Some(resident.id),
            action: actions::ASSIGN_BED.to_string(),
            at,
            meta: Some(bed_assignment_meta(old_bed_id, new_bed_id)),
        },
    )
}

/// Event-only recording for entities without a history ledger (structure
/// rows, task templates, tags). The event meta still carries both snapshots,
/// so the facility timeline shows what changed even where no ledger exists.
pub fn record_untracked_change<T: Serialize>(
    conn: &mut PgConnection,
    actor: &ActorContext,
    residence_id: Option<Uuid>,
    entity: &'static str,
    entity_id: Uuid,
    action: &str,
    old: Option<&T>,
    new: Option<&T>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    let old_row = old.map(snapshot).transpose()?;
    let new_row = new.map(snapshot).transpose()?;

    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id,
            entity: entity.to_string(),
            entity_id: Some(entity_id),
            action: action.to_string(),
            at,
            meta: Some(change_meta(&old_row, &new_row)),
        },
    )
}

/// Guard-derived event for a tag being attached to or detached from a
/// resident. The join row itself carries no history.
pub fn record_tag_assignment(
    conn: &mut PgConnection,
    actor: &ActorContext,
    resident: &dbm::Resident,
    tag_id: Uuid,
    action: &str,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(resident.residence_id),
            entity: entities::RESIDENT_TAG.to_string(),
            entity_id: Some(resident.id),
            action: action.to_string(),
            at,
            meta: Some(json!({ "resident_id": resident.id, "tag_id": tag_id })),
        },
    )
}

pub fn record_device_change(
    conn: &mut PgConnection,
    actor: &ActorContext,
    kind: ChangeKind,
    action: &str,
    old: Option<&dbm::Device>,
    new: Option<&dbm::Device>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    use schema::device_history::dsl as H;

    let anchor = new.or(old).ok_or(MutationError::Storage {
        detail: "device history row without a snapshot".to_string(),
    })?;
    let old_row = old.map(snapshot).transpose()?;
    let new_row = new.map(snapshot).transpose()?;

    diesel::insert_into(H::device_history)
        .values(&dbm::NewDeviceHistoryRow {
            device_id: anchor.id,
            changed_by: actor.user_id,
            change_kind: kind.as_str().to_string(),
            old_row: old_row.clone(),
            new_row: new_row.clone(),
            changed_at: at,
        })
        .execute(conn)?;

    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(anchor.residence_id),
            entity: entities::DEVICE.to_string(),
            entity_id: Some(anchor.id),
            action: action.to_string(),
            at,
            meta: Some(change_meta(&old_row, &new_row)),
        },
    )
}

pub fn record_measurement_change(
    conn: &mut PgConnection,
    actor: &ActorContext,
    kind: ChangeKind,
    action: &str,
    old: Option<&dbm::Measurement>,
    new: Option<&dbm::Measurement>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    use schema::measurement_history::dsl as H;

    let anchor = new.or(old).ok_or(MutationError::Storage {
        detail: "measurement history row without a snapshot".to_string(),
    })?;
    let old_row = old.map(snapshot).transpose()?;
    let new_row = new.map(snapshot).transpose()?;

    diesel::insert_into(H::measurement_history)
        .values(&dbm::NewMeasurementHistoryRow {
            measurement_id: anchor.id,
            changed_by: actor.user_id,
            change_kind: kind.as_str().to_string(),
            old_row: old_row.clone(),
            new_row: new_row.clone(),
            changed_at: at,
        })
        .execute(conn)?;

    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(anchor.residence_id),
            entity: entities::MEASUREMENT.to_string(),
            entity_id: Some(anchor.id),
            action: action.to_string(),
            at,
            meta: Some(change_meta(&old_row, &new_row)),
        },
    )
}

pub fn record_task_application_change(
    conn: &mut PgConnection,
    actor: &ActorContext,
    kind: ChangeKind,
    action: &str,
    old: Option<&dbm::TaskApplication>,
    new: Option<&dbm::TaskApplication>,
    at: DateTime<Utc>,
) -> Result<(), MutationError> {
    use schema::task_application_history::dsl as H;

    let anchor = new.or(old).ok_or(MutationError::Storage {
        detail: "task application history row without a snapshot".to_string(),
    })?;
    let old_row = old.map(snapshot).transpose()?;
    let new_row = new.map(snapshot).transpose()?;

    diesel::insert_into(H::task_application_history)
        .values(&dbm::NewTaskApplicationHistoryRow {
            task_application_id: anchor.id,
            changed_by: actor.user_id,
            change_kind: kind.as_str().to_string(),
            old_row: old_row.clone(),
            new_row: new_row.clone(),
            changed_at: at,
        })
        .execute(conn)?;

    append_event(
        conn,
        dbm::NewEventRow {
            actor_user_id: actor.user_id,
            residence_id: Some(anchor.residence_id),
            entity: entities::TASK_APPLICATION.to_string(),
            entity_id: Some(anchor.id),
            action: action.to_string(),
            at,
            meta: Some(change_meta(&old_row, &new_row)),
        },
    )
}

// ---------------------------------------------------------------------------
// Read surfaces for reporting collaborators. History is returned oldest
// first (the sequence id is the total order); events newest first.
// ---------------------------------------------------------------------------

pub fn resident_history(
    conn: &mut PgConnection,
    resident_id: Uuid,
) -> Result<Vec<dbm::ResidentHistoryRow>, MutationError> {
    use schema::resident_history::dsl as H;

    H::resident_history
        .filter(H::resident_id.eq(resident_id))
        .order(H::id.asc())
        .select(dbm::ResidentHistoryRow::as_select())
        .load(conn)
        .map_err(Into::into)
}

pub fn device_history(
    conn: &mut PgConnection,
    device_id: Uuid,
) -> Result<Vec<dbm::DeviceHistoryRow>, MutationError> {
    use schema::device_history::dsl as H;

    H::device_history
        .filter(H::device_id.eq(device_id))
        .order(H::id.asc())
        .select(dbm::DeviceHistoryRow::as_select())
        .load(conn)
        .map_err(Into::into)
}

pub fn measurement_history(
    conn: &mut PgConnection,
    measurement_id: Uuid,
) -> Result<Vec<dbm::MeasurementHistoryRow>, MutationError> {
    use schema::measurement_history::dsl as H;

    H::measurement_history
        .filter(H::measurement_id.eq(measurement_id))
        .order(H::id.asc())
        .select(dbm::MeasurementHistoryRow::as_select())
        .load(conn)
        .map_err(Into::into)
}

pub fn task_application_history(
    conn: &mut PgConnection,
    task_application_id: Uuid,
) -> Result<Vec<dbm::TaskApplicationHistoryRow>, MutationError> {
    use schema::task_application_history::dsl as H;

    H::task_application_history
        .filter(H::task_application_id.eq(task_application_id))
        .order(H::id.asc())
        .select(dbm::TaskApplicationHistoryRow::as_select())
        .load(conn)
        .map_err(Into::into)
}

/// Facility timeline: events for one residence, newest first, optionally
/// bounded below by `since`.
pub fn events_for_residence(
    conn: &mut PgConnection,
    residence_id: Uuid,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<dbm::EventRow>, MutationError> {
    use schema::event_log::dsl as E;

    let mut query = E::event_log
        .filter(E::residence_id.eq(residence_id))
        .into_boxed();
    if let Some(t) = since {
        query = query.filter(E::at.ge(t));
    }
    query
        .order((E::at.desc(), E::id.desc()))
        .limit(limit)
        .select(dbm::EventRow::as_select())
        .load(conn)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_meta_pairs_old_and_new() {
        let old_row = Some(json!({"status": "active"}));
        let new_row = Some(json!({"status": "discharged"}));
        let meta = change_meta(&old_row, &new_row);
        assert_eq!(meta["old"]["status"], "active");
        assert_eq!(meta["new"]["status"], "discharged");
    }

    #[test]
    fn create_meta_has_null_old_side() {
        let new_row = Some(json!({"id": 1}));
        let meta = change_meta(&None, &new_row);
        assert!(meta["old"].is_null());
        assert_eq!(meta["new"]["id"], 1);
    }

    #[test]
    fn bed_assignment_meta_carries_both_ends() {
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let meta = bed_assignment_meta(Some(b1), Some(b2));
        assert_eq!(meta["old_bed_id"], json!(b1));
        assert_eq!(meta["new_bed_id"], json!(b2));

        let cleared = bed_assignment_meta(Some(b1), None);
        assert!(cleared["new_bed_id"].is_null());
    }
}
