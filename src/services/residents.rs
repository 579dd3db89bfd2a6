//! Guarded mutation pipeline for residents.
//!
//! Residents carry the two invariants that make this core interesting: a bed
//! reference is only permitted while the resident is active, and a bed may
//! host at most one active, non-deleted resident at a time. The first is an
//! auto-correcting guard ([`apply_status_rules`]); the second is decided by
//! the `resident_active_bed_uq` partial unique index at commit time, so two
//! concurrent writers racing for a bed cannot both win. The loser surfaces
//! [`MutationError::OccupancyConflict`] and must re-decide; nothing here
//! retries on its behalf.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use log::debug;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities, ChangeKind, ResidentStatus};
use crate::models::requests::{ActorContext, ResidentCreate, ResidentPatch};
use crate::schema;
use crate::services::audit;
use crate::services::guards;

/// Status side-effect guard. A resident leaving the `active` status loses
/// their bed unconditionally and is stamped with `status_changed_at` and the
/// soft-delete marker where those are still unset. Caller-supplied values
/// for the forced fields are overridden, never trusted.
fn apply_status_rules(
    status: ResidentStatus,
    bed_id: &mut Option<Uuid>,
    status_changed_at: &mut Option<DateTime<Utc>>,
    deleted_at: &mut Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) {
    if status == ResidentStatus::Active {
        return;
    }
    *bed_id = None;
    if status_changed_at.is_none() {
        *status_changed_at = Some(now);
    }
    if deleted_at.is_none() {
        *deleted_at = Some(now);
    }
}

fn fetch_resident(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Resident, MutationError> {
    use schema::resident::dsl as R;

    R::resident
        .filter(R::id.eq(id))
        .select(dbm::Resident::as_select())
        .first(conn)
        .map_err(Into::into)
}

/// Live-row lookup used by the update pipeline and by callers that resolve a
/// resident reference. Soft-deleted rows are not reachable here.
pub fn find_resident(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Resident, MutationError> {
    use schema::resident::dsl as R;

    R::resident
        .filter(R::id.eq(id).and(R::deleted_at.is_null()))
        .select(dbm::Resident::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::RESIDENT,
            id,
        })
}

pub fn create_resident(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: ResidentCreate,
) -> Result<dbm::Resident, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let status = req.status.unwrap_or(ResidentStatus::Active);

        let mut bed_id = req.bed_id;
        let mut status_changed_at = None;
        let mut deleted_at = None;
        apply_status_rules(status, &mut bed_id, &mut status_changed_at, &mut deleted_at, now);

        guards::load_residence(conn, req.residence_id)?;
        if let Some(bed) = bed_id {
            guards::load_bed_in_residence(conn, bed, req.residence_id)?;
        }

        let id = Uuid::new_v4();
        let new_row = dbm::NewResident {
            id,
            residence_id: req.residence_id,
            full_name: req.full_name,
            birth_date: req.birth_date,
            sex: req.sex,
            comments: req.comments,
            status: status.as_str().to_string(),
            status_changed_at,
            bed_id,
            created_by: actor.user_id,
            deleted_at,
        };

        use schema::resident::dsl as R;
        diesel::insert_into(R::resident).values(&new_row).execute(conn)?;

        let created = fetch_resident(conn, id)?;
        audit::record_resident_change(
            conn,
            actor,
            ChangeKind::Create,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        debug!("resident {} created in residence {}", id, created.residence_id);
        Ok(created)
    })
}

pub fn update_resident(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: ResidentPatch,
) -> Result<dbm::Resident, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_resident(conn, id)?;

        let current_status =
            ResidentStatus::parse(&current.status).ok_or_else(|| MutationError::Storage {
                detail: format!("resident {} has invalid stored status {}", id, current.status),
            })?;

        let full_name = patch.full_name.unwrap_or_else(|| current.full_name.clone());
        let birth_date = patch.birth_date.unwrap_or(current.birth_date);
        let sex = patch.sex.unwrap_or_else(|| current.sex.clone());
        let comments = patch.comments.unwrap_or_else(|| current.comments.clone());
        let status = patch.status.unwrap_or(current_status);
        let mut bed_id = patch.bed_id.unwrap_or(current.bed_id);
        let mut status_changed_at = current.status_changed_at;
        let mut deleted_at = current.deleted_at;

        apply_status_rules(status, &mut bed_id, &mut status_changed_at, &mut deleted_at, now);

        if let Some(bed) = bed_id {
            guards::load_bed_in_residence(conn, bed, current.residence_id)?;
        }

        use schema::resident::dsl as R;
        diesel::update(R::resident.filter(R::id.eq(id)))
            .set((
                R::full_name.eq(full_name),
                R::birth_date.eq(birth_date),
                R::sex.eq(sex),
                R::comments.eq(comments),
                R::status.eq(status.as_str()),
                R::status_changed_at.eq(status_changed_at),
                R::bed_id.eq(bed_id),
                R::updated_at.eq(now),
                R::deleted_at.eq(deleted_at),
            ))
            .execute(conn)?;

        let updated = fetch_resident(conn, id)?;
        audit::record_resident_change(
            conn,
            actor,
            ChangeKind::Update,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;
        if current.bed_id != updated.bed_id {
            audit::record_bed_assignment(conn, actor, &updated, current.bed_id, updated.bed_id, now)?;
        }

        Ok(updated)
    })
}

/// Move a resident to `new_bed_id` (or clear the assignment with `None`).
/// A bed-to-bed transfer is one mutation and one `assign_bed` event.
pub fn change_bed(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    new_bed_id: Option<Uuid>,
) -> Result<dbm::Resident, MutationError> {
    update_resident(conn, actor, id, ResidentPatch::bed_change(new_bed_id))
}

/// Soft delete. The row is retained and recorded in history as an update;
/// the event log carries the caller-meaningful `delete` action. Freeing the
/// bed is implicit: the occupancy index only counts non-deleted rows.
pub fn soft_delete_resident(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::Resident, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_resident(conn, id)?;

        use schema::resident::dsl as R;
        diesel::update(R::resident.filter(R::id.eq(id)))
            .set((R::deleted_at.eq(Some(now)), R::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = fetch_resident(conn, id)?;
        audit::record_resident_change(
            conn,
            actor,
            ChangeKind::Update,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn discharge_forces_bed_null_and_stamps_timestamps() {
        let now = fixed_now();
        let mut bed_id = Some(Uuid::new_v4());
        let mut status_changed_at = None;
        let mut deleted_at = None;

        apply_status_rules(
            ResidentStatus::Discharged,
            &mut bed_id,
            &mut status_changed_at,
            &mut deleted_at,
            now,
        );

        assert_eq!(bed_id, None);
        assert_eq!(status_changed_at, Some(now));
        assert_eq!(deleted_at, Some(now));
    }

    #[test]
    fn deceased_is_treated_like_discharged() {
        let now = fixed_now();
        let mut bed_id = Some(Uuid::new_v4());
        let mut status_changed_at = None;
        let mut deleted_at = None;

        apply_status_rules(
            ResidentStatus::Deceased,
            &mut bed_id,
            &mut status_changed_at,
            &mut deleted_at,
            now,
        );

        assert_eq!(bed_id, None);
        assert!(status_changed_at.is_some());
        assert!(deleted_at.is_some());
    }

    #[test]
    fn active_status_leaves_fields_alone() {
        let now = fixed_now();
        let bed = Some(Uuid::new_v4());
        let mut bed_id = bed;
        let mut status_changed_at = None;
        let mut deleted_at = None;

        apply_status_rules(
            ResidentStatus::Active,
            &mut bed_id,
            &mut status_changed_at,
            &mut deleted_at,
            now,
        );

        assert_eq!(bed_id, bed);
        assert_eq!(status_changed_at, None);
        assert_eq!(deleted_at, None);
    }

    #[test]
    fn existing_timestamps_are_not_overwritten() {
        let earlier = Utc.with_ymd_and_hms(2025, 12, 1, 8, 0, 0).unwrap();
        let now = fixed_now();
        let mut bed_id = None;
        let mut status_changed_at = Some(earlier);
        let mut deleted_at = Some(earlier);

        apply_status_rules(
            ResidentStatus::Discharged,
            &mut bed_id,
            &mut status_changed_at,
            &mut deleted_at,
            now,
        );

        assert_eq!(status_changed_at, Some(earlier));
        assert_eq!(deleted_at, Some(earlier));
    }

    #[test]
    fn bed_change_patch_touches_only_the_bed() {
        let bed = Uuid::new_v4();
        let patch = ResidentPatch::bed_change(Some(bed));
        assert_eq!(patch.bed_id, Some(Some(bed)));
        assert!(patch.full_name.is_none());
        assert!(patch.status.is_none());
        assert!(patch.sex.is_none());
    }
}
