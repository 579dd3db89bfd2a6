//! Tags and their assignment to residents.
//!
//! The tag catalogue is global (not per-residence); assignments are plain
//! join rows with no soft-delete of their own. Attaching and detaching are
//! the only guard-derived events besides bed assignment.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities};
use crate::models::requests::{ActorContext, TagCreate};
use crate::schema;
use crate::services::audit;
use crate::services::residents;

pub fn find_tag(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Tag, MutationError> {
    use schema::tag::dsl as T;

    T::tag
        .filter(T::id.eq(id).and(T::deleted_at.is_null()))
        .select(dbm::Tag::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::TAG,
            id,
        })
}

pub fn create_tag(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: TagCreate,
) -> Result<dbm::Tag, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();

        let id = Uuid::new_v4();
        let new_row = dbm::NewTag {
            id,
            name: req.name,
            created_by: actor.user_id,
        };

        use schema::tag::dsl as T;
        diesel::insert_into(T::tag).values(&new_row).execute(conn)?;

        let created = find_tag(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            None,
            entities::TAG,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

/// Renaming into a name already taken by another tag trips the unique index
/// and surfaces as [`MutationError::DuplicateValue`].
pub fn rename_tag(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    name: String,
) -> Result<dbm::Tag, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_tag(conn, id)?;

        use schema::tag::dsl as T;
        diesel::update(T::tag.filter(T::id.eq(id)))
            .set((T::name.eq(name), T::updated_at.eq(now)))
            .execute(conn)?;

        let updated = find_tag(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            None,
            entities::TAG,
            id,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

/// Soft-deleting a tag hides it from the catalogue and from per-resident
/// listings; existing join rows stay until explicitly unassigned.
pub fn soft_delete_tag(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::Tag, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_tag(conn, id)?;

        use schema::tag::dsl as T;
        diesel::update(T::tag.filter(T::id.eq(id)))
            .set((T::deleted_at.eq(Some(now)), T::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = T::tag
            .filter(T::id.eq(id))
            .select(dbm::Tag::as_select())
            .first(conn)?;
        audit::record_untracked_change(
            conn,
            actor,
            None,
            entities::TAG,
            id,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

/// Attach a tag to a resident. Re-attaching an already-attached tag is a
/// duplicate key on the join table and surfaces as
/// [`MutationError::DuplicateValue`].
pub fn assign_tag(
    conn: &mut PgConnection,
    actor: &ActorContext,
    resident_id: Uuid,
    tag_id: Uuid,
) -> Result<dbm::ResidentTag, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let resident = residents::find_resident(conn, resident_id)?;
        find_tag(conn, tag_id)?;

        let new_row = dbm::NewResidentTag {
            resident_id,
            tag_id,
            assigned_by: actor.user_id,
            assigned_at: now,
        };

        use schema::resident_tag::dsl as RT;
        diesel::insert_into(RT::resident_tag).values(&new_row).execute(conn)?;

        let assigned = RT::resident_tag
            .filter(RT::resident_id.eq(resident_id).and(RT::tag_id.eq(tag_id)))
            .select(dbm::ResidentTag::as_select())
            .first(conn)?;

        audit::record_tag_assignment(conn, actor, &resident, tag_id, actions::ASSIGN_TAG, now)?;

        Ok(assigned)
    })
}

/// Detach a tag from a resident. The join row is removed outright; detaching
/// a tag that is not attached is reported as a missing reference.
pub fn unassign_tag(
    conn: &mut PgConnection,
    actor: &ActorContext,
    resident_id: Uuid,
    tag_id: Uuid,
) -> Result<(), MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let resident = residents::find_resident(conn, resident_id)?;

        use schema::resident_tag::dsl as RT;
        let removed = diesel::delete(
            RT::resident_tag.filter(RT::resident_id.eq(resident_id).and(RT::tag_id.eq(tag_id))),
        )
        .execute(conn)?;
        if removed == 0 {
            return Err(MutationError::ReferenceNotFound {
                entity: entities::RESIDENT_TAG,
                id: tag_id,
            });
        }

        audit::record_tag_assignment(conn, actor, &resident, tag_id, actions::UNASSIGN_TAG, now)?;

        Ok(())
    })
}

pub fn tags_for_resident(
    conn: &mut PgConnection,
    resident_id: Uuid,
) -> Result<Vec<dbm::Tag>, MutationError> {
    use schema::resident_tag::dsl as RT;
    use schema::tag::dsl as T;

    RT::resident_tag
        .inner_join(T::tag)
        .filter(RT::resident_id.eq(resident_id).and(T::deleted_at.is_null()))
        .order(T::name.asc())
        .select(dbm::Tag::as_select())
        .load(conn)
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_tag(deleted_at: Option<chrono::DateTime<Utc>>) -> dbm::Tag {
        dbm::Tag {
            id: Uuid::nil(),
            name: "diabetic".into(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at,
        }
    }

    #[test]
    fn soft_delete_timestamp_lands_in_snapshots() {
        let now = Utc::now();
        let snapshot = serde_json::to_value(sample_tag(Some(now))).unwrap();
        assert!(!snapshot["deleted_at"].is_null());
        assert_eq!(snapshot["name"], "diabetic");
    }

    #[test]
    fn live_tag_snapshot_has_null_delete_marker() {
        let snapshot = serde_json::to_value(sample_tag(None)).unwrap();
        assert!(snapshot["deleted_at"].is_null());
    }
}
