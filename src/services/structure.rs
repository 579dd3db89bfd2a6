//! Facility structure: residences, floors, rooms, and beds.
//!
//! Structure rows are slow-moving reference data. They carry the same
//! soft-delete and timestamp discipline as tracked entities and are
//! event-logged, but keep no per-entity history ledger. Name collisions
//! (residence names globally, bed names within a room) are decided by unique
//! indexes and surface as [`MutationError::DuplicateValue`].

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities};
use crate::models::requests::{
    ActorContext, BedCreate, FloorCreate, ResidenceCreate, ResidencePatch, RoomCreate,
};
use crate::schema;
use crate::services::audit;
use crate::services::guards;

pub fn create_residence(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: ResidenceCreate,
) -> Result<dbm::Residence, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();

        let id = Uuid::new_v4();
        let new_row = dbm::NewResidence {
            id,
            name: req.name,
            address: req.address,
            phone_encrypted: req.phone_encrypted,
            email_encrypted: req.email_encrypted,
            created_by: actor.user_id,
        };

        use schema::residence::dsl as R;
        diesel::insert_into(R::residence).values(&new_row).execute(conn)?;

        let created = guards::load_residence(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(id),
            entities::RESIDENCE,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

pub fn update_residence(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: ResidencePatch,
) -> Result<dbm::Residence, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_residence(conn, id)?;

        let name = patch.name.unwrap_or_else(|| current.name.clone());
        let address = patch.address.unwrap_or_else(|| current.address.clone());
        let phone_encrypted = patch
            .phone_encrypted
            .unwrap_or_else(|| current.phone_encrypted.clone());
        let email_encrypted = patch
            .email_encrypted
            .unwrap_or_else(|| current.email_encrypted.clone());

        use schema::residence::dsl as R;
        diesel::update(R::residence.filter(R::id.eq(id)))
            .set((
                R::name.eq(name),
                R::address.eq(address),
                R::phone_encrypted.eq(phone_encrypted),
                R::email_encrypted.eq(email_encrypted),
                R::updated_at.eq(now),
            ))
            .execute(conn)?;

        let updated = guards::load_residence(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(id),
            entities::RESIDENCE,
            id,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

/// Soft-deleting a residence hides the tenancy root; owned floors, rooms,
/// beds, and residents are left in place, but every scoped pipeline loads the
/// residence first, so mutations under a deleted residence are rejected.
pub fn soft_delete_residence(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::Residence, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_residence(conn, id)?;

        use schema::residence::dsl as R;
        diesel::update(R::residence.filter(R::id.eq(id)))
            .set((R::deleted_at.eq(Some(now)), R::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = R::residence
            .filter(R::id.eq(id))
            .select(dbm::Residence::as_select())
            .first(conn)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(id),
            entities::RESIDENCE,
            id,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

pub fn create_floor(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: FloorCreate,
) -> Result<dbm::Floor, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        guards::load_residence(conn, req.residence_id)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewFloor {
            id,
            residence_id: req.residence_id,
            name: req.name,
            created_by: actor.user_id,
        };

        use schema::floor::dsl as F;
        diesel::insert_into(F::floor).values(&new_row).execute(conn)?;

        let created = guards::load_floor_in_residence(conn, id, req.residence_id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(req.residence_id),
            entities::FLOOR,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

/// The room's floor must live in the same residence as the room itself.
pub fn create_room(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: RoomCreate,
) -> Result<dbm::Room, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        guards::load_residence(conn, req.residence_id)?;
        guards::load_floor_in_residence(conn, req.floor_id, req.residence_id)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewRoom {
            id,
            residence_id: req.residence_id,
            floor_id: req.floor_id,
            name: req.name,
            created_by: actor.user_id,
        };

        use schema::room::dsl as R;
        diesel::insert_into(R::room).values(&new_row).execute(conn)?;

        let created = guards::load_room_in_residence(conn, id, req.residence_id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(req.residence_id),
            entities::ROOM,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

pub fn rename_floor(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    residence_id: Uuid,
    name: String,
) -> Result<dbm::Floor, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_floor_in_residence(conn, id, residence_id)?;

        use schema::floor::dsl as F;
        diesel::update(F::floor.filter(F::id.eq(id)))
            .set((F::name.eq(name), F::updated_at.eq(now)))
            .execute(conn)?;

        let updated = guards::load_floor_in_residence(conn, id, residence_id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(residence_id),
            entities::FLOOR,
            id,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

pub fn soft_delete_floor(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Floor, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_floor_in_residence(conn, id, residence_id)?;

        use schema::floor::dsl as F;
        diesel::update(F::floor.filter(F::id.eq(id)))
            .set((F::deleted_at.eq(Some(now)), F::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = F::floor
            .filter(F::id.eq(id))
            .select(dbm::Floor::as_select())
            .first(conn)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(residence_id),
            entities::FLOOR,
            id,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

pub fn rename_room(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    residence_id: Uuid,
    name: String,
) -> Result<dbm::Room, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_room_in_residence(conn, id, residence_id)?;

        use schema::room::dsl as R;
        diesel::update(R::room.filter(R::id.eq(id)))
            .set((R::name.eq(name), R::updated_at.eq(now)))
            .execute(conn)?;

        let updated = guards::load_room_in_residence(conn, id, residence_id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(residence_id),
            entities::ROOM,
            id,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

pub fn soft_delete_room(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Room, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_room_in_residence(conn, id, residence_id)?;

        use schema::room::dsl as R;
        diesel::update(R::room.filter(R::id.eq(id)))
            .set((R::deleted_at.eq(Some(now)), R::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = R::room
            .filter(R::id.eq(id))
            .select(dbm::Room::as_select())
            .first(conn)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(residence_id),
            entities::ROOM,
            id,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

/// The bed's room must live in the same residence as the bed itself.
pub fn create_bed(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: BedCreate,
) -> Result<dbm::Bed, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        guards::load_residence(conn, req.residence_id)?;
        guards::load_room_in_residence(conn, req.room_id, req.residence_id)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewBed {
            id,
            residence_id: req.residence_id,
            room_id: req.room_id,
            name: req.name,
            created_by: actor.user_id,
        };

        use schema::bed::dsl as B;
        diesel::insert_into(B::bed).values(&new_row).execute(conn)?;

        let created = guards::load_bed_in_residence(conn, id, req.residence_id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(req.residence_id),
            entities::BED,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

/// Soft-deleting a bed frees its name for reuse within the room (the unique
/// index only counts live rows) but leaves any pointing residents untouched;
/// the integrity audit reports those as orphaned assignments.
pub fn soft_delete_bed(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Bed, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = guards::load_bed_in_residence(conn, id, residence_id)?;

        use schema::bed::dsl as B;
        diesel::update(B::bed.filter(B::id.eq(id)))
            .set((B::deleted_at.eq(Some(now)), B::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = B::bed
            .filter(B::id.eq(id))
            .select(dbm::Bed::as_select())
            .first(conn)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(residence_id),
            entities::BED,
            id,
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
    use chrono::Utc;

    #[test]
    fn residence_snapshot_carries_the_delete_marker() {
        let now = Utc::now();
        let residence = dbm::Residence {
            id: Uuid::nil(),
            name: "Sunrise Home".into(),
            address: None,
            phone_encrypted: None,
            email_encrypted: None,
            created_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: Some(now),
        };
        let snapshot = serde_json::to_value(&residence).unwrap();
        assert!(!snapshot["deleted_at"].is_null());
        assert_eq!(snapshot["name"], "Sunrise Home");
    }
}
