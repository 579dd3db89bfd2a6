//! Cross-entity reference guards shared by the mutation pipelines.
//!
//! Each loader returns the live (non-soft-deleted) row behind a reference or
//! the precise rejection the caller surfaces: [`MutationError::ReferenceNotFound`]
//! when the row is missing, [`MutationError::CrossTenantViolation`] when it
//! exists under a different residence. They run inside the caller's
//! transaction, so a rejection aborts the whole mutation.

use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::entities;
use crate::schema;

pub fn load_residence(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Residence, MutationError> {
    use schema::residence::dsl as R;

    R::residence
        .filter(R::id.eq(id).and(R::deleted_at.is_null()))
        .select(dbm::Residence::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::RESIDENCE,
            id,
        })
}

pub fn load_floor_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Floor, MutationError> {
    use schema::floor::dsl as F;

    let floor = F::floor
        .filter(F::id.eq(id).and(F::deleted_at.is_null()))
        .select(dbm::Floor::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::FLOOR,
            id,
        })?;
    if floor.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::FLOOR,
            id,
        });
    }
    Ok(floor)
}

pub fn load_room_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Room, MutationError> {
    use schema::room::dsl as R;

    let room = R::room
        .filter(R::id.eq(id).and(R::deleted_at.is_null()))
        .select(dbm::Room::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::ROOM,
            id,
        })?;
    if room.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::ROOM,
            id,
        });
    }
    Ok(room)
}

pub fn load_bed_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Bed, MutationError> {
    use schema::bed::dsl as B;

    let bed = B::bed
        .filter(B::id.eq(id).and(B::deleted_at.is_null()))
        .select(dbm::Bed::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::BED,
            id,
        })?;
    if bed.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::BED,
            id,
        });
    }
    Ok(bed)
}

pub fn load_resident_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Resident, MutationError> {
    use schema::resident::dsl as R;

    let resident = R::resident
        .filter(R::id.eq(id).and(R::deleted_at.is_null()))
        .select(dbm::Resident::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::RESIDENT,
            id,
        })?;
    if resident.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::RESIDENT,
            id,
        });
    }
    Ok(resident)
}

pub fn load_device_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::Device, MutationError> {
    use schema::device::dsl as D;

    let device = D::device
        .filter(D::id.eq(id).and(D::deleted_at.is_null()))
        .select(dbm::Device::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::DEVICE,
            id,
        })?;
    if device.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::DEVICE,
            id,
        });
    }
    Ok(device)
}

pub fn load_template_in_residence(
    conn: &mut PgConnection,
    id: Uuid,
    residence_id: Uuid,
) -> Result<dbm::TaskTemplate, MutationError> {
    use schema::task_template::dsl as T;

    let template = T::task_template
        .filter(T::id.eq(id).and(T::deleted_at.is_null()))
        .select(dbm::TaskTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::TASK_TEMPLATE,
            id,
        })?;
    if template.residence_id != residence_id {
        return Err(MutationError::CrossTenantViolation {
            entity: entities::TASK_TEMPLATE,
            id,
        });
    }
    Ok(template)
}
