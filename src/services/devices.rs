//! Guarded mutation pipeline for clinical devices.
//!
//! Device MAC addresses are globally unique; the database index decides
//! collisions at commit time and they surface as
//! [`MutationError::DuplicateValue`]. The battery range check is an
//! application guard so the caller gets a field-level rejection instead of a
//! raw constraint error.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities, ChangeKind};
use crate::models::requests::{ActorContext, DeviceCreate, DevicePatch};
use crate::schema;
use crate::services::audit;
use crate::services::guards;

fn check_battery_percent(battery_percent: Option<i16>) -> Result<(), MutationError> {
    match battery_percent {
        Some(p) if !(0..=100).contains(&p) => Err(MutationError::ValueOutOfRange {
            field: "battery_percent",
        }),
        _ => Ok(()),
    }
}

fn fetch_device(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Device, MutationError> {
    use schema::device::dsl as D;

    D::device
        .filter(D::id.eq(id))
        .select(dbm::Device::as_select())
        .first(conn)
        .map_err(Into::into)
}

pub fn find_device(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Device, MutationError> {
    use schema::device::dsl as D;

    D::device
        .filter(D::id.eq(id).and(D::deleted_at.is_null()))
        .select(dbm::Device::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::DEVICE,
            id,
        })
}

pub fn create_device(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: DeviceCreate,
) -> Result<dbm::Device, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();

        check_battery_percent(req.battery_percent)?;
        guards::load_residence(conn, req.residence_id)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewDevice {
            id,
            residence_id: req.residence_id,
            kind: req.kind.as_str().to_string(),
            name: req.name,
            mac: req.mac,
            battery_percent: req.battery_percent,
            created_by: actor.user_id,
        };

        use schema::device::dsl as D;
        diesel::insert_into(D::device).values(&new_row).execute(conn)?;

        let created = fetch_device(conn, id)?;
        audit::record_device_change(
            conn,
            actor,
            ChangeKind::Create,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

pub fn update_device(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: DevicePatch,
) -> Result<dbm::Device, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_device(conn, id)?;

        let name = patch.name.unwrap_or_else(|| current.name.clone());
        let mac = patch.mac.unwrap_or_else(|| current.mac.clone());
        let battery_percent = patch.battery_percent.unwrap_or(current.battery_percent);

        check_battery_percent(battery_percent)?;

        use schema::device::dsl as D;
        diesel::update(D::device.filter(D::id.eq(id)))
            .set((
                D::name.eq(name),
                D::mac.eq(mac),
                D::battery_percent.eq(battery_percent),
                D::updated_at.eq(now),
            ))
            .execute(conn)?;

        let updated = fetch_device(conn, id)?;
        audit::record_device_change(
            conn,
            actor,
            ChangeKind::Update,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

pub fn soft_delete_device(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::Device, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_device(conn, id)?;

        use schema::device::dsl as D;
        diesel::update(D::device.filter(D::id.eq(id)))
            .set((D::deleted_at.eq(Some(now)), D::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = fetch_device(conn, id)?;
        audit::record_device_change(
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

    #[test]
    fn battery_bounds_are_inclusive() {
        assert!(check_battery_percent(Some(0)).is_ok());
        assert!(check_battery_percent(Some(100)).is_ok());
        assert!(check_battery_percent(None).is_ok());
    }

    #[test]
    fn battery_outside_range_is_rejected() {
        assert_eq!(
            check_battery_percent(Some(-1)),
            Err(MutationError::ValueOutOfRange {
                field: "battery_percent",
            })
        );
        assert_eq!(
            check_battery_percent(Some(101)),
            Err(MutationError::ValueOutOfRange {
                field: "battery_percent",
            })
        );
    }
}
