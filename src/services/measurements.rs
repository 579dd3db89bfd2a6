//! Guarded mutation pipeline for clinical measurements.
//!
//! A measurement stores one value group chosen by its kind; the remaining
//! columns must stay null so consumers can trust the kind tag alone. The
//! shape guard is a pure validation with no auto-correct: a mixed-kind
//! payload is rejected, never trimmed.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities, ChangeKind, MeasurementKind};
use crate::models::requests::{ActorContext, MeasurementCreate, MeasurementPatch};
use crate::schema;
use crate::services::audit;
use crate::services::guards;

/// Per-kind field-group exclusivity. `pulse_bpm` rides along with both blood
/// pressure and pulse-oximeter readings; everything else belongs to exactly
/// one kind.
fn check_measurement_shape(
    kind: MeasurementKind,
    systolic: Option<i32>,
    diastolic: Option<i32>,
    pulse_bpm: Option<i32>,
    spo2: Option<i32>,
    weight_kg: Option<f64>,
    temperature_c: Option<f64>,
) -> Result<(), MutationError> {
    let kind_label = kind.as_str();
    let required = |present: bool, field: &'static str| {
        if present {
            Ok(())
        } else {
            Err(MutationError::MalformedMeasurement {
                kind: kind_label,
                field,
                problem: "is required",
            })
        }
    };
    let forbidden = |absent: bool, field: &'static str| {
        if absent {
            Ok(())
        } else {
            Err(MutationError::MalformedMeasurement {
                kind: kind_label,
                field,
                problem: "must be null",
            })
        }
    };

    match kind {
        MeasurementKind::Bp => {
            required(systolic.is_some(), "systolic")?;
            required(diastolic.is_some(), "diastolic")?;
            forbidden(spo2.is_none(), "spo2")?;
            forbidden(weight_kg.is_none(), "weight_kg")?;
            forbidden(temperature_c.is_none(), "temperature_c")?;
        }
        MeasurementKind::Spo2 => {
            required(spo2.is_some(), "spo2")?;
            forbidden(systolic.is_none(), "systolic")?;
            forbidden(diastolic.is_none(), "diastolic")?;
            forbidden(weight_kg.is_none(), "weight_kg")?;
            forbidden(temperature_c.is_none(), "temperature_c")?;
        }
        MeasurementKind::Weight => {
            required(weight_kg.is_some(), "weight_kg")?;
            forbidden(systolic.is_none(), "systolic")?;
            forbidden(diastolic.is_none(), "diastolic")?;
            forbidden(pulse_bpm.is_none(), "pulse_bpm")?;
            forbidden(spo2.is_none(), "spo2")?;
            forbidden(temperature_c.is_none(), "temperature_c")?;
        }
        MeasurementKind::Temperature => {
            required(temperature_c.is_some(), "temperature_c")?;
            forbidden(systolic.is_none(), "systolic")?;
            forbidden(diastolic.is_none(), "diastolic")?;
            forbidden(pulse_bpm.is_none(), "pulse_bpm")?;
            forbidden(spo2.is_none(), "spo2")?;
            forbidden(weight_kg.is_none(), "weight_kg")?;
        }
    }
    Ok(())
}

fn fetch_measurement(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Measurement, MutationError> {
    use schema::measurement::dsl as M;

    M::measurement
        .filter(M::id.eq(id))
        .select(dbm::Measurement::as_select())
        .first(conn)
        .map_err(Into::into)
}

pub fn find_measurement(conn: &mut PgConnection, id: Uuid) -> Result<dbm::Measurement, MutationError> {
    use schema::measurement::dsl as M;

    M::measurement
        .filter(M::id.eq(id).and(M::deleted_at.is_null()))
        .select(dbm::Measurement::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::MEASUREMENT,
            id,
        })
}

pub fn create_measurement(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: MeasurementCreate,
) -> Result<dbm::Measurement, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();

        check_measurement_shape(
            req.kind,
            req.systolic,
            req.diastolic,
            req.pulse_bpm,
            req.spo2,
            req.weight_kg,
            req.temperature_c,
        )?;
        guards::load_resident_in_residence(conn, req.resident_id, req.residence_id)?;
        if let Some(device) = req.device_id {
            guards::load_device_in_residence(conn, device, req.residence_id)?;
        }

        let id = Uuid::new_v4();
        let new_row = dbm::NewMeasurement {
            id,
            residence_id: req.residence_id,
            resident_id: req.resident_id,
            recorded_by: actor.user_id,
            source: req.source.as_str().to_string(),
            device_id: req.device_id,
            kind: req.kind.as_str().to_string(),
            systolic: req.systolic,
            diastolic: req.diastolic,
            pulse_bpm: req.pulse_bpm,
            spo2: req.spo2,
            weight_kg: req.weight_kg,
            temperature_c: req.temperature_c,
            taken_at: req.taken_at,
        };

        use schema::measurement::dsl as M;
        diesel::insert_into(M::measurement).values(&new_row).execute(conn)?;

        let created = fetch_measurement(conn, id)?;
        audit::record_measurement_change(
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

pub fn update_measurement(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: MeasurementPatch,
) -> Result<dbm::Measurement, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_measurement(conn, id)?;

        let current_kind =
            MeasurementKind::parse(&current.kind).ok_or_else(|| MutationError::Storage {
                detail: format!("measurement {} has invalid stored kind {}", id, current.kind),
            })?;

        let kind = patch.kind.unwrap_or(current_kind);
        let systolic = patch.systolic.unwrap_or(current.systolic);
        let diastolic = patch.diastolic.unwrap_or(current.diastolic);
        let pulse_bpm = patch.pulse_bpm.unwrap_or(current.pulse_bpm);
        let spo2 = patch.spo2.unwrap_or(current.spo2);
        let weight_kg = patch.weight_kg.unwrap_or(current.weight_kg);
        let temperature_c = patch.temperature_c.unwrap_or(current.temperature_c);
        let taken_at = patch.taken_at.unwrap_or(current.taken_at);

        // The final state must satisfy the shape rule, whatever mix of
        // current and patched values produced it.
        check_measurement_shape(kind, systolic, diastolic, pulse_bpm, spo2, weight_kg, temperature_c)?;

        use schema::measurement::dsl as M;
        diesel::update(M::measurement.filter(M::id.eq(id)))
            .set((
                M::kind.eq(kind.as_str()),
                M::systolic.eq(systolic),
                M::diastolic.eq(diastolic),
                M::pulse_bpm.eq(pulse_bpm),
                M::spo2.eq(spo2),
                M::weight_kg.eq(weight_kg),
                M::temperature_c.eq(temperature_c),
                M::taken_at.eq(taken_at),
                M::updated_at.eq(now),
            ))
            .execute(conn)?;

        let updated = fetch_measurement(conn, id)?;
        audit::record_measurement_change(
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

pub fn soft_delete_measurement(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::Measurement, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_measurement(conn, id)?;

        use schema::measurement::dsl as M;
        diesel::update(M::measurement.filter(M::id.eq(id)))
            .set((M::deleted_at.eq(Some(now)), M::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = fetch_measurement(conn, id)?;
        audit::record_measurement_change(
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
    fn bp_with_both_pressures_is_valid() {
        let result = check_measurement_shape(
            MeasurementKind::Bp,
            Some(120),
            Some(80),
            Some(70),
            None,
            None,
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn bp_with_spo2_set_is_rejected() {
        let result = check_measurement_shape(
            MeasurementKind::Bp,
            Some(120),
            Some(80),
            Some(70),
            Some(98),
            None,
            None,
        );
        assert_eq!(
            result,
            Err(MutationError::MalformedMeasurement {
                kind: "bp",
                field: "spo2",
                problem: "must be null",
            })
        );
    }

    #[test]
    fn bp_missing_diastolic_is_rejected() {
        let result =
            check_measurement_shape(MeasurementKind::Bp, Some(120), None, None, None, None, None);
        assert_eq!(
            result,
            Err(MutationError::MalformedMeasurement {
                kind: "bp",
                field: "diastolic",
                problem: "is required",
            })
        );
    }

    #[test]
    fn spo2_allows_pulse_companion() {
        let result = check_measurement_shape(
            MeasurementKind::Spo2,
            None,
            None,
            Some(64),
            Some(97),
            None,
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn weight_rejects_pulse() {
        let result = check_measurement_shape(
            MeasurementKind::Weight,
            None,
            None,
            Some(64),
            None,
            Some(71.5),
            None,
        );
        assert_eq!(
            result,
            Err(MutationError::MalformedMeasurement {
                kind: "weight",
                field: "pulse_bpm",
                problem: "must be null",
            })
        );
    }

    #[test]
    fn temperature_only_accepts_its_own_field() {
        assert!(check_measurement_shape(
            MeasurementKind::Temperature,
            None,
            None,
            None,
            None,
            None,
            Some(36.8),
        )
        .is_ok());

        let missing = check_measurement_shape(
            MeasurementKind::Temperature,
            None,
            None,
            None,
            None,
            None,
            None,
        );
        assert_eq!(
            missing,
            Err(MutationError::MalformedMeasurement {
                kind: "temperature",
                field: "temperature_c",
                problem: "is required",
            })
        );
    }
}
