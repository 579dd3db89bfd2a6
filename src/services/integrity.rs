//! Read-only integrity audit.
//!
//! The guards and constraints should make these findings impossible; this
//! audit exists to prove that on a live database (and to surface damage from
//! out-of-band writes). It mutates nothing and reports through the log.

use std::collections::HashSet;

use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::PgConnection;
use log::{info, warn};
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::schema;

#[derive(Debug, Default)]
pub struct IntegrityReport {
    /// Beds held by more than one active, non-deleted resident.
    pub multi_occupied_beds: Vec<(Uuid, i64)>,
    /// Residents in a non-active status that still hold a bed reference.
    pub non_active_with_bed: Vec<Uuid>,
    /// Live residents whose bed reference points at a soft-deleted bed.
    pub dangling_bed_refs: Vec<Uuid>,
    /// Live measurements recorded against soft-deleted residents.
    pub measurements_of_deleted_residents: Vec<Uuid>,
    /// Live task applications recorded against soft-deleted residents.
    pub applications_of_deleted_residents: Vec<Uuid>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.multi_occupied_beds.is_empty()
            && self.non_active_with_bed.is_empty()
            && self.dangling_bed_refs.is_empty()
            && self.measurements_of_deleted_residents.is_empty()
            && self.applications_of_deleted_residents.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.multi_occupied_beds.len()
            + self.non_active_with_bed.len()
            + self.dangling_bed_refs.len()
            + self.measurements_of_deleted_residents.len()
            + self.applications_of_deleted_residents.len()
    }
}

pub fn run_audit(conn: &mut PgConnection) -> Result<IntegrityReport, MutationError> {
    let mut report = IntegrityReport::default();

    {
        use schema::resident::dsl as R;

        let occupied: Vec<(Option<Uuid>, i64)> = R::resident
            .filter(
                R::status
                    .eq("active")
                    .and(R::deleted_at.is_null())
                    .and(R::bed_id.is_not_null()),
            )
            .group_by(R::bed_id)
            .having(count_star().gt(1_i64))
            .select((R::bed_id, count_star()))
            .load(conn)?;
        report.multi_occupied_beds = occupied
            .into_iter()
            .filter_map(|(bed, n)| bed.map(|b| (b, n)))
            .collect();

        report.non_active_with_bed = R::resident
            .filter(R::status.ne("active").and(R::bed_id.is_not_null()))
            .order(R::id.asc())
            .select(R::id)
            .load(conn)?;
    }

    let live_beds: HashSet<Uuid> = {
        use schema::bed::dsl as B;
        B::bed
            .filter(B::deleted_at.is_null())
            .select(B::id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect()
    };
    let deleted_residents: HashSet<Uuid> = {
        use schema::resident::dsl as R;
        R::resident
            .filter(R::deleted_at.is_not_null())
            .select(R::id)
            .load::<Uuid>(conn)?
            .into_iter()
            .collect()
    };

    {
        use schema::resident::dsl as R;

        let bed_refs: Vec<(Uuid, Option<Uuid>)> = R::resident
            .filter(R::deleted_at.is_null().and(R::bed_id.is_not_null()))
            .select((R::id, R::bed_id))
            .load(conn)?;
        report.dangling_bed_refs = bed_refs
            .into_iter()
            .filter(|(_, bed)| bed.map(|b| !live_beds.contains(&b)).unwrap_or(false))
            .map(|(id, _)| id)
            .collect();
    }

    {
        use schema::measurement::dsl as M;

        let refs: Vec<(Uuid, Uuid)> = M::measurement
            .filter(M::deleted_at.is_null())
            .select((M::id, M::resident_id))
            .load(conn)?;
        report.measurements_of_deleted_residents = refs
            .into_iter()
            .filter(|(_, resident)| deleted_residents.contains(resident))
            .map(|(id, _)| id)
            .collect();
    }

    {
        use schema::task_application::dsl as A;

        let refs: Vec<(Uuid, Uuid)> = A::task_application
            .filter(A::deleted_at.is_null())
            .select((A::id, A::resident_id))
            .load(conn)?;
        report.applications_of_deleted_residents = refs
            .into_iter()
            .filter(|(_, resident)| deleted_residents.contains(resident))
            .map(|(id, _)| id)
            .collect();
    }

    Ok(report)
}

pub fn log_report(report: &IntegrityReport) {
    if report.is_clean() {
        info!("integrity audit clean");
        return;
    }
    warn!("integrity audit found {} issue(s)", report.finding_count());
    for (bed, n) in &report.multi_occupied_beds {
        warn!("bed {} held by {} active residents", bed, n);
    }
    for id in &report.non_active_with_bed {
        warn!("non-active resident {} still holds a bed", id);
    }
    for id in &report.dangling_bed_refs {
        warn!("resident {} references a deleted bed", id);
    }
    for id in &report.measurements_of_deleted_residents {
        warn!("live measurement {} belongs to a deleted resident", id);
    }
    for id in &report.applications_of_deleted_residents {
        warn!("live task application {} belongs to a deleted resident", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_clean() {
        let report = IntegrityReport::default();
        assert!(report.is_clean());
        assert_eq!(report.finding_count(), 0);
    }

    #[test]
    fn any_finding_marks_the_report_dirty() {
        let report = IntegrityReport {
            non_active_with_bed: vec![Uuid::new_v4()],
            ..IntegrityReport::default()
        };
        assert!(!report.is_clean());
        assert_eq!(report.finding_count(), 1);
    }
}
