//! Diesel model structs representing current-state rows, the per-entity
//! history ledgers, and the global event log.
//!
//! Enumerated columns are stored as text and validated by CHECK constraints;
//! the Rust enums below are the application-side view the guards work with.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema;

/// Entity type labels as they appear in `event_log.entity`.
pub mod entities {
    pub const RESIDENCE: &str = "residence";
    pub const FLOOR: &str = "floor";
    pub const ROOM: &str = "room";
    pub const BED: &str = "bed";
    pub const RESIDENT: &str = "resident";
    pub const DEVICE: &str = "device";
    pub const MEASUREMENT: &str = "measurement";
    pub const TASK_TEMPLATE: &str = "task_template";
    pub const TASK_APPLICATION: &str = "task_application";
    pub const TAG: &str = "tag";
    pub const RESIDENT_TAG: &str = "resident_tag";
}

/// Action labels for `event_log.action`. The first three mirror history
/// change kinds; the rest are guard-derived events with no history row.
pub mod actions {
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const ASSIGN_BED: &str = "assign_bed";
    pub const ASSIGN_TAG: &str = "assign_tag";
    pub const UNASSIGN_TAG: &str = "unassign_tag";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidentStatus {
    Active,
    Discharged,
    Deceased,
}

impl ResidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResidentStatus::Active => "active",
            ResidentStatus::Discharged => "discharged",
            ResidentStatus::Deceased => "deceased",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ResidentStatus::Active),
            "discharged" => Some(ResidentStatus::Discharged),
            "deceased" => Some(ResidentStatus::Deceased),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    BloodPressure,
    PulseOximeter,
    Scale,
    Thermometer,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::BloodPressure => "blood_pressure",
            DeviceKind::PulseOximeter => "pulse_oximeter",
            DeviceKind::Scale => "scale",
            DeviceKind::Thermometer => "thermometer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blood_pressure" => Some(DeviceKind::BloodPressure),
            "pulse_oximeter" => Some(DeviceKind::PulseOximeter),
            "scale" => Some(DeviceKind::Scale),
            "thermometer" => Some(DeviceKind::Thermometer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Bp,
    Spo2,
    Weight,
    Temperature,
}

impl MeasurementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementKind::Bp => "bp",
            MeasurementKind::Spo2 => "spo2",
            MeasurementKind::Weight => "weight",
            MeasurementKind::Temperature => "temperature",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bp" => Some(MeasurementKind::Bp),
            "spo2" => Some(MeasurementKind::Spo2),
            "weight" => Some(MeasurementKind::Weight),
            "temperature" => Some(MeasurementKind::Temperature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementSource {
    Device,
    Voice,
    Manual,
}

impl MeasurementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementSource::Device => "device",
            MeasurementSource::Voice => "voice",
            MeasurementSource::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "device" => Some(MeasurementSource::Device),
            "voice" => Some(MeasurementSource::Voice),
            "manual" => Some(MeasurementSource::Manual),
            _ => None,
        }
    }
}

/// Change kinds recorded in the history ledgers. Soft deletes are updates;
/// `Delete` is reserved for physical removal, which tracked entities do not
/// undergo in normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::residence)]
pub struct Residence {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone_encrypted: Option<Vec<u8>>,
    pub email_encrypted: Option<Vec<u8>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::residence)]
pub struct NewResidence {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone_encrypted: Option<Vec<u8>>,
    pub email_encrypted: Option<Vec<u8>>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::floor)]
#[diesel(belongs_to(Residence))]
pub struct Floor {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::floor)]
pub struct NewFloor {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::room)]
#[diesel(belongs_to(Floor))]
pub struct Room {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub floor_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::room)]
pub struct NewRoom {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub floor_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::bed)]
#[diesel(belongs_to(Room))]
pub struct Bed {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::bed)]
pub struct NewBed {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub room_id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::resident)]
#[diesel(belongs_to(Residence))]
pub struct Resident {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>,
    pub comments: Option<String>,
    pub status: String,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub bed_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::resident)]
pub struct NewResident {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>,
    pub comments: Option<String>,
    pub status: String,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub bed_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::device)]
#[diesel(belongs_to(Residence))]
pub struct Device {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub kind: String,
    pub name: String,
    pub mac: String,
    pub battery_percent: Option<i16>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::device)]
pub struct NewDevice {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub kind: String,
    pub name: String,
    pub mac: String,
    pub battery_percent: Option<i16>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::measurement)]
#[diesel(belongs_to(Resident))]
pub struct Measurement {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub recorded_by: Option<Uuid>,
    pub source: String,
    pub device_id: Option<Uuid>,
    pub kind: String,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse_bpm: Option<i32>,
    pub spo2: Option<i32>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub taken_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::measurement)]
pub struct NewMeasurement {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub recorded_by: Option<Uuid>,
    pub source: String,
    pub device_id: Option<Uuid>,
    pub kind: String,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse_bpm: Option<i32>,
    pub spo2: Option<i32>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::task_template)]
#[diesel(belongs_to(Residence))]
pub struct TaskTemplate {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub name: String,
    pub status1: Option<String>,
    pub status2: Option<String>,
    pub status3: Option<String>,
    pub status4: Option<String>,
    pub status5: Option<String>,
    pub status6: Option<String>,
    pub audio_phrase: Option<String>,
    pub is_block: Option<bool>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TaskTemplate {
    /// The status label stored in slot `index` (1-based, 1..=6).
    pub fn status_label(&self, index: i16) -> Option<&str> {
        let slot = match index {
            1 => &self.status1,
            2 => &self.status2,
            3 => &self.status3,
            4 => &self.status4,
            5 => &self.status5,
            6 => &self.status6,
            _ => return None,
        };
        slot.as_deref()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::task_template)]
pub struct NewTaskTemplate {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub name: String,
    pub status1: Option<String>,
    pub status2: Option<String>,
    pub status3: Option<String>,
    pub status4: Option<String>,
    pub status5: Option<String>,
    pub status6: Option<String>,
    pub audio_phrase: Option<String>,
    pub is_block: Option<bool>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::task_application)]
#[diesel(belongs_to(Resident))]
pub struct TaskApplication {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub task_template_id: Uuid,
    pub applied_by: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
    pub selected_status_index: Option<i16>,
    pub selected_status_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::task_application)]
pub struct NewTaskApplication {
    pub id: Uuid,
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub task_template_id: Uuid,
    pub applied_by: Option<Uuid>,
    pub applied_at: DateTime<Utc>,
    pub selected_status_index: Option<i16>,
    pub selected_status_text: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::tag)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::tag)]
pub struct NewTag {
    pub id: Uuid,
    pub name: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::resident_tag)]
#[diesel(primary_key(resident_id, tag_id))]
#[diesel(belongs_to(Resident))]
#[diesel(belongs_to(Tag))]
pub struct ResidentTag {
    pub resident_id: Uuid,
    pub tag_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::resident_tag)]
pub struct NewResidentTag {
    pub resident_id: Uuid,
    pub tag_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

// History ledger rows. `old_row`/`new_row` hold full snapshots, not diffs,
// so a single row is enough to know any one state.

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::resident_history)]
pub struct ResidentHistoryRow {
    pub id: i64,
    pub resident_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::resident_history)]
pub struct NewResidentHistoryRow {
    pub resident_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::device_history)]
pub struct DeviceHistoryRow {
    pub id: i64,
    pub device_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::device_history)]
pub struct NewDeviceHistoryRow {
    pub device_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::measurement_history)]
pub struct MeasurementHistoryRow {
    pub id: i64,
    pub measurement_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::measurement_history)]
pub struct NewMeasurementHistoryRow {
    pub measurement_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::task_application_history)]
pub struct TaskApplicationHistoryRow {
    pub id: i64,
    pub task_application_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::task_application_history)]
pub struct NewTaskApplicationHistoryRow {
    pub task_application_id: Uuid,
    pub changed_by: Option<Uuid>,
    pub change_kind: String,
    pub old_row: Option<serde_json::Value>,
    pub new_row: Option<serde_json::Value>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = schema::event_log)]
pub struct EventRow {
    pub id: i64,
    pub actor_user_id: Option<Uuid>,
    pub residence_id: Option<Uuid>,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub at: DateTime<Utc>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::event_log)]
pub struct NewEventRow {
    pub actor_user_id: Option<Uuid>,
    pub residence_id: Option<Uuid>,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub action: String,
    pub at: DateTime<Utc>,
    pub meta: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip() {
        for s in [
            ResidentStatus::Active,
            ResidentStatus::Discharged,
            ResidentStatus::Deceased,
        ] {
            assert_eq!(ResidentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ResidentStatus::parse("retired"), None);
    }

    #[test]
    fn measurement_kind_labels_round_trip() {
        for k in [
            MeasurementKind::Bp,
            MeasurementKind::Spo2,
            MeasurementKind::Weight,
            MeasurementKind::Temperature,
        ] {
            assert_eq!(MeasurementKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(MeasurementKind::parse("pulse"), None);
    }

    #[test]
    fn template_status_label_slots() {
        let tpl = TaskTemplate {
            id: Uuid::nil(),
            residence_id: Uuid::nil(),
            name: "medication round".into(),
            status1: Some("Pending".into()),
            status2: None,
            status3: Some("Completed".into()),
            status4: None,
            status5: None,
            status6: None,
            audio_phrase: None,
            is_block: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        };
        assert_eq!(tpl.status_label(1), Some("Pending"));
        assert_eq!(tpl.status_label(2), None);
        assert_eq!(tpl.status_label(3), Some("Completed"));
        assert_eq!(tpl.status_label(7), None);
        assert_eq!(tpl.status_label(0), None);
    }
}
