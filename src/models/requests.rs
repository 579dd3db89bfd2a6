//! Inbound mutation request types handed to the service layer by the
//! (out-of-scope) API surface.
//!
//! `*Create` types carry full proposed field values and derive `Deserialize`
//! so the API layer can hand them over as-is. `*Patch` types model partial
//! updates: an outer `None` means "leave the field alone"; for nullable
//! columns the inner `Option` distinguishes "set" from "clear".
//!
//! The acting identity travels with every call as an [`ActorContext`]; this
//! core records who acted but never decides whether they were allowed to.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::{DeviceKind, MeasurementKind, MeasurementSource, ResidentStatus};

/// Opaque reference to the acting identity, stamped onto history and event
/// rows. `user_id = None` marks a system-initiated mutation.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub user_id: Option<Uuid>,
}

impl ActorContext {
    pub fn user(id: Uuid) -> Self {
        ActorContext { user_id: Some(id) }
    }

    pub fn system() -> Self {
        ActorContext { user_id: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResidenceCreate {
    pub name: String,
    pub address: Option<String>,
    pub phone_encrypted: Option<Vec<u8>>,
    pub email_encrypted: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResidencePatch {
    pub name: Option<String>,
    pub address: Option<Option<String>>,
    pub phone_encrypted: Option<Option<Vec<u8>>>,
    pub email_encrypted: Option<Option<Vec<u8>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloorCreate {
    pub residence_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomCreate {
    pub residence_id: Uuid,
    pub floor_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedCreate {
    pub residence_id: Uuid,
    pub room_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResidentCreate {
    pub residence_id: Uuid,
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>,
    pub comments: Option<String>,
    /// Defaults to `active` when omitted.
    pub status: Option<ResidentStatus>,
    pub bed_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ResidentPatch {
    pub full_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<Option<String>>,
    pub comments: Option<Option<String>>,
    pub status: Option<ResidentStatus>,
    pub bed_id: Option<Option<Uuid>>,
}

impl ResidentPatch {
    /// A patch that only moves (or clears) the bed assignment.
    pub fn bed_change(new_bed_id: Option<Uuid>) -> Self {
        ResidentPatch {
            bed_id: Some(new_bed_id),
            ..ResidentPatch::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCreate {
    pub residence_id: Uuid,
    pub kind: DeviceKind,
    pub name: String,
    pub mac: String,
    pub battery_percent: Option<i16>,
}

#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub name: Option<String>,
    pub mac: Option<String>,
    pub battery_percent: Option<Option<i16>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementCreate {
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub source: MeasurementSource,
    pub device_id: Option<Uuid>,
    pub kind: MeasurementKind,
    pub systolic: Option<i32>,
    pub diastolic: Option<i32>,
    pub pulse_bpm: Option<i32>,
    pub spo2: Option<i32>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

/// Measurement updates may correct values or re-type the record; the shape
/// guard re-validates the final state either way.
#[derive(Debug, Clone, Default)]
pub struct MeasurementPatch {
    pub kind: Option<MeasurementKind>,
    pub systolic: Option<Option<i32>>,
    pub diastolic: Option<Option<i32>>,
    pub pulse_bpm: Option<Option<i32>>,
    pub spo2: Option<Option<i32>>,
    pub weight_kg: Option<Option<f64>>,
    pub temperature_c: Option<Option<f64>>,
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskTemplateCreate {
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
}

#[derive(Debug, Clone, Default)]
pub struct TaskTemplatePatch {
    pub name: Option<String>,
    pub status1: Option<Option<String>>,
    pub status2: Option<Option<String>>,
    pub status3: Option<Option<String>>,
    pub status4: Option<Option<String>>,
    pub status5: Option<Option<String>>,
    pub status6: Option<Option<String>>,
    pub audio_phrase: Option<Option<String>>,
    pub is_block: Option<Option<bool>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskApplicationCreate {
    pub residence_id: Uuid,
    pub resident_id: Uuid,
    pub task_template_id: Uuid,
    pub selected_status_index: Option<i16>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskApplicationPatch {
    pub selected_status_index: Option<Option<i16>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagCreate {
    pub name: String,
}
