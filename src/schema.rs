//! Handwritten Diesel schema declarations used by model structs.
//!
//! Migrations define the actual tables, constraints, and partial indexes
//! (notably `resident_active_bed_uq`, which carries the bed-occupancy
//! invariant). This module only provides `diesel::table!` declarations so we
//! can derive Insertable/Queryable in a type-safe way without running
//! `diesel print-schema`.

diesel::table! {
    residence (id) {
        id -> Uuid,
        name -> Text,
        address -> Nullable<Text>,
        phone_encrypted -> Nullable<Bytea>,
        email_encrypted -> Nullable<Bytea>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    floor (id) {
        id -> Uuid,
        residence_id -> Uuid,
        name -> Text,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    room (id) {
        id -> Uuid,
        residence_id -> Uuid,
        floor_id -> Uuid,
        name -> Text,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    bed (id) {
        id -> Uuid,
        residence_id -> Uuid,
        room_id -> Uuid,
        name -> Text,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    resident (id) {
        id -> Uuid,
        residence_id -> Uuid,
        full_name -> Text,
        birth_date -> Date,
        sex -> Nullable<Text>,
        comments -> Nullable<Text>,
        status -> Text,
        status_changed_at -> Nullable<Timestamptz>,
        bed_id -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    device (id) {
        id -> Uuid,
        residence_id -> Uuid,
        kind -> Text,
        name -> Text,
        mac -> Text,
        battery_percent -> Nullable<SmallInt>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    measurement (id) {
        id -> Uuid,
        residence_id -> Uuid,
        resident_id -> Uuid,
        recorded_by -> Nullable<Uuid>,
        source -> Text,
        device_id -> Nullable<Uuid>,
        kind -> Text,
        systolic -> Nullable<Integer>,
        diastolic -> Nullable<Integer>,
        pulse_bpm -> Nullable<Integer>,
        spo2 -> Nullable<Integer>,
        weight_kg -> Nullable<Double>,
        temperature_c -> Nullable<Double>,
        taken_at -> Timestamptz,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    task_template (id) {
        id -> Uuid,
        residence_id -> Uuid,
        name -> Text,
        status1 -> Nullable<Text>,
        status2 -> Nullable<Text>,
        status3 -> Nullable<Text>,
        status4 -> Nullable<Text>,
        status5 -> Nullable<Text>,
        status6 -> Nullable<Text>,
        audio_phrase -> Nullable<Text>,
        is_block -> Nullable<Bool>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    task_application (id) {
        id -> Uuid,
        residence_id -> Uuid,
        resident_id -> Uuid,
        task_template_id -> Uuid,
        applied_by -> Nullable<Uuid>,
        applied_at -> Timestamptz,
        selected_status_index -> Nullable<SmallInt>,
        selected_status_text -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    tag (id) {
        id -> Uuid,
        name -> Text,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        deleted_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    resident_tag (resident_id, tag_id) {
        resident_id -> Uuid,
        tag_id -> Uuid,
        assigned_by -> Nullable<Uuid>,
        assigned_at -> Timestamptz,
    }
}

// Append-only history ledgers, one per tracked entity type.

diesel::table! {
    resident_history (id) {
        id -> BigInt,
        resident_id -> Uuid,
        changed_by -> Nullable<Uuid>,
        change_kind -> Text,
        old_row -> Nullable<Jsonb>,
        new_row -> Nullable<Jsonb>,
        changed_at -> Timestamptz,
    }
}

diesel::table! {
    device_history (id) {
        id -> BigInt,
        device_id -> Uuid,
        changed_by -> Nullable<Uuid>,
        change_kind -> Text,
        old_row -> Nullable<Jsonb>,
        new_row -> Nullable<Jsonb>,
        changed_at -> Timestamptz,
    }
}

diesel::table! {
    measurement_history (id) {
        id -> BigInt,
        measurement_id -> Uuid,
        changed_by -> Nullable<Uuid>,
        change_kind -> Text,
        old_row -> Nullable<Jsonb>,
        new_row -> Nullable<Jsonb>,
        changed_at -> Timestamptz,
    }
}

diesel::table! {
    task_application_history (id) {
        id -> BigInt,
        task_application_id -> Uuid,
        changed_by -> Nullable<Uuid>,
        change_kind -> Text,
        old_row -> Nullable<Jsonb>,
        new_row -> Nullable<Jsonb>,
        changed_at -> Timestamptz,
    }
}

// Global append-only event ledger.

diesel::table! {
    event_log (id) {
        id -> BigInt,
        actor_user_id -> Nullable<Uuid>,
        residence_id -> Nullable<Uuid>,
        entity -> Text,
        entity_id -> Nullable<Uuid>,
        action -> Text,
        at -> Timestamptz,
        meta -> Nullable<Jsonb>,
    }
}

diesel::joinable!(floor -> residence (residence_id));
diesel::joinable!(room -> floor (floor_id));
diesel::joinable!(bed -> room (room_id));
diesel::joinable!(resident -> residence (residence_id));
diesel::joinable!(device -> residence (residence_id));
diesel::joinable!(measurement -> resident (resident_id));
diesel::joinable!(task_application -> resident (resident_id));
diesel::joinable!(task_application -> task_template (task_template_id));
diesel::joinable!(resident_tag -> resident (resident_id));
diesel::joinable!(resident_tag -> tag (tag_id));

diesel::allow_tables_to_appear_in_same_query!(
    residence,
    floor,
    room,
    bed,
    resident,
    device,
    measurement,
    task_template,
    task_application,
    tag,
    resident_tag,
    resident_history,
    device_history,
    measurement_history,
    task_application_history,
    event_log,
);
