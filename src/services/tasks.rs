//! Task templates and their applications to residents.
//!
//! A template defines up to six named status slots. Applying a template to a
//! resident optionally selects one slot by index; the slot's label is copied
//! into the application row at write time, so later edits to the template
//! never rewrite what a caregiver actually recorded. Applications are
//! historized; templates are event-logged only.

use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::error::MutationError;
use crate::db::models as dbm;
use crate::db::models::{actions, entities, ChangeKind};
use crate::models::requests::{
    ActorContext, TaskApplicationCreate, TaskApplicationPatch, TaskTemplateCreate,
    TaskTemplatePatch,
};
use crate::schema;
use crate::services::audit;
use crate::services::guards;

/// Resolve a selected status index against the template's slots. A missing
/// index means no status was selected; an index outside 1..=6 is rejected; an
/// in-range index pointing at an empty slot resolves to no text.
fn resolve_status_text(
    template: &dbm::TaskTemplate,
    index: Option<i16>,
) -> Result<Option<String>, MutationError> {
    let Some(index) = index else {
        return Ok(None);
    };
    if !(1..=6).contains(&index) {
        return Err(MutationError::InvalidStatusIndex { index });
    }
    Ok(template.status_label(index).map(String::from))
}

fn fetch_template(conn: &mut PgConnection, id: Uuid) -> Result<dbm::TaskTemplate, MutationError> {
    use schema::task_template::dsl as T;

    T::task_template
        .filter(T::id.eq(id))
        .select(dbm::TaskTemplate::as_select())
        .first(conn)
        .map_err(Into::into)
}

pub fn find_template(conn: &mut PgConnection, id: Uuid) -> Result<dbm::TaskTemplate, MutationError> {
    use schema::task_template::dsl as T;

    T::task_template
        .filter(T::id.eq(id).and(T::deleted_at.is_null()))
        .select(dbm::TaskTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::TASK_TEMPLATE,
            id,
        })
}

pub fn create_template(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: TaskTemplateCreate,
) -> Result<dbm::TaskTemplate, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        guards::load_residence(conn, req.residence_id)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewTaskTemplate {
            id,
            residence_id: req.residence_id,
            name: req.name,
            status1: req.status1,
            status2: req.status2,
            status3: req.status3,
            status4: req.status4,
            status5: req.status5,
            status6: req.status6,
            audio_phrase: req.audio_phrase,
            is_block: req.is_block,
            created_by: actor.user_id,
        };

        use schema::task_template::dsl as T;
        diesel::insert_into(T::task_template).values(&new_row).execute(conn)?;

        let created = fetch_template(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(created.residence_id),
            entities::TASK_TEMPLATE,
            id,
            actions::CREATE,
            None,
            Some(&created),
            now,
        )?;

        Ok(created)
    })
}

pub fn update_template(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: TaskTemplatePatch,
) -> Result<dbm::TaskTemplate, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_template(conn, id)?;

        let name = patch.name.unwrap_or_else(|| current.name.clone());
        let status1 = patch.status1.unwrap_or_else(|| current.status1.clone());
        let status2 = patch.status2.unwrap_or_else(|| current.status2.clone());
        let status3 = patch.status3.unwrap_or_else(|| current.status3.clone());
        let status4 = patch.status4.unwrap_or_else(|| current.status4.clone());
        let status5 = patch.status5.unwrap_or_else(|| current.status5.clone());
        let status6 = patch.status6.unwrap_or_else(|| current.status6.clone());
        let audio_phrase = patch
            .audio_phrase
            .unwrap_or_else(|| current.audio_phrase.clone());
        let is_block = patch.is_block.unwrap_or(current.is_block);

        use schema::task_template::dsl as T;
        diesel::update(T::task_template.filter(T::id.eq(id)))
            .set((
                T::name.eq(name),
                T::status1.eq(status1),
                T::status2.eq(status2),
                T::status3.eq(status3),
                T::status4.eq(status4),
                T::status5.eq(status5),
                T::status6.eq(status6),
                T::audio_phrase.eq(audio_phrase),
                T::is_block.eq(is_block),
                T::updated_at.eq(now),
            ))
            .execute(conn)?;

        let updated = fetch_template(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(updated.residence_id),
            entities::TASK_TEMPLATE,
            id,
            actions::UPDATE,
            Some(&current),
            Some(&updated),
            now,
        )?;

        Ok(updated)
    })
}

pub fn soft_delete_template(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::TaskTemplate, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_template(conn, id)?;

        use schema::task_template::dsl as T;
        diesel::update(T::task_template.filter(T::id.eq(id)))
            .set((T::deleted_at.eq(Some(now)), T::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = fetch_template(conn, id)?;
        audit::record_untracked_change(
            conn,
            actor,
            Some(deleted.residence_id),
            entities::TASK_TEMPLATE,
            id,
            actions::DELETE,
            Some(&current),
            Some(&deleted),
            now,
        )?;

        Ok(deleted)
    })
}

fn fetch_application(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<dbm::TaskApplication, MutationError> {
    use schema::task_application::dsl as A;

    A::task_application
        .filter(A::id.eq(id))
        .select(dbm::TaskApplication::as_select())
        .first(conn)
        .map_err(Into::into)
}

pub fn find_application(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<dbm::TaskApplication, MutationError> {
    use schema::task_application::dsl as A;

    A::task_application
        .filter(A::id.eq(id).and(A::deleted_at.is_null()))
        .select(dbm::TaskApplication::as_select())
        .first(conn)
        .optional()?
        .ok_or(MutationError::ReferenceNotFound {
            entity: entities::TASK_APPLICATION,
            id,
        })
}

pub fn create_application(
    conn: &mut PgConnection,
    actor: &ActorContext,
    req: TaskApplicationCreate,
) -> Result<dbm::TaskApplication, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();

        guards::load_resident_in_residence(conn, req.resident_id, req.residence_id)?;
        let template =
            guards::load_template_in_residence(conn, req.task_template_id, req.residence_id)?;
        let selected_status_text = resolve_status_text(&template, req.selected_status_index)?;

        let id = Uuid::new_v4();
        let new_row = dbm::NewTaskApplication {
            id,
            residence_id: req.residence_id,
            resident_id: req.resident_id,
            task_template_id: req.task_template_id,
            applied_by: actor.user_id,
            applied_at: now,
            selected_status_index: req.selected_status_index,
            selected_status_text,
        };

        use schema::task_application::dsl as A;
        diesel::insert_into(A::task_application).values(&new_row).execute(conn)?;

        let created = fetch_application(conn, id)?;
        audit::record_task_application_change(
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

/// Re-select (or clear) the status of an existing application. The text is
/// resolved against the template as it stands now; an application whose index
/// is untouched keeps the text captured at apply time.
pub fn update_application(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
    patch: TaskApplicationPatch,
) -> Result<dbm::TaskApplication, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_application(conn, id)?;

        let Some(selected_status_index) = patch.selected_status_index else {
            return Ok(current);
        };

        let template = fetch_template(conn, current.task_template_id)?;
        let selected_status_text = resolve_status_text(&template, selected_status_index)?;

        use schema::task_application::dsl as A;
        diesel::update(A::task_application.filter(A::id.eq(id)))
            .set((
                A::selected_status_index.eq(selected_status_index),
                A::selected_status_text.eq(selected_status_text),
                A::updated_at.eq(now),
            ))
            .execute(conn)?;

        let updated = fetch_application(conn, id)?;
        audit::record_task_application_change(
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

pub fn soft_delete_application(
    conn: &mut PgConnection,
    actor: &ActorContext,
    id: Uuid,
) -> Result<dbm::TaskApplication, MutationError> {
    conn.transaction(|conn| {
        let now = Utc::now();
        let current = find_application(conn, id)?;

        use schema::task_application::dsl as A;
        diesel::update(A::task_application.filter(A::id.eq(id)))
            .set((A::deleted_at.eq(Some(now)), A::updated_at.eq(now)))
            .execute(conn)?;

        let deleted = fetch_application(conn, id)?;
        audit::record_task_application_change(
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
    use chrono::Utc;

    fn template_with_slots() -> dbm::TaskTemplate {
        dbm::TaskTemplate {
            id: Uuid::nil(),
            residence_id: Uuid::nil(),
            name: "evening round".into(),
            status1: Some("Done".into()),
            status2: Some("Refused".into()),
            status3: None,
            status4: None,
            status5: None,
            status6: Some("Postponed".into()),
            audio_phrase: None,
            is_block: Some(false),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn no_index_resolves_to_no_text() {
        let tpl = template_with_slots();
        assert_eq!(resolve_status_text(&tpl, None), Ok(None));
    }

    #[test]
    fn filled_slot_copies_its_label() {
        let tpl = template_with_slots();
        assert_eq!(resolve_status_text(&tpl, Some(2)), Ok(Some("Refused".into())));
        assert_eq!(resolve_status_text(&tpl, Some(6)), Ok(Some("Postponed".into())));
    }

    #[test]
    fn empty_slot_passes_through_as_none() {
        let tpl = template_with_slots();
        assert_eq!(resolve_status_text(&tpl, Some(3)), Ok(None));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let tpl = template_with_slots();
        assert_eq!(
            resolve_status_text(&tpl, Some(0)),
            Err(MutationError::InvalidStatusIndex { index: 0 })
        );
        assert_eq!(
            resolve_status_text(&tpl, Some(7)),
            Err(MutationError::InvalidStatusIndex { index: 7 })
        );
        assert_eq!(
            resolve_status_text(&tpl, Some(-1)),
            Err(MutationError::InvalidStatusIndex { index: -1 })
        );
    }
}
