use crate::assignments::{build_new_assignment, AssignmentForm};
use crate::epoch::Family;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_present_str, parse_date, parse_params};
use crate::ipc::types::{AppCtx, Request};
use crate::roster::fetch_teacher_assignments;
use chrono::NaiveDate;
use serde_json::json;

async fn handle_load(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let (token, identity, ticket) = ctx.state.lock().await.begin(Family::Assignments)?;
    let backend = ctx.backend.as_ref();
    let (list, teacher) = tokio::join!(
        backend.assignments(&token, &identity.institution_id),
        fetch_teacher_assignments(backend, &token, &identity, true),
    );

    let mut state = ctx.state.lock().await;
    state.ensure_current(&ticket)?;
    let teacher = teacher?.non_empty()?;
    let page = &mut state.assignments;
    page.list = list?;
    page.teacher = teacher;
    page.loaded = true;
    log::info!("loaded {} assignments", page.list.len());
    Ok(json!(page.view()))
}

fn optional_date(params: &serde_json::Value, key: &str) -> Result<Option<Option<NaiveDate>>, HandlerErr> {
    match get_present_str(params, key) {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => parse_date(&raw, key).map(|d| Some(Some(d))),
    }
}

/// Keys that are present are applied; a new class always clears the section.
async fn handle_set_filter(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date_from = optional_date(&req.params, "dateFrom")?;
    let date_to = optional_date(&req.params, "dateTo")?;

    let mut state = ctx.state.lock().await;
    state.auth()?;
    let page = &mut state.assignments;
    if !page.loaded {
        return Err(HandlerErr::not_loaded("assignments"));
    }
    if let Some(class_name) = get_present_str(&req.params, "className") {
        page.filter.set_class(class_name);
    }
    if let Some(section_name) = get_present_str(&req.params, "sectionName") {
        if section_name.is_some() && page.filter.class_name.is_none() {
            return Err(HandlerErr::bad_params("choose a class before a section"));
        }
        page.filter.set_section(section_name);
    }
    if date_from.is_some() || date_to.is_some() {
        let from = date_from.unwrap_or(page.filter.date_from);
        let to = date_to.unwrap_or(page.filter.date_to);
        page.filter.set_dates(from, to);
    }
    Ok(json!(page.view()))
}

async fn handle_clear_filters(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.assignments.filter.clear();
    Ok(json!(state.assignments.view()))
}

async fn handle_create(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let form: AssignmentForm = parse_params(&req.params)?;
    let (token, identity, new_assignment, session) = {
        let state = ctx.state.lock().await;
        let (token, identity, session) = state.begin_write()?;
        if !state.assignments.loaded {
            return Err(HandlerErr::not_loaded("assignments"));
        }
        let new_assignment = build_new_assignment(&form, &state.assignments.teacher, &identity)?;
        (token, identity, new_assignment, session)
    };

    ctx.backend.create_assignment(&token, &new_assignment).await?;
    log::info!("created assignment {:?} for {}", new_assignment.title, new_assignment.class_name);

    let ticket = ctx.state.lock().await.epochs.begin(Family::Assignments);
    let refreshed = ctx
        .backend
        .assignments(&token, &identity.institution_id)
        .await;
    let mut state = ctx.state.lock().await;
    match refreshed {
        Ok(list) if state.same_session(&session) && state.epochs.is_current(&ticket) => {
            state.assignments.list = list;
        }
        Ok(_) => {}
        Err(e) => log::warn!("assignment created but list refresh failed: {e}"),
    }
    Ok(json!({
        "created": new_assignment,
        "view": state.assignments.view(),
    }))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assignments.load" => handle_load(ctx).await,
        "assignments.setFilter" => handle_set_filter(ctx, req).await,
        "assignments.clearFilters" => handle_clear_filters(ctx).await,
        "assignments.create" => handle_create(ctx, req).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
