use crate::epoch::Family;
use crate::gateway::GatewayError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_present_str, get_required_str};
use crate::ipc::types::{AppCtx, Request};
use crate::marks::{index_marks, ExamsPage, MarkKey, MarksError, SaveScope};
use crate::roster::{fetch_teacher_assignments, TeacherAssignments};
use serde_json::json;

/// Failed fetches on this page degrade to an empty list plus a warning.
fn or_warn<T: Default>(what: &str, result: Result<T, GatewayError>, warnings: &mut Vec<String>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            log::warn!("exams page: {what} unavailable: {e}");
            warnings.push(format!("could not load {what}: {e}"));
            T::default()
        }
    }
}

async fn handle_load(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let (token, identity, ticket) = ctx.state.lock().await.begin(Family::Exams)?;
    let backend = ctx.backend.as_ref();
    let (teacher, exams, schedules, students, marks) = tokio::join!(
        fetch_teacher_assignments(backend, &token, &identity, true),
        backend.exams(&token),
        backend.exam_schedules(&token),
        backend.students(&token),
        backend.exam_marks(&token),
    );

    let mut warnings = Vec::new();
    let teacher: TeacherAssignments = or_warn("teaching assignments", teacher, &mut warnings);
    let page = ExamsPage {
        teacher,
        exams: or_warn("exams", exams, &mut warnings),
        schedules: or_warn("exam schedules", schedules, &mut warnings),
        roster: or_warn("students", students, &mut warnings),
        existing: index_marks(or_warn("saved marks", marks, &mut warnings)),
        warnings,
        grid: None,
    };

    let mut state = ctx.state.lock().await;
    state.ensure_current(&ticket)?;
    state.exams = page;
    Ok(json!(state.exams.overview()))
}

fn grid_json(page: &ExamsPage) -> Result<serde_json::Value, HandlerErr> {
    let grid = page.grid()?;
    let view = grid.view(&page.existing);
    Ok(json!({
        "assigned": grid.subject.is_some(),
        "grid": view,
    }))
}

async fn handle_select(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(&req.params, "examId")?;
    let mut state = ctx.state.lock().await;
    state.auth()?;
    let grid = state.exams.open(&exam_id)?;
    if grid.subject.is_none() {
        log::info!("teacher has no subject to grade in exam {exam_id}");
    }
    grid_json(&state.exams)
}

async fn handle_grid(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.exams.editable_grid()?;
    grid_json(&state.exams)
}

async fn handle_set_filter(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let search = get_present_str(&req.params, "search").map(Option::unwrap_or_default);
    let section = get_present_str(&req.params, "section");
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.exams.editable_grid()?.set_filter(search, section);
    grid_json(&state.exams)
}

async fn handle_clear_filters(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.exams.editable_grid()?.clear_filters();
    grid_json(&state.exams)
}

async fn handle_set_page(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let page = req
        .params
        .get("page")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing page"))?;
    let mut state = ctx.state.lock().await;
    state.auth()?;
    let page = usize::try_from(page).unwrap_or(usize::MAX);
    state.exams.editable_grid()?.set_page(page);
    grid_json(&state.exams)
}

async fn handle_enter_mark(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let raw = req.params.get("value").cloned().unwrap_or(serde_json::Value::Null);
    let mut state = ctx.state.lock().await;
    state.auth()?;
    let grid = state.exams.editable_grid()?;
    let value = grid.enter(&student_id, &raw)?;
    Ok(json!({
        "studentId": student_id,
        "value": value,
        "maxMarks": grid.max_marks,
        "pendingEdits": grid.pending_count(),
    }))
}

async fn handle_save(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let scope = match get_optional_str(&req.params, "scope").as_deref() {
        None | Some("page") => SaveScope::Page,
        Some("edited") => SaveScope::Edited,
        Some(other) => {
            return Err(HandlerErr::bad_params(format!(
                "scope must be page or edited, got {other}"
            )))
        }
    };

    let (token, exam_id, plan, session) = {
        let state = ctx.state.lock().await;
        let (token, _identity, session) = state.begin_write()?;
        let exams = &state.exams;
        let grid = exams.grid.as_ref().ok_or(MarksError::NoExamSelected)?;
        let plan = grid.plan_save(scope, &exams.existing)?;
        (token, grid.exam.id.clone(), plan, session)
    };

    ctx.backend.save_exam_marks(&token, &plan.entries).await?;
    if plan.dropped_edits > 0 {
        log::warn!(
            "saved page of exam {exam_id}; {} edits on other pages discarded",
            plan.dropped_edits
        );
    }

    let mut state = ctx.state.lock().await;
    if !state.same_session(&session) {
        log::info!("marks for exam {exam_id} saved after a session change");
    } else {
        let exams = &mut state.exams;
        match exams.grid.as_mut().filter(|g| g.exam.id == exam_id) {
            Some(grid) => grid.commit_save(&plan, &mut exams.existing),
            None => {
                for e in &plan.entries {
                    exams.existing.insert(
                        MarkKey::new(&e.exam_id, &e.subject, &e.student_id),
                        e.marks_obtained,
                    );
                }
            }
        }
    }
    Ok(json!({
        "saved": plan.entries.len(),
        "droppedEdits": plan.dropped_edits,
        "scope": scope,
    }))
}

async fn handle_close(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.exams.grid = None;
    Ok(json!(state.exams.overview()))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "exams.load" => handle_load(ctx).await,
        "exams.select" => handle_select(ctx, req).await,
        "exams.grid" => handle_grid(ctx).await,
        "exams.setFilter" => handle_set_filter(ctx, req).await,
        "exams.clearFilters" => handle_clear_filters(ctx).await,
        "exams.setPage" => handle_set_page(ctx, req).await,
        "exams.enterMark" => handle_enter_mark(ctx, req).await,
        "exams.save" => handle_save(ctx, req).await,
        "exams.close" => handle_close(ctx).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
