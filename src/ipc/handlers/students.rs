use crate::epoch::Family;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, parse_params};
use crate::ipc::types::{AppCtx, Request, StudentsPage};
use crate::roster::{filter_students, unique_sorted, StudentFilter};
use serde_json::json;

fn students_view(page: &StudentsPage) -> Result<serde_json::Value, HandlerErr> {
    let students = page
        .students
        .as_deref()
        .ok_or_else(|| HandlerErr::not_loaded("students"))?;
    let shown = filter_students(students, &page.filter);
    Ok(json!({
        "students": shown,
        "shown": shown.len(),
        "total": students.len(),
        "filter": page.filter,
        "filterActive": page.filter.is_active(),
        "classes": unique_sorted(students.iter().map(|s| s.class_name.as_str())),
        "academicYears": unique_sorted(students.iter().map(|s| s.academic_year.as_str())),
    }))
}

async fn handle_load(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let (token, _identity, ticket) = ctx.state.lock().await.begin(Family::Students)?;
    let fetched = ctx.backend.students(&token).await;

    let mut state = ctx.state.lock().await;
    state.ensure_current(&ticket)?;
    let students = fetched?;
    log::info!("loaded {} students", students.len());
    state.students.students = Some(students);
    students_view(&state.students)
}

async fn handle_filter(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let filter: StudentFilter = parse_params(&req.params)?;
    let mut state = ctx.state.lock().await;
    state.auth()?;
    state.students.filter = filter;
    students_view(&state.students)
}

async fn handle_get(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let state = ctx.state.lock().await;
    state.auth()?;
    let students = state
        .students
        .students
        .as_deref()
        .ok_or_else(|| HandlerErr::not_loaded("students"))?;
    let student = students
        .iter()
        .find(|s| s.id == student_id)
        .ok_or_else(|| HandlerErr::new("not_found", format!("student {student_id} not found")))?;
    Ok(json!({ "student": student }))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.load" => handle_load(ctx).await,
        "students.filter" => handle_filter(ctx, req).await,
        "students.get" => handle_get(ctx, req).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
