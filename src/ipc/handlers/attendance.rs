use crate::attendance::{
    build_mark, build_view, change_entry, fetch_board, mark_time, AttendanceError, AttendanceFilter,
};
use crate::epoch::Family;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_date, parse_params};
use crate::ipc::types::{AppCtx, Request};
use crate::model::AttendanceStatus;
use chrono::{Local, NaiveDate};
use serde_json::json;

fn selected_date(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match get_optional_str(params, "date") {
        Some(raw) if !raw.trim().is_empty() => parse_date(&raw, "date"),
        _ => Ok(Local::now().date_naive()),
    }
}

async fn handle_load(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date = selected_date(&req.params)?;
    let (token, identity, ticket) = ctx.state.lock().await.begin(Family::Attendance)?;
    let fetched = fetch_board(ctx.backend.as_ref(), &token, &identity, date).await;

    let mut state = ctx.state.lock().await;
    state.ensure_current(&ticket)?;
    let board = fetched?;
    let view = build_view(&board, &AttendanceFilter::default());
    state.attendance.board = Some(board);
    Ok(json!(view))
}

async fn handle_view(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let filter: AttendanceFilter = parse_params(&req.params)?;
    let state = ctx.state.lock().await;
    state.auth()?;
    let board = state.attendance.board()?;
    Ok(json!(build_view(board, &filter)))
}

/// First mark for a student on the loaded date. No reason needed.
async fn handle_mark(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let raw_status = get_optional_str(&req.params, "status").unwrap_or_default();

    let (token, date, mark, status, session) = {
        let mut state = ctx.state.lock().await;
        let (token, identity, session) = state.begin_write()?;
        let board = state.attendance.board()?;
        let student = board.check_first_mark(&student_id)?;
        if raw_status.trim().is_empty() {
            return Err(AttendanceError::StatusRequired.into());
        }
        let status = AttendanceStatus::parse(&raw_status)
            .ok_or_else(|| AttendanceError::InvalidStatus(raw_status.trim().to_string()))?;
        let date = board.date;
        let mark = build_mark(student, date, status, "", &identity);
        state.attendance.claim_first_mark(date, &student_id)?;
        (token, date, mark, status, session)
    };

    let written = ctx.backend.mark_attendance(&token, &mark).await;

    let time = mark_time(status, Local::now());
    let mut state = ctx.state.lock().await;
    let current = state.same_session(&session);
    if current {
        state.attendance.release_first_mark(date, &student_id);
    }
    written?;
    let applied = current
        && state
            .attendance
            .apply_confirmed(date, &student_id, status, time.clone())
            .is_some();
    if !applied {
        log::info!("attendance for {student_id} on {date} saved after the board moved on");
    }
    Ok(json!({
        "studentId": student_id,
        "date": date.format("%Y-%m-%d").to_string(),
        "status": status,
        "time": time,
        "applied": applied,
    }))
}

/// Change an existing mark. Status and a non-blank reason are checked
/// before anything is sent.
async fn handle_amend(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let raw_status = get_optional_str(&req.params, "status");
    let reason = get_optional_str(&req.params, "reason").unwrap_or_default();

    let (token, date, mark, status, previous, student, session) = {
        let state = ctx.state.lock().await;
        let (token, identity, session) = state.begin_write()?;
        let board = state.attendance.board()?;
        let (student, status, reason) =
            board.check_amendment(&student_id, raw_status.as_deref(), &reason)?;
        let previous = board.cell(&student_id).label().to_string();
        let mark = build_mark(student, board.date, status, &reason, &identity);
        (token, board.date, mark, status, previous, student.clone(), session)
    };

    ctx.backend.mark_attendance(&token, &mark).await?;

    let time = mark_time(status, Local::now());
    let entry = change_entry(&student, previous, status, mark.remarks.clone());
    let mut state = ctx.state.lock().await;
    let current = state.same_session(&session);
    let applied = current
        && state
            .attendance
            .apply_confirmed(date, &student_id, status, time.clone())
            .is_some();
    if current {
        state.attendance.history.push(entry.clone());
    } else {
        log::info!("amendment for {student_id} on {date} landed after a session change");
    }
    Ok(json!({
        "studentId": student_id,
        "date": date.format("%Y-%m-%d").to_string(),
        "status": status,
        "time": time,
        "applied": applied,
        "change": entry,
    }))
}

async fn handle_history(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let state = ctx.state.lock().await;
    state.auth()?;
    Ok(json!({ "changes": state.attendance.history }))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.load" => handle_load(ctx, req).await,
        "attendance.view" => handle_view(ctx, req).await,
        "attendance.mark" => handle_mark(ctx, req).await,
        "attendance.amend" => handle_amend(ctx, req).await,
        "attendance.history" => handle_history(ctx).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
