use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppCtx, Request};
use crate::session::Session;
use serde_json::json;

fn session_json(session: Option<&Session>) -> serde_json::Value {
    let Some(s) = session else {
        return json!({ "authenticated": false });
    };
    let identity = s.identity();
    json!({
        "authenticated": identity.is_some(),
        "teacherId": identity.as_ref().map(|i| i.teacher_id.clone()),
        "institutionId": identity.as_ref().map(|i| i.institution_id.clone()),
        "claims": s.claims,
        "staff": s.staff,
    })
}

async fn install(ctx: &AppCtx, session: Session) -> serde_json::Value {
    if session.claims.is_empty() {
        log::warn!("session token carries no claims; data methods will be refused");
    } else if session.identity().is_none() {
        log::warn!("session token lacks a teacher or institution id");
    }
    let mut state = ctx.state.lock().await;
    state.replace_session(Some(session));
    session_json(state.session.as_ref())
}

async fn handle_login(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let employee_id = get_required_str(&req.params, "employeeId")?;
    let password = get_required_str(&req.params, "password")?;
    if employee_id.trim().is_empty() || password.is_empty() {
        return Err(HandlerErr::bad_params("employee id and password are required"));
    }
    let reply = ctx.backend.login(employee_id.trim(), &password).await?;
    log::info!("staff {} signed in", employee_id.trim());
    Ok(install(ctx, Session::from_token(reply.token, reply.staff)).await)
}

async fn handle_restore(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let token = get_required_str(&req.params, "token")?;
    let staff = req.params.get("staff").filter(|v| !v.is_null()).cloned();
    Ok(install(ctx, Session::from_token(token, staff)).await)
}

async fn handle_get(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let state = ctx.state.lock().await;
    Ok(session_json(state.session.as_ref()))
}

async fn handle_logout(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    ctx.state.lock().await.replace_session(None);
    Ok(json!({ "authenticated": false }))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.login" => handle_login(ctx, req).await,
        "session.restore" => handle_restore(ctx, req).await,
        "session.get" => handle_get(ctx).await,
        "session.logout" => handle_logout(ctx).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
