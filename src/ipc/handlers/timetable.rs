use crate::epoch::Family;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppCtx, Request};
use crate::timetable::build_view;
use serde_json::json;

async fn handle_load(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    let (token, identity, ticket) = ctx.state.lock().await.begin(Family::Timetable)?;
    let fetched = ctx
        .backend
        .timetable(&token, &identity.institution_id)
        .await;

    ctx.state.lock().await.ensure_current(&ticket)?;
    Ok(json!(build_view(&identity.teacher_id, &fetched?)))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "timetable.load" => handle_load(ctx).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
