use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppCtx, Request};
use crate::roster::fetch_teacher_assignments;

/// `allocations.summary {teacherScoped?}`: the session teacher's classes,
/// sections and subjects. A teacher with no rows is an error here.
async fn handle_summary(ctx: &AppCtx, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let teacher_scoped = req
        .params
        .get("teacherScoped")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let (token, identity) = ctx.state.lock().await.auth()?;
    let teacher =
        fetch_teacher_assignments(ctx.backend.as_ref(), &token, &identity, teacher_scoped)
            .await?
            .non_empty()?;
    serde_json::to_value(&teacher).map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "allocations.summary" => handle_summary(ctx, req).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
