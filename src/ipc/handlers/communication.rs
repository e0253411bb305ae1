use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppCtx, Request};
use serde_json::json;

/// The messaging page has no backend yet; the inbox is always empty.
async fn handle_inbox(ctx: &AppCtx) -> Result<serde_json::Value, HandlerErr> {
    ctx.state.lock().await.auth()?;
    Ok(json!({
        "messages": [],
        "unread": 0,
        "announcements": [],
    }))
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "communication.inbox" => handle_inbox(ctx).await,
        _ => return None,
    };
    Some(respond(&req.id, result))
}
