use crate::ipc::error::ok;
use crate::ipc::types::{AppCtx, Request};
use serde_json::json;

async fn handle_health(ctx: &AppCtx, req: &Request) -> serde_json::Value {
    let authenticated = ctx.state.lock().await.auth().is_ok();
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "apiUrl": ctx.config.api_url,
            "authenticated": authenticated,
        }),
    )
}

pub async fn try_handle(ctx: &AppCtx, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(ctx, req).await),
        _ => None,
    }
}
