use super::handlers;
use super::types::{AppCtx, Request};
use crate::ipc::error::err;

pub async fn handle_request(ctx: &AppCtx, req: Request) -> serde_json::Value {
    log::debug!("request {} {}", req.id, req.method);
    if let Some(resp) = handlers::core::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::session::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::allocations::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::assignments::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::exams::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::timetable::try_handle(ctx, &req).await {
        return resp;
    }
    if let Some(resp) = handlers::communication::try_handle(ctx, &req).await {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
