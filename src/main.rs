mod assignments;
mod attendance;
mod config;
mod epoch;
mod gateway;
mod ipc;
mod logging;
mod marks;
mod model;
mod roster;
mod session;
#[cfg(test)]
mod testing;
mod timetable;

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::PortalConfig::from_env();
    logging::init(&config);

    let backend = gateway::HttpGateway::new(config.clone()).context("building backend client")?;
    let ctx = Arc::new(ipc::AppCtx::new(config, Arc::new(backend)));
    log::info!(
        "portald {} ready, backend {}",
        env!("CARGO_PKG_VERSION"),
        ctx.config.api_url
    );

    // stdout is the response channel; a single writer keeps lines whole.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = tx.send(resp.to_string());
                continue;
            }
        };

        let ctx = Arc::clone(&ctx);
        let tx = tx.clone();
        tokio::spawn(async move {
            let resp = ipc::handle_request(&ctx, req).await;
            let _ = tx.send(resp.to_string());
        });
    }

    // Tasks still running hold their own senders; the writer drains until they finish.
    drop(tx);
    let _ = writer.await;
    log::info!("stdin closed, shutting down");
    Ok(())
}
