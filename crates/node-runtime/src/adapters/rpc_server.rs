//! Downstream subscription server: the same `vulcanizedb_stream` method
//! exposed on a WebSocket and on an IPC (Unix domain socket) endpoint,
//! both speaking JSON-RPC 2.0 against the subscriber table `Screener`
//! already owns (§6: "exposes the same subscription method ... under
//! namespace `vulcanizedb`").
//!
//! `jsonrpsee`'s server builder only binds TCP transports, so the WS
//! endpoint goes through it directly; the IPC endpoint reuses the same
//! request/notification shapes over a hand-framed newline-delimited
//! socket, the way the two transports in the upstream chain node's own
//! `rpc.StartIPCEndpoint`/`rpc.StartWSEndpoint` share one handler.

use std::sync::Arc;

use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use screener_server::ports::inbound::ScreenerServerApi;
use shared_bus::QuitWatch;
use shared_types::filters::SubscriptionFilters;

const SUBSCRIBE_METHOD: &str = "vulcanizedb_stream";
const NOTIF_METHOD: &str = "vulcanizedb_subscription";
const UNSUBSCRIBE_METHOD: &str = "vulcanizedb_unsubscribe";

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    filters: SubscriptionFilters,
    #[serde(default)]
    historical_range: Option<(u64, u64)>,
}

fn build_module(screener: Arc<dyn ScreenerServerApi>) -> RpcModule<()> {
    let mut module = RpcModule::new(());
    module
        .register_subscription(SUBSCRIBE_METHOD, NOTIF_METHOD, UNSUBSCRIBE_METHOD, move |params, pending, _ctx, _ext| {
            let screener = Arc::clone(&screener);
            async move {
                let SubscribeParams { filters, historical_range } = params.parse()?;
                let sink = pending.accept().await?;
                let mut handle = screener.subscribe(filters, historical_range);

                while let Some(payload) = handle.frames.recv().await {
                    let message = SubscriptionMessage::from_json(&payload)?;
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }

                screener.unsubscribe(handle.id);
                Ok(())
            }
        })
        .expect("vulcanizedb_stream is the only subscription registered; name cannot collide");
    module
}

/// Binds the WebSocket endpoint. The returned handle keeps the server
/// alive; dropping it (or calling `stop()`) shuts it down.
pub async fn serve_ws(ws_endpoint: &str, screener: Arc<dyn ScreenerServerApi>) -> anyhow::Result<ServerHandle> {
    let server = ServerBuilder::default().build(ws_endpoint).await?;
    Ok(server.start(build_module(screener)))
}

#[derive(Debug, Deserialize)]
struct IpcRequest {
    id: serde_json::Value,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct IpcResponse<'a> {
    jsonrpc: &'static str,
    id: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObjectOwned>,
}

#[derive(Debug, Serialize)]
struct IpcNotification {
    jsonrpc: &'static str,
    method: &'static str,
    params: IpcNotificationParams,
}

#[derive(Debug, Serialize)]
struct IpcNotificationParams {
    subscription: String,
    result: serde_json::Value,
}

/// Binds the IPC endpoint. One task per connection; each subscription
/// spawns its own forwarding task, torn down on unsubscribe or on the
/// connection closing. Runs until `quit` fires.
pub async fn serve_ipc(ipc_path: &str, screener: Arc<dyn ScreenerServerApi>, mut quit: QuitWatch) -> anyhow::Result<()> {
    let _ = std::fs::remove_file(ipc_path);
    let listener = UnixListener::bind(ipc_path)?;

    loop {
        tokio::select! {
            biased;

            _ = quit.wait() => return Ok(()),

            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let screener = Arc::clone(&screener);
                tokio::spawn(async move {
                    if let Err(err) = handle_ipc_connection(stream, screener).await {
                        warn!(stage = "node-runtime", %err, "ipc connection ended with an error");
                    }
                });
            }
        }
    }
}

async fn handle_ipc_connection(stream: UnixStream, screener: Arc<dyn ScreenerServerApi>) -> anyhow::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                debug!(stage = "node-runtime", %err, "dropping malformed ipc request");
                continue;
            }
        };

        if request.method == SUBSCRIBE_METHOD {
            let SubscribeParams { filters, historical_range } = serde_json::from_value(request.params)?;
            let mut handle = screener.subscribe(filters, historical_range);
            let subscription_id = handle.id.to_string();

            let response = IpcResponse {
                jsonrpc: "2.0",
                id: &request.id,
                result: Some(serde_json::to_value(&subscription_id)?),
                error: None,
            };
            write_half.write_all(serde_json::to_string(&response)?.as_bytes()).await?;
            write_half.write_all(b"\n").await?;

            while let Some(payload) = handle.frames.recv().await {
                let notification = IpcNotification {
                    jsonrpc: "2.0",
                    method: NOTIF_METHOD,
                    params: IpcNotificationParams {
                        subscription: subscription_id.clone(),
                        result: serde_json::to_value(&payload)?,
                    },
                };
                if write_half.write_all(serde_json::to_string(&notification)?.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }

            screener.unsubscribe(handle.id);
            return Ok(());
        }

        if request.method == UNSUBSCRIBE_METHOD {
            // One subscription per connection in this transport; closing the
            // connection (or the frames loop above returning) already tears
            // it down, so an explicit unsubscribe call is a no-op success.
            let response = IpcResponse {
                jsonrpc: "2.0",
                id: &request.id,
                result: Some(serde_json::Value::Bool(true)),
                error: None,
            };
            write_half.write_all(serde_json::to_string(&response)?.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
        }
    }

    Ok(())
}
