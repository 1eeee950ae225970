//! Stdio MCP server: read loop, concurrent request tasks, single writer.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::mcp::codec::{read_message, write_message};
use crate::mcp::router;
use crate::mcp::types::{CancelledParams, RpcMessage, RpcResponse, JSONRPC_VERSION};
use crate::tools::ToolAdapter;
use crate::types::{Error, Result, ServerConfig, RPC_INVALID_REQUEST, RPC_PARSE_ERROR};

type InFlight = Arc<Mutex<HashMap<String, CancellationToken>>>;

/// MCP server wrapping the tool adapter.
#[derive(Debug)]
pub struct McpServer {
    adapter: Arc<ToolAdapter>,
    config: ServerConfig,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(adapter: Arc<ToolAdapter>, config: ServerConfig) -> Self {
        Self {
            adapter,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the server when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request shutdown. In-flight calls are aborted.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Serve on the process's stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Run until EOF, cancellation, or a transport error.
    ///
    /// On EOF, calls already started run to completion and their responses are
    /// flushed before this returns.
    pub async fn serve<R, W>(&self, mut reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let max_in_flight = self.config.max_in_flight.max(1);
        let (tx, rx) = mpsc::channel::<String>(max_in_flight * 2);
        let write_timeout = Duration::from_secs(self.config.write_timeout_secs);
        let writer_task = tokio::spawn(write_loop(writer, rx, write_timeout));

        let permits = Arc::new(Semaphore::new(max_in_flight));
        let in_flight: InFlight = Arc::default();
        let mut tasks = JoinSet::new();

        tracing::info!(max_in_flight, "MCP server reading from stdio");

        let outcome: Result<()> = loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("MCP server shutting down");
                    break Ok(());
                }
                read = read_message(&mut reader, self.config.max_line_bytes) => read,
            };

            let line = match read {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("stdin closed");
                    break Ok(());
                }
                Err(e) => {
                    tracing::warn!("read error: {}", e);
                    break Err(e.into());
                }
            };

            while tasks.try_join_next().is_some() {}

            self.handle_line(&line, &tx, &permits, &in_flight, &mut tasks)
                .await;
        };

        if self.cancel.is_cancelled() {
            tasks.abort_all();
        }
        while tasks.join_next().await.is_some() {}

        drop(tx);
        writer_task
            .await
            .map_err(|e| Error::internal(format!("writer task failed: {}", e)))??;

        outcome
    }

    async fn handle_line(
        &self,
        line: &[u8],
        tx: &mpsc::Sender<String>,
        permits: &Arc<Semaphore>,
        in_flight: &InFlight,
        tasks: &mut JoinSet<()>,
    ) {
        // Invalid UTF-8 fails here too, as a parse error.
        let message: RpcMessage = match serde_json::from_slice(line) {
            Ok(m) => m,
            Err(e) => {
                send(tx, RpcResponse::error(Value::Null, RPC_PARSE_ERROR, format!("Parse error: {}", e))).await;
                return;
            }
        };

        if message.jsonrpc != JSONRPC_VERSION {
            let id = message.id.unwrap_or(Value::Null);
            send(
                tx,
                RpcResponse::error(id, RPC_INVALID_REQUEST, "Unsupported jsonrpc version (expected 2.0)"),
            )
            .await;
            return;
        }

        let Some(method) = message.method else {
            // Client-side responses; this server never sends requests.
            tracing::debug!("ignoring message without method");
            return;
        };

        let Some(id) = message.id else {
            handle_notification(&method, message.params, in_flight);
            return;
        };

        tracing::debug!(%id, %method, "request");

        let key = id.to_string();
        let token = self.cancel.child_token();
        let registered = {
            let mut map = lock(in_flight);
            if map.contains_key(&key) {
                false
            } else {
                map.insert(key.clone(), token.clone());
                true
            }
        };
        if !registered {
            tracing::warn!(%id, %method, "duplicate in-flight request id");
            send(
                tx,
                RpcResponse::error(id, RPC_INVALID_REQUEST, format!("Request id {} is already in flight", key)),
            )
            .await;
            return;
        }

        // Reading stops here while every slot is busy.
        let permit = tokio::select! {
            _ = self.cancel.cancelled() => None,
            permit = permits.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            lock(in_flight).remove(&key);
            return;
        };

        let adapter = self.adapter.clone();
        let in_flight = in_flight.clone();
        let tx = tx.clone();
        let params = message.params;

        tasks.spawn(async move {
            let _permit = permit;
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = router::route_request(&adapter, &method, params) => Some(result),
            };
            lock(&in_flight).remove(&key);

            let response = match outcome {
                None => {
                    tracing::debug!(%id, %method, "request cancelled");
                    return;
                }
                Some(Ok(result)) => RpcResponse::success(id, result),
                Some(Err(e)) => {
                    tracing::debug!(%id, %method, error = %e, "request failed");
                    RpcResponse::error(id, e.to_rpc_code(), e.to_string())
                }
            };
            send(&tx, response).await;
        });
    }
}

fn handle_notification(method: &str, params: Option<Value>, in_flight: &InFlight) {
    match method {
        "notifications/cancelled" => {
            let params: CancelledParams =
                match serde_json::from_value(params.unwrap_or(Value::Null)) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::debug!("malformed cancel notification: {}", e);
                        return;
                    }
                };
            let key = params.request_id.to_string();
            if let Some(token) = lock(in_flight).get(&key) {
                tracing::info!(request_id = %key, reason = ?params.reason, "cancelling request");
                token.cancel();
            }
        }
        "notifications/initialized" => tracing::debug!("client initialized"),
        other => tracing::debug!(method = other, "ignoring notification"),
    }
}

fn lock(in_flight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn send(tx: &mpsc::Sender<String>, response: RpcResponse) {
    match serde_json::to_string(&response) {
        Ok(line) => {
            if tx.send(line).await.is_err() {
                tracing::debug!("writer closed, dropping response");
            }
        }
        Err(e) => tracing::error!("response encoding failed: {}", e),
    }
}

/// Drain responses to the writer. One task owns the writer so lines never interleave.
async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<String>,
    timeout: Duration,
) -> std::io::Result<()> {
    while let Some(line) = rx.recv().await {
        tokio::time::timeout(timeout, write_message(&mut writer, &line))
            .await
            .map_err(|_| {
                tracing::warn!("Write timeout ({}s), closing output", timeout.as_secs());
                std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout")
            })??;
    }
    Ok(())
}
