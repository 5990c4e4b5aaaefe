//! WebSocket transport to the messaging sidecar.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    tokio::sync::{Mutex, RwLock, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, error, info, warn},
    uuid::Uuid,
};

use charla_common::Error;

use crate::{
    Connector,
    types::{ClientOp, ConnectorCommand, ConnectorEvent, OpOutput},
};

/// Callback for events that are not command results.
pub type EventCallback = Arc<dyn Fn(ConnectorEvent) + Send + Sync>;

/// Resolution of one in-flight sidecar request.
#[derive(Debug)]
struct CommandOutcome {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<CommandOutcome>>>>;

/// Handle for communicating with the sidecar.
#[derive(Clone)]
pub struct WsConnector {
    /// Sender for outgoing commands to the sidecar.
    tx: mpsc::Sender<ConnectorCommand>,
    /// In-flight request/response correlation.
    pending: PendingMap,
    /// Connection state.
    connected: Arc<RwLock<bool>>,
    request_timeout: Duration,
}

impl WsConnector {
    /// Check if connected to the sidecar.
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    async fn send_command(&self, cmd: ConnectorCommand) -> charla_common::Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| Error::UpstreamError("sidecar connection lost".into()))
    }

    /// Send a command that expects a correlated `command_result` event.
    async fn request(
        &self,
        request_id: String,
        cmd: ConnectorCommand,
    ) -> charla_common::Result<CommandOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(e) = self.send_command(cmd).await {
            self.pending.lock().await.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(Error::UpstreamError("sidecar connection lost".into())),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                Err(Error::UpstreamError("sidecar request timed out".into()))
            },
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn login(&self, token: &str, auth_dir: Option<String>) -> charla_common::Result<()> {
        debug!(token, "sending login command");
        self.send_command(ConnectorCommand::Login {
            token: token.to_string(),
            auth_dir,
        })
        .await
    }

    async fn logout(&self, token: &str) -> charla_common::Result<()> {
        let request_id = Uuid::new_v4().to_string();
        debug!(token, request_id, "sending logout command");

        let outcome = self
            .request(request_id.clone(), ConnectorCommand::Logout {
                token: token.to_string(),
                request_id,
            })
            .await?;

        if outcome.success {
            Ok(())
        } else {
            Err(Error::UpstreamError(
                outcome.error.unwrap_or_else(|| "logout failed".into()),
            ))
        }
    }

    async fn close(&self, token: &str) -> charla_common::Result<()> {
        debug!(token, "sending close command");
        self.send_command(ConnectorCommand::Close {
            token: token.to_string(),
        })
        .await
    }

    async fn invoke(&self, token: &str, op: ClientOp) -> charla_common::Result<OpOutput> {
        let request_id = Uuid::new_v4().to_string();
        debug!(token, request_id, ?op, "invoking client operation");

        let outcome = self
            .request(request_id.clone(), ConnectorCommand::Invoke {
                token: token.to_string(),
                request_id,
                op: op.clone(),
            })
            .await?;

        if outcome.success {
            op.parse_output(outcome.data)
        } else {
            Err(Error::UpstreamError(
                outcome.error.unwrap_or_else(|| "command failed".into()),
            ))
        }
    }
}

/// Connect to the sidecar and spawn reader/writer tasks.
pub async fn connect_to_sidecar(
    url: &str,
    request_timeout: Duration,
    on_event: EventCallback,
) -> Result<(WsConnector, oneshot::Receiver<()>)> {
    info!(url = %url, "connecting to messaging sidecar");

    let (ws_stream, _) = connect_async(url)
        .await
        .context("failed to connect to sidecar")?;

    info!("connected to messaging sidecar");

    let (mut write, mut read) = ws_stream.split();

    // Channel for outgoing commands.
    let (tx, mut rx) = mpsc::channel::<ConnectorCommand>(32);

    // Channel for disconnect notification.
    let (disconnect_tx, disconnect_rx) = oneshot::channel();

    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let connected = Arc::new(RwLock::new(true));
    let pending_reader = Arc::clone(&pending);
    let connected_reader = Arc::clone(&connected);
    let connected_writer = Arc::clone(&connected);

    // Spawn reader task.
    tokio::spawn(async move {
        while let Some(msg_result) = read.next().await {
            match msg_result {
                Ok(Message::Text(text)) => match serde_json::from_str::<ConnectorEvent>(&text) {
                    Ok(ConnectorEvent::CommandResult {
                        request_id,
                        success,
                        data,
                        error,
                    }) => {
                        let waiter = pending_reader.lock().await.remove(&request_id);
                        match waiter {
                            Some(tx) => {
                                let _ = tx.send(CommandOutcome {
                                    success,
                                    data,
                                    error,
                                });
                            },
                            None => {
                                warn!(request_id, "result for unknown request");
                            },
                        }
                    },
                    Ok(event) => {
                        debug!(?event, "received event from sidecar");
                        on_event(event);
                    },
                    Err(e) => {
                        warn!(error = %e, text = %text, "failed to parse sidecar event");
                    },
                },
                Ok(Message::Close(_)) => {
                    info!("sidecar connection closed");
                    break;
                },
                Ok(_) => {}, // Ignore ping/pong/binary
                Err(e) => {
                    error!(error = %e, "WebSocket read error");
                    break;
                },
            }
        }

        // Fail any requests still waiting on this connection.
        pending_reader.lock().await.clear();
        *connected_reader.write().await = false;
        let _ = disconnect_tx.send(());
    });

    // Spawn writer task.
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            match serde_json::to_string(&cmd) {
                Ok(json) => {
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        error!(error = %e, "failed to send command to sidecar");
                        break;
                    }
                    debug!(?cmd, "sent command to sidecar");
                },
                Err(e) => {
                    error!(error = %e, "failed to serialize command");
                },
            }
        }

        *connected_writer.write().await = false;
    });

    Ok((
        WsConnector {
            tx,
            pending,
            connected,
            request_timeout,
        },
        disconnect_rx,
    ))
}

/// Try to connect to the sidecar with retries.
pub async fn connect_with_retry(
    url: &str,
    request_timeout: Duration,
    on_event: EventCallback,
    max_retries: u32,
) -> Result<(WsConnector, oneshot::Receiver<()>)> {
    let mut attempt = 0;
    loop {
        match connect_to_sidecar(url, request_timeout, Arc::clone(&on_event)).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(e);
                }
                warn!(
                    attempt,
                    max_retries,
                    error = %e,
                    "failed to connect to sidecar, retrying..."
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            },
        }
    }
}
