//! Session worker and handle
//!
//! The worker owns the WebSocket and runs a single select loop per
//! connection (outbound commands, inbound frames, heartbeat, timeout
//! sweep, shutdown). Request-style emits carry a correlation id and
//! resolve through a pending-request map; both the waiter and the map
//! entry are cleaned up on every exit path (ack, timeout, disconnect)
//! so concurrent in-flight requests never collide.
//! `update_job_status` deliberately skips the ack machinery.

use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use shared::{ClientMessage, PrintJob, PrinterDescriptor, ServerMessage};

use crate::core::tasks::{BackgroundTasks, TaskKind};

use super::{ConnectionState, SessionConfig, SessionError, SessionSignal};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsRead = futures::stream::SplitStream<WsStream>;

enum Command {
    RegisterPrinter {
        printer: PrinterDescriptor,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    UpdatePrinterStatus {
        printer_id: String,
        status: String,
        metadata: serde_json::Value,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Heartbeat {
        printer_id: String,
    },
    GetPendingJobs {
        reply: oneshot::Sender<Result<Vec<PrintJob>, SessionError>>,
    },
    UpdateJobStatus {
        job_id: String,
        status: String,
        metadata: serde_json::Value,
    },
    Disconnect,
}

enum PendingKind {
    Register {
        printer: PrinterDescriptor,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Status {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    PendingJobs {
        reply: oneshot::Sender<Result<Vec<PrintJob>, SessionError>>,
    },
}

struct PendingRequest {
    kind: PendingKind,
    deadline: Instant,
}

/// How one connected session ended.
enum SessionEnd {
    Shutdown,
    Operator,
    Transport(String),
    AuthRejected(String),
}

/// Cloneable front door to the session worker.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Register a printer with the backend and await the ack.
    /// On success the descriptor enters the replay cache.
    pub async fn register_printer(
        &self,
        printer: PrinterDescriptor,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::RegisterPrinter { printer, reply: tx })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn update_printer_status(
        &self,
        printer_id: impl Into<String>,
        status: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::UpdatePrinterStatus {
                printer_id: printer_id.into(),
                status: status.into(),
                metadata,
                reply: tx,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Queue a heartbeat for one printer. Best effort.
    pub async fn send_heartbeat(&self, printer_id: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(Command::Heartbeat {
                printer_id: printer_id.into(),
            })
            .await;
    }

    /// Ask the backend for all pending jobs for this client.
    pub async fn get_all_pending_jobs(&self) -> Result<Vec<PrintJob>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::GetPendingJobs { reply: tx })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Fire-and-forget job status report. No ack is awaited, so
    /// concurrent jobs never race on a shared ack channel; a lost
    /// update does not affect local queue state.
    pub fn update_job_status(
        &self,
        job_id: impl Into<String>,
        status: impl Into<String>,
        metadata: serde_json::Value,
    ) {
        let _ = self.cmd_tx.try_send(Command::UpdateJobStatus {
            job_id: job_id.into(),
            status: status.into(),
            metadata,
        });
    }

    /// Operator-initiated disconnect: no reconnection follows.
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect).await;
    }
}

/// Spawn the session worker onto the task registry.
pub fn spawn_session(
    config: SessionConfig,
    signals: mpsc::UnboundedSender<SessionSignal>,
    tasks: &mut BackgroundTasks,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let worker = SessionWorker {
        config,
        cmd_rx,
        signals,
        state_tx,
        registered: Vec::new(),
        pending: HashMap::new(),
    };

    let token = tasks.shutdown_token();
    tasks.spawn("socket_session", TaskKind::Worker, async move {
        worker.run(token).await;
    });

    SessionHandle { cmd_tx, state_rx }
}

struct SessionWorker {
    config: SessionConfig,
    cmd_rx: mpsc::Receiver<Command>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    state_tx: watch::Sender<ConnectionState>,
    /// Insertion-ordered registered-printer cache, replayed after
    /// every reconnect.
    registered: Vec<PrinterDescriptor>,
    pending: HashMap<String, PendingRequest>,
}

impl SessionWorker {
    async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(url = %self.config.ws_url, "Session worker started");
        let mut attempt: u32 = 0;
        let mut ever_connected = false;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let end = self
                .connect_session(&shutdown, &mut attempt, &mut ever_connected)
                .await;
            self.fail_all_pending();

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Operator => {
                    tracing::info!("Operator disconnect, staying offline");
                    self.set_state(ConnectionState::Disconnected);
                    let _ = self.signals.send(SessionSignal::Disconnected {
                        reason: "operator disconnect".into(),
                    });
                    self.dormant(&shutdown).await;
                    break;
                }
                SessionEnd::AuthRejected(message) => {
                    // Retrying the same credentials would loop
                    // forever on the backend; surface and wait.
                    tracing::error!("Authentication rejected: {message}");
                    self.set_state(ConnectionState::Disconnected);
                    let _ = self.signals.send(SessionSignal::AuthFailed { message });
                    self.dormant(&shutdown).await;
                    break;
                }
                SessionEnd::Transport(reason) => {
                    tracing::warn!("Session ended: {reason}");
                    self.set_state(ConnectionState::Disconnected);
                    let _ = self.signals.send(SessionSignal::Disconnected {
                        reason: reason.clone(),
                    });

                    let delay = self.config.reconnect_delay(attempt);
                    attempt += 1;
                    let _ = self.signals.send(SessionSignal::Reconnecting {
                        attempt,
                        delay,
                    });
                    self.set_state(ConnectionState::Reconnecting);
                    if !self.sleep_with_commands(delay, &shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.fail_all_pending();
        tracing::info!("Session worker stopped");
    }

    /// Dial, authenticate and run the connected loop once.
    async fn connect_session(
        &mut self,
        shutdown: &CancellationToken,
        attempt: &mut u32,
        ever_connected: &mut bool,
    ) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);

        let ws = tokio::select! {
            _ = shutdown.cancelled() => return SessionEnd::Shutdown,
            result = tokio_tungstenite::connect_async(self.config.ws_url.as_str()) => match result {
                Ok((ws, _)) => ws,
                Err(e) => {
                    let _ = self.signals.send(SessionSignal::ReconnectFailed {
                        attempt: *attempt,
                        error: e.to_string(),
                    });
                    return SessionEnd::Transport(format!("connect failed: {e}"));
                }
            }
        };

        let (mut sink, mut stream) = ws.split();

        self.set_state(ConnectionState::Authenticating);
        let auth = ClientMessage::Authenticate {
            tenant_id: self.config.tenant_id.clone(),
            client_id: self.config.client_id.clone(),
            token: self.config.token.clone(),
            api_key: self.config.api_key.clone(),
        };
        if let Err(e) = send_msg(&mut sink, &auth).await {
            return SessionEnd::Transport(format!("auth send failed: {e}"));
        }
        match self.await_auth(&mut stream).await {
            Ok(()) => {}
            Err(SessionError::AuthRejected(message)) => {
                return SessionEnd::AuthRejected(message);
            }
            Err(e) => return SessionEnd::Transport(e.to_string()),
        }

        self.set_state(ConnectionState::Connected);
        let first = !*ever_connected;
        *ever_connected = true;
        let recovered_after = *attempt;
        *attempt = 0;

        if first {
            tracing::info!("Connected to backend");
            let _ = self.signals.send(SessionSignal::Connected);
        } else {
            // Replay the registration cache best-effort; the acks are
            // not awaited and a failure here is a transport failure.
            tracing::info!(
                printers = self.registered.len(),
                "Reconnected, replaying printer registrations"
            );
            for printer in self.registered.clone() {
                let msg = ClientMessage::RegisterPrinter {
                    request_id: None,
                    printer,
                };
                if let Err(e) = send_msg(&mut sink, &msg).await {
                    return SessionEnd::Transport(format!("re-registration failed: {e}"));
                }
            }
            let _ = self.signals.send(SessionSignal::Reconnected {
                attempt: recovered_after,
            });
        }

        self.connected_loop(shutdown, sink, stream).await
    }

    async fn connected_loop(
        &mut self,
        shutdown: &CancellationToken,
        mut sink: WsSink,
        mut stream: WsRead,
    ) -> SessionEnd {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.tick().await; // skip the immediate tick
        let mut sweep = tokio::time::interval(std::time::Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }

                cmd = self.cmd_rx.recv() => match cmd {
                    None => return SessionEnd::Shutdown,
                    Some(Command::Disconnect) => {
                        let _ = sink.close().await;
                        return SessionEnd::Operator;
                    }
                    Some(cmd) => {
                        if let Err(reason) = self.handle_command(cmd, &mut sink).await {
                            return SessionEnd::Transport(reason);
                        }
                    }
                },

                _ = heartbeat.tick() => {
                    for printer in self.registered.clone() {
                        let msg = ClientMessage::Heartbeat {
                            printer_id: printer.system_name,
                        };
                        if send_msg(&mut sink, &msg).await.is_err() {
                            return SessionEnd::Transport("heartbeat send failed".into());
                        }
                    }
                }

                _ = sweep.tick() => self.expire_pending(),

                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_server_message(&text),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        return SessionEnd::Transport("closed by server".into());
                    }
                    Some(Err(e)) => return SessionEnd::Transport(e.to_string()),
                    None => return SessionEnd::Transport("stream ended".into()),
                    _ => {}
                }
            }
        }
    }

    /// Wait for exactly one of `authenticated` / `auth_error`.
    async fn await_auth(&mut self, stream: &mut WsRead) -> Result<(), SessionError> {
        let wait = async {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(ServerMessage::Authenticated { success: true }) => {
                                return Ok(());
                            }
                            Ok(ServerMessage::Authenticated { success: false }) => {
                                return Err(SessionError::AuthRejected(
                                    "authentication refused".into(),
                                ));
                            }
                            Ok(ServerMessage::AuthError { message }) => {
                                return Err(SessionError::AuthRejected(message));
                            }
                            // Anything else before the auth ack is noise.
                            Ok(_) | Err(_) => continue,
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => return Err(SessionError::Closed),
                    Ok(_) => continue,
                }
            }
            Err(SessionError::Closed)
        };

        tokio::time::timeout(self.config.auth_timeout, wait)
            .await
            .map_err(|_| SessionError::Timeout("authenticate"))?
    }

    async fn handle_command(
        &mut self,
        cmd: Command,
        sink: &mut WsSink,
    ) -> Result<(), String> {
        match cmd {
            Command::RegisterPrinter { printer, reply } => {
                let request_id = uuid::Uuid::new_v4().to_string();
                let msg = ClientMessage::RegisterPrinter {
                    request_id: Some(request_id.clone()),
                    printer: printer.clone(),
                };
                match send_msg(sink, &msg).await {
                    Ok(()) => {
                        self.pending.insert(
                            request_id,
                            PendingRequest {
                                kind: PendingKind::Register { printer, reply },
                                deadline: Instant::now() + self.config.request_timeout,
                            },
                        );
                        Ok(())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(SessionError::Transport(e.to_string())));
                        Err(e.to_string())
                    }
                }
            }

            Command::UpdatePrinterStatus {
                printer_id,
                status,
                metadata,
                reply,
            } => {
                let request_id = uuid::Uuid::new_v4().to_string();
                let msg = ClientMessage::PrinterStatus {
                    request_id: Some(request_id.clone()),
                    printer_id,
                    status,
                    metadata,
                };
                match send_msg(sink, &msg).await {
                    Ok(()) => {
                        self.pending.insert(
                            request_id,
                            PendingRequest {
                                kind: PendingKind::Status { reply },
                                deadline: Instant::now() + self.config.request_timeout,
                            },
                        );
                        Ok(())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(SessionError::Transport(e.to_string())));
                        Err(e.to_string())
                    }
                }
            }

            Command::Heartbeat { printer_id } => {
                send_msg(sink, &ClientMessage::Heartbeat { printer_id })
                    .await
                    .map_err(|e| e.to_string())
            }

            Command::GetPendingJobs { reply } => {
                let request_id = uuid::Uuid::new_v4().to_string();
                let msg = ClientMessage::GetPendingJobs {
                    request_id: Some(request_id.clone()),
                    client_id: Some(self.config.client_id.clone()),
                    printer_system_name: None,
                };
                match send_msg(sink, &msg).await {
                    Ok(()) => {
                        self.pending.insert(
                            request_id,
                            PendingRequest {
                                kind: PendingKind::PendingJobs { reply },
                                deadline: Instant::now() + self.config.request_timeout,
                            },
                        );
                        Ok(())
                    }
                    Err(e) => {
                        let _ = reply.send(Err(SessionError::Transport(e.to_string())));
                        Err(e.to_string())
                    }
                }
            }

            Command::UpdateJobStatus {
                job_id,
                status,
                metadata,
            } => send_msg(
                sink,
                &ClientMessage::JobStatus {
                    job_id,
                    status,
                    metadata,
                },
            )
            .await
            .map_err(|e| e.to_string()),

            // Handled by the connected loop before dispatch.
            Command::Disconnect => Ok(()),
        }
    }

    fn handle_server_message(&mut self, text: &str) {
        let msg: ServerMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Unparseable message from backend: {e}");
                return;
            }
        };

        if let Some(request_id) = msg.request_id().map(str::to_string) {
            if let Some(pending) = self.pending.remove(&request_id) {
                self.resolve_pending(pending.kind, msg);
                return;
            }
            tracing::debug!(request_id, "Ack for unknown or expired request");
            return;
        }

        match msg {
            ServerMessage::NewPrintJob(job) => {
                tracing::info!(job_id = %job.id, "Job received from backend");
                let _ = self.signals.send(SessionSignal::NewJob(job));
            }
            ServerMessage::Error { message } => {
                tracing::warn!("Backend error: {message}");
            }
            // Fire-and-forget confirmations and late auth frames.
            ServerMessage::HeartbeatAck {}
            | ServerMessage::JobStatusUpdated { .. }
            | ServerMessage::Authenticated { .. } => {}
            ServerMessage::AuthError { message } => {
                tracing::warn!("Auth error outside handshake: {message}");
            }
            other => {
                tracing::debug!(?other, "Ignoring unexpected backend message");
            }
        }
    }

    fn resolve_pending(&mut self, kind: PendingKind, msg: ServerMessage) {
        match (kind, msg) {
            (
                PendingKind::Register { printer, reply },
                ServerMessage::PrinterRegistered { .. },
            ) => {
                self.cache_printer(printer);
                let _ = reply.send(Ok(()));
            }
            (PendingKind::Status { reply }, ServerMessage::StatusUpdated { .. }) => {
                let _ = reply.send(Ok(()));
            }
            (PendingKind::PendingJobs { reply }, ServerMessage::PendingJobs { jobs, .. }) => {
                let _ = reply.send(Ok(jobs));
            }
            (kind, other) => {
                tracing::warn!(?other, "Mismatched ack for pending request");
                fail_pending(kind, SessionError::Transport("mismatched ack".into()));
            }
        }
    }

    /// Keep the cache insertion-ordered and unique by system name.
    fn cache_printer(&mut self, printer: PrinterDescriptor) {
        match self
            .registered
            .iter_mut()
            .find(|p| p.system_name == printer.system_name)
        {
            Some(existing) => *existing = printer,
            None => self.registered.push(printer),
        }
    }

    fn expire_pending(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, req)| req.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            if let Some(req) = self.pending.remove(&id) {
                tracing::warn!(request_id = %id, "Request timed out");
                fail_pending(req.kind, SessionError::Timeout("ack"));
            }
        }
    }

    fn fail_all_pending(&mut self) {
        for (_, req) in self.pending.drain() {
            fail_pending(req.kind, SessionError::Closed);
        }
    }

    /// Backoff sleep that keeps answering commands. Returns false when
    /// the worker should stop.
    async fn sleep_with_commands(
        &mut self,
        delay: std::time::Duration,
        shutdown: &CancellationToken,
    ) -> bool {
        let deadline = tokio::time::sleep(delay);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return false,
                _ = &mut deadline => return true,
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => return false,
                    Some(cmd) => reject_command(cmd),
                }
            }
        }
    }

    /// After an operator disconnect or auth rejection: answer commands
    /// with NotConnected until shutdown.
    async fn dormant(&mut self, shutdown: &CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return,
                    Some(Command::Disconnect) => {}
                    Some(cmd) => reject_command(cmd),
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

fn reject_command(cmd: Command) {
    match cmd {
        Command::RegisterPrinter { reply, .. } => {
            let _ = reply.send(Err(SessionError::NotConnected));
        }
        Command::UpdatePrinterStatus { reply, .. } => {
            let _ = reply.send(Err(SessionError::NotConnected));
        }
        Command::GetPendingJobs { reply } => {
            let _ = reply.send(Err(SessionError::NotConnected));
        }
        Command::Heartbeat { .. }
        | Command::UpdateJobStatus { .. }
        | Command::Disconnect => {}
    }
}

fn fail_pending(kind: PendingKind, error: SessionError) {
    match kind {
        PendingKind::Register { reply, .. } => {
            let _ = reply.send(Err(error));
        }
        PendingKind::Status { reply } => {
            let _ = reply.send(Err(error));
        }
        PendingKind::PendingJobs { reply } => {
            let _ = reply.send(Err(error));
        }
    }
}

async fn send_msg(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), SessionError> {
    let json = serde_json::to_string(msg)?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| SessionError::Transport(e.to_string()))
}
