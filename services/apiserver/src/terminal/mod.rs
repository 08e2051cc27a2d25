//! Browser terminal bridge.
//!
//! # Purpose
//! Connects a browser WebSocket to an interactive `exec` stream in a pod,
//! and, for node shells, to a privileged helper pod (see [`node_shell`]).
//!
//! # Protocol
//! Inbound text frames are JSON with an `op` discriminator:
//! - `{"op":"stdin","data":"ls\r"}` writes to the process stdin;
//! - `{"op":"resize","cols":120,"rows":40}` resizes the TTY;
//! - `{"op":"ping"}` is a keepalive and is ignored.
//!
//! Process output is sent back as `{"op":"stdout","data":"..."}`.
//!
//! # Lifecycle
//! `Connecting -> Upgraded -> Streaming -> Closed`. Two pumps run
//! concurrently once streaming; whichever finishes first (client gone or
//! process exited) drops the other.
pub mod node_shell;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams, TerminalSize};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub type ResizeSender = futures::channel::mpsc::Sender<TerminalSize>;

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("invalid terminal state transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error("exec failed: {0}")]
    Exec(#[from] kube::Error),
    #[error("exec stream missing {0}")]
    MissingStream(&'static str),
    #[error("node shell pod {pod} not ready after {seconds}s")]
    NodeShellTimeout { pod: String, seconds: u64 },
    #[error("node shell pod {pod} failed: {reason}")]
    NodeShellFailed { pod: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Upgraded,
    Streaming,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Upgraded => "upgraded",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Which kind of shell a session serves; used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Pod,
    Node,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Pod => "pod",
            SessionKind::Node => "node",
        }
    }
}

#[derive(Debug)]
pub struct Session {
    kind: SessionKind,
    state: SessionState,
}

impl Session {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Advance the lifecycle. `Closed` is reachable from anywhere, once.
    pub fn transition(&mut self, next: SessionState) -> Result<(), TerminalError> {
        let allowed = matches!(
            (self.state, next),
            (SessionState::Connecting, SessionState::Upgraded)
                | (SessionState::Upgraded, SessionState::Streaming)
        ) || (next == SessionState::Closed && self.state != SessionState::Closed);
        if !allowed {
            return Err(TerminalError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(kind = self.kind.as_str(), from = %self.state, to = %next, "terminal session transition");
        self.state = next;
        Ok(())
    }

    /// Close and record the outcome.
    pub fn close(&mut self, outcome: &'static str) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        metrics::counter!(
            "dashboard_terminal_sessions_total",
            "kind" => self.kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        tracing::info!(kind = self.kind.as_str(), outcome, "terminal session closed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientFrame {
    Stdin { data: String },
    Resize { cols: u16, rows: u16 },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServerFrame {
    Stdout { data: String },
}

impl ServerFrame {
    pub fn stdout(data: impl Into<String>) -> Self {
        ServerFrame::Stdout { data: data.into() }
    }

    pub fn into_message(self) -> Message {
        // Serializing a tagged enum of strings cannot fail.
        Message::Text(serde_json::to_string(&self).unwrap_or_default())
    }
}

/// Why a bridge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    ClientGone,
    ProcessExited,
}

impl BridgeEnd {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeEnd::ClientGone => "client_gone",
            BridgeEnd::ProcessExited => "process_exited",
        }
    }
}

/// Copy frames both ways until either side finishes.
pub async fn bridge<In, E, Out, R, W>(
    mut incoming: In,
    mut outgoing: Out,
    mut stdout: R,
    mut stdin: W,
    mut resize: Option<ResizeSender>,
) -> BridgeEnd
where
    In: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    Out: Sink<Message> + Unpin,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let inbound = async {
        while let Some(message) = incoming.next().await {
            let message = match message {
                Ok(message) => message,
                Err(err) => {
                    tracing::debug!(error = %err, "terminal websocket read failed");
                    break;
                }
            };
            let written = match message {
                Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Stdin { data }) => write_stdin(&mut stdin, data.as_bytes()).await,
                    Ok(ClientFrame::Resize { cols, rows }) => {
                        if let Some(sender) = resize.as_mut() {
                            let size = TerminalSize {
                                width: cols,
                                height: rows,
                            };
                            if sender.send(size).await.is_err() {
                                tracing::debug!("terminal resize channel closed");
                            }
                        }
                        true
                    }
                    Ok(ClientFrame::Ping) => true,
                    Err(err) => {
                        tracing::debug!(error = %err, "ignoring malformed terminal frame");
                        true
                    }
                },
                Message::Binary(bytes) => write_stdin(&mut stdin, &bytes).await,
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => true,
            };
            if !written {
                break;
            }
        }
        BridgeEnd::ClientGone
    };

    let outbound = async {
        let mut buf = vec![0u8; 8192];
        let mut pending = Vec::new();
        loop {
            let read = match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) => {
                    tracing::debug!(error = %err, "exec stdout read failed");
                    break;
                }
            };
            pending.extend_from_slice(&buf[..read]);
            let text = take_utf8(&mut pending);
            if text.is_empty() {
                continue;
            }
            if outgoing
                .send(ServerFrame::stdout(text).into_message())
                .await
                .is_err()
            {
                return BridgeEnd::ClientGone;
            }
        }
        if !pending.is_empty() {
            let tail = String::from_utf8_lossy(&pending).into_owned();
            let _ = outgoing.send(ServerFrame::stdout(tail).into_message()).await;
        }
        BridgeEnd::ProcessExited
    };

    let end = tokio::select! {
        end = inbound => end,
        end = outbound => end,
    };
    if end == BridgeEnd::ProcessExited {
        let _ = outgoing.send(Message::Close(None)).await;
    }
    end
}

async fn write_stdin<W: AsyncWrite + Unpin>(stdin: &mut W, bytes: &[u8]) -> bool {
    match stdin.write_all(bytes).await {
        Ok(()) => stdin.flush().await.is_ok(),
        Err(err) => {
            tracing::debug!(error = %err, "exec stdin write failed");
            false
        }
    }
}

/// Drain the longest valid UTF-8 prefix, keeping a split code point for later.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(err) if err.error_len().is_none() => {
            let valid = err.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}

/// Target of an interactive exec.
#[derive(Debug, Clone)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
    pub command: Vec<String>,
}

/// Run one exec session over an upgraded socket.
///
/// Exec failures are reported to the browser as a final stdout frame before
/// the socket is closed.
pub async fn run_exec_session<S>(
    client: kube::Client,
    target: ExecTarget,
    mut socket: S,
    session: &mut Session,
) -> Result<BridgeEnd, TerminalError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    let pods: Api<Pod> = Api::namespaced(client, &target.namespace);
    let mut params = AttachParams::interactive_tty();
    if let Some(container) = &target.container {
        params = params.container(container.clone());
    }
    let mut attached = match pods.exec(&target.pod, target.command.clone(), &params).await {
        Ok(attached) => attached,
        Err(err) => {
            let err = TerminalError::from(err);
            send_error(&mut socket, &err).await;
            return Err(err);
        }
    };
    let (Some(stdin), Some(stdout)) = (attached.stdin(), attached.stdout()) else {
        let err = TerminalError::MissingStream("stdin/stdout");
        send_error(&mut socket, &err).await;
        attached.abort();
        return Err(err);
    };
    let resize = attached.terminal_size();

    session.transition(SessionState::Streaming)?;
    tracing::info!(
        namespace = %target.namespace,
        pod = %target.pod,
        container = target.container.as_deref().unwrap_or(""),
        "terminal streaming"
    );
    let (outgoing, incoming) = socket.split();
    let end = bridge(incoming, outgoing, stdout, stdin, resize).await;
    attached.abort();
    Ok(end)
}

/// Tell the browser why the session ends, then close.
pub async fn send_error<S>(socket: &mut S, err: &TerminalError)
where
    S: Sink<Message> + Unpin,
{
    let _ = socket
        .send(ServerFrame::stdout(format!("\r\n{err}\r\n")).into_message())
        .await;
    let _ = socket.send(Message::Close(None)).await;
}

/// Drive a pod terminal from upgrade to close.
pub async fn run_pod_session<S>(client: kube::Client, target: ExecTarget, socket: S, mut session: Session)
where
    S: Stream<Item = Result<Message, axum::Error>> + Sink<Message> + Unpin,
{
    if let Err(err) = session.transition(SessionState::Upgraded) {
        tracing::warn!(error = %err, "terminal session not upgradable");
        session.close("invalid_state");
        return;
    }
    let outcome = match run_exec_session(client, target, socket, &mut session).await {
        Ok(end) => end.as_str(),
        Err(err) => {
            tracing::warn!(error = %err, "terminal exec failed");
            "exec_failed"
        }
    };
    session.close(outcome);
}
