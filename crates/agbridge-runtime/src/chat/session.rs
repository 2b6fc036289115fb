use super::backend::ChatBackend;
use super::sanitize::sanitize_error;
use crate::monitor::{Clock, SessionMonitor, SystemClock};
use crate::process::{ByteStream, ProcessControl, ProcessSpawner, SpawnedProcess};
use crate::{Error, Result};
use agbridge_providers::{LineBuffer, StreamParser};
use agbridge_types::{AgentType, ChatEvent, ClientMessage, MessageKind, SessionMessage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const NO_RESPONSE: &str =
    "No response from backend. Check that the backend is installed and configured.";
const READ_CHUNK: usize = 8192;
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Stored transcript lookup used to replay a resumed session.
pub trait HistorySource: Send + Sync {
    fn history(&self, agent_type: AgentType, session_id: &str) -> Result<Vec<SessionMessage>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    /// Backend started, nothing received yet.
    Processing,
    Streaming,
}

pub struct ChatOptions {
    pub model: Option<String>,
    /// Resume this backend session on the first turn.
    pub session_id: Option<String>,
    pub history: Option<Arc<dyn HistorySource>>,
    pub clock: Arc<dyn Clock>,
    /// Bytes of stderr kept for the failure message.
    pub stderr_limit: usize,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            session_id: None,
            history: None,
            clock: Arc::new(SystemClock),
            stderr_limit: 64 * 1024,
        }
    }
}

struct SessionState {
    phase: TurnPhase,
    phase_tx: watch::Sender<TurnPhase>,
    /// Bumped per turn; a task only touches state while it is current.
    generation: u64,
    session_id: Option<String>,
    /// Model the current `session_id` was started under.
    bound_model: Option<String>,
    model: Option<String>,
    history_loaded: bool,
    cancel: Option<CancellationToken>,
}

impl SessionState {
    fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One live conversation with a backend.
///
/// At most one turn runs at a time; each turn is a spawned backend process
/// whose output is parsed into [`ChatEvent`]s on the channel returned by
/// [`ChatSession::new`]. Dropping the session cancels a running turn.
pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    spawner: Arc<dyn ProcessSpawner>,
    history: Option<Arc<dyn HistorySource>>,
    clock: Arc<dyn Clock>,
    stderr_limit: usize,
    events: mpsc::UnboundedSender<ChatEvent>,
    phase_rx: watch::Receiver<TurnPhase>,
    state: Arc<Mutex<SessionState>>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        spawner: Arc<dyn ProcessSpawner>,
        options: ChatOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(TurnPhase::Idle);
        let state = SessionState {
            phase: TurnPhase::Idle,
            phase_tx,
            generation: 0,
            bound_model: options.session_id.as_ref().and(options.model.clone()),
            session_id: options.session_id,
            model: options.model,
            history_loaded: false,
            cancel: None,
        };
        let session = Self {
            backend,
            spawner,
            history: options.history,
            clock: options.clock,
            stderr_limit: options.stderr_limit,
            events,
            phase_rx,
            state: Arc::new(Mutex::new(state)),
        };
        (session, rx)
    }

    pub fn agent_type(&self) -> AgentType {
        self.backend.agent_type()
    }

    pub fn phase(&self) -> TurnPhase {
        lock(&self.state).phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == TurnPhase::Idle
    }

    pub fn session_id(&self) -> Option<String> {
        lock(&self.state).session_id.clone()
    }

    pub fn model(&self) -> Option<String> {
        lock(&self.state).model.clone()
    }

    /// Resolves once no turn is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.phase_rx.clone();
        let _ = rx.wait_for(|phase| *phase == TurnPhase::Idle).await;
    }

    /// Dispatch one inbound control message.
    pub fn handle(&self, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Message {
                content,
                session_id,
                model,
            } => {
                if !self.is_idle() {
                    return Err(Error::Busy);
                }
                // A model switch may drop the current session; naming that
                // same session again must not rebind it under the new model.
                let current = self.session_id();
                if let Some(model) = model {
                    self.set_model(model);
                }
                if let Some(id) = session_id
                    && current.as_deref() != Some(id.as_str())
                {
                    self.resume(id)?;
                }
                self.send_message(content)
            }
            ClientMessage::Interrupt => {
                self.interrupt();
                Ok(())
            }
        }
    }

    /// Bind to an existing backend session; its history is replayed before
    /// the next turn.
    pub fn resume(&self, session_id: impl Into<String>) -> Result<()> {
        let mut state = lock(&self.state);
        if state.phase != TurnPhase::Idle {
            return Err(Error::Busy);
        }
        state.session_id = Some(session_id.into());
        state.bound_model = state.model.clone();
        state.history_loaded = false;
        Ok(())
    }

    /// Start a turn. Rejected with [`Error::Busy`] while another is in flight.
    pub fn send_message(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::PreconditionFailed("Message is empty".to_string()));
        }

        let turn = {
            let mut state = lock(&self.state);
            if state.phase != TurnPhase::Idle {
                return Err(Error::Busy);
            }
            state.generation += 1;
            state.set_phase(TurnPhase::Processing);
            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());
            let replay = state.session_id.is_some() && !state.history_loaded;
            state.history_loaded = true;

            Turn {
                text,
                session_id: state.session_id.clone(),
                model: state.model.clone(),
                replay,
                cancel,
                backend: self.backend.clone(),
                spawner: self.spawner.clone(),
                history: self.history.clone(),
                clock: self.clock.clone(),
                stderr_limit: self.stderr_limit,
                emitter: Emitter {
                    events: self.events.clone(),
                    state: self.state.clone(),
                    generation: state.generation,
                },
            }
        };

        tracing::info!(agent = %self.backend.agent_type(), resume = turn.session_id.is_some(), "starting turn");
        tokio::spawn(turn.run());
        Ok(())
    }

    /// Stop the running turn, if any. A no-op while idle.
    pub fn interrupt(&self) {
        let cancel = {
            let mut state = lock(&self.state);
            if state.phase == TurnPhase::Idle {
                return;
            }
            state.set_phase(TurnPhase::Idle);
            state.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        tracing::info!("turn interrupted");
        let _ = self.events.send(ChatEvent::system("Interrupted"));
    }

    /// Switch model for later turns. A model other than the one the current
    /// backend session started under forces a fresh session.
    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        let switched = {
            let mut state = lock(&self.state);
            if state.model.as_deref() == Some(model.as_str()) {
                return;
            }
            state.model = Some(model.clone());
            if state.session_id.is_some() && state.bound_model.as_deref() != Some(model.as_str()) {
                state.session_id = None;
                state.bound_model = None;
                true
            } else {
                false
            }
        };
        if switched {
            let _ = self.events.send(ChatEvent::system(format!(
                "Switching model to {}; starting a new session",
                model
            )));
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(cancel) = lock(&self.state).cancel.take() {
            cancel.cancel();
        }
    }
}

/// Sends events for one turn, and only while that turn is current.
struct Emitter {
    events: mpsc::UnboundedSender<ChatEvent>,
    state: Arc<Mutex<SessionState>>,
    generation: u64,
}

impl Emitter {
    fn is_current(&self, state: &SessionState) -> bool {
        state.generation == self.generation && state.phase != TurnPhase::Idle
    }

    fn emit(&self, event: ChatEvent) -> bool {
        let state = lock(&self.state);
        if !self.is_current(&state) {
            tracing::debug!(kind = ?event.kind, "suppressing event from finished turn");
            return false;
        }
        self.events.send(event).is_ok()
    }

    fn streaming(&self) {
        let mut state = lock(&self.state);
        if self.is_current(&state) && state.phase == TurnPhase::Processing {
            state.set_phase(TurnPhase::Streaming);
        }
    }

    fn finish(&self, observed_session: Option<String>, model: Option<String>) {
        let mut state = lock(&self.state);
        if state.generation != self.generation {
            return;
        }
        if let Some(id) = observed_session
            && state.model == model
        {
            state.session_id = Some(id);
            state.bound_model = model;
        }
        state.cancel = None;
        state.set_phase(TurnPhase::Idle);
    }
}

struct Turn {
    text: String,
    session_id: Option<String>,
    model: Option<String>,
    replay: bool,
    cancel: CancellationToken,
    backend: Arc<dyn ChatBackend>,
    spawner: Arc<dyn ProcessSpawner>,
    history: Option<Arc<dyn HistorySource>>,
    clock: Arc<dyn Clock>,
    stderr_limit: usize,
    emitter: Emitter,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

async fn kill(control: &mut dyn ProcessControl) {
    if let Err(err) = control.kill().await {
        tracing::debug!(error = %err, "kill failed");
    }
}

/// Read a stream to the end, keeping at most `limit` bytes.
async fn drain_capped(mut stream: ByteStream, limit: usize) -> String {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}

impl Turn {
    async fn run(self) {
        let mut parser = self.backend.new_parser();
        self.drive(parser.as_mut()).await;
        let observed = parser.session_id().map(str::to_string);
        self.emitter.finish(observed, self.model.clone());
    }

    fn forward(&self, parser: &mut dyn StreamParser, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        for event in parser.parse_line(line) {
            self.emitter.emit(event);
        }
    }

    /// Replay stored history. Returns false when cancelled meanwhile.
    async fn replay_history(&self, session_id: &str) -> bool {
        let Some(history) = self.history.clone() else {
            return true;
        };
        let agent = self.backend.agent_type();
        let id = session_id.to_string();
        let loaded = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            loaded = tokio::task::spawn_blocking(move || history.history(agent, &id)) => loaded,
        };

        match loaded {
            Ok(Ok(messages)) => {
                tracing::debug!(count = messages.len(), "replaying history");
                for message in messages
                    .iter()
                    .filter(|m| !matches!(m.kind, MessageKind::Error | MessageKind::Done))
                {
                    self.emitter.emit(ChatEvent::from(message));
                }
            }
            Ok(Err(err)) => tracing::warn!(session_id, error = %err, "history unavailable"),
            Err(err) => tracing::warn!(session_id, error = %err, "history task failed"),
        }
        true
    }

    async fn drive(&self, parser: &mut dyn StreamParser) {
        if self.replay
            && let Some(id) = self.session_id.as_deref()
            && !self.replay_history(id).await
        {
            return;
        }

        let invocation =
            self.backend
                .build_invocation(&self.text, self.session_id.as_deref(), self.model.as_deref());
        tracing::debug!(argv = ?invocation.argv, "spawning backend");

        let spawned = tokio::select! {
            _ = self.cancel.cancelled() => return,
            spawned = self.spawner.spawn(&invocation) => spawned,
        };
        let SpawnedProcess {
            mut stdout,
            stderr,
            mut control,
        } = match spawned {
            Ok(process) => process,
            Err(err) => {
                tracing::warn!(program = invocation.program(), error = %err, "spawn failed");
                self.emitter.emit(ChatEvent::error(sanitize_error(&format!(
                    "Failed to start {}: {}",
                    invocation.program(),
                    err
                ))));
                return;
            }
        };

        let stderr_task = tokio::spawn(drain_capped(stderr, self.stderr_limit));
        let mut monitor = SessionMonitor::new(self.backend.monitor_config(), self.clock.clone());
        monitor.start();

        let mut buffer = LineBuffer::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut received = 0usize;

        loop {
            let deadline = monitor.next_deadline();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    monitor.complete();
                    kill(control.as_mut()).await;
                    stderr_task.abort();
                    return;
                }
                _ = sleep_until(deadline) => {
                    if let Some(failure) = monitor.poll() {
                        tracing::info!(%failure, "monitor failed turn");
                        kill(control.as_mut()).await;
                        stderr_task.abort();
                        self.emitter.emit(ChatEvent::error(failure.message()));
                        return;
                    }
                }
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => {
                        monitor.mark_activity();
                        received += n;
                        self.emitter.streaming();
                        for line in buffer.append(&chunk[..n]) {
                            self.forward(parser, &line);
                        }
                    }
                    Err(err) => {
                        monitor.complete();
                        kill(control.as_mut()).await;
                        stderr_task.abort();
                        self.emitter.emit(ChatEvent::error(sanitize_error(&format!(
                            "Failed to read backend output: {}",
                            err
                        ))));
                        return;
                    }
                },
            }
        }

        if let Some(rest) = buffer.finish() {
            self.forward(parser, &rest);
        }

        let status = loop {
            let deadline = monitor.next_deadline();
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    monitor.complete();
                    kill(control.as_mut()).await;
                    stderr_task.abort();
                    return;
                }
                _ = sleep_until(deadline) => {
                    if let Some(failure) = monitor.poll() {
                        kill(control.as_mut()).await;
                        stderr_task.abort();
                        self.emitter.emit(ChatEvent::error(failure.message()));
                        return;
                    }
                }
                status = control.wait() => break status,
            }
        };
        monitor.complete();

        let event = match status {
            Ok(0) if received == 0 => ChatEvent::error(NO_RESPONSE),
            Ok(0) => ChatEvent::done(),
            Ok(code) => {
                let stderr = tokio::time::timeout(STDERR_GRACE, stderr_task)
                    .await
                    .ok()
                    .and_then(|joined| joined.ok())
                    .unwrap_or_default();
                tracing::info!(code, "backend exited with failure");
                if stderr.trim().is_empty() {
                    ChatEvent::error(format!("Backend exited with code {}.", code))
                } else {
                    ChatEvent::error(sanitize_error(&stderr))
                }
            }
            Err(err) => ChatEvent::error(sanitize_error(&format!(
                "Failed to wait for backend: {}",
                err
            ))),
        };
        self.emitter.emit(event);
    }
}
