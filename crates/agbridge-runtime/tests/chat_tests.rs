use agbridge_runtime::{
    ChatBackend, ChatConfig, ChatOptions, ChatSession, ClaudeChatBackend, Error, HistorySource,
    Invocation, OpenCodeChatBackend, ProcessControl, ProcessSpawner, SpawnedProcess, TurnPhase,
};
use agbridge_types::{AgentType, ChatEvent, ChatEventKind, ClientMessage, SessionMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

#[derive(Default, Clone)]
struct Script {
    chunks: Vec<&'static str>,
    stderr: &'static str,
    exit_code: i32,
    /// Keep stdout open until killed.
    hang: bool,
}

#[derive(Default)]
struct ScriptedSpawner {
    scripts: Mutex<VecDeque<Script>>,
    invocations: Mutex<Vec<Invocation>>,
    killed: Arc<AtomicBool>,
}

impl ScriptedSpawner {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    fn killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    fn argv(&self, turn: usize) -> Vec<String> {
        self.invocations.lock().unwrap()[turn].argv.clone()
    }
}

struct ScriptedControl {
    exit_code: i32,
    hang: bool,
    kill: CancellationToken,
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl ProcessControl for ScriptedControl {
    async fn wait(&mut self) -> io::Result<i32> {
        if self.hang {
            self.kill.cancelled().await;
            return Ok(-1);
        }
        Ok(self.exit_code)
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.kill.cancel();
        Ok(())
    }
}

#[async_trait]
impl ProcessSpawner for ScriptedSpawner {
    async fn spawn(&self, invocation: &Invocation) -> io::Result<SpawnedProcess> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no script left"))?;

        let (mut stdout_w, stdout_r) = tokio::io::duplex(64 * 1024);
        let (mut stderr_w, stderr_r) = tokio::io::duplex(64 * 1024);
        let kill = CancellationToken::new();

        let writer_kill = kill.clone();
        let writer_script = script.clone();
        tokio::spawn(async move {
            for chunk in writer_script.chunks {
                let _ = stdout_w.write_all(chunk.as_bytes()).await;
                tokio::task::yield_now().await;
            }
            let _ = stderr_w.write_all(writer_script.stderr.as_bytes()).await;
            drop(stderr_w);
            if writer_script.hang {
                writer_kill.cancelled().await;
            }
            drop(stdout_w);
        });

        Ok(SpawnedProcess {
            stdout: Box::new(stdout_r),
            stderr: Box::new(stderr_r),
            control: Box::new(ScriptedControl {
                exit_code: script.exit_code,
                hang: script.hang,
                kill,
                killed: self.killed.clone(),
            }),
        })
    }
}

fn chat_config(initial_response_timeout_ms: u64) -> ChatConfig {
    ChatConfig {
        binary: "claude".to_string(),
        extra_args: Vec::new(),
        operation_timeout_ms: 5_000,
        initial_response_timeout_ms,
        activity_timeout_ms: 0,
    }
}

fn session(
    spawner: &Arc<ScriptedSpawner>,
    initial_response_timeout_ms: u64,
    options: ChatOptions,
) -> (ChatSession, UnboundedReceiver<ChatEvent>) {
    claude_session(spawner, chat_config(initial_response_timeout_ms), options)
}

fn claude_session(
    spawner: &Arc<ScriptedSpawner>,
    config: ChatConfig,
    options: ChatOptions,
) -> (ChatSession, UnboundedReceiver<ChatEvent>) {
    let backend: Arc<dyn ChatBackend> = Arc::new(ClaudeChatBackend::new(config, None));
    ChatSession::new(backend, spawner.clone(), options)
}

fn drain(rx: &mut UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn run_turn(
    session: &ChatSession,
    rx: &mut UnboundedReceiver<ChatEvent>,
    text: &str,
) -> Vec<ChatEvent> {
    session.send_message(text).unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.wait_idle())
        .await
        .unwrap();
    drain(rx)
}

async fn handle_turn(
    session: &ChatSession,
    rx: &mut UnboundedReceiver<ChatEvent>,
    message: ClientMessage,
) -> Vec<ChatEvent> {
    session.handle(message).unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.wait_idle())
        .await
        .unwrap();
    drain(rx)
}

fn kinds(events: &[ChatEvent]) -> Vec<ChatEventKind> {
    events.iter().map(|e| e.kind).collect()
}

const INIT: &str = "{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"abc123\"}\n";
const DELTA_HI: &str = "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}}\n";

#[tokio::test]
async fn test_streamed_turn_ends_with_done_and_binds_session() {
    let spawner = ScriptedSpawner::new(vec![
        Script {
            // split mid-line
            chunks: vec![&INIT[..20], &INIT[20..], DELTA_HI],
            ..Script::default()
        },
        Script {
            chunks: vec![DELTA_HI],
            ..Script::default()
        },
    ]);
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(
        kinds(&events),
        vec![ChatEventKind::System, ChatEventKind::Assistant, ChatEventKind::Done]
    );
    assert_eq!(events[0].session_id.as_deref(), Some("abc123"));
    assert_eq!(events[1].content.as_deref(), Some("Hi"));
    assert_eq!(session.session_id().as_deref(), Some("abc123"));

    run_turn(&session, &mut rx, "again").await;
    let argv = spawner.argv(1).join(" ");
    assert!(argv.contains("--resume abc123"), "{argv}");
}

#[tokio::test]
async fn test_zero_bytes_exit_zero_is_no_response() {
    let spawner = ScriptedSpawner::new(vec![Script::default()]);
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::Error]);
    assert!(events[0].content.as_deref().unwrap().contains("No response"));
}

#[tokio::test]
async fn test_initial_response_timeout_kills_backend() {
    let spawner = ScriptedSpawner::new(vec![Script {
        hang: true,
        ..Script::default()
    }]);
    let (session, mut rx) = session(&spawner, 10, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::Error]);
    assert!(spawner.killed());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(session.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn test_nonzero_exit_reports_sanitized_stderr() {
    let spawner = ScriptedSpawner::new(vec![Script {
        chunks: vec![INIT],
        stderr: "Error: Invalid API key\n    at run (cli.js:10:5)\n",
        exit_code: 1,
        ..Script::default()
    }]);
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::System, ChatEventKind::Error]);
    assert_eq!(events[1].content.as_deref(), Some("Invalid API key."));
}

#[tokio::test]
async fn test_unterminated_last_line_is_parsed() {
    let spawner = ScriptedSpawner::new(vec![Script {
        chunks: vec![DELTA_HI.trim_end()],
        ..Script::default()
    }]);
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::Assistant, ChatEventKind::Done]);
}

#[tokio::test]
async fn test_second_message_while_busy_is_rejected() {
    let spawner = ScriptedSpawner::new(vec![Script {
        chunks: vec![INIT],
        hang: true,
        ..Script::default()
    }]);
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    session.send_message("first").unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.kind, ChatEventKind::System);
    assert_eq!(session.phase(), TurnPhase::Streaming);
    assert!(matches!(session.send_message("second"), Err(Error::Busy)));

    session.handle(ClientMessage::Interrupt).unwrap();
    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec![ChatEventKind::System]);
    assert_eq!(events[0].content.as_deref(), Some("Interrupted"));
    assert!(session.is_idle());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !spawner.killed() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_interrupt_while_idle_is_noop() {
    let spawner = ScriptedSpawner::new(Vec::new());
    let (session, mut rx) = session(&spawner, 2_000, ChatOptions::default());

    session.interrupt();
    session.interrupt();
    assert!(drain(&mut rx).is_empty());
    assert!(session.is_idle());
    assert!(!spawner.killed());
}

#[tokio::test]
async fn test_model_switch_drops_bound_session() {
    let spawner = ScriptedSpawner::new(Vec::new());
    let (session, mut rx) = session(
        &spawner,
        2_000,
        ChatOptions {
            model: Some("sonnet".to_string()),
            session_id: Some("s1".to_string()),
            ..ChatOptions::default()
        },
    );

    session.set_model("sonnet");
    assert!(drain(&mut rx).is_empty());
    assert_eq!(session.session_id().as_deref(), Some("s1"));

    session.set_model("opus");
    let events = drain(&mut rx);
    assert_eq!(kinds(&events), vec![ChatEventKind::System]);
    assert_eq!(session.session_id(), None);
    assert_eq!(session.model().as_deref(), Some("opus"));

    session.set_model("sonnet");
    assert!(drain(&mut rx).is_empty());
}

struct FixedHistory;

impl HistorySource for FixedHistory {
    fn history(
        &self,
        agent_type: AgentType,
        session_id: &str,
    ) -> agbridge_runtime::Result<Vec<SessionMessage>> {
        assert_eq!(agent_type, AgentType::CliTranscript);
        assert_eq!(session_id, "s1");
        Ok(vec![
            SessionMessage::user("earlier question"),
            SessionMessage::assistant("earlier answer"),
        ])
    }
}

#[tokio::test]
async fn test_resumed_session_replays_history_once() {
    let spawner = ScriptedSpawner::new(vec![
        Script {
            chunks: vec![DELTA_HI],
            ..Script::default()
        },
        Script {
            chunks: vec![DELTA_HI],
            ..Script::default()
        },
    ]);
    let (session, mut rx) = session(
        &spawner,
        2_000,
        ChatOptions {
            history: Some(Arc::new(FixedHistory)),
            ..ChatOptions::default()
        },
    );

    session
        .handle(ClientMessage::Message {
            content: "continue".to_string(),
            session_id: Some("s1".to_string()),
            model: None,
        })
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.wait_idle())
        .await
        .unwrap();
    let events = drain(&mut rx);
    assert_eq!(
        kinds(&events),
        vec![
            ChatEventKind::User,
            ChatEventKind::Assistant,
            ChatEventKind::Assistant,
            ChatEventKind::Done
        ]
    );
    assert_eq!(events[0].content.as_deref(), Some("earlier question"));
    assert!(spawner.argv(0).join(" ").contains("--resume s1"));

    let events = run_turn(&session, &mut rx, "more").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::Assistant, ChatEventKind::Done]);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let spawner = ScriptedSpawner::new(Vec::new());
    let (session, _rx) = session(&spawner, 2_000, ChatOptions::default());
    assert!(matches!(
        session.send_message("   "),
        Err(Error::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn test_model_switch_with_current_session_starts_fresh() {
    let spawner = ScriptedSpawner::new(vec![
        Script {
            chunks: vec![DELTA_HI],
            ..Script::default()
        },
        Script {
            chunks: vec![DELTA_HI],
            ..Script::default()
        },
    ]);
    let (session, mut rx) = session(
        &spawner,
        2_000,
        ChatOptions {
            model: Some("sonnet".to_string()),
            history: Some(Arc::new(FixedHistory)),
            ..ChatOptions::default()
        },
    );

    let first = handle_turn(
        &session,
        &mut rx,
        ClientMessage::Message {
            content: "first".to_string(),
            session_id: Some("s1".to_string()),
            model: None,
        },
    )
    .await;
    assert_eq!(first[0].kind, ChatEventKind::User);
    assert!(spawner.argv(0).join(" ").contains("--resume s1"));

    let second = handle_turn(
        &session,
        &mut rx,
        ClientMessage::Message {
            content: "second".to_string(),
            session_id: Some("s1".to_string()),
            model: Some("opus".to_string()),
        },
    )
    .await;
    assert_eq!(
        kinds(&second),
        vec![ChatEventKind::System, ChatEventKind::Assistant, ChatEventKind::Done]
    );
    let argv = spawner.argv(1).join(" ");
    assert!(!argv.contains("--resume"), "{argv}");
    assert!(argv.contains("--model opus"), "{argv}");
    assert_eq!(session.session_id(), None);
}

#[tokio::test]
async fn test_operation_timeout_fails_streaming_turn() {
    let spawner = ScriptedSpawner::new(vec![Script {
        chunks: vec![INIT],
        hang: true,
        ..Script::default()
    }]);
    let config = ChatConfig {
        operation_timeout_ms: 40,
        ..chat_config(2_000)
    };
    let (session, mut rx) = claude_session(&spawner, config, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::System, ChatEventKind::Error]);
    assert_eq!(events[1].content.as_deref(), Some("Operation timed out."));
    assert!(spawner.killed());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_silent_backend_loses_connection() {
    let spawner = ScriptedSpawner::new(vec![Script {
        chunks: vec![INIT],
        hang: true,
        ..Script::default()
    }]);
    let config = ChatConfig {
        activity_timeout_ms: 30,
        ..chat_config(2_000)
    };
    let (session, mut rx) = claude_session(&spawner, config, ChatOptions::default());

    let events = run_turn(&session, &mut rx, "hello").await;
    assert_eq!(kinds(&events), vec![ChatEventKind::System, ChatEventKind::Error]);
    assert!(events[1].content.as_deref().unwrap().starts_with("Connection lost"));
    assert!(spawner.killed());
    assert!(session.is_idle());
}

const STEP_START: &str = "{\"type\":\"step_start\",\"sessionID\":\"ses_1\"}\n";
const TEXT_PART: &str = "{\"type\":\"text\",\"part\":{\"type\":\"text\",\"text\":\"Reading\"}}\n";
const TOOL_RUNNING: &str = "{\"type\":\"tool_use\",\"part\":{\"tool\":\"read\",\"callID\":\"c1\",\"state\":{\"status\":\"running\",\"input\":{\"filePath\":\"a.rs\"}}}}\n";
const TOOL_DONE: &str = "{\"type\":\"tool_use\",\"part\":{\"tool\":\"read\",\"callID\":\"c1\",\"state\":{\"status\":\"completed\",\"output\":\"fn a() {}\"}}}\n";

#[tokio::test]
async fn test_part_store_turn_pairs_split_tool_events() {
    let spawner = ScriptedSpawner::new(vec![
        Script {
            chunks: vec![STEP_START, TEXT_PART, &TOOL_RUNNING[..30], &TOOL_RUNNING[30..], TOOL_DONE],
            ..Script::default()
        },
        Script {
            chunks: vec![TEXT_PART],
            ..Script::default()
        },
    ]);
    let backend: Arc<dyn ChatBackend> = Arc::new(OpenCodeChatBackend::new(
        ChatConfig::default_for(AgentType::PartStore),
        None,
    ));
    let (session, mut rx) = ChatSession::new(backend, spawner.clone(), ChatOptions::default());

    let events = run_turn(&session, &mut rx, "read a.rs").await;
    assert_eq!(
        kinds(&events),
        vec![
            ChatEventKind::System,
            ChatEventKind::Assistant,
            ChatEventKind::ToolUse,
            ChatEventKind::ToolResult,
            ChatEventKind::Done
        ]
    );
    assert_eq!(events[0].session_id.as_deref(), Some("ses_1"));
    assert_eq!(events[2].tool_id.as_deref(), Some("c1"));
    assert_eq!(events[3].tool_id.as_deref(), Some("c1"));
    assert_eq!(events[3].content.as_deref(), Some("fn a() {}"));
    assert_eq!(session.session_id().as_deref(), Some("ses_1"));

    run_turn(&session, &mut rx, "-v again").await;
    let argv = spawner.argv(1);
    assert!(argv.join(" ").contains("--session ses_1"));
    assert_eq!(&argv[argv.len() - 2..], ["--", "-v again"]);
}
