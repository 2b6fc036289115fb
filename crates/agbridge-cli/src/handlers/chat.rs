use crate::args::{ChatArgs, OutputFormat};
use agbridge_runtime::{
    ChatOptions, ChatSession, Config, ContainerSpawner, HistorySource, ProcessSpawner,
    SessionFacade, TokioSpawner, create_chat_backend,
};
use agbridge_types::{ChatEvent, ChatEventKind, truncate};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const TOOL_OUTPUT_WIDTH: usize = 400;

pub fn handle(
    config: Config,
    facade: SessionFacade,
    args: ChatArgs,
    format: OutputFormat,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run(config, facade, args, format))
}

async fn run(
    config: Config,
    facade: SessionFacade,
    args: ChatArgs,
    format: OutputFormat,
) -> Result<()> {
    let agent = args.agent;
    let backend = create_chat_backend(agent, config.chat_config(agent), args.cwd.clone())?;
    let spawner: Arc<dyn ProcessSpawner> = match &config.container {
        Some(container) => Arc::new(ContainerSpawner::new(
            container.name.clone(),
            container.user.clone(),
        )),
        None => Arc::new(TokioSpawner),
    };

    let facade = Arc::new(facade);
    let history: Arc<dyn HistorySource> = facade.clone();
    let options = ChatOptions {
        model: args.model.clone(),
        session_id: args.session.clone(),
        history: Some(history),
        ..ChatOptions::default()
    };
    let (session, mut events) = ChatSession::new(backend, spawner, options);
    let session = Arc::new(session);
    let mut printer = EventPrinter::new(format);

    // Ctrl+C stops the running turn; at the prompt it exits.
    let interrupter = Arc::clone(&session);
    ctrlc::set_handler(move || {
        if interrupter.is_idle() {
            std::process::exit(130);
        }
        interrupter.interrupt();
    })
    .context("Failed to install Ctrl+C handler")?;

    let message = args.message.join(" ");
    if !message.trim().is_empty() {
        let ok = run_turn(&session, &mut events, &mut printer, message).await?;
        remember(&facade, &session);
        if !ok {
            anyhow::bail!("Turn failed");
        }
        return Ok(());
    }

    // Interactive: one turn per stdin line.
    loop {
        let Some(line) = read_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        if let Some(model) = line.strip_prefix("/model ") {
            session.set_model(model.trim());
            printer.drain(&mut events);
            continue;
        }
        run_turn(&session, &mut events, &mut printer, line.to_string()).await?;
        remember(&facade, &session);
    }
    Ok(())
}

/// Returns whether the turn ended with `done`.
async fn run_turn(
    session: &ChatSession,
    events: &mut UnboundedReceiver<ChatEvent>,
    printer: &mut EventPrinter,
    text: String,
) -> Result<bool> {
    session.send_message(text)?;

    // An interrupted turn goes idle without a terminal event.
    let mut ok = false;
    loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                printer.print(&event)?;
                if event.is_terminal() {
                    ok = event.kind == ChatEventKind::Done;
                    break;
                }
            }
            _ = session.wait_idle() => break,
        }
    }
    session.wait_idle().await;
    printer.drain(events);
    Ok(ok)
}

fn remember(facade: &SessionFacade, session: &ChatSession) {
    if let Some(id) = session.session_id()
        && let Err(err) = facade.touch_recent(&id, session.agent_type())
    {
        tracing::warn!(error = %err, "failed to record recent session");
    }
}

async fn read_line() -> Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        print!("> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok::<_, std::io::Error>((read > 0).then_some(line))
    })
    .await
    .context("stdin reader panicked")??;
    Ok(line)
}

struct EventPrinter {
    format: OutputFormat,
    /// Assistant text is printed inline; anything else starts a fresh line.
    mid_text: bool,
}

impl EventPrinter {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            mid_text: false,
        }
    }

    fn drain(&mut self, events: &mut UnboundedReceiver<ChatEvent>) {
        while let Ok(event) = events.try_recv() {
            if let Err(err) = self.print(&event) {
                tracing::warn!(error = %err, "failed to print event");
            }
        }
    }

    fn print(&mut self, event: &ChatEvent) -> Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        let mut out = std::io::stdout().lock();
        let content = event.content.as_deref().unwrap_or("");

        if event.kind == ChatEventKind::Assistant {
            write!(out, "{}", content)?;
            out.flush()?;
            self.mid_text = true;
            return Ok(());
        }
        if self.mid_text {
            writeln!(out)?;
            self.mid_text = false;
        }

        match event.kind {
            ChatEventKind::User => writeln!(out, "> {}", content)?,
            ChatEventKind::System => match &event.session_id {
                Some(id) => writeln!(out, "[{}: {}]", content, id)?,
                None => writeln!(out, "[{}]", content)?,
            },
            ChatEventKind::ToolUse => writeln!(
                out,
                "[tool {} #{}] {}",
                event.tool_name.as_deref().unwrap_or("?"),
                event.tool_id.as_deref().unwrap_or("?"),
                truncate(
                    event.content.as_deref().or(event.tool_input.as_deref()).unwrap_or(""),
                    TOOL_OUTPUT_WIDTH
                )
            )?,
            ChatEventKind::ToolResult => writeln!(
                out,
                "[result #{}] {}",
                event.tool_id.as_deref().unwrap_or("?"),
                truncate(content, TOOL_OUTPUT_WIDTH)
            )?,
            ChatEventKind::Error => {
                drop(out);
                eprintln!("Error: {}", content);
            }
            ChatEventKind::Done | ChatEventKind::Assistant => {}
        }
        Ok(())
    }
}
