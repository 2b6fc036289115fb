use crate::args::OutputFormat;
use crate::handlers::print_json;
use agbridge_providers::SearchPattern;
use agbridge_runtime::SessionFacade;
use agbridge_types::{AgentType, MessageKind, SessionMessage, SessionSummary, truncate};
use anyhow::Result;

const TOOL_OUTPUT_WIDTH: usize = 400;

fn label(summary: &SessionSummary) -> &str {
    summary
        .name
        .as_deref()
        .or(summary.first_prompt_preview.as_deref())
        .unwrap_or("")
}

pub fn list(
    facade: &SessionFacade,
    agent: Option<AgentType>,
    limit: usize,
    offset: usize,
    format: OutputFormat,
) -> Result<()> {
    let page = facade.list(agent, limit, offset)?;

    if format == OutputFormat::Json {
        return print_json(&page);
    }

    if page.sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    for s in &page.sessions {
        println!(
            "{:<38} {:<15} {}  {:>5}  {}",
            s.id,
            s.agent_type,
            s.last_activity.format("%Y-%m-%d %H:%M"),
            s.message_count,
            truncate(label(s), 80)
        );
    }
    if page.total > offset + page.sessions.len() {
        println!(
            "({} of {} shown; use --offset for more)",
            page.sessions.len(),
            page.total
        );
    }
    Ok(())
}

fn render_message(msg: &SessionMessage) -> String {
    let content = msg.content.as_deref().unwrap_or("");
    let id = msg.tool_id.as_deref().unwrap_or("?");
    match msg.kind {
        MessageKind::User => format!("> {}", content),
        MessageKind::Assistant => content.to_string(),
        MessageKind::System => format!("[system] {}", content),
        MessageKind::ToolUse => format!(
            "[tool {} #{}] {}",
            msg.tool_name.as_deref().unwrap_or("?"),
            id,
            truncate(
                msg.content.as_deref().or(msg.tool_input.as_deref()).unwrap_or(""),
                TOOL_OUTPUT_WIDTH
            )
        ),
        MessageKind::ToolResult => {
            format!("[result #{}] {}", id, truncate(content, TOOL_OUTPUT_WIDTH))
        }
        MessageKind::Error => format!("[error] {}", content),
        MessageKind::Done => "[done]".to_string(),
    }
}

pub fn show(
    facade: &SessionFacade,
    id: &str,
    agent: Option<AgentType>,
    format: OutputFormat,
) -> Result<()> {
    let detail = facade.get(id, agent)?;
    facade.touch_recent(&detail.id, detail.agent_type)?;

    if format == OutputFormat::Json {
        return print_json(&detail);
    }

    println!("{} ({})\n", detail.id, detail.agent_type);
    for msg in &detail.messages {
        println!("{}\n", render_message(msg));
    }
    Ok(())
}

pub fn search(
    facade: &SessionFacade,
    query: &str,
    agent: Option<AgentType>,
    regex: bool,
    ignore_case: bool,
    format: OutputFormat,
) -> Result<()> {
    let pattern = SearchPattern::build(query, !regex, ignore_case)?;
    let hits = facade.search(&pattern, agent)?;

    if format == OutputFormat::Json {
        return print_json(&hits);
    }

    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for hit in &hits {
        println!("{:<38} {:<15} {:>5}", hit.id, hit.agent_type, hit.match_count);
    }
    Ok(())
}

pub fn rename(facade: &SessionFacade, id: &str, name: &str) -> Result<()> {
    facade.rename(id, name)?;
    println!("Renamed {}", id);
    Ok(())
}

pub fn clear_name(facade: &SessionFacade, id: &str) -> Result<()> {
    facade.clear_name(id)?;
    println!("Cleared name of {}", id);
    Ok(())
}

pub fn delete(
    facade: &SessionFacade,
    id: &str,
    agent: Option<AgentType>,
    format: OutputFormat,
) -> Result<()> {
    let outcome = facade.delete(id, agent)?;

    if format == OutputFormat::Json {
        return print_json(&outcome);
    }

    match (outcome.success, outcome.error) {
        (true, _) => println!("Deleted {}", id),
        (false, Some(err)) => anyhow::bail!(err),
        (false, None) => anyhow::bail!("Failed to delete {}", id),
    }
    Ok(())
}

pub fn recent(facade: &SessionFacade, format: OutputFormat) -> Result<()> {
    let entries = facade.recent()?;

    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No recent sessions.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:<38} {:<15} {}",
            entry.id,
            entry.agent_type,
            entry.opened_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tool_messages() {
        let call = SessionMessage::tool_use("Bash", "t1", Some("{\"command\":\"ls\"}".to_string()));
        assert_eq!(render_message(&call), "[tool Bash #t1] {\"command\":\"ls\"}");

        let mut titled = call.clone();
        titled.content = Some("List files".to_string());
        assert_eq!(render_message(&titled), "[tool Bash #t1] List files");

        let result = SessionMessage::tool_result("t1", None);
        assert_eq!(render_message(&result), "[result #t1] ");
    }

    #[test]
    fn test_render_user_prompt() {
        assert_eq!(render_message(&SessionMessage::user("hi")), "> hi");
    }
}
