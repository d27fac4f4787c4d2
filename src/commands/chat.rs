use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::AppContext;
use crate::services::action_executor::ActionExecutor;
use crate::services::assistant::{Assistant, AssistantReply};
use crate::services::chat::ChatService;
use crate::services::confirmation::{summary_message, ConfirmationOrchestrator};
use crate::services::llm_client::LanguageModel;
use crate::services::reminders::ReminderRegistry;
use crate::services::response_cache::ResponseCache;

/// Interactive chat with Luna.
///
/// Reads one message per line from `input` until EOF or `exit`. Replies that
/// carry action tags are listed and need a `y` before anything is written.
pub async fn run_chat<R>(
    ctx: &AppContext,
    model: Option<&dyn LanguageModel>,
    input: R,
    out: &mut dyn Write,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let store = ctx.store();
    let storage = ctx.storage();
    let settings = &ctx.settings;

    let chat = match model {
        Some(model) => {
            let cache = ResponseCache::new(
                Duration::from_secs(settings.ai.cache_ttl_secs),
                ResponseCache::DEFAULT_CAPACITY,
            );
            Some(
                ChatService::start(ctx.conn.clone(), model, cache, settings.ai.history_limit)?
                    .with_display_name(&settings.general.display_name),
            )
        }
        None => None,
    };

    let mut assistant = Assistant::new(
        ctx.calendar(&store),
        storage.clone(),
        chat,
        settings.reminders.clone(),
        ctx.tz(),
    );
    let executor_calendar = ctx.calendar(&store);
    let executor = ActionExecutor::new(&store, ctx.uid()).with_calendar(&executor_calendar);
    let mut orchestrator = ConfirmationOrchestrator::new(Duration::from_millis(settings.confirmation.dwell_ms));

    let mut lines = input.lines();
    writeln!(out, "Luna is ready. Type \"exit\" to quit.")?;

    loop {
        announce_due_reminders(ctx, out)?;
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = match assistant.handle_message(text, Utc::now()).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Failed to handle message: {}", e);
                writeln!(out, "Error: {}", e)?;
                continue;
            }
        };
        writeln!(out, "{}", reply.text())?;

        if let AssistantReply::Chat(chat_reply) = reply {
            if orchestrator.propose_actions(chat_reply.actions) {
                confirm_pending(&mut orchestrator, &executor, &mut lines, out).await?;
            }
        }
    }

    Ok(())
}

async fn confirm_pending<R>(
    orchestrator: &mut ConfirmationOrchestrator,
    executor: &ActionExecutor<'_>,
    lines: &mut Lines<R>,
    out: &mut dyn Write,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    for line in orchestrator.pending_lines() {
        writeln!(out, "  {}", line)?;
    }
    write!(out, "Confirm {} action(s)? [y/N] ", orchestrator.confirmable_count())?;
    out.flush()?;

    let answer = lines.next_line().await?.unwrap_or_default();
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        orchestrator.cancel();
        writeln!(out, "Cancelled.")?;
        return Ok(());
    }

    let actions = orchestrator.pending().to_vec();
    let outcome = orchestrator.confirm(executor).await?;
    for (action, result) in actions.iter().zip(&outcome.results) {
        if let Some(error) = &result.error {
            writeln!(out, "  {} {}", action.action_type, error)?;
        }
    }
    writeln!(out, "{}", summary_message(&outcome.summary))?;
    Ok(())
}

fn announce_due_reminders(ctx: &AppContext, out: &mut dyn Write) -> anyhow::Result<()> {
    if !ctx.settings.reminders.enabled {
        return Ok(());
    }
    let storage = ctx.storage();
    let mut registry = ReminderRegistry::load(&storage)?;
    let due = registry.take_due(Utc::now());
    if due.is_empty() {
        return Ok(());
    }
    registry.save(&storage)?;
    let tz = ctx.tz();
    for reminder in due {
        writeln!(out, "⏰ {}", reminder.message(tz))?;
    }
    Ok(())
}
