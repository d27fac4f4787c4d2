use std::io::Write;

use chrono::DateTime;

use super::AppContext;
use crate::database::{lock, queries};

/// Past chat sessions, most recently active first.
pub fn list_sessions(ctx: &AppContext, out: &mut dyn Write) -> anyhow::Result<()> {
    let sessions = {
        let conn = lock(&ctx.conn)?;
        queries::get_chat_sessions(&conn)?
    };

    if sessions.is_empty() {
        writeln!(out, "No chat sessions yet.")?;
        return Ok(());
    }
    for session in sessions {
        let updated = DateTime::from_timestamp(session.updated_at, 0)
            .map(|at| at.with_timezone(&ctx.tz()).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        writeln!(out, "  {}  {}  {}", session.id, updated, session.title)?;
    }
    Ok(())
}

pub fn delete_session(ctx: &AppContext, session_id: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let deleted = {
        let conn = lock(&ctx.conn)?;
        queries::delete_chat_session(&conn, session_id)?
    };
    if !deleted {
        anyhow::bail!("no chat session with id {}", session_id);
    }

    log::info!("Deleted chat session {}", session_id);
    writeln!(out, "Deleted session {}.", session_id)?;
    Ok(())
}
