use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ActionRequest, ChatMessage, ChatSession};

const TITLE_MAX_CHARS: usize = 50;

pub fn create_chat_session(conn: &Connection) -> Result<ChatSession> {
    let now = Utc::now().timestamp();
    let session = ChatSession {
        id: Uuid::new_v4().to_string(),
        title: "New Chat".to_string(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO chat_sessions (id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![session.id, session.title, session.created_at, session.updated_at],
    )?;

    Ok(session)
}

/// Sessions that have at least one message, most recently active first.
pub fn get_chat_sessions(conn: &Connection) -> Result<Vec<ChatSession>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.title, s.created_at, s.updated_at
         FROM chat_sessions s
         INNER JOIN (
            SELECT session_id, COUNT(*) as msg_count
            FROM chat_messages
            GROUP BY session_id
         ) m ON m.session_id = s.id
         WHERE m.msg_count > 0
         ORDER BY s.updated_at DESC",
    )?;

    let sessions = stmt
        .query_map([], |row| {
            Ok(ChatSession {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(sessions)
}

/// Returns false when no session has that id.
pub fn delete_chat_session(conn: &Connection, session_id: &str) -> Result<bool> {
    // Delete messages first, then session
    conn.execute("DELETE FROM chat_messages WHERE session_id = ?1", [session_id])?;
    let deleted = conn.execute("DELETE FROM chat_sessions WHERE id = ?1", [session_id])?;
    Ok(deleted > 0)
}

/// Stores a message and bumps the session; the first user message names the session.
pub fn append_chat_message(
    conn: &Connection,
    session_id: &str,
    role: &str,
    content: &str,
    actions: Option<&[ActionRequest]>,
) -> Result<i64> {
    let now = Utc::now().timestamp();
    let actions_json = match actions {
        Some(actions) if !actions.is_empty() => Some(serde_json::to_string(actions)?),
        _ => None,
    };

    conn.execute(
        "INSERT INTO chat_messages (session_id, role, content, actions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![session_id, role, content, actions_json, now],
    )?;
    let message_id = conn.last_insert_rowid();

    let msg_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM chat_messages WHERE session_id = ?1",
        [session_id],
        |row| row.get(0),
    )?;

    if msg_count <= 1 && role == "user" {
        conn.execute(
            "UPDATE chat_sessions SET title = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![session_title(content), now, session_id],
        )?;
    } else {
        conn.execute(
            "UPDATE chat_sessions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now, session_id],
        )?;
    }

    Ok(message_id)
}

/// The last `limit` messages of a session in chronological order.
pub fn load_recent_messages(conn: &Connection, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
    let mut stmt = conn.prepare(
        "SELECT role, content
         FROM chat_messages
         WHERE session_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let mut messages = stmt
        .query_map(rusqlite::params![session_id, limit], |row| {
            Ok(ChatMessage {
                role: row.get::<_, String>(0)?,
                content: row.get::<_, String>(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    messages.reverse();
    Ok(messages)
}

fn session_title(message: &str) -> String {
    let message = message.trim();
    match message.char_indices().nth(TITLE_MAX_CHARS) {
        Some((end, _)) => format!("{}...", &message[..end]),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{lock, open_in_memory};
    use pretty_assertions::assert_eq;

    #[test]
    fn first_user_message_names_the_session() {
        let shared = open_in_memory().unwrap();
        let conn = lock(&shared).unwrap();
        let session = create_chat_session(&conn).unwrap();

        append_chat_message(&conn, &session.id, "user", "Help me plan my VLSI revision", None).unwrap();
        append_chat_message(&conn, &session.id, "assistant", "Sure!", None).unwrap();

        let sessions = get_chat_sessions(&conn).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Help me plan my VLSI revision");
    }

    #[test]
    fn long_titles_are_truncated() {
        let long = "a".repeat(80);
        assert_eq!(session_title(&long), format!("{}...", "a".repeat(50)));
        assert_eq!(session_title("  short  "), "short");
    }

    #[test]
    fn empty_sessions_are_hidden_and_deletable() {
        let shared = open_in_memory().unwrap();
        let conn = lock(&shared).unwrap();
        let empty = create_chat_session(&conn).unwrap();
        let used = create_chat_session(&conn).unwrap();
        append_chat_message(&conn, &used.id, "user", "hi", None).unwrap();

        let ids: Vec<String> = get_chat_sessions(&conn).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![used.id.clone()]);

        assert!(delete_chat_session(&conn, &used.id).unwrap());
        assert!(delete_chat_session(&conn, &empty.id).unwrap());
        assert!(!delete_chat_session(&conn, &used.id).unwrap());
        assert!(get_chat_sessions(&conn).unwrap().is_empty());
    }

    #[test]
    fn recent_messages_come_back_in_order() {
        let shared = open_in_memory().unwrap();
        let conn = lock(&shared).unwrap();
        let session = create_chat_session(&conn).unwrap();
        for i in 0..5 {
            append_chat_message(&conn, &session.id, "user", &format!("m{}", i), None).unwrap();
        }

        let recent = load_recent_messages(&conn, &session.id, 3).unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }
}
