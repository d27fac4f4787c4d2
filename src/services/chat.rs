use chrono::NaiveDate;

use crate::database::{lock, queries, SharedConnection};
use crate::error::Result;
use crate::models::{ChatMessage, ChatReply};
use crate::services::action_protocol::{parse_actions, strip_actions};
use crate::services::llm_client::LanguageModel;
use crate::services::response_cache::ResponseCache;

const SYSTEM_PROMPT: &str = r#"You are Luna, the study assistant inside DreamOS. Help the student plan their studies, break subjects into topics and stay on track. Keep answers short and encouraging.

When the student asks you to change their data, propose the change with an action tag placed anywhere in your reply:
[ACTION:type|key:value|key:value]

Supported actions and their required keys:
- add_schedule: subject, startTime (HH:MM, 24-hour), duration (minutes), date (YYYY-MM-DD). Optional: type (study, break, personal, other)
- create_task: title. Optional: subject, dueDate (YYYY-MM-DD), priority (low, medium, high)
- extract_topics: subject, topics (comma separated)
- update_subject: subject, plus the fields to change, e.g. progress (0-100) or examDate (YYYY-MM-DD)
- adjust_schedule: date (YYYY-MM-DD), change. Optional: reason

Rules:
- Values must not contain "|" or "]".
- Only emit a tag when the student asked for the change. The student confirms every action before it runs.
- Never mention the tag syntax in your prose."#;

pub fn system_prompt(today: NaiveDate, display_name: &str) -> String {
    let mut prompt = format!(
        "{}\n\nToday is {} ({}).",
        SYSTEM_PROMPT,
        today.format("%Y-%m-%d"),
        today.format("%A")
    );
    if !display_name.trim().is_empty() {
        prompt.push_str(&format!(" The student's name is {}.", display_name.trim()));
    }
    prompt
}

/// One persisted conversation with the model.
pub struct ChatService<'a> {
    conn: SharedConnection,
    model: &'a dyn LanguageModel,
    cache: ResponseCache,
    history_limit: i64,
    session_id: String,
    display_name: String,
}

impl<'a> ChatService<'a> {
    /// Starts a fresh session.
    pub fn start(
        conn: SharedConnection,
        model: &'a dyn LanguageModel,
        cache: ResponseCache,
        history_limit: i64,
    ) -> Result<Self> {
        let session = {
            let guard = lock(&conn)?;
            queries::create_chat_session(&guard)?
        };
        log::debug!("started chat session {}", session.id);
        Ok(Self {
            conn,
            model,
            cache,
            history_limit,
            session_id: session.id,
            display_name: String::new(),
        })
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn send(&mut self, message: &str, today: NaiveDate) -> Result<ChatReply> {
        // 1. Load recent context before storing this message
        let history = {
            let conn = lock(&self.conn)?;
            let history = queries::load_recent_messages(&conn, &self.session_id, self.history_limit)?;
            queries::append_chat_message(&conn, &self.session_id, "user", message, None)?;
            history
        };

        // 2. Ask the model unless a fresh answer is cached
        let model_id = self.model.model_id().to_string();
        let (response, cached) = match self.cache.get(&model_id, message) {
            Some(hit) => {
                log::debug!("response cache hit");
                (hit, true)
            }
            None => {
                let mut messages = Vec::with_capacity(history.len() + 2);
                messages.push(ChatMessage::system(system_prompt(today, &self.display_name)));
                messages.extend(history);
                messages.push(ChatMessage::user(message));

                match self.model.generate(&messages).await {
                    Ok(text) => {
                        self.cache.insert(&model_id, message, text.clone());
                        (text, false)
                    }
                    Err(e) => {
                        log::warn!("Model request failed: {}", e);
                        (format!("Sorry, I encountered an error: {}", e), false)
                    }
                }
            }
        };

        // 3. Store the visible reply along with the proposed actions
        let actions = parse_actions(&response);
        let display_text = strip_actions(&response);
        {
            let conn = lock(&self.conn)?;
            queries::append_chat_message(
                &conn,
                &self.session_id,
                "assistant",
                &display_text,
                Some(&actions),
            )?;
        }

        Ok(ChatReply {
            display_text,
            actions,
            cached,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_in_memory;
    use crate::error::AppError;
    use crate::models::ActionType;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<Vec<Result<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 12).unwrap()
    }

    fn cache() -> ResponseCache {
        ResponseCache::new(Duration::from_secs(300), 16)
    }

    #[test]
    fn prompt_mentions_date_and_name() {
        let prompt = system_prompt(today(), "Asha");
        assert!(prompt.contains("Today is 2025-11-12 (Wednesday)."));
        assert!(prompt.contains("The student's name is Asha."));
        assert!(prompt.contains("[ACTION:type|key:value|key:value]"));
    }

    #[tokio::test]
    async fn reply_is_stripped_and_persisted() {
        let conn = open_in_memory().unwrap();
        let model = Scripted::new(vec![Ok(
            "Added it! [ACTION:create_task|title:Revise CMOS]".to_string()
        )]);
        let mut chat = ChatService::start(conn.clone(), &model, cache(), 12).unwrap();

        let reply = chat.send("Remind me to revise CMOS", today()).await.unwrap();
        assert_eq!(reply.display_text, "Added it!");
        assert_eq!(reply.actions.len(), 1);
        assert_eq!(reply.actions[0].action_type, ActionType::CreateTask);
        assert!(!reply.cached);

        let guard = lock(&conn).unwrap();
        let stored = queries::load_recent_messages(&guard, chat.session_id(), 10).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].content, "Added it!");
    }

    #[tokio::test]
    async fn history_is_sent_and_repeats_hit_the_cache() {
        let conn = open_in_memory().unwrap();
        let model = Scripted::new(vec![Ok("First answer".to_string())]);
        let mut chat = ChatService::start(conn, &model, cache(), 12).unwrap();

        chat.send("What is a latch?", today()).await.unwrap();
        let again = chat.send("what is a latch?", today()).await.unwrap();
        assert!(again.cached);
        assert_eq!(again.display_text, "First answer");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].role, "system");
        assert_eq!(seen[0].last().unwrap().content, "What is a latch?");
    }

    #[tokio::test]
    async fn model_failure_becomes_an_apology() {
        let conn = open_in_memory().unwrap();
        let model = Scripted::new(vec![Err(AppError::Llm("boom".to_string()))]);
        let mut chat = ChatService::start(conn, &model, cache(), 12).unwrap();

        let reply = chat.send("hello", today()).await.unwrap();
        assert_eq!(reply.display_text, "Sorry, I encountered an error: AI error: boom");
        assert!(reply.actions.is_empty());
    }
}
