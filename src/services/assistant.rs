use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::database::LocalStorage;
use crate::error::Result;
use crate::models::{ChatReply, DateSpec, ReminderSettings, ScheduleEvent, ScheduleRequest};
use crate::services::calendar::Calendar;
use crate::services::chat::ChatService;
use crate::services::reminders::ReminderRegistry;
use crate::services::scheduling::{clarification_prompt, detect_scheduling_intent, parse_schedule_request};

pub const AI_NOT_CONFIGURED: &str = "AI is not configured. Please set your API key in Settings.";

#[derive(Debug, Clone)]
pub enum AssistantReply {
    Scheduled {
        events: Vec<ScheduleEvent>,
        message: String,
    },
    NeedsClarification {
        message: String,
    },
    Chat(ChatReply),
}

impl AssistantReply {
    pub fn text(&self) -> &str {
        match self {
            AssistantReply::Scheduled { message, .. } => message,
            AssistantReply::NeedsClarification { message } => message,
            AssistantReply::Chat(reply) => &reply.display_text,
        }
    }
}

pub struct Assistant<'a> {
    calendar: Calendar<'a>,
    storage: LocalStorage,
    chat: Option<ChatService<'a>>,
    reminders: ReminderSettings,
    tz: Tz,
}

impl<'a> Assistant<'a> {
    /// `chat` is `None` when no model is configured.
    pub fn new(
        calendar: Calendar<'a>,
        storage: LocalStorage,
        chat: Option<ChatService<'a>>,
        reminders: ReminderSettings,
        tz: Tz,
    ) -> Self {
        Self {
            calendar,
            storage,
            chat,
            reminders,
            tz,
        }
    }

    pub fn calendar(&self) -> &Calendar<'a> {
        &self.calendar
    }

    pub async fn handle_message(&mut self, text: &str, now: DateTime<Utc>) -> Result<AssistantReply> {
        let today = now.with_timezone(&self.tz).date_naive();

        if detect_scheduling_intent(text) {
            let request = parse_schedule_request(text, today);
            if !request.success {
                log::debug!("scheduling intent without a usable date or activity");
                return Ok(AssistantReply::NeedsClarification {
                    message: clarification_prompt(),
                });
            }

            let events = self.calendar.materialize(&request)?;
            if self.reminders.enabled {
                self.register_reminders(&events, now)?;
            }
            return Ok(AssistantReply::Scheduled {
                message: confirmation_message(&request),
                events,
            });
        }

        match self.chat.as_mut() {
            Some(chat) => Ok(AssistantReply::Chat(chat.send(text, today).await?)),
            None => Ok(AssistantReply::Chat(ChatReply {
                display_text: AI_NOT_CONFIGURED.to_string(),
                actions: Vec::new(),
                cached: false,
            })),
        }
    }

    fn register_reminders(&self, events: &[ScheduleEvent], now: DateTime<Utc>) -> Result<()> {
        let mut registry = ReminderRegistry::load(&self.storage)?;
        for event in events {
            registry.schedule(event, self.reminders.lead_minutes, self.tz, now);
        }
        registry.save(&self.storage)
    }
}

/// Acknowledgement for a scheduled request, noting any defaults that were filled in.
pub fn confirmation_message(request: &ScheduleRequest) -> String {
    let when = match &request.date {
        Some(DateSpec::Week { dates }) => format!(
            "every weekday this week ({} to {})",
            format_day(dates[0]),
            format_day(dates[4])
        ),
        Some(DateSpec::Single { date }) => format!("on {}", format_day(*date)),
        None => String::new(),
    };

    let mut message = format!(
        "Scheduled {} {} at {} for {} minutes.",
        request.activity, when, request.start_time, request.duration
    );

    let defaulted: Vec<&str> = [
        (!request.time_specified).then_some("start time"),
        (!request.duration_specified).then_some("duration"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !defaulted.is_empty() {
        message.push_str(&format!(
            " I used the default {}; tell me if you want to change it.",
            defaulted.join(" and ")
        ));
    }
    message
}

fn format_day(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}
