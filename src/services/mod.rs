pub mod action_executor;
pub mod action_protocol;
pub mod assistant;
pub mod calendar;
pub mod chat;
pub mod confirmation;
pub mod llm_client;
pub mod reminders;
pub mod response_cache;
pub mod scheduling;
