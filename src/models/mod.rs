pub mod action;
pub mod chat;
pub mod schedule;
pub mod settings;
pub mod subject;
pub mod task;

pub use action::*;
pub use chat::*;
pub use schedule::*;
pub use settings::*;
pub use subject::*;
pub use task::*;
