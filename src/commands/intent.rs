use std::io::Write;

use serde::Serialize;

use super::AppContext;
use crate::models::ScheduleRequest;
use crate::services::scheduling::{detect_scheduling_intent, parse_schedule_request};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutput {
    pub scheduling_intent: bool,
    pub request: ScheduleRequest,
}

/// Runs the scheduling parser over `input` without writing anything.
pub fn parse_intent(ctx: &AppContext, input: &str) -> ParseOutput {
    ParseOutput {
        scheduling_intent: detect_scheduling_intent(input),
        request: parse_schedule_request(input, ctx.today()),
    }
}

pub fn print_parse(ctx: &AppContext, input: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    let output = parse_intent(ctx, input);
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    #[test]
    fn prints_the_parsed_request_as_json() {
        let ctx = AppContext::in_memory(Settings::default()).unwrap();
        let mut out = Vec::new();
        print_parse(&ctx, "Schedule physics tomorrow at 9am for 45 minutes", &mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["schedulingIntent"], true);
        assert_eq!(json["request"]["startTime"], "09:00");
        assert_eq!(json["request"]["duration"], 45);
        assert_eq!(json["request"]["date"]["kind"], "single");
        assert_eq!(json["request"]["success"], true);
    }
}
