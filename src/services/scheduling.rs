use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::models::{DateSpec, EventType, ScheduleRequest};

pub const DEFAULT_ACTIVITY: &str = "Study Session";
pub const DEFAULT_START_TIME: &str = "10:00";
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Longer stated durations are ignored.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

/// Substrings that route a message to the scheduling parser.
const SCHEDULING_KEYWORDS: &[&str] = &[
    "schedule",
    "plan",
    "book",
    "block",
    "remind",
    "calendar",
    "tomorrow",
    "today",
    "tonight",
    "this week",
    "next week",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
    " am",
    " pm",
    "at ",
    "for ",
    "from ",
    "daily",
    "weekly",
    "every day",
];

/// Sunday first, matching the order weekday names are searched in.
const WEEKDAYS: &[(&str, Weekday)] = &[
    ("sunday", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
];

const TIME_OF_DAY_DEFAULTS: &[(&str, &str)] = &[
    ("morning", "09:00"),
    ("afternoon", "14:00"),
    ("evening", "18:00"),
    ("night", "20:00"),
];

const STUDY_KEYWORDS: &[&str] = &["study", "learn", "practice", "homework", "assignment", "exam", "revision"];
const BREAK_KEYWORDS: &[&str] = &["break", "rest", "lunch", "dinner", "meal", "snack"];
const PERSONAL_KEYWORDS: &[&str] = &["gym", "workout", "exercise", "fitness", "run", "yoga"];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("scheduling regex must compile"))
}

fn time_12h_minutes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(\d{1,2}):(\d{2})\s*(am|pm)\b")
}

fn time_12h_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(\d{1,2})\s*(am|pm)\b")
}

fn time_24h_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b(\d{1,2}):(\d{2})\b")
}

fn hours_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(\d+(?:\.\d+)?)\s*(?:hours?|hrs?)\b")
}

fn minutes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(\d+)\s*(?:minutes?|mins?)\b")
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\bfrom\s+\S+(?:\s*(?:am|pm))?\s+to\s+\S+")
}

/// Token classes removed from a message to leave just the activity, in order.
fn activity_strip_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)\b(?:today|tomorrow|tonight|this week|next week)\b",
            r"(?i)\b(?:on\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?\b",
            r"(?i)\b\d{1,2}:\d{2}\s*(?:am|pm)?\b",
            r"(?i)\b\d{1,2}\s*(?:am|pm)\b",
            r"(?i)\b\d+(?:\.\d+)?\s*(?:hours?|hrs?|minutes?|mins?)\b",
            r"(?i)\b(?:at|from|to|for|schedule|plan|book|block)\b",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("activity regex must compile"))
        .collect()
    })
}

/// Cheap gate in front of the parser. False positives are fine, the parser
/// fails gracefully; false negatives fall through to ordinary chat.
pub fn detect_scheduling_intent(message: &str) -> bool {
    let lower = message.to_lowercase();
    SCHEDULING_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

pub fn parse_schedule_request(message: &str, reference_date: NaiveDate) -> ScheduleRequest {
    let lower = message.to_lowercase();

    let activity = extract_activity(message);
    let date = extract_date(&lower, reference_date);
    let time = extract_time_slot(&lower);
    let duration = extract_duration_slot(&lower);
    let event_type = match extract_type(&lower) {
        // An unclassified activity in a study planner is a study block.
        EventType::Other => EventType::Study,
        other => other,
    };

    let success = !activity.is_empty() && date.is_some();
    log::debug!(
        "parsed schedule request: activity={:?} date={:?} time={:?} duration={:?} success={}",
        activity,
        date,
        time,
        duration,
        success
    );

    ScheduleRequest {
        activity,
        date,
        start_time: time.clone().unwrap_or_else(|| DEFAULT_START_TIME.to_string()),
        duration: duration.unwrap_or(DEFAULT_DURATION_MINUTES),
        event_type,
        success,
        time_specified: time.is_some(),
        duration_specified: duration.is_some(),
    }
}

pub fn extract_activity(message: &str) -> String {
    let mut activity = message.to_string();
    for re in activity_strip_res() {
        activity = re.replace_all(&activity, " ").into_owned();
    }

    let collapsed = activity.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    if trimmed.is_empty() {
        return DEFAULT_ACTIVITY.to_string();
    }

    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => DEFAULT_ACTIVITY.to_string(),
    }
}

/// Checked in priority order: tomorrow, today/tonight, weekday name, this week.
pub fn extract_date(lower: &str, reference_date: NaiveDate) -> Option<DateSpec> {
    if lower.contains("tomorrow") {
        return Some(DateSpec::Single {
            date: reference_date + Duration::days(1),
        });
    }

    if lower.contains("today") || lower.contains("tonight") {
        return Some(DateSpec::Single { date: reference_date });
    }

    for (name, weekday) in WEEKDAYS {
        if lower.contains(name) {
            let today = reference_date.weekday().num_days_from_sunday() as i64;
            let target = weekday.num_days_from_sunday() as i64;
            let mut offset = target - today;
            if offset <= 0 {
                offset += 7;
            }
            return Some(DateSpec::Single {
                date: reference_date + Duration::days(offset),
            });
        }
    }

    if lower.contains("this week") {
        let monday = reference_date - Duration::days(reference_date.weekday().num_days_from_monday() as i64);
        let dates = [0, 1, 2, 3, 4].map(|offset| monday + Duration::days(offset));
        return Some(DateSpec::Week { dates });
    }

    None
}

/// Start time as 24-hour `HH:MM`, falling back to [`DEFAULT_START_TIME`].
pub fn extract_time(lower: &str) -> String {
    extract_time_slot(lower).unwrap_or_else(|| DEFAULT_START_TIME.to_string())
}

fn extract_time_slot(lower: &str) -> Option<String> {
    if let Some(caps) = time_12h_minutes_re().captures(lower) {
        if let Some(time) = to_24h(&caps[1], &caps[2], Some(&caps[3])) {
            return Some(time);
        }
    }

    if let Some(caps) = time_12h_re().captures(lower) {
        if let Some(time) = to_24h(&caps[1], "00", Some(&caps[2])) {
            return Some(time);
        }
    }

    if let Some(caps) = time_24h_re().captures(lower) {
        if let Some(time) = to_24h(&caps[1], &caps[2], None) {
            return Some(time);
        }
    }

    TIME_OF_DAY_DEFAULTS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, time)| time.to_string())
}

fn to_24h(hour: &str, minute: &str, meridiem: Option<&str>) -> Option<String> {
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if minute > 59 {
        return None;
    }

    match meridiem {
        Some(meridiem) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            if meridiem == "pm" && hour < 12 {
                hour += 12;
            } else if meridiem == "am" && hour == 12 {
                hour = 0;
            }
        }
        None if hour > 23 => return None,
        None => {}
    }

    Some(format!("{:02}:{:02}", hour, minute))
}

/// Duration in minutes, falling back to [`DEFAULT_DURATION_MINUTES`].
pub fn extract_duration(lower: &str) -> u32 {
    extract_duration_slot(lower).unwrap_or(DEFAULT_DURATION_MINUTES)
}

fn extract_duration_slot(lower: &str) -> Option<u32> {
    if let Some(caps) = hours_re().captures(lower) {
        let minutes = caps[1].parse::<f64>().map(|hours| (hours * 60.0).round());
        if let Ok(minutes) = minutes {
            if (0.0..=f64::from(MAX_DURATION_MINUTES)).contains(&minutes) {
                return Some(minutes as u32);
            }
        }
    }

    if let Some(caps) = minutes_re().captures(lower) {
        if let Ok(minutes) = caps[1].parse::<u32>() {
            if minutes <= MAX_DURATION_MINUTES {
                return Some(minutes);
            }
        }
    }

    // Ranges are recognised but not measured; they always book one hour.
    if range_re().is_match(lower) {
        return Some(DEFAULT_DURATION_MINUTES);
    }

    None
}

pub fn extract_type(lower: &str) -> EventType {
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if matches(STUDY_KEYWORDS) {
        EventType::Study
    } else if matches(BREAK_KEYWORDS) {
        EventType::Break
    } else if matches(PERSONAL_KEYWORDS) {
        EventType::Personal
    } else {
        EventType::Other
    }
}

/// Reply used when a scheduling message could not be turned into an event.
pub fn clarification_prompt() -> String {
    [
        "I couldn't quite work out that schedule. Could you tell me:",
        "• What: the activity or subject",
        "• When: the day (today, tomorrow, a weekday or \"this week\")",
        "• Time: when to start (e.g. 2 PM or 14:00)",
        "• Duration: how long (e.g. 90 minutes or 1.5 hours)",
    ]
    .join("\n")
}
