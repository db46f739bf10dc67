//! Calendar blackouts: which dates refuse attendance for which classes.
//!
//! A date is blocked when it falls on a weekend, or when a calendar event covers it and applies to
//! the class. Events are read in full and filtered here, since a single range query cannot express
//! "start <= date <= coalesce(end, start)" together with the scope rules.

use crate::models::{CalendarEventRow, ClassId, EventId, NewCalendarEvent};
use chrono::{Datelike, NaiveDate, Weekday};
use std::fmt;

/// Which classes a calendar event applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    Global,
    /// Only the listed classes. An empty list applies to no class at all.
    Classes(Vec<ClassId>),
}

impl EventScope {
    pub const GLOBAL: &'static str = "global";
    pub const CLASSES: &'static str = "turmas";

    pub fn applies_to(&self, class_id: ClassId) -> bool {
        match self {
            EventScope::Global => true,
            EventScope::Classes(ids) => ids.contains(&class_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: Option<EventId>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub description: String,
    pub scope: EventScope,
}

impl CalendarEvent {
    /// Last day covered by the event; single-day events have no explicit end.
    pub fn last_day(&self) -> NaiveDate {
        self.end.unwrap_or(self.start)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.last_day()
    }

    pub fn blocks(&self, date: NaiveDate, class_id: ClassId) -> bool {
        self.covers(date) && self.scope.applies_to(class_id)
    }

    /// Checks an event before it is written. A class-scoped event must name at least one class and
    /// must not end before it starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("the description is empty".to_string());
        }
        if self.last_day() < self.start {
            return Err(format!(
                "the event ends ({}) before it starts ({})",
                self.last_day(),
                self.start
            ));
        }
        if let EventScope::Classes(ids) = &self.scope {
            if ids.is_empty() {
                return Err("select at least one class for a class-specific event".to_string());
            }
        }
        Ok(())
    }

    pub(crate) fn to_row(&self) -> NewCalendarEvent {
        let (scope, class_ids) = match &self.scope {
            EventScope::Global => (EventScope::GLOBAL, None),
            EventScope::Classes(ids) => (
                EventScope::CLASSES,
                Some(serde_json::Value::from(ids.clone()).to_string()),
            ),
        };

        NewCalendarEvent {
            start_date: self.start,
            end_date: self.end,
            description: self.description.clone(),
            scope: scope.to_string(),
            class_ids,
        }
    }
}

impl From<CalendarEventRow> for CalendarEvent {
    fn from(row: CalendarEventRow) -> Self {
        let ids = parse_class_ids(row.class_ids.as_deref());

        // Either marker makes the event class-specific, even if the list turns out empty. A blank
        // scope counts as global.
        let scope = row.scope.trim();
        let is_specific = (!scope.is_empty() && scope != EventScope::GLOBAL) || !ids.is_empty();
        let scope = if is_specific {
            EventScope::Classes(ids)
        } else {
            EventScope::Global
        };

        CalendarEvent {
            id: Some(row.id),
            start: row.start_date,
            end: row.end_date,
            description: row.description,
            scope,
        }
    }
}

/// Parses a stored class id list. Accepts a JSON array, a Postgres array literal (`{1,2}`) or a
/// plain comma separated list. Each entry is read up to its first non-digit ("2abc" is 2, 1.0 is
/// 1); entries with no leading digits are dropped.
pub fn parse_class_ids(raw: Option<&str>) -> Vec<ClassId> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Vec::new();
    };

    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        return values
            .iter()
            .filter_map(|value| match value {
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(n) => ClassId::try_from(n).ok(),
                    None => n
                        .as_f64()
                        .filter(|n| n.is_finite())
                        .and_then(|n| ClassId::try_from(n.trunc() as i64).ok()),
                },
                serde_json::Value::String(s) => leading_int(s),
                _ => None,
            })
            .collect();
    }

    raw.trim_matches(|c| matches!(c, '{' | '}' | '[' | ']'))
        .split(',')
        .filter_map(leading_int)
        .collect()
}

/// The integer at the start of `s`, ignoring leading whitespace and anything after the digits.
fn leading_int(s: &str) -> Option<ClassId> {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits_end = s[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |end| sign_len + end);

    if digits_end == sign_len {
        return None;
    }
    s[..digits_end].parse().ok()
}

/// Why attendance cannot be taken on a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockedReason {
    Weekend,
    CalendarEvent {
        description: String,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl BlockedReason {
    fn from_event(event: &CalendarEvent) -> Self {
        BlockedReason::CalendarEvent {
            description: event.description.clone(),
            start: event.start,
            end: event.last_day(),
        }
    }
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockedReason::Weekend => write!(f, "Attendance blocked: weekend blackout"),
            BlockedReason::CalendarEvent { description, .. } => write!(
                f,
                "Attendance blocked: date registered in the calendar as \"{description}\""
            ),
        }
    }
}

/// A non-blocking notice shown when correcting a date that the calendar marks as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarWarning {
    pub description: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<&CalendarEvent> for CalendarWarning {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            description: event.description.clone(),
            start: event.start,
            end: event.last_day(),
        }
    }
}

impl fmt::Display for CalendarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const BR: &str = "%d/%m/%Y";

        write!(
            f,
            "Warning: this date is marked in the calendar as \"{}\"",
            self.description
        )?;
        if self.end != self.start {
            write!(
                f,
                " (period: {} to {})",
                self.start.format(BR),
                self.end.format(BR)
            )?;
        }
        write!(f, ".")
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Returns the first event that covers `date` and applies to `class_id`.
pub fn event_for_date(
    date: NaiveDate,
    class_id: ClassId,
    events: &[CalendarEvent],
) -> Option<&CalendarEvent> {
    events.iter().find(|event| event.blocks(date, class_id))
}

/// Returns why `date` is closed for `class_id`, or `None` if attendance may be taken.
pub fn blocked_reason(
    date: NaiveDate,
    class_id: ClassId,
    events: &[CalendarEvent],
) -> Option<BlockedReason> {
    if is_weekend(date) {
        return Some(BlockedReason::Weekend);
    }

    event_for_date(date, class_id, events).map(BlockedReason::from_event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn event(start: &str, end: Option<&str>, scope: EventScope) -> CalendarEvent {
        CalendarEvent {
            id: None,
            start: date(start),
            end: end.map(date),
            description: "Feriado".to_string(),
            scope,
        }
    }

    fn row(scope: &str, class_ids: Option<&str>) -> CalendarEventRow {
        CalendarEventRow {
            id: 1,
            start_date: date("2024-05-13"),
            end_date: None,
            description: "Conselho de classe".to_string(),
            scope: scope.to_string(),
            class_ids: class_ids.map(str::to_string),
        }
    }

    #[test]
    fn weekends_are_always_blocked() {
        // 2024-05-18 is a Saturday, 2024-05-19 a Sunday.
        for day in ["2024-05-18", "2024-05-19"] {
            for class_id in [1, 2, 99] {
                assert_eq!(
                    blocked_reason(date(day), class_id, &[]),
                    Some(BlockedReason::Weekend)
                );
            }
        }
        assert_eq!(blocked_reason(date("2024-05-17"), 1, &[]), None);
    }

    #[test]
    fn global_event_blocks_every_class_inside_its_range() {
        let events = [event("2024-05-13", Some("2024-05-15"), EventScope::Global)];

        for day in ["2024-05-13", "2024-05-14", "2024-05-15"] {
            assert!(blocked_reason(date(day), 7, &events).is_some(), "{day}");
        }
        assert_eq!(blocked_reason(date("2024-05-16"), 7, &events), None);
        assert_eq!(blocked_reason(date("2024-05-10"), 7, &events), None);
    }

    #[test]
    fn missing_end_date_means_single_day() {
        let events = [event("2024-05-14", None, EventScope::Global)];

        assert!(blocked_reason(date("2024-05-14"), 1, &events).is_some());
        assert_eq!(blocked_reason(date("2024-05-15"), 1, &events), None);
    }

    #[test]
    fn class_scoped_event_only_blocks_listed_classes() {
        let events = [event("2024-05-14", None, EventScope::Classes(vec![3, 4]))];

        assert_eq!(
            blocked_reason(date("2024-05-14"), 3, &events),
            Some(BlockedReason::CalendarEvent {
                description: "Feriado".to_string(),
                start: date("2024-05-14"),
                end: date("2024-05-14"),
            })
        );
        assert_eq!(blocked_reason(date("2024-05-14"), 5, &events), None);
    }

    #[test]
    fn class_scoped_event_without_classes_blocks_nobody() {
        let events = [event("2024-05-14", None, EventScope::Classes(vec![]))];

        assert_eq!(blocked_reason(date("2024-05-14"), 1, &events), None);
        assert!(events[0].validate().is_err());
    }

    #[test]
    fn first_matching_event_wins() {
        let mut first = event("2024-05-13", Some("2024-05-17"), EventScope::Global);
        first.description = "Semana de provas".to_string();
        let second = event("2024-05-14", None, EventScope::Global);

        let events = [first, second];
        let found = event_for_date(date("2024-05-14"), 1, &events).unwrap();
        assert_eq!(found.description, "Semana de provas");
    }

    #[test]
    fn rows_are_normalized_at_the_boundary() {
        assert_eq!(CalendarEvent::from(row("global", None)).scope, EventScope::Global);
        assert_eq!(
            CalendarEvent::from(row("turmas", Some("[1, 2]"))).scope,
            EventScope::Classes(vec![1, 2])
        );
        // A class list alone marks the event as specific.
        assert_eq!(
            CalendarEvent::from(row("global", Some("{5,6}"))).scope,
            EventScope::Classes(vec![5, 6])
        );
        assert_eq!(
            CalendarEvent::from(row("turmas", Some(""))).scope,
            EventScope::Classes(vec![])
        );
    }

    #[test]
    fn blank_scope_is_global() {
        let event = CalendarEvent::from(row("", None));
        assert_eq!(event.scope, EventScope::Global);
        assert_eq!(
            blocked_reason(date("2024-05-13"), 4, &[event]),
            Some(BlockedReason::CalendarEvent {
                description: "Conselho de classe".to_string(),
                start: date("2024-05-13"),
                end: date("2024-05-13"),
            })
        );
        assert_eq!(CalendarEvent::from(row("  ", Some("[3]"))).scope, EventScope::Classes(vec![3]));
    }

    #[test]
    fn class_id_lists_are_parsed_leniently() {
        assert_eq!(parse_class_ids(None), Vec::<ClassId>::new());
        assert_eq!(parse_class_ids(Some("[1,\"2\",\"x\",3]")), vec![1, 2, 3]);
        assert_eq!(parse_class_ids(Some("{7, 8}")), vec![7, 8]);
        assert_eq!(parse_class_ids(Some("9, ten, 11")), vec![9, 11]);
        assert_eq!(parse_class_ids(Some("{}")), Vec::<ClassId>::new());
    }

    #[test]
    fn class_ids_keep_their_leading_digits() {
        assert_eq!(parse_class_ids(Some("[\"2abc\", 1.0, 4.7, \" 5 \"]")), vec![2, 1, 4, 5]);
        assert_eq!(parse_class_ids(Some("{12a, b3, 7}")), vec![12, 7]);
        assert_eq!(parse_class_ids(Some("[\"-\", \"+\", null]")), Vec::<ClassId>::new());
    }

    #[test]
    fn warning_mentions_the_period_only_for_multi_day_events() {
        let single = event("2024-05-14", None, EventScope::Global);
        assert_eq!(
            CalendarWarning::from(&single).to_string(),
            "Warning: this date is marked in the calendar as \"Feriado\"."
        );

        let multi = event("2024-05-13", Some("2024-05-15"), EventScope::Global);
        assert_eq!(
            CalendarWarning::from(&multi).to_string(),
            "Warning: this date is marked in the calendar as \"Feriado\" (period: 13/05/2024 to 15/05/2024)."
        );
    }

    #[test]
    fn class_scoped_events_store_a_json_class_list() {
        let original = event("2024-05-14", Some("2024-05-16"), EventScope::Classes(vec![2, 8]));
        let new_row = original.to_row();
        assert_eq!(new_row.scope, "turmas");
        assert_eq!(new_row.class_ids.as_deref(), Some("[2,8]"));
    }
}
