//! Weekly timetable parsing and overlap detection.
//!
//! A course timetable is written as comma-separated `"<Day> <HH:MM>-<HH:MM>"`
//! tokens, e.g. `"Segunda 14:00-16:00, Quarta 14:00-16:00"`. Tokens that cannot
//! be turned into a [`TimeSlot`] are dropped from the result and reported in
//! [`ParsedSchedule::errors`]; parsing itself never fails.

use crate::domain::model::CourseRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Segunda" => Some(Weekday::Monday),
            "Terça" => Some(Weekday::Tuesday),
            "Quarta" => Some(Weekday::Wednesday),
            "Quinta" => Some(Weekday::Thursday),
            "Sexta" => Some(Weekday::Friday),
            "Sábado" => Some(Weekday::Saturday),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Weekday::Monday => "Segunda",
            Weekday::Tuesday => "Terça",
            Weekday::Wednesday => "Quarta",
            Weekday::Thursday => "Quinta",
            Weekday::Friday => "Sexta",
            Weekday::Saturday => "Sábado",
        }
    }
}

/// One weekly recurring interval `[start_minute, end_minute)` on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    day: Weekday,
    start_minute: u16,
    end_minute: u16,
}

impl TimeSlot {
    /// Returns `None` unless `start < end < 1440`.
    pub fn new(day: Weekday, start_minute: u16, end_minute: u16) -> Option<Self> {
        (start_minute < end_minute && end_minute < MINUTES_PER_DAY).then_some(Self {
            day,
            start_minute,
            end_minute,
        })
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn start_minute(&self) -> u16 {
        self.start_minute
    }

    pub fn end_minute(&self) -> u16 {
        self.end_minute
    }

    /// Half-open overlap: back-to-back slots (`e1 == s2`) do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.day == other.day
            && !(self.end_minute <= other.start_minute || other.end_minute <= self.start_minute)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02}-{:02}:{:02}",
            self.day.name(),
            self.start_minute / 60,
            self.start_minute % 60,
            self.end_minute / 60,
            self.end_minute % 60
        )
    }
}

/// How `HH:MM` components that are not numbers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Malformed times are reported and their slot dropped.
    #[default]
    Strict,
    /// Malformed times read as minute 0 (midnight), the registrar's historical behaviour.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown parse mode '{0}', expected 'strict' or 'lenient'")]
pub struct UnknownParseMode(pub String);

impl FromStr for ParseMode {
    type Err = UnknownParseMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "strict" => Ok(ParseMode::Strict),
            "lenient" => Ok(ParseMode::Lenient),
            other => Err(UnknownParseMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleParseError {
    #[error("'{token}' does not have exactly two fields")]
    FieldCount { token: String },
    #[error("unknown day '{day}' in '{token}'")]
    UnknownDay { token: String, day: String },
    #[error("'{token}' has no start-end separator")]
    MissingSeparator { token: String },
    #[error("invalid time '{value}' in '{token}'")]
    InvalidTime { token: String, value: String },
    #[error("'{token}' is not a valid interval within one day")]
    InvalidInterval { token: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSchedule {
    pub slots: Vec<TimeSlot>,
    pub errors: Vec<ScheduleParseError>,
}

impl ParsedSchedule {
    /// No usable slot: the course has no fixed timetable and conflicts with nothing.
    pub fn is_unscheduled(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn parse_schedule(spec: &str, mode: ParseMode) -> ParsedSchedule {
    let mut parsed = ParsedSchedule::default();

    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match parse_token(token, mode) {
            Ok(slot) => parsed.slots.push(slot),
            Err(error) => parsed.errors.push(error),
        }
    }

    parsed
}

fn parse_token(token: &str, mode: ParseMode) -> Result<TimeSlot, ScheduleParseError> {
    let fields: Vec<&str> = token.split_whitespace().collect();
    let &[day_name, range] = fields.as_slice() else {
        return Err(ScheduleParseError::FieldCount {
            token: token.to_string(),
        });
    };

    let day = Weekday::from_name(day_name).ok_or_else(|| ScheduleParseError::UnknownDay {
        token: token.to_string(),
        day: day_name.to_string(),
    })?;

    let (start, end) = range
        .split_once('-')
        .ok_or_else(|| ScheduleParseError::MissingSeparator {
            token: token.to_string(),
        })?;

    let start = to_minutes(token, start, mode)?;
    let end = to_minutes(token, end, mode)?;

    let invalid = || ScheduleParseError::InvalidInterval {
        token: token.to_string(),
    };
    let start = u16::try_from(start).map_err(|_| invalid())?;
    let end = u16::try_from(end).map_err(|_| invalid())?;
    TimeSlot::new(day, start, end).ok_or_else(invalid)
}

fn to_minutes(token: &str, value: &str, mode: ParseMode) -> Result<i64, ScheduleParseError> {
    match mode {
        ParseMode::Strict => strict_minutes(value).ok_or_else(|| ScheduleParseError::InvalidTime {
            token: token.to_string(),
            value: value.to_string(),
        }),
        ParseMode::Lenient => Ok(lenient_minutes(value).unwrap_or(0)),
    }
}

fn strict_minutes(value: &str) -> Option<i64> {
    let (hours, minutes) = value.split_once(':')?;
    let is_digits = |s: &str| !s.is_empty() && s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(hours) || !is_digits(minutes) {
        return None;
    }
    let hours: i64 = hours.parse().ok()?;
    let minutes: i64 = minutes.parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    hours.checked_mul(60)?.checked_add(minutes)
}

fn lenient_minutes(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    // Out-of-range values read as 0 like any other unreadable component
    hours.checked_mul(60)?.checked_add(minutes)
}

/// First overlapping `(candidate, existing)` pair, if any.
pub fn find_conflict(candidate: &[TimeSlot], existing: &[TimeSlot]) -> Option<(TimeSlot, TimeSlot)> {
    candidate.iter().find_map(|new_slot| {
        existing
            .iter()
            .find(|old_slot| new_slot.overlaps(old_slot))
            .map(|old_slot| (*new_slot, *old_slot))
    })
}

pub fn has_conflict(candidate: &[TimeSlot], existing: &[TimeSlot]) -> bool {
    find_conflict(candidate, existing).is_some()
}

/// A course that clashes with the candidate, with the slots that overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseConflict<'a> {
    pub course: &'a CourseRecord,
    pub candidate_slot: TimeSlot,
    pub existing_slot: TimeSlot,
}

/// Parses course timetables with a fixed [`ParseMode`] and checks them against each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    mode: ParseMode,
}

impl ConflictDetector {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn parse(&self, course: &CourseRecord) -> ParsedSchedule {
        let parsed = parse_schedule(&course.schedule_spec, self.mode);
        for error in &parsed.errors {
            tracing::warn!(course = %course.code, "Dropped timetable slot: {}", error);
        }
        parsed
    }

    /// The first enrolled course whose timetable overlaps the candidate's.
    pub fn first_conflict<'a>(
        &self,
        candidate: &CourseRecord,
        enrolled: impl IntoIterator<Item = &'a CourseRecord>,
    ) -> Option<CourseConflict<'a>> {
        let candidate_slots = self.parse(candidate).slots;
        if candidate_slots.is_empty() {
            return None;
        }

        enrolled.into_iter().find_map(|course| {
            let existing = self.parse(course).slots;
            find_conflict(&candidate_slots, &existing).map(|(candidate_slot, existing_slot)| {
                CourseConflict {
                    course,
                    candidate_slot,
                    existing_slot,
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(day: Weekday, start: u16, end: u16) -> TimeSlot {
        TimeSlot::new(day, start, end).unwrap()
    }

    fn course(code: &str, spec: &str) -> CourseRecord {
        CourseRecord {
            code: code.to_string(),
            name: format!("Course {code}"),
            credits: 6,
            prerequisites: vec![],
            capacity: 10,
            schedule_spec: spec.to_string(),
        }
    }

    #[test]
    fn test_parse_two_day_schedule() {
        let parsed = parse_schedule("Segunda 14:00-16:00, Quarta 14:00-16:00", ParseMode::Strict);
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.slots,
            vec![
                slot(Weekday::Monday, 840, 960),
                slot(Weekday::Wednesday, 840, 960)
            ]
        );
    }

    #[test]
    fn test_touching_boundaries_never_conflict() {
        let first = [slot(Weekday::Monday, 14 * 60, 16 * 60)];
        let second = [slot(Weekday::Monday, 16 * 60, 18 * 60)];
        assert!(!has_conflict(&first, &second));
        assert!(!has_conflict(&second, &first));
    }

    #[test]
    fn test_overlap_matches_half_open_formula() {
        let points = [0u16, 30, 60, 90, 120, 150];
        for &s1 in &points {
            for &e1 in points.iter().filter(|&&e| e > s1) {
                for &s2 in &points {
                    for &e2 in points.iter().filter(|&&e| e > s2) {
                        let a = slot(Weekday::Tuesday, s1, e1);
                        let b = slot(Weekday::Tuesday, s2, e2);
                        let expected = !(e1 <= s2 || e2 <= s1);
                        assert_eq!(a.overlaps(&b), expected, "{a} vs {b}");
                        assert_eq!(has_conflict(&[a], &[b]), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_different_days_never_conflict() {
        let monday = [slot(Weekday::Monday, 600, 720)];
        let tuesday = [slot(Weekday::Tuesday, 600, 720)];
        assert!(!has_conflict(&monday, &tuesday));
    }

    #[test]
    fn test_find_conflict_returns_first_overlapping_pair() {
        let candidate = [
            slot(Weekday::Monday, 480, 600),
            slot(Weekday::Friday, 540, 660),
        ];
        let existing = [
            slot(Weekday::Friday, 600, 720),
            slot(Weekday::Monday, 500, 560),
        ];
        assert_eq!(
            find_conflict(&candidate, &existing),
            Some((candidate[0], existing[1]))
        );
    }

    #[test]
    fn test_malformed_tokens_yield_no_slots() {
        let malformed = [
            "",
            "   ",
            "Domingo 10:00-12:00",
            "Segunda",
            "Segunda 10:00 12:00",
            "Segunda 10:00",
            "Segunda 12:00-10:00",
            "Segunda 10:00-10:00",
            "Monday 10:00-12:00",
            "Segunda 25:00-26:00",
            "Segunda 9223372036854775807:00-9223372036854775807:30",
            "Segunda 10:00-10:9223372036854775807",
        ];
        for spec in malformed {
            for mode in [ParseMode::Strict, ParseMode::Lenient] {
                let parsed = parse_schedule(spec, mode);
                assert!(parsed.is_unscheduled(), "{spec:?} in {mode:?}");
            }
        }
    }

    #[test]
    fn test_malformed_tokens_are_reported() {
        let parsed = parse_schedule(
            "Domingo 10:00-12:00, Segunda, Terça 10:00, Quarta 12:00-10:00, Quinta 09:00-11:00",
            ParseMode::Strict,
        );
        assert_eq!(parsed.slots, vec![slot(Weekday::Thursday, 540, 660)]);
        assert!(matches!(parsed.errors[0], ScheduleParseError::UnknownDay { .. }));
        assert!(matches!(parsed.errors[1], ScheduleParseError::FieldCount { .. }));
        assert!(matches!(parsed.errors[2], ScheduleParseError::MissingSeparator { .. }));
        assert!(matches!(parsed.errors[3], ScheduleParseError::InvalidInterval { .. }));
    }

    #[test]
    fn test_strict_mode_rejects_non_numeric_times() {
        let parsed = parse_schedule("Segunda ab:00-16:00", ParseMode::Strict);
        assert!(parsed.is_unscheduled());
        assert_eq!(
            parsed.errors,
            vec![ScheduleParseError::InvalidTime {
                token: "Segunda ab:00-16:00".to_string(),
                value: "ab:00".to_string(),
            }]
        );
    }

    #[test]
    fn test_lenient_mode_reads_non_numeric_times_as_midnight() {
        let parsed = parse_schedule("Segunda ab:00-16:00", ParseMode::Lenient);
        assert!(parsed.is_clean());
        assert_eq!(parsed.slots, vec![slot(Weekday::Monday, 0, 960)]);

        // both ends collapse to midnight: no valid interval left
        let collapsed = parse_schedule("Segunda xx-yy", ParseMode::Lenient);
        assert!(collapsed.is_unscheduled());
    }

    #[test]
    fn test_huge_hours_do_not_overflow() {
        let lenient = parse_schedule("Segunda 9223372036854775807:00-10:00", ParseMode::Lenient);
        assert!(lenient.is_clean());
        assert_eq!(lenient.slots, vec![slot(Weekday::Monday, 0, 600)]);

        let strict = parse_schedule("Segunda 9223372036854775807:00-10:00", ParseMode::Strict);
        assert!(strict.is_unscheduled());
        assert!(matches!(
            strict.errors.as_slice(),
            [ScheduleParseError::InvalidTime { .. }]
        ));
    }

    #[test]
    fn test_parse_mode_from_str() {
        assert_eq!("strict".parse::<ParseMode>(), Ok(ParseMode::Strict));
        assert_eq!("lenient".parse::<ParseMode>(), Ok(ParseMode::Lenient));
        assert_eq!(
            "fuzzy".parse::<ParseMode>(),
            Err(UnknownParseMode("fuzzy".to_string()))
        );
    }

    #[test]
    fn test_time_slot_display() {
        assert_eq!(slot(Weekday::Saturday, 545, 600).to_string(), "Sábado 09:05-10:00");
    }

    #[test]
    fn test_detector_finds_first_conflicting_course() {
        let detector = ConflictDetector::new(ParseMode::Strict);
        let candidate = course("BD101", "Segunda 14:00-16:00, Sexta 09:00-11:00");
        let enrolled = [
            course("RC301", "Quarta 16:00-18:00"),
            course("SO201", "Segunda 15:00-17:00"),
            course("ES202", "Sexta 10:00-12:00"),
        ];

        let conflict = detector.first_conflict(&candidate, enrolled.iter()).unwrap();
        assert_eq!(conflict.course.code, "SO201");
        assert_eq!(conflict.candidate_slot, slot(Weekday::Monday, 840, 960));
        assert_eq!(conflict.existing_slot, slot(Weekday::Monday, 900, 1020));
    }

    #[test]
    fn test_detector_unscheduled_course_conflicts_with_nothing() {
        let detector = ConflictDetector::default();
        let candidate = course("TFC", "a definir");
        let enrolled = [course("SO201", "Segunda 00:00-23:59")];
        assert!(detector.first_conflict(&candidate, enrolled.iter()).is_none());
    }
}
