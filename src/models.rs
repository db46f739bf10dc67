//! Row types for the tables in [`crate::schema`], plus the two text-backed enums stored in the
//! `attendance` table.

use crate::schema::{attendance, audit_logs, calendar_events, class_teachers, classes, configuration, students};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::{Sqlite, SqliteValue};
use std::fmt;
use std::str::FromStr;

pub type StudentId = i32;
pub type ClassId = i32;
pub type EventId = i32;

/// Identity of an authenticated user (teacher or administrator).
pub type UserId = String;

/// Whether a student was in class on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    /// The value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "presente",
            Status::Absent => "falta",
        }
    }

    /// The other state of the two.
    pub fn toggled(self) -> Self {
        match self {
            Status::Present => Status::Absent,
            Status::Absent => Status::Present,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Present => f.write_str("present"),
            Status::Absent => f.write_str("absent"),
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "presente" | "present" => Ok(Status::Present),
            "falta" | "absent" => Ok(Status::Absent),
            other => Err(format!("unknown attendance status `{other}`")),
        }
    }
}

impl ToSql<Text, Sqlite> for Status {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Status {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(value.parse()?)
    }
}

/// The reason recorded next to an absence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum Justification {
    Justified,
    Unjustified,
    /// Free text typed by an administrator during a correction.
    Other(String),
}

impl Justification {
    pub const JUSTIFIED: &'static str = "Falta justificada";
    pub const UNJUSTIFIED: &'static str = "Falta injustificada";
    pub const OTHER_FALLBACK: &'static str = "Outros";

    /// Builds a free-text justification. Blank input falls back to [`Self::OTHER_FALLBACK`].
    pub fn other(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            Justification::Other(Self::OTHER_FALLBACK.to_string())
        } else {
            Justification::Other(text.to_string())
        }
    }

    /// Maps a stored value back to a justification; the two fixed reasons are recognised, anything
    /// else is free text.
    pub fn from_stored(value: &str) -> Self {
        match value {
            Self::JUSTIFIED => Justification::Justified,
            Self::UNJUSTIFIED => Justification::Unjustified,
            other => Justification::other(other),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Justification::Justified => Self::JUSTIFIED,
            Justification::Unjustified => Self::UNJUSTIFIED,
            Justification::Other(text) => text,
        }
    }

    pub fn is_free_text(&self) -> bool {
        matches!(self, Justification::Other(_))
    }
}

impl fmt::Display for Justification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql<Text, Sqlite> for Justification {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.as_str());
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Sqlite> for Justification {
    fn from_sql(bytes: SqliteValue<'_, '_, '_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(Justification::from_stored(&value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Student {
    pub id: StudentId,
    pub full_name: String,
    pub class_id: Option<ClassId>,
    pub active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = students)]
pub struct NewStudent<'a> {
    pub full_name: &'a str,
    pub class_id: Option<ClassId>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = classes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub academic_year: i32,
}

#[derive(Insertable)]
#[diesel(table_name = classes)]
pub struct NewClass<'a> {
    pub name: &'a str,
    pub academic_year: i32,
}

#[derive(Insertable)]
#[diesel(table_name = class_teachers)]
pub struct ClassTeacher<'a> {
    pub class_id: ClassId,
    pub teacher_id: &'a str,
}

/// One student's attendance on one date. The table's primary key is `(student_id, date)`, so a
/// student has at most one row per calendar day regardless of class.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub class_id: ClassId,
    pub status: Status,
    pub justification: Option<Justification>,
    pub recorded_by: UserId,
    pub recorded_at: NaiveDateTime,
}

/// A calendar event exactly as stored; see [`crate::calendar::CalendarEvent`] for the validated
/// form.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = calendar_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CalendarEventRow {
    pub id: EventId,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: String,
    pub scope: String,
    pub class_ids: Option<String>,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = calendar_events)]
#[diesel(treat_none_as_null = true)]
pub struct NewCalendarEvent {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: String,
    pub scope: String,
    pub class_ids: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = configuration)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Configuration {
    pub id: i32,
    pub consecutive_absence_limit: Option<i32>,
    pub interleaved_absence_limit: Option<i32>,
    pub interleaved_absence_window_days: Option<i32>,
    pub alert_time: Option<NaiveTime>,
    pub absence_alerts_enabled: bool,
    pub missing_attendance_alerts_enabled: bool,
}

/// The editable part of [`Configuration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Insertable, AsChangeset)]
#[diesel(table_name = configuration)]
#[diesel(treat_none_as_null = true)]
pub struct ConfigurationValues {
    pub consecutive_absence_limit: Option<i32>,
    pub interleaved_absence_limit: Option<i32>,
    pub interleaved_absence_window_days: Option<i32>,
    pub alert_time: Option<NaiveTime>,
    pub absence_alerts_enabled: bool,
    pub missing_attendance_alerts_enabled: bool,
}

impl From<Configuration> for ConfigurationValues {
    fn from(config: Configuration) -> Self {
        Self {
            consecutive_absence_limit: config.consecutive_absence_limit,
            interleaved_absence_limit: config.interleaved_absence_limit,
            interleaved_absence_window_days: config.interleaved_absence_window_days,
            alert_time: config.alert_time,
            absence_alerts_enabled: config.absence_alerts_enabled,
            missing_attendance_alerts_enabled: config.missing_attendance_alerts_enabled,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuditEntry {
    pub id: i32,
    pub actor: Option<UserId>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditEntry<'a> {
    pub actor: Option<&'a str>,
    pub action: &'a str,
    pub entity: &'a str,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    pub created_at: NaiveDateTime,
}
