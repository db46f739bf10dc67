//! This module contains the command-line interface [`Cli`] parser for taking and correcting
//! attendance and managing the data around it.

use crate::models::{ClassId, EventId, Justification, StudentId};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::str::FromStr;

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(version, about = "School attendance (chamada) management")]
pub struct Cli {
    /// The different commands available.
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show a class's attendance sheet (today by default).
    Show {
        class: ClassId,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only list absent students.
        #[arg(long)]
        absent_only: bool,
    },

    /// Take today's attendance for a class. Students not listed are marked present.
    Take {
        class: ClassId,
        /// An absent student, as `ID`, `ID:justified` or `ID:unjustified`.
        #[arg(long = "absent")]
        absent: Vec<Absence>,
    },

    /// Correct a past day's attendance for a class.
    Correct {
        class: ClassId,
        date: NaiveDate,
        /// An absent student, as `ID`, `ID:justified`, `ID:unjustified` or `ID:other=REASON`.
        #[arg(long = "absent")]
        absent: Vec<Absence>,
        /// A student to mark present.
        #[arg(long = "present")]
        present: Vec<StudentId>,
    },

    /// Check whether attendance can be taken for a class on a date.
    CheckDate { class: ClassId, date: NaiveDate },

    /// Add a new student, optionally placing them in a class.
    AddStudent {
        name: String,
        #[arg(long)]
        class: Option<ClassId>,
    },

    /// Move a student to another class, or out of any class.
    MoveStudent {
        student: StudentId,
        #[arg(long)]
        class: Option<ClassId>,
    },

    /// Mark a student inactive, removing them from attendance sheets.
    DeactivateStudent { student: StudentId },

    /// Mark a student active again.
    ActivateStudent { student: StudentId },

    /// Show a student's attendance history.
    ShowStudent { student: StudentId },

    /// Add a new class.
    AddClass { name: String, year: i32 },

    /// Promote classes to the next grade in a new academic year, moving their active students.
    PromoteClasses {
        /// The academic year the students move into.
        target_year: i32,
        #[arg(required = true)]
        classes: Vec<ClassId>,
        /// Keep the classes' teachers assigned to the promoted classes.
        #[arg(long)]
        keep_teachers: bool,
    },

    /// Assign a teacher to a class.
    AssignTeacher { class: ClassId, teacher: String },

    /// List classes, optionally only those of one teacher.
    ListClasses {
        #[arg(long)]
        teacher: Option<String>,
    },

    /// Add a calendar event. Without `--class` the event applies to every class.
    AddEvent {
        start: NaiveDate,
        description: String,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long = "class")]
        classes: Vec<ClassId>,
    },

    /// List calendar events.
    ListEvents,

    /// Delete a calendar event.
    DeleteEvent { event: EventId },

    /// Show school-wide attendance for a day (today by default).
    DailySummary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// List students without a class, students of deleted classes and duplicated classes.
    CheckConsistency,

    /// Show the absence-alert configuration.
    ShowConfig,

    /// Change the absence-alert configuration. Omitted values are left unchanged.
    SetConfig {
        #[arg(long)]
        consecutive_absences: Option<i32>,
        #[arg(long)]
        interleaved_absences: Option<i32>,
        #[arg(long)]
        interleaved_window_days: Option<i32>,
        #[arg(long)]
        alert_time: Option<NaiveTime>,
        #[arg(long)]
        absence_alerts: Option<bool>,
        #[arg(long)]
        missing_attendance_alerts: Option<bool>,
    },

    /// Show the most recent audit log entries.
    AuditLog {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// An absence given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absence {
    pub student: StudentId,
    /// `None` leaves the default justification in place.
    pub justification: Option<Justification>,
}

impl FromStr for Absence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, reason) = match s.split_once(':') {
            Some((id, reason)) => (id, Some(reason)),
            None => (s, None),
        };

        let student = id
            .trim()
            .parse()
            .map_err(|_| format!("`{id}` is not a student ID"))?;

        let justification = match reason.map(str::trim) {
            None => None,
            Some("justified") => Some(Justification::Justified),
            Some("unjustified") => Some(Justification::Unjustified),
            Some(other) => match other.strip_prefix("other=") {
                Some(text) => Some(Justification::other(text)),
                None => return Err(format!("unknown justification `{other}`")),
            },
        };

        Ok(Absence {
            student,
            justification,
        })
    }
}
