//! An attendance sheet for one class on one day, held in memory between loading and saving.
//!
//! The marks map is the source of truth; rows handed out for display are projections of it in
//! roster order.

use crate::calendar::{BlockedReason, CalendarWarning};
use crate::error::{Error, Result};
use crate::lock::LockInfo;
use crate::models::{AttendanceRecord, ClassId, Justification, Status, Student, StudentId, UserId};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::debug;

/// Which workflow a sheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A teacher taking today's attendance: blackout and lock rules apply.
    Daily,
    /// An administrator correcting any date: blackouts are advisory, the lock never applies.
    Correction,
}

/// Orders loads so an older result can be told apart from a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn next(self) -> Self {
        LoadTicket(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Mark {
    status: Status,
    justification: Option<Justification>,
    recorded_at: Option<NaiveDateTime>,
}

impl Default for Mark {
    fn default() -> Self {
        Self {
            status: Status::Present,
            justification: None,
            recorded_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RosterEntry {
    student_id: StudentId,
    full_name: String,
}

/// A student's line on the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub student_id: StudentId,
    pub full_name: String,
    pub status: Status,
    pub justification: Option<Justification>,
    pub recorded_at: Option<NaiveDateTime>,
    pub editable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub present: usize,
    pub absent: usize,
}

#[derive(Debug, Clone)]
pub struct AttendanceSession {
    ticket: LoadTicket,
    kind: SessionKind,
    class_id: ClassId,
    date: NaiveDate,
    roster: Vec<RosterEntry>,
    marks: HashMap<StudentId, Mark>,
    blocked: Option<BlockedReason>,
    warning: Option<CalendarWarning>,
    lock: LockInfo,
    is_today: bool,
}

impl AttendanceSession {
    /// Builds a sheet from the class's active students and the records already stored for the
    /// date. Students without a record start out present.
    pub(crate) fn new(
        ticket: LoadTicket,
        kind: SessionKind,
        class_id: ClassId,
        date: NaiveDate,
        students: Vec<Student>,
        existing: Vec<AttendanceRecord>,
    ) -> Self {
        let mut marks: HashMap<StudentId, Mark> = students
            .iter()
            .map(|student| (student.id, Mark::default()))
            .collect();

        for record in existing {
            if let Some(mark) = marks.get_mut(&record.student_id) {
                // An absence stored without a reason reads as unjustified.
                let justification = match (record.status, record.justification) {
                    (Status::Absent, None) => Some(Justification::Unjustified),
                    (Status::Absent, justification) => justification,
                    (Status::Present, _) => None,
                };
                *mark = Mark {
                    status: record.status,
                    justification,
                    recorded_at: Some(record.recorded_at),
                };
            }
        }

        let roster = students
            .into_iter()
            .map(|student| RosterEntry {
                student_id: student.id,
                full_name: student.full_name,
            })
            .collect();

        Self {
            ticket,
            kind,
            class_id,
            date,
            roster,
            marks,
            blocked: None,
            warning: None,
            lock: LockInfo::default(),
            is_today: true,
        }
    }

    pub(crate) fn with_blocked(mut self, blocked: Option<BlockedReason>) -> Self {
        self.blocked = blocked;
        self
    }

    pub(crate) fn with_warning(mut self, warning: Option<CalendarWarning>) -> Self {
        self.warning = warning;
        self
    }

    pub(crate) fn with_lock(mut self, lock: LockInfo) -> Self {
        self.lock = lock;
        self
    }

    pub(crate) fn with_is_today(mut self, is_today: bool) -> Self {
        self.is_today = is_today;
        self
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn blocked(&self) -> Option<&BlockedReason> {
        self.blocked.as_ref()
    }

    pub fn warning(&self) -> Option<&CalendarWarning> {
        self.warning.as_ref()
    }

    pub fn lock(&self) -> LockInfo {
        self.lock
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// Whether marks may be changed. Corrections are always editable; a daily sheet is editable
    /// only for today, outside a blackout and before its lock.
    pub fn editable(&self) -> bool {
        match self.kind {
            SessionKind::Correction => true,
            SessionKind::Daily => self.is_today && self.blocked.is_none() && !self.lock.locked,
        }
    }

    /// A one-line explanation of the sheet's state, for display above it.
    pub fn status_message(&self) -> String {
        if let Some(reason) = &self.blocked {
            return reason.to_string();
        }
        if let Some(warning) = &self.warning {
            return warning.to_string();
        }
        match (self.kind, self.lock.lock_at) {
            (SessionKind::Daily, Some(lock_at)) if self.lock.locked => format!(
                "Attendance closed. Changes are locked one hour after the first save (limit: {}).",
                crate::lock::local_clock_time(lock_at)
            ),
            (SessionKind::Daily, _) if !self.is_today => {
                "Viewing attendance. Only today's attendance can be edited.".to_string()
            }
            _ => "Mark absences and pick a justification for each.".to_string(),
        }
    }

    /// The sheet in roster order.
    pub fn rows(&self) -> Vec<SessionRow> {
        let editable = self.editable();

        self.roster
            .iter()
            .map(|entry| {
                let mark = self.marks.get(&entry.student_id).cloned().unwrap_or_default();
                SessionRow {
                    student_id: entry.student_id,
                    full_name: entry.full_name.clone(),
                    status: mark.status,
                    justification: mark.justification,
                    recorded_at: mark.recorded_at,
                    editable,
                }
            })
            .collect()
    }

    pub fn row(&self, student_id: StudentId) -> Option<SessionRow> {
        self.rows().into_iter().find(|row| row.student_id == student_id)
    }

    /// Only the rows marked absent.
    pub fn absentees(&self) -> Vec<SessionRow> {
        self.rows()
            .into_iter()
            .filter(|row| row.status == Status::Absent)
            .collect()
    }

    pub fn summary(&self) -> Summary {
        self.marks
            .values()
            .fold(Summary::default(), |mut summary, mark| {
                match mark.status {
                    Status::Present => summary.present += 1,
                    Status::Absent => summary.absent += 1,
                }
                summary
            })
    }

    fn editable_mark(&mut self, student_id: StudentId) -> Result<&mut Mark> {
        if !self.editable() {
            return Err(Error::ReadOnly);
        }
        self.marks
            .get_mut(&student_id)
            .ok_or(Error::UnknownStudent(student_id))
    }

    /// Sets a student's status. A new absence defaults to [`Justification::Unjustified`]; marking
    /// present clears the justification.
    pub fn set_status(&mut self, student_id: StudentId, status: Status) -> Result<()> {
        let mark = self.editable_mark(student_id)?;
        mark.status = status;
        match status {
            Status::Present => mark.justification = None,
            Status::Absent if mark.justification.is_none() => {
                mark.justification = Some(Justification::Unjustified);
            }
            Status::Absent => {}
        }
        Ok(())
    }

    /// Flips a student between present and absent, returning the new status.
    pub fn toggle(&mut self, student_id: StudentId) -> Result<Status> {
        let status = self
            .marks
            .get(&student_id)
            .ok_or(Error::UnknownStudent(student_id))?
            .status
            .toggled();
        self.set_status(student_id, status)?;
        Ok(status)
    }

    /// Records why a student was absent, marking them absent if they were not already. Free-text
    /// reasons are only accepted on corrections.
    pub fn set_justification(
        &mut self,
        student_id: StudentId,
        justification: Justification,
    ) -> Result<()> {
        if self.kind == SessionKind::Daily && justification.is_free_text() {
            return Err(Error::InvalidJustification(format!(
                "\"{justification}\" is only available when correcting attendance"
            )));
        }

        let mark = self.editable_mark(student_id)?;
        mark.status = Status::Absent;
        mark.justification = Some(justification);
        Ok(())
    }

    pub fn mark_all_present(&mut self) -> Result<()> {
        if !self.editable() {
            return Err(Error::ReadOnly);
        }
        for mark in self.marks.values_mut() {
            mark.status = Status::Present;
            mark.justification = None;
        }
        Ok(())
    }

    /// Builds one record per student, keeping the original `recorded_at` of students that already
    /// had a record for the date.
    pub(crate) fn records(
        &self,
        recorded_by: &UserId,
        previously_recorded: &HashMap<StudentId, NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Vec<AttendanceRecord> {
        self.roster
            .iter()
            .map(|entry| {
                let mark = self.marks.get(&entry.student_id).cloned().unwrap_or_default();
                let justification = match mark.status {
                    Status::Absent => mark.justification.or(Some(Justification::Unjustified)),
                    Status::Present => None,
                };
                AttendanceRecord {
                    student_id: entry.student_id,
                    date: self.date,
                    class_id: self.class_id,
                    status: mark.status,
                    justification,
                    recorded_by: recorded_by.clone(),
                    recorded_at: previously_recorded
                        .get(&entry.student_id)
                        .copied()
                        .unwrap_or(now),
                }
            })
            .collect()
    }

    /// Brings the sheet in line with what was just written.
    pub(crate) fn apply_saved(&mut self, records: &[AttendanceRecord], lock: LockInfo) {
        for record in records {
            if let Some(mark) = self.marks.get_mut(&record.student_id) {
                mark.recorded_at = Some(record.recorded_at);
            }
        }
        self.lock = lock;
    }
}

/// The sheet currently on screen, owned by whoever drives the UI.
///
/// Loads may complete out of order; a session from an older load than the one installed is
/// refused.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<AttendanceSession>,
}

impl SessionSlot {
    pub fn install(&mut self, session: AttendanceSession) -> Result<&mut AttendanceSession> {
        if let Some(current) = &self.current {
            if session.ticket() < current.ticket() {
                debug!(
                    stale = ?session.ticket(),
                    current = ?current.ticket(),
                    "dropping stale attendance sheet"
                );
                return Err(Error::StaleSession);
            }
        }

        Ok(self.current.insert(session))
    }

    pub fn current(&self) -> Option<&AttendanceSession> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AttendanceSession> {
        self.current.as_mut()
    }

    pub fn clear(&mut self) -> Option<AttendanceSession> {
        self.current.take()
    }
}
