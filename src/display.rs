//! Table views over the data the manager hands out. Nothing here reads or writes the database.

use crate::calendar::{CalendarEvent, EventScope};
use crate::models::{AttendanceRecord, AuditEntry, Class, ConfigurationValues, Status, Student};
use crate::reports::{ConsistencyReport, DailySummary, Promotion};
use chrono::NaiveDate;
use crate::session::AttendanceSession;
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct SheetRow {
    id: i32,
    name: String,
    status: String,
    justification: String,
}

/// Renders an attendance sheet, optionally only its absent rows.
pub fn session_table(session: &AttendanceSession, absent_only: bool) -> Table {
    let rows = if absent_only {
        session.absentees()
    } else {
        session.rows()
    };

    let rows: Vec<SheetRow> = rows
        .into_iter()
        .map(|row| SheetRow {
            id: row.student_id,
            name: row.full_name,
            status: row.status.to_string(),
            justification: row
                .justification
                .map(|justification| justification.to_string())
                .unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    table
}

/// Pretty prints an attendance sheet with its header, state, and counts.
pub fn show_session(session: &AttendanceSession, absent_only: bool) {
    let summary = session.summary();

    println!(
        "Attendance for class {} on {}{}",
        session.class_id(),
        session.date(),
        if session.editable() { "" } else { " (read-only)" }
    );
    println!("{}", session.status_message());

    if session.is_empty() {
        println!("No active students found.");
        return;
    }

    println!("{}", session_table(session, absent_only));
    println!("Present: {}  Absent: {}", summary.present, summary.absent);
}

/// Pretty prints a list of classes.
pub fn show_classes(classes: Vec<Class>) {
    #[derive(Tabled)]
    struct ClassRow {
        id: i32,
        name: String,
        year: i32,
    }

    let rows: Vec<ClassRow> = classes
        .into_iter()
        .map(|class| ClassRow {
            id: class.id,
            name: class.name,
            year: class.academic_year,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Classes:\n{table}");
}

/// Prints all info about a student along with their attendance history.
pub fn show_student(student: &Student, records: Vec<AttendanceRecord>) {
    println!("Student Information:\n{:#?}", student);

    #[derive(Tabled)]
    struct HistoryRow {
        date: String,
        class: i32,
        status: String,
        justification: String,
    }

    let absences = records
        .iter()
        .filter(|record| record.status == Status::Absent)
        .count();

    let rows: Vec<HistoryRow> = records
        .into_iter()
        .map(|record| HistoryRow {
            date: record.date.to_string(),
            class: record.class_id,
            status: record.status.to_string(),
            justification: record
                .justification
                .map(|justification| justification.to_string())
                .unwrap_or_default(),
        })
        .collect();
    let days = rows.len();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Attendance:\n{table}");
    println!("{absences} absence(s) in {days} recorded day(s)");
}

/// Pretty prints calendar events.
pub fn show_events(events: Vec<CalendarEvent>) {
    #[derive(Tabled)]
    struct EventRow {
        id: String,
        start: String,
        end: String,
        description: String,
        scope: String,
    }

    let rows: Vec<EventRow> = events
        .into_iter()
        .map(|event| EventRow {
            id: event.id.map(|id| id.to_string()).unwrap_or_default(),
            start: event.start.to_string(),
            end: event.last_day().to_string(),
            scope: match &event.scope {
                EventScope::Global => "all classes".to_string(),
                EventScope::Classes(ids) => format!("classes {ids:?}"),
            },
            description: event.description,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Calendar:\n{table}");
}

/// Pretty prints the day's attendance across all classes.
pub fn show_daily_summary(date: NaiveDate, summary: &DailySummary) {
    #[derive(Tabled)]
    struct AbsentRow {
        id: i32,
        name: String,
        class: String,
        reason: String,
    }

    println!("Attendance on {date}");
    println!("Present: {}  Absent: {}", summary.present, summary.absent);

    if summary.absentees.is_empty() {
        println!("No absent students.");
        return;
    }

    let rows: Vec<AbsentRow> = summary
        .absentees
        .iter()
        .map(|absent| AbsentRow {
            id: absent.student_id,
            name: absent.full_name.clone(),
            class: absent.class_name.clone(),
            reason: absent.reason().to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
}

pub fn show_promotions(promotions: Vec<Promotion>) {
    #[derive(Tabled)]
    struct PromotionRow {
        from: i32,
        to: i32,
        name: String,
        year: i32,
        students: usize,
    }

    let rows: Vec<PromotionRow> = promotions
        .into_iter()
        .map(|promotion| PromotionRow {
            from: promotion.from,
            to: promotion.to.id,
            name: promotion.to.name,
            year: promotion.to.academic_year,
            students: promotion.students,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Promoted:\n{table}");
}

/// Pretty prints the consistency checks, one table per problem found.
pub fn show_consistency(report: &ConsistencyReport) {
    #[derive(Tabled)]
    struct StudentRow {
        id: i32,
        name: String,
        class: String,
    }

    fn student_rows(students: &[Student]) -> Table {
        let rows: Vec<StudentRow> = students
            .iter()
            .map(|student| StudentRow {
                id: student.id,
                name: student.full_name.clone(),
                class: student.class_id.map(|id| id.to_string()).unwrap_or_default(),
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        table
    }

    if report.is_clean() {
        println!("No problems found.");
        return;
    }

    println!("Active students without a class: {}", report.students_without_class.len());
    if !report.students_without_class.is_empty() {
        println!("{}", student_rows(&report.students_without_class));
    }

    println!("Students of deleted classes: {}", report.orphaned_students.len());
    if !report.orphaned_students.is_empty() {
        println!("{}", student_rows(&report.orphaned_students));
    }

    println!("Duplicated classes: {}", report.duplicate_classes.len());
    if !report.duplicate_classes.is_empty() {
        #[derive(Tabled)]
        struct DuplicateRow {
            name: String,
            year: i32,
            count: usize,
        }

        let rows: Vec<DuplicateRow> = report
            .duplicate_classes
            .iter()
            .map(|duplicate| DuplicateRow {
                name: duplicate.name.clone(),
                year: duplicate.academic_year,
                count: duplicate.count,
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }
}

pub fn show_configuration(config: &ConfigurationValues) {
    fn or_unset<T: ToString>(value: Option<T>) -> String {
        value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    }

    println!("Consecutive absences limit:   {}", or_unset(config.consecutive_absence_limit));
    println!("Interleaved absences limit:   {}", or_unset(config.interleaved_absence_limit));
    println!("Interleaved window (days):    {}", or_unset(config.interleaved_absence_window_days));
    println!("Alert time:                   {}", or_unset(config.alert_time));
    println!("Absence alerts:               {}", config.absence_alerts_enabled);
    println!("Missing attendance alerts:    {}", config.missing_attendance_alerts_enabled);
}

pub fn show_audit_log(entries: Vec<AuditEntry>) {
    #[derive(Tabled)]
    struct AuditRow {
        at: String,
        actor: String,
        action: String,
        entity: String,
        details: String,
    }

    let rows: Vec<AuditRow> = entries
        .into_iter()
        .map(|entry| AuditRow {
            at: entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            actor: entry.actor.unwrap_or_default(),
            action: entry.action,
            entity: match entry.entity_id {
                Some(id) => format!("{} {id}", entry.entity),
                None => entry.entity,
            },
            details: entry.details.unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("Audit log:\n{table}");
}
