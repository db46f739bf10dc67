use crate::calendar::{self, BlockedReason, CalendarEvent, CalendarWarning};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::lock::LockInfo;
use crate::models::{
    AttendanceRecord, AuditEntry, CalendarEventRow, Class, ClassId, ClassTeacher, Configuration,
    ConfigurationValues, EventId, Justification, NewAuditEntry, NewClass, NewStudent, Status,
    Student, StudentId, UserId,
};
use crate::reports::{self, AbsentStudent, ConsistencyReport, DailySummary, Promotion};
use crate::schema;
use crate::session::{AttendanceSession, LoadTicket, SessionKind};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use diesel::prelude::*;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Statements that create the tables in [`crate::schema`] when missing. Change both together.
const CREATE_TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        name TEXT NOT NULL,
        academic_year INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS class_teachers (
        class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
        teacher_id TEXT NOT NULL,
        PRIMARY KEY (class_id, teacher_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        full_name TEXT NOT NULL,
        class_id INTEGER REFERENCES classes(id),
        active BOOLEAN NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        student_id INTEGER NOT NULL REFERENCES students(id),
        date DATE NOT NULL,
        class_id INTEGER NOT NULL REFERENCES classes(id),
        status TEXT NOT NULL,
        justification TEXT,
        recorded_by TEXT NOT NULL,
        recorded_at TIMESTAMP NOT NULL,
        PRIMARY KEY (student_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS calendar_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE,
        description TEXT NOT NULL,
        scope TEXT NOT NULL DEFAULT 'global',
        class_ids TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS configuration (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        consecutive_absence_limit INTEGER,
        interleaved_absence_limit INTEGER,
        interleaved_absence_window_days INTEGER,
        alert_time TIME,
        absence_alerts_enabled BOOLEAN NOT NULL DEFAULT 0,
        missing_attendance_alerts_enabled BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        actor TEXT,
        action TEXT NOT NULL,
        entity TEXT NOT NULL,
        entity_id TEXT,
        details TEXT,
        created_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance(class_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
];

/// The manager for recording, correcting, and retrieving attendance data, along with the
/// students, classes, calendar, and configuration it depends on.
pub struct AttendanceManager {
    db: SqliteConnection,
    clock: Box<dyn Clock>,
    identity: Identity,
    last_ticket: LoadTicket,
}

impl AttendanceManager {
    /// Connects to the `sqlite3` database at `database_url`, creating any missing tables.
    pub fn connect(database_url: &str) -> Result<Self> {
        let db = SqliteConnection::establish(database_url)?;

        let mut manager = Self {
            db,
            clock: Box::new(SystemClock),
            identity: Identity::default(),
            last_ticket: LoadTicket::default(),
        };
        manager.init_schema()?;

        debug!(database_url, "connected to attendance database");
        Ok(manager)
    }

    /// A manager over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::connect(":memory:")
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the idle time after which a sign-in expires. Signs out anyone signed in.
    pub fn with_inactivity_timeout(mut self, timeout: TimeDelta) -> Self {
        self.identity = Identity::new(timeout);
        self
    }

    fn init_schema(&mut self) -> Result<()> {
        for statement in CREATE_TABLES {
            diesel::sql_query(*statement).execute(&mut self.db)?;
        }
        Ok(())
    }

    fn next_ticket(&mut self) -> LoadTicket {
        self.last_ticket = self.last_ticket.next();
        self.last_ticket
    }

    /// The current UTC timestamp according to the manager's clock.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Today's local date according to the manager's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn sign_in(&mut self, user_id: impl Into<UserId>) {
        let now = self.clock.now();
        self.identity.sign_in(user_id, now);
    }

    pub fn sign_out(&mut self) -> Option<UserId> {
        self.identity.sign_out()
    }

    /// Returns the signed-in user, forcing a sign-out if the sign-in has expired.
    pub fn current_user(&mut self) -> Result<UserId> {
        let now = self.clock.now();
        self.identity.current_user(now)
    }

    /// Inserts a student into the roster.
    pub fn insert_student(&mut self, name: &str, class: Option<ClassId>) -> Result<Student> {
        let student = diesel::insert_into(schema::students::table)
            .values(&NewStudent {
                full_name: name,
                class_id: class,
                active: true,
            })
            .returning(Student::as_returning())
            .get_result(&mut self.db)?;

        self.record_audit(
            "create",
            "aluno",
            Some(student.id.to_string()),
            json!({ "full_name": name, "class_id": class }),
        );
        Ok(student)
    }

    /// Retrieves a specific student based on their ID.
    pub fn get_student(&mut self, student: StudentId) -> Result<Student> {
        schema::students::table
            .find(student)
            .select(Student::as_select())
            .first(&mut self.db)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("student {student}")))
    }

    /// Moves a student to another class, or out of any class.
    pub fn move_student(&mut self, student: StudentId, class: Option<ClassId>) -> Result<Student> {
        use schema::students::dsl::*;

        let updated = diesel::update(students.find(student))
            .set(class_id.eq(class))
            .returning(Student::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("student {student}")))?;

        self.record_audit("update", "aluno", Some(student.to_string()), json!({ "class_id": class }));
        Ok(updated)
    }

    /// Marks a student active or inactive. Inactive students are left off attendance sheets.
    pub fn set_student_active(&mut self, student: StudentId, is_active: bool) -> Result<Student> {
        use schema::students::dsl::*;

        let updated = diesel::update(students.find(student))
            .set(active.eq(is_active))
            .returning(Student::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("student {student}")))?;

        self.record_audit("update", "aluno", Some(student.to_string()), json!({ "active": is_active }));
        Ok(updated)
    }

    /// Retrieves the active students of a class, ordered by name.
    pub fn active_students(&mut self, class: ClassId) -> Result<Vec<Student>> {
        use schema::students::dsl::*;

        Ok(students
            .filter(class_id.eq(class))
            .filter(active.eq(true))
            .order((full_name.asc(), id.asc()))
            .select(Student::as_select())
            .load(&mut self.db)?)
    }

    pub fn insert_class(&mut self, class_name: &str, year: i32) -> Result<Class> {
        let class = diesel::insert_into(schema::classes::table)
            .values(&NewClass {
                name: class_name,
                academic_year: year,
            })
            .returning(Class::as_returning())
            .get_result(&mut self.db)?;

        self.record_audit(
            "create",
            "turma",
            Some(class.id.to_string()),
            json!({ "name": class_name, "academic_year": year }),
        );
        Ok(class)
    }

    /// Assigns a teacher to a class. Assigning twice is a no-op.
    pub fn assign_teacher(&mut self, class: ClassId, teacher: &str) -> Result<()> {
        diesel::insert_or_ignore_into(schema::class_teachers::table)
            .values(&ClassTeacher {
                class_id: class,
                teacher_id: teacher,
            })
            .execute(&mut self.db)?;

        Ok(())
    }

    /// All classes, in natural name order.
    pub fn classes(&mut self) -> Result<Vec<Class>> {
        let mut classes = schema::classes::table
            .select(Class::as_select())
            .load(&mut self.db)?;

        classes.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        Ok(classes)
    }

    /// The classes a teacher is assigned to, in natural name order ("2A" before "10A").
    pub fn classes_for_teacher(&mut self, teacher: &str) -> Result<Vec<Class>> {
        let mut classes = schema::classes::table
            .inner_join(schema::class_teachers::table)
            .filter(schema::class_teachers::teacher_id.eq(teacher))
            .select(Class::as_select())
            .load(&mut self.db)?;

        classes.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        Ok(classes)
    }

    /// Every calendar event, ordered by start date.
    pub fn calendar_events(&mut self) -> Result<Vec<CalendarEvent>> {
        use schema::calendar_events::dsl::*;

        let rows = calendar_events
            .order((start_date.asc(), id.asc()))
            .select(CalendarEventRow::as_select())
            .load(&mut self.db)?;

        Ok(rows.into_iter().map(CalendarEvent::from).collect())
    }

    pub fn insert_event(&mut self, event: &CalendarEvent) -> Result<CalendarEvent> {
        event.validate().map_err(Error::InvalidEvent)?;

        let row = diesel::insert_into(schema::calendar_events::table)
            .values(&event.to_row())
            .returning(CalendarEventRow::as_returning())
            .get_result(&mut self.db)?;

        let event = CalendarEvent::from(row);
        self.record_audit("create", "evento", event.id.map(|id| id.to_string()), event_details(&event));
        Ok(event)
    }

    pub fn update_event(&mut self, event_id: EventId, event: &CalendarEvent) -> Result<CalendarEvent> {
        event.validate().map_err(Error::InvalidEvent)?;

        let row = diesel::update(schema::calendar_events::table.find(event_id))
            .set(&event.to_row())
            .returning(CalendarEventRow::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("calendar event {event_id}")))?;

        let event = CalendarEvent::from(row);
        self.record_audit("update", "evento", Some(event_id.to_string()), event_details(&event));
        Ok(event)
    }

    pub fn delete_event(&mut self, event_id: EventId) -> Result<()> {
        let deleted = diesel::delete(schema::calendar_events::table.find(event_id)).execute(&mut self.db)?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("calendar event {event_id}")));
        }

        self.record_audit("delete", "evento", Some(event_id.to_string()), serde_json::Value::Null);
        Ok(())
    }

    /// Returns why attendance cannot be taken for `class` on `day`, if anything prevents it.
    ///
    /// A failure to read the calendar is returned as an error rather than treated as "not
    /// blocked".
    pub fn is_date_blocked(&mut self, day: NaiveDate, class: ClassId) -> Result<Option<BlockedReason>> {
        if calendar::is_weekend(day) {
            return Ok(Some(BlockedReason::Weekend));
        }

        let events = self.calendar_events()?;
        Ok(calendar::blocked_reason(day, class, &events))
    }

    /// The calendar event covering `day` for `class`, as a warning for corrections.
    pub fn calendar_warning(&mut self, day: NaiveDate, class: ClassId) -> Result<Option<CalendarWarning>> {
        let events = self.calendar_events()?;
        Ok(calendar::event_for_date(day, class, &events).map(CalendarWarning::from))
    }

    /// The attendance records stored for a class on a day.
    pub fn day_records(&mut self, class: ClassId, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        use schema::attendance::dsl::*;

        Ok(attendance
            .filter(class_id.eq(class))
            .filter(date.eq(day))
            .select(AttendanceRecord::as_select())
            .load(&mut self.db)?)
    }

    /// Retrieves every record of a student, oldest first.
    pub fn student_attendance(&mut self, student: StudentId) -> Result<Vec<AttendanceRecord>> {
        use schema::attendance::dsl::*;

        Ok(attendance
            .filter(student_id.eq(student))
            .order(date.asc())
            .select(AttendanceRecord::as_select())
            .load(&mut self.db)?)
    }

    /// Loads a teacher's attendance sheet for `class` on `day`.
    ///
    /// The sheet is editable only when `day` is today, no blackout applies and the day's lock
    /// window has not passed.
    pub fn load_chamada(&mut self, class: ClassId, day: NaiveDate) -> Result<AttendanceSession> {
        let ticket = self.next_ticket();

        let students = self.active_students(class)?;
        let existing = self.day_records(class, day)?;
        let blocked = self.is_date_blocked(day, class)?;

        let now = self.clock.now();
        let lock = LockInfo::from_recorded_at(existing.iter().map(|record| record.recorded_at), now);
        let is_today = day == self.clock.today();

        debug!(class, %day, students = students.len(), existing = existing.len(), ?blocked, ?lock, "loaded attendance sheet");

        Ok(
            AttendanceSession::new(ticket, SessionKind::Daily, class, day, students, existing)
                .with_blocked(blocked)
                .with_lock(lock)
                .with_is_today(is_today),
        )
    }

    /// Loads an administrator's correction sheet for `class` on any `day`. A calendar event on
    /// that day is reported as a warning; the sheet stays editable.
    pub fn load_correcao(&mut self, class: ClassId, day: NaiveDate) -> Result<AttendanceSession> {
        let ticket = self.next_ticket();

        let students = self.active_students(class)?;
        let existing = self.day_records(class, day)?;
        let warning = self.calendar_warning(day, class)?;

        debug!(class, %day, students = students.len(), existing = existing.len(), ?warning, "loaded correction sheet");

        Ok(
            AttendanceSession::new(ticket, SessionKind::Correction, class, day, students, existing)
                .with_warning(warning),
        )
    }

    /// Writes a sheet, returning the number of records written.
    ///
    /// Every rule is checked again against the database at save time; if any fails nothing is
    /// written. On success the sheet is refreshed with the stored timestamps.
    pub fn save_session(&mut self, session: &mut AttendanceSession) -> Result<usize> {
        let user = self.current_user()?;
        let now = self.clock.now();
        let class = session.class_id();
        let day = session.date();

        if session.kind() == SessionKind::Daily {
            let today = self.clock.today();
            if day != today {
                return Err(Error::NotToday { date: day, today });
            }
            if let Some(reason) = self.is_date_blocked(day, class)? {
                info!(class, %day, %reason, "rejected attendance save on blocked date");
                return Err(Error::Blocked(reason));
            }
        }

        let existing = self.day_records(class, day)?;

        if session.kind() == SessionKind::Daily {
            let lock = LockInfo::from_recorded_at(existing.iter().map(|record| record.recorded_at), now);
            if let (true, Some(lock_at)) = (lock.locked, lock.lock_at) {
                info!(class, %day, %lock_at, "rejected attendance save after lock");
                return Err(Error::Locked { lock_at });
            }
        }

        let previously_recorded: HashMap<StudentId, NaiveDateTime> = existing
            .iter()
            .map(|record| (record.student_id, record.recorded_at))
            .collect();
        let records = session.records(&user, &previously_recorded, now);

        let written = self.upsert_records(&records)?;

        let action = match session.kind() {
            SessionKind::Daily => "chamada_save",
            SessionKind::Correction => "chamada_correcao",
        };
        self.record_audit(
            action,
            "presencas",
            None,
            json!({ "class_id": class, "date": day.to_string(), "total": records.len() }),
        );
        info!(class, %day, user = %user, total = records.len(), action, "attendance saved");

        let lock = match session.kind() {
            SessionKind::Daily => LockInfo::from_recorded_at(records.iter().map(|record| record.recorded_at), now),
            SessionKind::Correction => LockInfo::default(),
        };
        session.apply_saved(&records, lock);

        Ok(written)
    }

    /// Inserts the records, replacing any existing record with the same `(student_id, date)`.
    fn upsert_records(&mut self, records: &[AttendanceRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let written = self.db.transaction(|conn| {
            diesel::replace_into(schema::attendance::table)
                .values(records)
                .execute(conn)
        })?;

        Ok(written)
    }

    /// Attendance across every class on `day`: how many were marked present and absent, and who
    /// was absent.
    pub fn daily_summary(&mut self, day: NaiveDate) -> Result<DailySummary> {
        use schema::{attendance, classes, students};

        let rows: Vec<(StudentId, String, String, Status, Option<Justification>)> = attendance::table
            .inner_join(students::table.on(students::id.eq(attendance::student_id)))
            .inner_join(classes::table.on(classes::id.eq(attendance::class_id)))
            .filter(attendance::date.eq(day))
            .order((students::full_name.asc(), students::id.asc()))
            .select((
                attendance::student_id,
                students::full_name,
                classes::name,
                attendance::status,
                attendance::justification,
            ))
            .load(&mut self.db)?;

        let mut summary = DailySummary::default();
        for (student_id, full_name, class_name, status, justification) in rows {
            match status {
                Status::Present => summary.present += 1,
                Status::Absent => {
                    summary.absent += 1;
                    summary.absentees.push(AbsentStudent {
                        student_id,
                        full_name,
                        class_name,
                        justification,
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Looks for students left out of every class, students pointing at a deleted class and
    /// classes created twice for the same year.
    pub fn consistency_report(&mut self) -> Result<ConsistencyReport> {
        use schema::{classes, students};

        let students_without_class = students::table
            .filter(students::active.eq(true))
            .filter(students::class_id.is_null())
            .order((students::full_name.asc(), students::id.asc()))
            .select(Student::as_select())
            .load(&mut self.db)?;

        let orphaned_students = students::table
            .left_join(classes::table.on(students::class_id.eq(classes::id.nullable())))
            .filter(students::class_id.is_not_null())
            .filter(classes::id.nullable().is_null())
            .order((students::full_name.asc(), students::id.asc()))
            .select(Student::as_select())
            .load(&mut self.db)?;

        let all_classes = classes::table
            .select(Class::as_select())
            .load(&mut self.db)?;

        Ok(ConsistencyReport {
            students_without_class,
            duplicate_classes: reports::duplicate_classes(&all_classes),
            orphaned_students,
        })
    }

    /// Moves the active students of each class in `class_ids` into the next grade's class for
    /// `target_year`, creating that class when it does not exist yet. With `keep_teachers` the
    /// teachers assigned to a class follow it.
    ///
    /// Runs in one transaction: if any class is missing or not older than `target_year`, nothing
    /// changes.
    pub fn promote_classes(
        &mut self,
        class_ids: &[ClassId],
        target_year: i32,
        keep_teachers: bool,
    ) -> Result<Vec<Promotion>> {
        use schema::{class_teachers, classes, students};

        if class_ids.is_empty() {
            return Err(Error::InvalidPromotion("no classes selected".to_string()));
        }

        let promotions = self.db.transaction::<_, Error, _>(|conn| {
            let mut promotions = Vec::with_capacity(class_ids.len());

            for &origin_id in class_ids {
                let origin = classes::table
                    .find(origin_id)
                    .select(Class::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| Error::NotFound(format!("class {origin_id}")))?;

                if target_year <= origin.academic_year {
                    return Err(Error::InvalidPromotion(format!(
                        "class {} is from {}, cannot promote it to {target_year}",
                        origin.name, origin.academic_year
                    )));
                }

                let target_name = reports::promoted_class_name(&origin.name);
                let existing = classes::table
                    .filter(classes::name.eq(&target_name))
                    .filter(classes::academic_year.eq(target_year))
                    .order(classes::id.asc())
                    .select(Class::as_select())
                    .first(conn)
                    .optional()?;
                let target = match existing {
                    Some(class) => class,
                    None => diesel::insert_into(classes::table)
                        .values(&NewClass {
                            name: &target_name,
                            academic_year: target_year,
                        })
                        .returning(Class::as_returning())
                        .get_result(conn)?,
                };

                let moved = diesel::update(
                    students::table
                        .filter(students::class_id.eq(origin.id))
                        .filter(students::active.eq(true)),
                )
                .set(students::class_id.eq(target.id))
                .execute(conn)?;

                if keep_teachers {
                    let teachers: Vec<String> = class_teachers::table
                        .filter(class_teachers::class_id.eq(origin.id))
                        .select(class_teachers::teacher_id)
                        .load(conn)?;

                    for teacher in &teachers {
                        diesel::insert_or_ignore_into(class_teachers::table)
                            .values(&ClassTeacher {
                                class_id: target.id,
                                teacher_id: teacher,
                            })
                            .execute(conn)?;
                    }
                }

                debug!(from = origin.id, to = target.id, moved, "promoted class");
                promotions.push(Promotion {
                    from: origin.id,
                    to: target,
                    students: moved,
                });
            }

            Ok(promotions)
        })?;

        info!(classes = promotions.len(), target_year, "promoted classes");
        self.record_audit(
            "promote",
            "turmas",
            None,
            json!({
                "class_ids": class_ids,
                "target_year": target_year,
                "keep_teachers": keep_teachers,
            }),
        );
        Ok(promotions)
    }

    /// The stored configuration, or the defaults if none was saved yet.
    pub fn configuration(&mut self) -> Result<ConfigurationValues> {
        Ok(self
            .stored_configuration()?
            .map(ConfigurationValues::from)
            .unwrap_or_default())
    }

    fn stored_configuration(&mut self) -> Result<Option<Configuration>> {
        use schema::configuration::dsl::*;

        Ok(configuration
            .order(id.asc())
            .select(Configuration::as_select())
            .first(&mut self.db)
            .optional()?)
    }

    /// Saves the singleton configuration, updating the stored row if there is one.
    pub fn save_configuration(&mut self, values: &ConfigurationValues) -> Result<()> {
        match self.stored_configuration()? {
            Some(existing) => {
                diesel::update(schema::configuration::table.find(existing.id))
                    .set(values)
                    .execute(&mut self.db)?;
            }
            None => {
                diesel::insert_into(schema::configuration::table)
                    .values(values)
                    .execute(&mut self.db)?;
            }
        }

        self.record_audit("update", "configuracoes", None, configuration_details(values));
        Ok(())
    }

    /// Appends an entry to the audit log. Failures are logged and otherwise ignored; auditing
    /// never fails the operation being audited.
    pub fn record_audit(
        &mut self,
        action: &str,
        entity: &str,
        entity_id: Option<String>,
        details: serde_json::Value,
    ) {
        let actor = self.identity.user_id().map(str::to_owned);
        let entry = NewAuditEntry {
            actor: actor.as_deref(),
            action,
            entity,
            entity_id,
            details: (!details.is_null()).then(|| details.to_string()),
            created_at: self.clock.now(),
        };

        if let Err(e) = diesel::insert_into(schema::audit_logs::table)
            .values(&entry)
            .execute(&mut self.db)
        {
            warn!(action, entity, error = %e, "audit log error");
        }
    }

    /// The most recent audit entries, newest first.
    pub fn audit_log(&mut self, limit: i64) -> Result<Vec<AuditEntry>> {
        use schema::audit_logs::dsl::*;

        Ok(audit_logs
            .order((created_at.desc(), id.desc()))
            .limit(limit)
            .select(AuditEntry::as_select())
            .load(&mut self.db)?)
    }
}

fn event_details(event: &CalendarEvent) -> serde_json::Value {
    let class_ids = match &event.scope {
        calendar::EventScope::Global => None,
        calendar::EventScope::Classes(ids) => Some(ids.clone()),
    };

    json!({
        "description": event.description,
        "start": event.start.to_string(),
        "end": event.end.map(|end| end.to_string()),
        "class_ids": class_ids,
    })
}

fn configuration_details(values: &ConfigurationValues) -> serde_json::Value {
    json!({
        "consecutive_absence_limit": values.consecutive_absence_limit,
        "interleaved_absence_limit": values.interleaved_absence_limit,
        "interleaved_absence_window_days": values.interleaved_absence_window_days,
        "alert_time": values.alert_time.map(|time| time.format("%H:%M").to_string()),
        "absence_alerts_enabled": values.absence_alerts_enabled,
        "missing_attendance_alerts_enabled": values.missing_attendance_alerts_enabled,
    })
}

/// Compares names so that embedded numbers sort by value: "2A" < "10A".
fn natural_cmp(a: &str, b: &str) -> Ordering {
    #[derive(PartialEq, Eq, PartialOrd, Ord)]
    enum Chunk {
        Number(u64),
        Text(String),
    }

    fn chunks(s: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut rest = s;

        while let Some(first) = rest.chars().next() {
            let is_digit = first.is_ascii_digit();
            let end = rest
                .find(|c: char| c.is_ascii_digit() != is_digit)
                .unwrap_or(rest.len());
            let (chunk, tail) = rest.split_at(end);

            chunks.push(if is_digit {
                Chunk::Number(chunk.parse().unwrap_or(u64::MAX))
            } else {
                Chunk::Text(chunk.to_lowercase())
            });
            rest = tail;
        }

        chunks
    }

    chunks(a).cmp(&chunks(b)).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventScope;
    use crate::clock::FixedClock;

    fn monday_manager() -> (AttendanceManager, ClassId) {
        let now = NaiveDateTime::parse_from_str("2024-05-13 08:00", "%Y-%m-%d %H:%M").unwrap();
        let mut manager = AttendanceManager::in_memory().unwrap().with_clock(FixedClock::new(now));
        let class = manager.insert_class("3B", 2024).unwrap().id;
        manager.insert_student("Caio Mendes", Some(class)).unwrap();
        manager.sign_in("prof-lia");
        (manager, class)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 13).unwrap()
    }

    fn drop_table(manager: &mut AttendanceManager, table: &str) {
        diesel::sql_query(format!("DROP TABLE {table}"))
            .execute(&mut manager.db)
            .unwrap();
    }

    #[test]
    fn unreadable_calendar_blocks_loading_and_saving() {
        let (mut manager, class) = monday_manager();
        let mut session = manager.load_chamada(class, monday()).unwrap();
        assert!(session.editable());

        drop_table(&mut manager, "calendar_events");

        assert!(matches!(manager.is_date_blocked(monday(), class), Err(Error::Database(_))));
        assert!(matches!(manager.load_chamada(class, monday()), Err(Error::Database(_))));
        assert!(matches!(manager.save_session(&mut session), Err(Error::Database(_))));
        assert!(manager.day_records(class, monday()).unwrap().is_empty());

        // Weekends need no calendar read.
        let saturday = NaiveDate::from_ymd_opt(2024, 5, 18).unwrap();
        assert!(matches!(
            manager.is_date_blocked(saturday, class),
            Ok(Some(BlockedReason::Weekend))
        ));
    }

    #[test]
    fn corrections_fail_too_when_the_calendar_is_unreadable() {
        let (mut manager, class) = monday_manager();
        manager
            .insert_event(&CalendarEvent {
                id: None,
                start: monday(),
                end: None,
                description: "Feriado municipal".to_string(),
                scope: EventScope::Global,
            })
            .unwrap();
        drop_table(&mut manager, "calendar_events");

        assert!(matches!(manager.load_correcao(class, monday()), Err(Error::Database(_))));
    }

    #[test]
    fn audit_failures_do_not_fail_the_save() {
        let (mut manager, class) = monday_manager();
        let mut session = manager.load_chamada(class, monday()).unwrap();

        drop_table(&mut manager, "audit_logs");

        assert_eq!(manager.save_session(&mut session).unwrap(), 1);
        assert_eq!(manager.day_records(class, monday()).unwrap().len(), 1);
        assert!(manager.audit_log(10).is_err());
    }

    #[test]
    fn students_of_a_deleted_class_are_reported() {
        let (mut manager, class) = monday_manager();
        let other = manager.insert_class("3C", 2024).unwrap().id;
        manager.insert_student("Davi Rocha", Some(other)).unwrap();

        diesel::sql_query(format!("DELETE FROM classes WHERE id = {class}"))
            .execute(&mut manager.db)
            .unwrap();

        let report = manager.consistency_report().unwrap();
        let orphans: Vec<&str> = report
            .orphaned_students
            .iter()
            .map(|student| student.full_name.as_str())
            .collect();
        assert_eq!(orphans, vec!["Caio Mendes"]);
        assert!(report.students_without_class.is_empty());
    }

    #[test]
    fn created_tables_have_every_schema_column() {
        let (mut manager, _) = monday_manager();
        let db = &mut manager.db;

        schema::students::table.select(Student::as_select()).load::<Student>(db).unwrap();
        schema::classes::table.select(Class::as_select()).load::<Class>(db).unwrap();
        schema::class_teachers::table
            .select((schema::class_teachers::class_id, schema::class_teachers::teacher_id))
            .load::<(ClassId, String)>(db)
            .unwrap();
        schema::attendance::table.select(AttendanceRecord::as_select()).load::<AttendanceRecord>(db).unwrap();
        schema::calendar_events::table.select(CalendarEventRow::as_select()).load::<CalendarEventRow>(db).unwrap();
        schema::configuration::table.select(Configuration::as_select()).load::<Configuration>(db).unwrap();
        schema::audit_logs::table.select(AuditEntry::as_select()).load::<AuditEntry>(db).unwrap();
    }

    #[test]
    fn class_names_sort_naturally() {
        let mut names = vec!["10A", "2B", "2A", "1º ano", "Infantil"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["1º ano", "2A", "2B", "10A", "Infantil"]);
    }
}
