use anyhow::{Context, Result};
use chamada::calendar::{CalendarEvent, EventScope};
use chamada::cli::{Absence, Cli, Command};
use chamada::models::{Status, StudentId};
use chamada::{AttendanceManager, AttendanceSession, display};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "chamada=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut manager = chamada::create_default_manager()?;

    let result = run(&mut manager, cli.command);

    if let Err(e) = &result {
        if e.downcast_ref::<chamada::Error>().is_some_and(chamada::Error::is_auth_expired) {
            manager.sign_out();
            eprintln!("{e}");
            std::process::exit(2);
        }
    }

    result
}

fn run(manager: &mut AttendanceManager, command: Command) -> Result<()> {
    match command {
        Command::Show {
            class,
            date,
            absent_only,
        } => {
            let date = date.unwrap_or_else(|| manager.today());
            let session = manager.load_chamada(class, date)?;
            display::show_session(&session, absent_only);
        }
        Command::Take { class, absent } => {
            let today = manager.today();
            let mut session = manager.load_chamada(class, today)?;
            if !session.editable() {
                anyhow::bail!(session.status_message());
            }

            session.mark_all_present()?;
            apply_absences(&mut session, &absent)?;

            let written = manager.save_session(&mut session)?;
            display::show_session(&session, false);
            println!("Attendance saved ({written} records).");
        }
        Command::Correct {
            class,
            date,
            absent,
            present,
        } => {
            let mut session = manager.load_correcao(class, date)?;
            if let Some(warning) = session.warning() {
                println!("{warning}");
            }

            for student in present {
                session.set_status(student, Status::Present)?;
            }
            apply_absences(&mut session, &absent)?;

            let written = manager.save_session(&mut session)?;
            display::show_session(&session, false);
            println!("Attendance corrected ({written} records).");
        }
        Command::CheckDate { class, date } => match manager.is_date_blocked(date, class)? {
            Some(reason) => println!("{reason}"),
            None => println!("Attendance can be taken for class {class} on {date}."),
        },
        Command::AddStudent { name, class } => {
            let student = manager.insert_student(&name, class)?;
            println!("Added student {} ({})", student.full_name, student.id);
        }
        Command::MoveStudent { student, class } => {
            let student = manager.move_student(student, class)?;
            println!("{:#?}", student);
        }
        Command::DeactivateStudent { student } => {
            let student = manager.set_student_active(student, false)?;
            println!("Deactivated {} ({})", student.full_name, student.id);
        }
        Command::ActivateStudent { student } => {
            let student = manager.set_student_active(student, true)?;
            println!("Activated {} ({})", student.full_name, student.id);
        }
        Command::ShowStudent { student } => {
            let info = manager.get_student(student)?;
            let records = manager.student_attendance(student)?;
            display::show_student(&info, records);
        }
        Command::AddClass { name, year } => {
            let class = manager.insert_class(&name, year)?;
            println!("Added class {} ({})", class.name, class.id);
        }
        Command::PromoteClasses {
            target_year,
            classes,
            keep_teachers,
        } => {
            let promotions = manager.promote_classes(&classes, target_year, keep_teachers)?;
            display::show_promotions(promotions);
        }
        Command::AssignTeacher { class, teacher } => {
            manager.assign_teacher(class, &teacher)?;
            println!("Assigned {teacher} to class {class}");
        }
        Command::ListClasses { teacher } => {
            let classes = match teacher {
                Some(teacher) => manager.classes_for_teacher(&teacher)?,
                None => manager.classes()?,
            };
            display::show_classes(classes);
        }
        Command::AddEvent {
            start,
            description,
            end,
            classes,
        } => {
            let scope = if classes.is_empty() {
                EventScope::Global
            } else {
                EventScope::Classes(classes)
            };
            let event = manager.insert_event(&CalendarEvent {
                id: None,
                start,
                end,
                description,
                scope,
            })?;
            println!("Added event {}", event.id.unwrap_or_default());
        }
        Command::ListEvents => display::show_events(manager.calendar_events()?),
        Command::DeleteEvent { event } => {
            manager.delete_event(event)?;
            println!("Deleted event {event}");
        }
        Command::DailySummary { date } => {
            let date = date.unwrap_or_else(|| manager.today());
            display::show_daily_summary(date, &manager.daily_summary(date)?);
        }
        Command::CheckConsistency => display::show_consistency(&manager.consistency_report()?),
        Command::ShowConfig => display::show_configuration(&manager.configuration()?),
        Command::SetConfig {
            consecutive_absences,
            interleaved_absences,
            interleaved_window_days,
            alert_time,
            absence_alerts,
            missing_attendance_alerts,
        } => {
            let mut config = manager.configuration()?;
            if consecutive_absences.is_some() {
                config.consecutive_absence_limit = consecutive_absences;
            }
            if interleaved_absences.is_some() {
                config.interleaved_absence_limit = interleaved_absences;
            }
            if interleaved_window_days.is_some() {
                config.interleaved_absence_window_days = interleaved_window_days;
            }
            if alert_time.is_some() {
                config.alert_time = alert_time;
            }
            if let Some(enabled) = absence_alerts {
                config.absence_alerts_enabled = enabled;
            }
            if let Some(enabled) = missing_attendance_alerts {
                config.missing_attendance_alerts_enabled = enabled;
            }

            manager.save_configuration(&config)?;
            display::show_configuration(&config);
        }
        Command::AuditLog { limit } => display::show_audit_log(manager.audit_log(limit)?),
    }

    Ok(())
}

fn apply_absences(session: &mut AttendanceSession, absent: &[Absence]) -> Result<()> {
    for absence in absent {
        let student: StudentId = absence.student;
        match &absence.justification {
            Some(justification) => session
                .set_justification(student, justification.clone())
                .with_context(|| format!("cannot mark student {student} absent"))?,
            None => session
                .set_status(student, Status::Absent)
                .with_context(|| format!("cannot mark student {student} absent"))?,
        }
    }

    Ok(())
}
