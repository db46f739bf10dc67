use chamada::calendar::{CalendarEvent, EventScope};
use chamada::clock::FixedClock;
use chamada::models::{ConfigurationValues, Justification, Status};
use chamada::reports::DuplicateClass;
use chamada::{AttendanceManager, Error};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn manager() -> AttendanceManager {
    let now = NaiveDateTime::parse_from_str("2024-05-13 08:00", "%Y-%m-%d %H:%M").unwrap();
    let mut manager = AttendanceManager::in_memory()
        .unwrap()
        .with_clock(FixedClock::new(now));
    manager.sign_in("admin");
    manager
}

fn event(description: &str, scope: EventScope) -> CalendarEvent {
    CalendarEvent {
        id: None,
        start: date("2024-06-03"),
        end: None,
        description: description.to_string(),
        scope,
    }
}

#[test]
fn teachers_see_their_classes_in_natural_order() {
    let mut manager = manager();
    for name in ["10A", "2A", "1A", "3C"] {
        let class = manager.insert_class(name, 2024).unwrap();
        if name != "3C" {
            manager.assign_teacher(class.id, "prof-davi").unwrap();
        }
    }
    // Assigning twice is harmless.
    let first = manager.classes().unwrap()[0].id;
    manager.assign_teacher(first, "prof-davi").unwrap();

    let names: Vec<String> = manager
        .classes_for_teacher("prof-davi")
        .unwrap()
        .into_iter()
        .map(|class| class.name)
        .collect();
    assert_eq!(names, vec!["1A", "2A", "10A"]);

    assert!(manager.classes_for_teacher("prof-nobody").unwrap().is_empty());
}

#[test]
fn class_specific_events_need_classes() {
    let mut manager = manager();

    let err = manager
        .insert_event(&event("Reunião", EventScope::Classes(vec![])))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidEvent(_)));

    let mut backwards = event("Recesso", EventScope::Global);
    backwards.end = Some(date("2024-06-01"));
    assert!(matches!(
        manager.insert_event(&backwards),
        Err(Error::InvalidEvent(_))
    ));

    assert!(manager.calendar_events().unwrap().is_empty());
}

#[test]
fn events_can_be_updated_and_deleted() {
    let mut manager = manager();
    let class = manager.insert_class("4A", 2024).unwrap().id;

    let created = manager
        .insert_event(&event("Feira de ciências", EventScope::Global))
        .unwrap();
    let id = created.id.unwrap();
    assert_eq!(created.scope, EventScope::Global);

    let mut changed = created.clone();
    changed.scope = EventScope::Classes(vec![class]);
    changed.end = Some(date("2024-06-04"));
    let updated = manager.update_event(id, &changed).unwrap();
    assert_eq!(updated.scope, EventScope::Classes(vec![class]));
    assert_eq!(updated.last_day(), date("2024-06-04"));

    // Back to a single day: the end date is cleared, not kept.
    changed.end = None;
    assert_eq!(manager.update_event(id, &changed).unwrap().end, None);

    assert!(matches!(
        manager.update_event(id + 100, &changed),
        Err(Error::NotFound(_))
    ));

    manager.delete_event(id).unwrap();
    assert!(manager.calendar_events().unwrap().is_empty());
    assert!(matches!(manager.delete_event(id), Err(Error::NotFound(_))));
}

#[test]
fn events_are_listed_by_start_date() {
    let mut manager = manager();
    let mut later = event("Formatura", EventScope::Global);
    later.start = date("2024-12-10");
    manager.insert_event(&later).unwrap();
    manager.insert_event(&event("Festa junina", EventScope::Global)).unwrap();

    let descriptions: Vec<String> = manager
        .calendar_events()
        .unwrap()
        .into_iter()
        .map(|event| event.description)
        .collect();
    assert_eq!(descriptions, vec!["Festa junina", "Formatura"]);
}

#[test]
fn configuration_is_a_singleton() {
    let mut manager = manager();
    assert_eq!(manager.configuration().unwrap(), ConfigurationValues::default());

    let mut values = ConfigurationValues {
        consecutive_absence_limit: Some(3),
        interleaved_absence_limit: Some(5),
        interleaved_absence_window_days: Some(30),
        alert_time: NaiveTime::from_hms_opt(9, 30, 0),
        absence_alerts_enabled: true,
        missing_attendance_alerts_enabled: false,
    };
    manager.save_configuration(&values).unwrap();
    assert_eq!(manager.configuration().unwrap(), values);

    values.consecutive_absence_limit = None;
    values.missing_attendance_alerts_enabled = true;
    manager.save_configuration(&values).unwrap();
    assert_eq!(manager.configuration().unwrap(), values);

    let audit = manager.audit_log(10).unwrap();
    assert_eq!(
        audit
            .iter()
            .filter(|entry| entry.entity == "configuracoes")
            .count(),
        2
    );
}

#[test]
fn students_can_move_and_be_deactivated() {
    let mut manager = manager();
    let first = manager.insert_class("7A", 2024).unwrap().id;
    let second = manager.insert_class("7B", 2024).unwrap().id;
    let student = manager.insert_student("Elisa Prado", Some(first)).unwrap();
    assert!(student.active);

    let moved = manager.move_student(student.id, Some(second)).unwrap();
    assert_eq!(moved.class_id, Some(second));
    assert!(manager.active_students(first).unwrap().is_empty());
    assert_eq!(manager.active_students(second).unwrap(), vec![moved]);

    manager.set_student_active(student.id, false).unwrap();
    assert!(manager.active_students(second).unwrap().is_empty());
    assert!(!manager.get_student(student.id).unwrap().active);

    assert!(matches!(manager.get_student(9999), Err(Error::NotFound(_))));
    assert!(matches!(
        manager.set_student_active(9999, true),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn active_students_are_ordered_by_name() {
    let mut manager = manager();
    let class = manager.insert_class("8A", 2024).unwrap().id;
    for name in ["Rui", "Ana", "Mateus"] {
        manager.insert_student(name, Some(class)).unwrap();
    }

    let names: Vec<String> = manager
        .active_students(class)
        .unwrap()
        .into_iter()
        .map(|student| student.full_name)
        .collect();
    assert_eq!(names, vec!["Ana", "Mateus", "Rui"]);
}

#[test]
fn daily_summary_counts_every_class() {
    let mut manager = manager();
    let monday = date("2024-05-13");
    let first = manager.insert_class("5A", 2024).unwrap().id;
    let second = manager.insert_class("6B", 2024).unwrap().id;
    let ana = manager.insert_student("Ana Souza", Some(first)).unwrap().id;
    manager.insert_student("Bruno Lima", Some(first)).unwrap();
    let caio = manager.insert_student("Caio Mendes", Some(second)).unwrap().id;
    manager.insert_student("Duda Reis", Some(second)).unwrap();

    let mut sheet = manager.load_chamada(first, monday).unwrap();
    sheet.set_justification(ana, Justification::Justified).unwrap();
    manager.save_session(&mut sheet).unwrap();

    let mut sheet = manager.load_chamada(second, monday).unwrap();
    sheet.set_status(caio, Status::Absent).unwrap();
    manager.save_session(&mut sheet).unwrap();

    let summary = manager.daily_summary(monday).unwrap();
    assert_eq!((summary.present, summary.absent), (2, 2));

    let absentees: Vec<(&str, &str, &str)> = summary
        .absentees
        .iter()
        .map(|absent| (absent.full_name.as_str(), absent.class_name.as_str(), absent.reason()))
        .collect();
    assert_eq!(
        absentees,
        vec![
            ("Ana Souza", "5A", "Falta justificada"),
            ("Caio Mendes", "6B", "Falta injustificada"),
        ]
    );

    let quiet = manager.daily_summary(date("2024-05-14")).unwrap();
    assert_eq!((quiet.present, quiet.absent), (0, 0));
    assert!(quiet.absentees.is_empty());
}

#[test]
fn promotion_moves_active_students_to_the_next_grade() {
    let mut manager = manager();
    let fifth = manager.insert_class("5A", 2024).unwrap().id;
    let ninth = manager.insert_class("9B", 2024).unwrap().id;
    // Already created by hand for next year; it is reused.
    let tenth = manager.insert_class("10B", 2025).unwrap().id;
    manager.assign_teacher(fifth, "prof-davi").unwrap();

    let ana = manager.insert_student("Ana Souza", Some(fifth)).unwrap().id;
    let left = manager.insert_student("Lia Alves", Some(fifth)).unwrap().id;
    manager.set_student_active(left, false).unwrap();
    manager.insert_student("Rui Costa", Some(ninth)).unwrap();

    let promotions = manager.promote_classes(&[fifth, ninth], 2025, true).unwrap();
    assert_eq!(promotions.len(), 2);
    assert_eq!(promotions[0].from, fifth);
    assert_eq!(promotions[0].to.name, "6A");
    assert_eq!(promotions[0].to.academic_year, 2025);
    assert_eq!(promotions[0].students, 1);
    assert_eq!(promotions[1].to.id, tenth);

    let sixth = promotions[0].to.id;
    assert_eq!(manager.get_student(ana).unwrap().class_id, Some(sixth));
    assert_eq!(manager.get_student(left).unwrap().class_id, Some(fifth));
    assert!(manager.active_students(ninth).unwrap().is_empty());
    assert_eq!(manager.active_students(tenth).unwrap().len(), 1);

    let davi: Vec<i32> = manager
        .classes_for_teacher("prof-davi")
        .unwrap()
        .into_iter()
        .map(|class| class.id)
        .collect();
    assert_eq!(davi, vec![fifth, sixth]);

    let audit = manager.audit_log(1).unwrap();
    assert_eq!((audit[0].action.as_str(), audit[0].entity.as_str()), ("promote", "turmas"));
}

#[test]
fn failed_promotion_changes_nothing() {
    let mut manager = manager();
    let fifth = manager.insert_class("5A", 2024).unwrap().id;
    let old = manager.insert_class("7C", 2025).unwrap().id;
    let ana = manager.insert_student("Ana Souza", Some(fifth)).unwrap().id;
    let classes_before = manager.classes().unwrap();

    // The second class is not older than the target year, so the first is rolled back too.
    assert!(matches!(
        manager.promote_classes(&[fifth, old], 2025, false),
        Err(Error::InvalidPromotion(_))
    ));
    assert!(matches!(
        manager.promote_classes(&[fifth, 9999], 2025, false),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        manager.promote_classes(&[], 2025, false),
        Err(Error::InvalidPromotion(_))
    ));

    assert_eq!(manager.classes().unwrap(), classes_before);
    assert_eq!(manager.get_student(ana).unwrap().class_id, Some(fifth));
}

#[test]
fn consistency_report_finds_unplaced_students_and_duplicate_classes() {
    let mut manager = manager();
    assert!(manager.consistency_report().unwrap().is_clean());

    manager.insert_class("5A", 2024).unwrap();
    manager.insert_class("5A", 2024).unwrap();
    manager.insert_class("5A", 2025).unwrap();
    manager.insert_student("Zeca Lopes", None).unwrap();
    manager.insert_student("Bia Nunes", None).unwrap();
    let gone = manager.insert_student("Tito Paz", None).unwrap().id;
    manager.set_student_active(gone, false).unwrap();

    let report = manager.consistency_report().unwrap();
    let unplaced: Vec<String> = report
        .students_without_class
        .into_iter()
        .map(|student| student.full_name)
        .collect();
    assert_eq!(unplaced, vec!["Bia Nunes", "Zeca Lopes"]);
    assert_eq!(
        report.duplicate_classes,
        vec![DuplicateClass {
            name: "5A".to_string(),
            academic_year: 2024,
            count: 2,
        }]
    );
    assert!(report.orphaned_students.is_empty());
}
