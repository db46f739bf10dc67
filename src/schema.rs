// Kept by hand in step with `CREATE_TABLES` in `manager.rs`, which creates these tables.

diesel::table! {
    attendance (student_id, date) {
        student_id -> Integer,
        date -> Date,
        class_id -> Integer,
        status -> Text,
        justification -> Nullable<Text>,
        recorded_by -> Text,
        recorded_at -> Timestamp,
    }
}

diesel::table! {
    audit_logs (id) {
        id -> Integer,
        actor -> Nullable<Text>,
        action -> Text,
        entity -> Text,
        entity_id -> Nullable<Text>,
        details -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    calendar_events (id) {
        id -> Integer,
        start_date -> Date,
        end_date -> Nullable<Date>,
        description -> Text,
        scope -> Text,
        class_ids -> Nullable<Text>,
    }
}

diesel::table! {
    class_teachers (class_id, teacher_id) {
        class_id -> Integer,
        teacher_id -> Text,
    }
}

diesel::table! {
    classes (id) {
        id -> Integer,
        name -> Text,
        academic_year -> Integer,
    }
}

diesel::table! {
    configuration (id) {
        id -> Integer,
        consecutive_absence_limit -> Nullable<Integer>,
        interleaved_absence_limit -> Nullable<Integer>,
        interleaved_absence_window_days -> Nullable<Integer>,
        alert_time -> Nullable<Time>,
        absence_alerts_enabled -> Bool,
        missing_attendance_alerts_enabled -> Bool,
    }
}

diesel::table! {
    students (id) {
        id -> Integer,
        full_name -> Text,
        class_id -> Nullable<Integer>,
        active -> Bool,
    }
}

diesel::joinable!(attendance -> classes (class_id));
diesel::joinable!(attendance -> students (student_id));
diesel::joinable!(class_teachers -> classes (class_id));
diesel::joinable!(students -> classes (class_id));

diesel::allow_tables_to_appear_in_same_query!(
    attendance,
    audit_logs,
    calendar_events,
    class_teachers,
    classes,
    configuration,
    students,
);
