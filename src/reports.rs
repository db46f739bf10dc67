//! School-wide views for administrators: the day's attendance across classes, data consistency
//! checks and the outcome of promoting classes to a new academic year.

use crate::models::{Class, ClassId, Justification, Student, StudentId};
use std::collections::HashMap;

/// Attendance across every class on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySummary {
    pub present: usize,
    pub absent: usize,
    /// Absent students ordered by name.
    pub absentees: Vec<AbsentStudent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsentStudent {
    pub student_id: StudentId,
    pub full_name: String,
    pub class_name: String,
    pub justification: Option<Justification>,
}

impl AbsentStudent {
    /// The recorded reason, or a placeholder when none was given.
    pub fn reason(&self) -> &str {
        self.justification
            .as_ref()
            .map_or("Sem justificativa", Justification::as_str)
    }
}

/// Records that point at data which should not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Active students not placed in any class. They never appear on an attendance sheet.
    pub students_without_class: Vec<Student>,
    /// Class names used more than once in the same academic year, most repeated first.
    pub duplicate_classes: Vec<DuplicateClass>,
    /// Students whose class no longer exists.
    pub orphaned_students: Vec<Student>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.students_without_class.is_empty()
            && self.duplicate_classes.is_empty()
            && self.orphaned_students.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateClass {
    pub name: String,
    pub academic_year: i32,
    pub count: usize,
}

/// Groups classes by name and year, keeping the groups with more than one class.
pub fn duplicate_classes(classes: &[Class]) -> Vec<DuplicateClass> {
    let mut counts: HashMap<(&str, i32), usize> = HashMap::new();
    for class in classes {
        *counts.entry((class.name.as_str(), class.academic_year)).or_default() += 1;
    }

    let mut duplicates: Vec<DuplicateClass> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|((name, academic_year), count)| DuplicateClass {
            name: name.to_string(),
            academic_year,
            count,
        })
        .collect();

    duplicates.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.academic_year.cmp(&b.academic_year))
            .then_with(|| a.name.cmp(&b.name))
    });
    duplicates
}

/// One class moved up a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub from: ClassId,
    pub to: Class,
    /// Active students moved into `to`.
    pub students: usize,
}

/// The class name for the next grade: the first number in the name goes up by one ("5A" becomes
/// "6A", "1º ano" becomes "2º ano"). Names without a number are kept.
pub fn promoted_class_name(name: &str) -> String {
    let Some(start) = name.find(|c: char| c.is_ascii_digit()) else {
        return name.to_string();
    };
    let end = name[start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(name.len(), |end| start + end);

    match name[start..end].parse::<u64>() {
        Ok(grade) => format!("{}{}{}", &name[..start], grade + 1, &name[end..]),
        Err(_) => name.to_string(),
    }
}
