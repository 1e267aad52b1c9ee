//! User-initiated create/delete operations, independent of sync.
//!
//! Ids arrive as the raw text the user typed into the add form; a
//! non-integer aborts only that action with a `Validation` error. A
//! blank name falls back to an "Unnamed ..." placeholder.

use crate::error::SyncError;
use crate::model::{Assignment, AssignmentGroup, Course, Term};
use crate::store::Store;

fn parse_id(input: &str) -> Result<i64, SyncError> {
    input
        .trim()
        .parse::<i64>()
        .map_err(|_| SyncError::Validation(format!("not an integer id: {input:?}")))
}

fn name_or(input: &str, placeholder: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Some(placeholder.to_string())
    } else {
        Some(trimmed.to_string())
    }
}

pub fn add_term(store: &Store<'_>, id_text: &str, name_text: &str) -> Result<Term, SyncError> {
    let term = Term {
        id: parse_id(id_text)?,
        name: name_or(name_text, "Unnamed Term"),
        start_at: None,
        end_at: None,
    };
    store.upsert_term(&term)?;
    Ok(term)
}

pub fn add_course(
    store: &Store<'_>,
    term_id: i64,
    id_text: &str,
    name_text: &str,
) -> Result<Course, SyncError> {
    let course = Course {
        id: parse_id(id_text)?,
        name: name_or(name_text, "Unnamed Course"),
        account_id: None,
        uuid: None,
        course_code: None,
        enrollment_term_id: None,
        term_id,
    };
    store.upsert_course(&course)?;
    Ok(course)
}

pub fn add_group(
    store: &Store<'_>,
    course_id: i64,
    id_text: &str,
    name_text: &str,
) -> Result<AssignmentGroup, SyncError> {
    let group = AssignmentGroup {
        id: parse_id(id_text)?,
        name: name_or(name_text, "Unnamed Group"),
        weight: None,
        course_id,
    };
    store.upsert_group(&group)?;
    Ok(group)
}

pub fn add_assignment(
    store: &Store<'_>,
    group_id: i64,
    id_text: &str,
    name_text: &str,
) -> Result<Assignment, SyncError> {
    let assignment = Assignment {
        id: parse_id(id_text)?,
        name: name_or(name_text, "Unnamed Assignment"),
        description: None,
        due_at: None,
        points_possible: None,
        uuid: None,
        group_id,
    };
    store.upsert_assignment(&assignment)?;
    Ok(assignment)
}

pub fn delete_term(store: &Store<'_>, id: i64) -> Result<usize, SyncError> {
    store.delete_term(id)
}

pub fn delete_course(store: &Store<'_>, id: i64) -> Result<usize, SyncError> {
    store.delete_course(id)
}

pub fn delete_group(store: &Store<'_>, id: i64) -> Result<usize, SyncError> {
    store.delete_group(id)
}

pub fn delete_assignment(store: &Store<'_>, id: i64) -> Result<usize, SyncError> {
    store.delete_assignment(id)
}

/// Erase-all actions, scoped the way the list screens are: terms
/// globally, children within their parent.
pub fn erase_terms(store: &Store<'_>) -> Result<usize, SyncError> {
    store.delete_all_terms()
}

pub fn erase_courses(store: &Store<'_>, term_id: i64) -> Result<usize, SyncError> {
    store.delete_courses_in_term(term_id)
}

pub fn erase_groups(store: &Store<'_>, course_id: i64) -> Result<usize, SyncError> {
    store.delete_groups_in_course(course_id)
}

pub fn erase_assignments(store: &Store<'_>, group_id: i64) -> Result<usize, SyncError> {
    store.delete_assignments_in_group(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        Store::new(&conn).unwrap().init_schema().unwrap();
        conn
    }

    #[test]
    fn non_integer_id_aborts_with_validation_and_inserts_nothing() {
        let conn = open();
        let store = Store::new(&conn).unwrap();
        let err = add_term(&store, "12ab", "Fall").unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert!(store.list_terms().unwrap().is_empty());
    }

    #[test]
    fn blank_name_falls_back_to_placeholder() {
        let conn = open();
        let store = Store::new(&conn).unwrap();
        let term = add_term(&store, " 7 ", "  ").unwrap();
        assert_eq!(term.id, 7);
        assert_eq!(term.name.as_deref(), Some("Unnamed Term"));
        let course = add_course(&store, 7, "70", "").unwrap();
        assert_eq!(course.name.as_deref(), Some("Unnamed Course"));
    }

    #[test]
    fn manual_entities_start_with_absent_fields() {
        let conn = open();
        let store = Store::new(&conn).unwrap();
        let term = add_term(&store, "7", "Fall").unwrap();
        assert!(term.start_at.is_none());
        let stored = store.get_term(7).unwrap().unwrap();
        assert!(stored.end_at.is_none());
    }

    #[test]
    fn adding_a_course_under_a_missing_term_fails() {
        let conn = open();
        let store = Store::new(&conn).unwrap();
        let err = add_course(&store, 404, "10", "Biology").unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));
    }

    #[test]
    fn erase_terms_cascades_everything() {
        let conn = open();
        let store = Store::new(&conn).unwrap();
        add_term(&store, "1", "Fall").unwrap();
        add_course(&store, 1, "10", "Biology").unwrap();
        add_group(&store, 10, "100", "HW").unwrap();
        add_assignment(&store, 100, "1000", "P1").unwrap();

        erase_terms(&store).unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.terms, 0);
        assert_eq!(counts.assignments, 0);
    }
}
