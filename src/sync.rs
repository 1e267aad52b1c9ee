use std::cell::Cell;
use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::RemoteSource;
use crate::dto::CourseDto;
use crate::error::SyncError;
use crate::model::{Assignment, AssignmentGroup, Course, Term};
use crate::store::Store;

/// Where in the hierarchy a branch was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum FailureScope {
    /// The top-level course fetch itself.
    Courses,
    /// The group fetch for one course.
    Groups { course_id: i64 },
    /// The assignment fetch for one course.
    Assignments { course_id: i64 },
    /// A single store write.
    Course { course_id: i64 },
    Group { group_id: i64 },
    Assignment { assignment_id: i64 },
    Checkpoint,
}

/// One abandoned branch. The pass keeps going; the caller decides what
/// to do with these.
#[derive(Debug, Clone, Serialize)]
pub struct BranchFailure {
    #[serde(flatten)]
    pub scope: FailureScope,
    pub error: String,
}

impl BranchFailure {
    fn new(scope: FailureScope, error: &SyncError) -> Self {
        Self {
            scope,
            error: error.to_string(),
        }
    }
}

/// Outcome of one full top-down pass. Failures are collected, never
/// swallowed; a pass whose root fetch failed still returns a report.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub terms_upserted: usize,
    pub courses_upserted: usize,
    pub groups_upserted: usize,
    pub assignments_upserted: usize,
    /// Courses returned without an embedded term are not mirrored.
    pub courses_without_term: usize,
    /// Assignments whose group id matched nothing fetched in this pass.
    pub assignments_dropped: usize,
    pub failures: Vec<BranchFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walks Term -> Course -> AssignmentGroup -> Assignment, fetching each
/// level from the remote and upserting it by id into the local store.
/// Fetches run strictly sequentially, one course at a time.
pub struct SyncClient<'c, R> {
    store: Store<'c>,
    remote: R,
    in_flight: Cell<bool>,
}

impl<'c, R: RemoteSource> SyncClient<'c, R> {
    pub fn new(conn: &'c Connection, remote: R) -> Result<Self, SyncError> {
        let store = Store::new(conn)?;
        store.init_schema()?;
        Ok(Self {
            store,
            remote,
            in_flight: Cell::new(false),
        })
    }

    pub fn store(&self) -> &Store<'c> {
        &self.store
    }

    /// Run one full sync pass. A second call while one is in flight on
    /// the same client fails fast instead of interleaving store writes.
    pub fn sync_pass(&self) -> Result<SyncReport, SyncError> {
        if self.in_flight.replace(true) {
            return Err(SyncError::State("sync pass already running"));
        }
        let report = self.run_pass();
        self.in_flight.set(false);
        Ok(report)
    }

    fn run_pass(&self) -> SyncReport {
        let mut report = SyncReport::default();

        let courses = match self.remote.fetch_courses() {
            Ok(courses) => courses,
            Err(e) => {
                warn!("course fetch failed, nothing to sync: {e}");
                report
                    .failures
                    .push(BranchFailure::new(FailureScope::Courses, &e));
                return report;
            }
        };

        // Terms repeat across courses; count each remote id once.
        let mut seen_terms: HashSet<i64> = HashSet::new();
        // Group ids fetched in this pass. Assignments only attach to these.
        let mut pass_groups: HashSet<i64> = HashSet::new();

        for course in &courses {
            self.sync_course(course, &mut seen_terms, &mut pass_groups, &mut report);
        }

        if let Err(e) = self.store.mark_synced() {
            report
                .failures
                .push(BranchFailure::new(FailureScope::Checkpoint, &e));
        }
        report
    }

    /// One course branch: term + course rows, then the course's groups,
    /// then its assignments. Any failure abandons the rest of this branch
    /// and is recorded; the caller moves on to the next course.
    fn sync_course(
        &self,
        dto: &CourseDto,
        seen_terms: &mut HashSet<i64>,
        pass_groups: &mut HashSet<i64>,
        report: &mut SyncReport,
    ) {
        let Some(term_dto) = &dto.term else {
            debug!(course_id = dto.id, "course has no term, dropped");
            report.courses_without_term += 1;
            return;
        };

        let term = Term::from_dto(term_dto);
        let course = Course::from_dto(dto, term.id);
        let written = self
            .store
            .upsert_term(&term)
            .and_then(|()| self.store.upsert_course(&course));
        if let Err(e) = written {
            warn!(course_id = course.id, "course upsert failed: {e}");
            report.failures.push(BranchFailure::new(
                FailureScope::Course {
                    course_id: course.id,
                },
                &e,
            ));
            return;
        }
        if seen_terms.insert(term.id) {
            report.terms_upserted += 1;
        }
        report.courses_upserted += 1;

        let groups = match self.remote.fetch_groups(course.id) {
            Ok(groups) => groups,
            Err(e) => {
                warn!(course_id = course.id, "group fetch failed, branch skipped: {e}");
                report.failures.push(BranchFailure::new(
                    FailureScope::Groups {
                        course_id: course.id,
                    },
                    &e,
                ));
                return;
            }
        };
        for group_dto in &groups {
            let group = AssignmentGroup::from_dto(group_dto, course.id);
            match self.store.upsert_group(&group) {
                Ok(()) => {
                    pass_groups.insert(group.id);
                    report.groups_upserted += 1;
                }
                Err(e) => {
                    warn!(group_id = group.id, "group upsert failed: {e}");
                    report.failures.push(BranchFailure::new(
                        FailureScope::Group { group_id: group.id },
                        &e,
                    ));
                }
            }
        }

        let assignments = match self.remote.fetch_assignments(course.id) {
            Ok(assignments) => assignments,
            Err(e) => {
                warn!(
                    course_id = course.id,
                    "assignment fetch failed, branch skipped: {e}"
                );
                report.failures.push(BranchFailure::new(
                    FailureScope::Assignments {
                        course_id: course.id,
                    },
                    &e,
                ));
                return;
            }
        };
        for assignment_dto in &assignments {
            let group_id = match assignment_dto.assignment_group_id {
                Some(id) if pass_groups.contains(&id) => id,
                _ => {
                    debug!(
                        assignment_id = assignment_dto.id,
                        "assignment has no matching group in this pass, dropped"
                    );
                    report.assignments_dropped += 1;
                    continue;
                }
            };
            let assignment = Assignment::from_dto(assignment_dto, group_id);
            match self.store.upsert_assignment(&assignment) {
                Ok(()) => report.assignments_upserted += 1,
                Err(e) => {
                    warn!(assignment_id = assignment.id, "assignment upsert failed: {e}");
                    report.failures.push(BranchFailure::new(
                        FailureScope::Assignment {
                            assignment_id: assignment.id,
                        },
                        &e,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{AssignmentDto, AssignmentGroupDto, TermDto};
    use pretty_assertions::assert_eq;

    /// Fixture remote: canned rows keyed by course, plus per-level
    /// failure switches.
    #[derive(Default)]
    struct FakeRemote {
        courses: Vec<CourseDto>,
        groups: Vec<(i64, AssignmentGroupDto)>,
        assignments: Vec<(i64, AssignmentDto)>,
        fail_courses: bool,
        fail_groups_for: Option<i64>,
        fail_assignments_for: Option<i64>,
    }

    impl FakeRemote {
        fn decode_failure() -> SyncError {
            serde_json::from_str::<Vec<i64>>("{").unwrap_err().into()
        }
    }

    impl RemoteSource for FakeRemote {
        fn fetch_courses(&self) -> Result<Vec<CourseDto>, SyncError> {
            if self.fail_courses {
                return Err(Self::decode_failure());
            }
            Ok(self.courses.clone())
        }

        fn fetch_groups(&self, course_id: i64) -> Result<Vec<AssignmentGroupDto>, SyncError> {
            if self.fail_groups_for == Some(course_id) {
                return Err(Self::decode_failure());
            }
            Ok(self
                .groups
                .iter()
                .filter(|(cid, _)| *cid == course_id)
                .map(|(_, g)| g.clone())
                .collect())
        }

        fn fetch_assignments(&self, course_id: i64) -> Result<Vec<AssignmentDto>, SyncError> {
            if self.fail_assignments_for == Some(course_id) {
                return Err(Self::decode_failure());
            }
            Ok(self
                .assignments
                .iter()
                .filter(|(cid, _)| *cid == course_id)
                .map(|(_, a)| a.clone())
                .collect())
        }
    }

    fn course_dto(id: i64, term: Option<(i64, &str)>) -> CourseDto {
        CourseDto {
            id,
            name: Some(format!("course {id}")),
            account_id: None,
            uuid: None,
            course_code: None,
            enrollment_term_id: term.map(|(tid, _)| tid),
            term: term.map(|(tid, name)| TermDto {
                id: tid,
                name: Some(name.to_string()),
                start_at: None,
                end_at: None,
            }),
        }
    }

    fn group_dto(id: i64, name: &str) -> AssignmentGroupDto {
        AssignmentGroupDto {
            id,
            name: Some(name.to_string()),
            weight: None,
        }
    }

    fn assignment_dto(id: i64, name: &str, group_id: Option<i64>) -> AssignmentDto {
        AssignmentDto {
            id,
            name: Some(name.to_string()),
            description: None,
            due_at: None,
            points_possible: None,
            uuid: None,
            assignment_group_id: group_id,
        }
    }

    fn fixture_remote() -> FakeRemote {
        FakeRemote {
            courses: vec![course_dto(10, Some((1, "Fall")))],
            groups: vec![(10, group_dto(100, "HW"))],
            assignments: vec![
                (10, assignment_dto(1000, "P1", Some(100))),
                (10, assignment_dto(1001, "P2", Some(999))),
            ],
            ..FakeRemote::default()
        }
    }

    #[test]
    fn full_pass_mirrors_the_hierarchy_and_drops_unmatched_assignments() {
        let conn = Connection::open_in_memory().unwrap();
        let client = SyncClient::new(&conn, fixture_remote()).unwrap();

        let report = client.sync_pass().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.terms_upserted, 1);
        assert_eq!(report.courses_upserted, 1);
        assert_eq!(report.groups_upserted, 1);
        assert_eq!(report.assignments_upserted, 1);
        assert_eq!(report.assignments_dropped, 1);

        let store = client.store();
        let term = store.get_term(1).unwrap().unwrap();
        assert_eq!(term.name.as_deref(), Some("Fall"));
        let course = store.get_course(10).unwrap().unwrap();
        assert_eq!(course.term_id, 1);
        let group = store.get_group(100).unwrap().unwrap();
        assert_eq!(group.course_id, 10);
        assert_eq!(group.name.as_deref(), Some("HW"));
        let assignment = store.get_assignment(1000).unwrap().unwrap();
        assert_eq!(assignment.group_id, 100);
        assert!(store.get_assignment(1001).unwrap().is_none());
    }

    #[test]
    fn resync_against_unchanged_remote_creates_no_duplicates() {
        let conn = Connection::open_in_memory().unwrap();
        let client = SyncClient::new(&conn, fixture_remote()).unwrap();

        client.sync_pass().unwrap();
        let before = client.store().counts().unwrap();
        client.sync_pass().unwrap();
        let after = client.store().counts().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn resync_updates_fields_in_place() {
        let conn = Connection::open_in_memory().unwrap();
        {
            let client = SyncClient::new(&conn, fixture_remote()).unwrap();
            client.sync_pass().unwrap();
        }

        let mut renamed = fixture_remote();
        renamed.courses = vec![course_dto(10, Some((1, "Fall 2024")))];
        let client = SyncClient::new(&conn, renamed).unwrap();
        client.sync_pass().unwrap();

        let term = client.store().get_term(1).unwrap().unwrap();
        assert_eq!(term.name.as_deref(), Some("Fall 2024"));
        assert_eq!(client.store().list_terms().unwrap().len(), 1);
    }

    #[test]
    fn course_without_term_is_dropped() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = FakeRemote {
            courses: vec![course_dto(10, Some((1, "Fall"))), course_dto(11, None)],
            ..FakeRemote::default()
        };
        let client = SyncClient::new(&conn, remote).unwrap();

        let report = client.sync_pass().unwrap();
        assert_eq!(report.courses_without_term, 1);
        assert_eq!(report.courses_upserted, 1);
        assert!(client.store().get_course(11).unwrap().is_none());
    }

    #[test]
    fn shared_term_across_courses_exists_exactly_once() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = FakeRemote {
            courses: vec![
                course_dto(10, Some((1, "Fall"))),
                course_dto(11, Some((1, "Fall"))),
            ],
            ..FakeRemote::default()
        };
        let client = SyncClient::new(&conn, remote).unwrap();

        let report = client.sync_pass().unwrap();
        assert_eq!(report.terms_upserted, 1);
        assert_eq!(client.store().list_terms().unwrap().len(), 1);
        assert_eq!(client.store().list_courses(1).unwrap().len(), 2);
    }

    #[test]
    fn one_branch_failure_does_not_abort_the_pass() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = FakeRemote {
            courses: vec![
                course_dto(10, Some((1, "Fall"))),
                course_dto(11, Some((1, "Fall"))),
            ],
            groups: vec![(10, group_dto(100, "HW")), (11, group_dto(110, "Labs"))],
            fail_groups_for: Some(10),
            ..FakeRemote::default()
        };
        let client = SyncClient::new(&conn, remote).unwrap();

        let report = client.sync_pass().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].scope,
            FailureScope::Groups { course_id: 10 }
        );
        // course 10 row still landed, its groups did not
        assert!(client.store().get_course(10).unwrap().is_some());
        assert!(client.store().get_group(100).unwrap().is_none());
        // course 11 synced in full
        assert!(client.store().get_group(110).unwrap().is_some());
    }

    #[test]
    fn failed_course_fetch_yields_an_empty_reported_pass() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = FakeRemote {
            fail_courses: true,
            ..FakeRemote::default()
        };
        let client = SyncClient::new(&conn, remote).unwrap();

        let report = client.sync_pass().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].scope, FailureScope::Courses);
        assert_eq!(report.courses_upserted, 0);
        assert!(client.store().last_synced_at().unwrap().is_none());
    }

    #[test]
    fn assignment_fetch_failure_keeps_groups() {
        let conn = Connection::open_in_memory().unwrap();
        let remote = FakeRemote {
            courses: vec![course_dto(10, Some((1, "Fall")))],
            groups: vec![(10, group_dto(100, "HW"))],
            fail_assignments_for: Some(10),
            ..FakeRemote::default()
        };
        let client = SyncClient::new(&conn, remote).unwrap();

        let report = client.sync_pass().unwrap();
        assert_eq!(report.groups_upserted, 1);
        assert_eq!(
            report.failures[0].scope,
            FailureScope::Assignments { course_id: 10 }
        );
    }

    #[test]
    fn in_flight_pass_refuses_reentry() {
        let conn = Connection::open_in_memory().unwrap();
        let client = SyncClient::new(&conn, fixture_remote()).unwrap();

        client.in_flight.set(true);
        let err = client.sync_pass().unwrap_err();
        assert!(matches!(err, SyncError::State(_)));

        client.in_flight.set(false);
        assert!(client.sync_pass().is_ok());
    }

    #[test]
    fn clean_pass_stamps_the_checkpoint() {
        let conn = Connection::open_in_memory().unwrap();
        let client = SyncClient::new(&conn, fixture_remote()).unwrap();
        client.sync_pass().unwrap();
        assert!(client.store().last_synced_at().unwrap().is_some());
    }
}
