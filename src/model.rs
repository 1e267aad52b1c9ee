use serde::Serialize;

use crate::dto::{AssignmentDto, AssignmentGroupDto, CourseDto, TermDto};

/// Local rows as the store returns them. Serialized as JSON across the
/// FFI boundary for the host's list screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Term {
    pub id: i64,
    pub name: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

impl Term {
    pub fn from_dto(dto: &TermDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name.clone(),
            start_at: dto.start_at.clone(),
            end_at: dto.end_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: i64,
    pub name: Option<String>,
    pub account_id: Option<i64>,
    pub uuid: Option<String>,
    pub course_code: Option<String>,
    pub enrollment_term_id: Option<i64>,
    pub term_id: i64,
}

impl Course {
    pub fn from_dto(dto: &CourseDto, term_id: i64) -> Self {
        Self {
            id: dto.id,
            name: dto.name.clone(),
            account_id: dto.account_id,
            uuid: dto.uuid.clone(),
            course_code: dto.course_code.clone(),
            enrollment_term_id: dto.enrollment_term_id,
            term_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentGroup {
    pub id: i64,
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub course_id: i64,
}

impl AssignmentGroup {
    pub fn from_dto(dto: &AssignmentGroupDto, course_id: i64) -> Self {
        Self {
            id: dto.id,
            name: dto.name.clone(),
            weight: dto.weight,
            course_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<String>,
    pub points_possible: Option<f64>,
    pub uuid: Option<String>,
    pub group_id: i64,
}

impl Assignment {
    pub fn from_dto(dto: &AssignmentDto, group_id: i64) -> Self {
        Self {
            id: dto.id,
            name: dto.name.clone(),
            description: dto.description.clone(),
            due_at: dto.due_at.clone(),
            points_possible: dto.points_possible,
            uuid: dto.uuid.clone(),
            group_id,
        }
    }
}

/// Row counts across the four collections, shown in the host's stats header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub terms: i64,
    pub courses: i64,
    pub groups: i64,
    pub assignments: i64,
}
