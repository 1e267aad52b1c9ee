use serde::Deserialize;

/// Wire records as the Canvas REST API returns them.
///
/// Every field besides `id` is optional: a missing or null key decodes
/// as `None`, never as a decode failure. Unknown keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TermDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub enrollment_term_id: Option<i64>,
    /// Embedded term, present when the course list is fetched with
    /// `include[]=term`. Courses without one are dropped by the sync pass.
    #[serde(default)]
    pub term: Option<TermDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentGroupDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    // the API spells this group_weight
    #[serde(default, alias = "group_weight")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentDto {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub assignment_group_id: Option<i64>,
}

/// Declared by the API under an assignment but not mirrored locally.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionDto {
    pub id: i64,
    #[serde(default)]
    pub entered_grade: Option<String>,
    #[serde(default)]
    pub entered_score: Option<f64>,
    #[serde(default)]
    pub graded_at: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}
