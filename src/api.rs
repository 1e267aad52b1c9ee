use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::dto::{AssignmentDto, AssignmentGroupDto, CourseDto};
use crate::error::SyncError;

// Single fixed page per collection; the upstream API caps these anyway.
const COURSES_PER_PAGE: u32 = 50;
const GROUPS_PER_PAGE: u32 = 20;
const ASSIGNMENTS_PER_PAGE: u32 = 100;

/// Fetch contract the sync pass runs against.
/// This keeps the orchestrator transport-agnostic; tests drive it from
/// in-memory fixtures instead of HTTP.
pub trait RemoteSource {
    fn fetch_courses(&self) -> Result<Vec<CourseDto>, SyncError>;
    fn fetch_groups(&self, course_id: i64) -> Result<Vec<AssignmentGroupDto>, SyncError>;
    fn fetch_assignments(&self, course_id: i64) -> Result<Vec<AssignmentDto>, SyncError>;
}

/// Authenticated client for the three Canvas endpoints the engine mirrors.
pub struct CanvasApi {
    http: Client,
    base_url: Url,
    token: String,
}

impl CanvasApi {
    /// Build a client from injected settings. The same host serves all
    /// three endpoints.
    pub fn new(config: &Config) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SyncError::Transport(format!("invalid base url {:?}: {e}", config.base_url))
        })?;
        Ok(Self {
            http: Client::new(),
            base_url,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, SyncError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| SyncError::Transport(format!("invalid endpoint {path:?}: {e}")))?;
        for (k, v) in query {
            url.query_pairs_mut().append_pair(k, v);
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SyncError> {
        let url = self.endpoint(path, query)?;
        let body = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl RemoteSource for CanvasApi {
    fn fetch_courses(&self) -> Result<Vec<CourseDto>, SyncError> {
        self.get_json(
            "api/v1/courses",
            &[
                ("include[]", "term".to_string()),
                ("per_page", COURSES_PER_PAGE.to_string()),
            ],
        )
    }

    fn fetch_groups(&self, course_id: i64) -> Result<Vec<AssignmentGroupDto>, SyncError> {
        self.get_json(
            &format!("api/v1/courses/{course_id}/assignment_groups"),
            &[("per_page", GROUPS_PER_PAGE.to_string())],
        )
    }

    fn fetch_assignments(&self, course_id: i64) -> Result<Vec<AssignmentDto>, SyncError> {
        self.get_json(
            &format!("api/v1/courses/{course_id}/assignments"),
            &[("per_page", ASSIGNMENTS_PER_PAGE.to_string())],
        )
    }
}
