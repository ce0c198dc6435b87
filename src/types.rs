use serde::{Deserialize, Serialize};

/// Lifecycle state of a generation job as reported by the server.
///
/// Anything other than `Completed` or `Failed` counts as in progress.
/// Status strings this client does not know about deserialize to `Other`
/// and are treated as in progress as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Starting,
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

impl JobStatus {
    /// Whether this status ends the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the job is still being worked on.
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }
}

/// One poll's view of a job, as returned by `GET /status/{imageId}`.
///
/// `last_modified_date` is an opaque token that only moves forward; two
/// snapshots carrying the same token describe the same server-side state.
/// `error` is only meaningful when `status` is [`JobStatus::Failed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(default)]
    pub image_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub last_modified_date: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Receipt for a submitted generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTicket {
    pub image_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One hit from a `POST /search-loras` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoraSearchResult {
    pub id: String,
    pub name: String,
}

/// Value handed to the progress callback on each observed state transition.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub image_id: String,
}
