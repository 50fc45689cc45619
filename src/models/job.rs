use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 后台任务 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        super::deserialize_opaque_id(deserializer).map(JobId)
    }
}

/// 提交成功后拿到的任务句柄，只在轮询期间存活
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub file_name: String,
}

/// 任务状态。未知字符串保留为 `Other`，按"处理中"对待
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Queued,
    Processing,
    Finished,
    Failed,
    Other(String),
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "finished" => JobStatus::Finished,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other(raw),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// 忙碌提示文案
    pub fn busy_label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            _ => "Processing",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => f.write_str("queued"),
            JobStatus::Processing => f.write_str("processing"),
            JobStatus::Finished => f.write_str("finished"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::Other(s) => f.write_str(s),
        }
    }
}

/// 任务完成后的处理统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStats {
    #[serde(rename = "pdf_found")]
    pub found: u64,
    pub processed: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub skipped: u64,
}

/// GET /upload/status/{job_id} 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub stats: Option<JobStats>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// POST /upload 响应体
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
