//! 远程批处理任务模型
//!
//! 任务状态完全由远程服务驱动，本地只能通过轮询观察。
//! 一个任务只存活于单个批次的处理期间，提取结果后即丢弃。

use std::fmt;

use serde::Deserialize;

/// 远程任务状态
///
/// 终态为 `Success` / `Failed` / `TimeoutExceeded` / `Cancelled`，
/// 其余状态（包括未识别的 `Other`）继续轮询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    TimeoutExceeded,
    Cancelled,
    /// 服务端返回的未识别状态，按非终态处理
    Other(String),
}

impl JobStatus {
    /// 从线上状态字符串解析
    pub fn parse(status: &str) -> Self {
        match status {
            "QUEUED" => JobStatus::Queued,
            "RUNNING" => JobStatus::Running,
            "SUCCESS" => JobStatus::Success,
            "FAILED" => JobStatus::Failed,
            "TIMEOUT_EXCEEDED" => JobStatus::TimeoutExceeded,
            "CANCELLED" => JobStatus::Cancelled,
            other => JobStatus::Other(other.to_string()),
        }
    }

    /// 是否为终态（远程任务不会再迁移）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success
                | JobStatus::Failed
                | JobStatus::TimeoutExceeded
                | JobStatus::Cancelled
        )
    }

    /// 是否为失败终态
    ///
    /// CANCELLED 与 FAILED 对调用方不作区分，统一归入"任务失败"
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::TimeoutExceeded | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::TimeoutExceeded => write!(f, "TIMEOUT_EXCEEDED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// 远程批处理任务
#[derive(Debug, Clone)]
pub struct RemoteJob {
    /// 任务 ID
    pub job_id: String,
    /// 当前状态
    pub status: JobStatus,
    /// 任务成功后的输出文件引用
    pub output_file: Option<String>,
}

// ========== 线上响应 DTO ==========

/// 文件上传响应
#[derive(Debug, Deserialize)]
pub struct FileUploadResponse {
    pub id: String,
}

/// 任务创建响应
#[derive(Debug, Deserialize)]
pub struct JobCreateResponse {
    pub id: String,
}

/// 任务轮询响应
#[derive(Debug, Deserialize)]
pub struct JobPollResponse {
    pub status: String,
    #[serde(default)]
    pub output_file: Option<String>,
}
