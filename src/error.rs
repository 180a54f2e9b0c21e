//! 错误类型
//!
//! 按失败范围分两类：
//! - 致命错误（上传失败、任务创建失败、任务终态失败、轮询超时）
//!   中止整个运行，携带任务 ID 和终态上下文抛给调用方；
//! - 条目级错误（单行载荷异常、单条请求异常）从不越过提取器/任务
//!   边界，在最小范围内降级为哨兵值。
//!
//! 限流不是硬错误：退避重试，预算耗尽后才降级为条目级哨兵。

use thiserror::Error;

use crate::models::JobStatus;

/// 派发层错误类型
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 批次文件上传失败（致命，整个运行中止）
    #[error("批次文件上传失败: {source}")]
    UploadFailed {
        #[source]
        source: reqwest::Error,
    },

    /// 创建远程任务失败（致命）
    #[error("创建批处理任务失败: {source}")]
    JobCreateFailed {
        #[source]
        source: reqwest::Error,
    },

    /// 远程任务以失败终态结束（FAILED / TIMEOUT_EXCEEDED / CANCELLED）
    #[error("批处理任务失败 (任务: {job_id}, 状态: {status})")]
    JobFailed { job_id: String, status: JobStatus },

    /// 本地轮询等待超限，与远程任务自身的 TIMEOUT_EXCEEDED 终态不同
    #[error("轮询超时 (任务: {job_id}, 已等待 {waited_secs} 秒)")]
    PollTimeout { job_id: String, waited_secs: u64 },

    /// 任务成功但缺少输出文件引用
    #[error("批处理任务缺少输出文件 (任务: {job_id})")]
    JobOutputMissing { job_id: String },

    /// 单条请求重试预算耗尽，在汇总边界转换为哨兵记录
    #[error("重试次数耗尽 (共 {attempts} 次)")]
    RetryExhausted { attempts: u32 },

    /// 网络请求失败
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON 解析失败
    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),

    /// 文件操作失败
    #[error("文件操作失败: {0}")]
    Io(#[from] std::io::Error),

    /// 并发信号量已关闭
    #[error("并发信号量已关闭: {0}")]
    SemaphoreClosed(#[from] tokio::sync::AcquireError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置项取值非法
    #[error("配置项 {field} 非法: {reason}")]
    InvalidValue { field: String, reason: String },

    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// model 必须通过 model_name 指定，不允许出现在 chat_params 里
    #[error("chat_params 不允许包含 model，请使用 model_name 配置项")]
    ModelInChatParams,
}

/// 派发层结果类型
pub type DispatchResult<T> = Result<T, DispatchError>;
