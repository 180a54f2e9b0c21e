//! 批处理提交流水线 - 编排层
//!
//! ## 职责
//!
//! 驱动单个批次的完整状态机：
//!
//! ```text
//! BUILD → UPLOAD → CREATE_JOB → POLL → DOWNLOAD → EXTRACT → CLEANUP
//! ```
//!
//! 批次之间严格顺序处理：上一批的 CLEANUP 完成前，下一批不会开始。
//! 用吞吐量换简单的失败模型（一个卡住的任务会阻塞整个运行，
//! 这是已记录的限制，不做隐藏）。
//!
//! 失败语义：
//! - 上传/创建任务失败、任务失败终态、轮询超时 → 整个运行中止，
//!   已完成批次的结果保留，当前批次不会写入任何部分结果
//! - 单行载荷异常 → 降级为哨兵值，只影响该行

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::clients::BatchClient;
use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{JobStatus, PromptRecord, RemoteJob, ResultRecord};
use crate::services::{extractor, plan_chunks, Backoff};

/// 批处理提交流水线
pub struct BatchPipeline {
    client: BatchClient,
    config: Config,
    poll_backoff: Backoff,
}

impl BatchPipeline {
    /// 创建新的批处理流水线
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            client: BatchClient::new(http, config),
            poll_backoff: Backoff::new(
                Duration::from_secs(config.poll_base_secs),
                Duration::from_secs(config.poll_cap_secs),
            ),
            config: config.clone(),
        }
    }

    /// 顺序处理全部批次
    ///
    /// # 参数
    /// - `records`: 已编号的提示词记录
    ///
    /// # 返回
    /// 返回 id → 结果记录 的映射；任何致命错误立即中止，
    /// 映射中只保留出错批次之前的结果
    pub async fn run(
        &self,
        records: &[PromptRecord],
    ) -> DispatchResult<HashMap<usize, ResultRecord>> {
        let mut results = HashMap::new();
        let chunks = plan_chunks(records, self.config.batch_size);
        let total_chunks = chunks.len();

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            log_chunk_start(chunk_index + 1, total_chunks, chunk);

            self.process_chunk(chunk_index, chunk, &mut results).await?;

            log_chunk_complete(chunk_index + 1, chunk.len());
        }

        Ok(results)
    }

    /// 处理单个批次，按状态机推进
    async fn process_chunk(
        &self,
        chunk_index: usize,
        chunk: &[PromptRecord],
        results: &mut HashMap<usize, ResultRecord>,
    ) -> DispatchResult<()> {
        // BUILD：序列化为 JSONL，一条记录一行，一个批次一个文件
        let path = self.jsonl_path(chunk_index);
        write_jsonl(&path, chunk, &self.config.endpoint, &self.config.chat_params).await?;

        // UPLOAD：失败对整个运行致命
        let file_id = self.client.upload_jsonl(&path).await?;

        // CREATE_JOB
        let job_id = self
            .client
            .create_job(
                &file_id,
                &self.config.model_name,
                &self.config.endpoint,
                self.config.timeout_hours,
            )
            .await?;
        info!("📤 批次 {} 已提交，任务: {}", chunk_index + 1, job_id);

        // POLL：到终态或超时为止
        let output_file = self.poll_job(&job_id).await?;

        // DOWNLOAD + EXTRACT
        let lines = self.client.download_output_lines(&output_file).await?;
        for item in &lines {
            if let Some((id, record)) = line_to_record(item) {
                results.insert(id, record);
            }
        }

        // CLEANUP：尽力而为，失败只记日志
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("⚠️ 临时文件清理失败 ({}): {}", path.display(), e);
        }

        Ok(())
    }

    /// 轮询任务直到终态，返回输出文件引用
    ///
    /// 等待总时长受 `min(poll_max_wait_secs, timeout_hours * 3600)`
    /// 约束，超限返回"轮询超时"，与远程任务自身的超时终态不同。
    /// 单步等待间隔由共享的退避调度器计算。
    async fn poll_job(&self, job_id: &str) -> DispatchResult<String> {
        let max_wait = self.config.effective_poll_wait_secs();
        let deadline = Instant::now() + Duration::from_secs(max_wait);
        let mut attempt: u32 = 0;

        loop {
            if Instant::now() > deadline {
                return Err(DispatchError::PollTimeout {
                    job_id: job_id.to_string(),
                    waited_secs: max_wait,
                });
            }

            let job = self.client.fetch_job(job_id).await?;
            if let Some(output_file) = poll_outcome(&job)? {
                info!("✓ 任务完成: {}", job_id);
                return Ok(output_file);
            }

            let delay = self.poll_backoff.next_delay(attempt);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// 本批次的临时 JSONL 文件路径
    fn jsonl_path(&self, chunk_index: usize) -> PathBuf {
        let file_name = format!(
            "batch_{}_{:03}.jsonl",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            chunk_index
        );
        Path::new(&self.config.work_dir).join(file_name)
    }
}

/// 判定一次轮询结果
///
/// - `Ok(Some(file))`: 任务成功，拿到输出文件引用
/// - `Ok(None)`: 非终态，继续轮询
/// - `Err`: 失败终态或成功但缺输出文件
fn poll_outcome(job: &RemoteJob) -> DispatchResult<Option<String>> {
    if job.status == JobStatus::Success {
        return match &job.output_file {
            Some(file) => Ok(Some(file.clone())),
            None => Err(DispatchError::JobOutputMissing {
                job_id: job.job_id.clone(),
            }),
        };
    }
    if job.status.is_failure() {
        return Err(DispatchError::JobFailed {
            job_id: job.job_id.clone(),
            status: job.status.clone(),
        });
    }
    Ok(None)
}

/// 构建单条线上记录
///
/// `custom_id` 携带记录编号，`body` 由批次无关参数和
/// 单条用户消息合并而成。
fn build_line(record: &PromptRecord, endpoint: &str, chat_params: &Map<String, Value>) -> Value {
    let mut body = chat_params.clone();
    body.insert(
        "messages".to_string(),
        json!([{"role": "user", "content": record.text}]),
    );

    json!({
        "custom_id": record.custom_id(),
        "method": "POST",
        "url": endpoint,
        "body": Value::Object(body),
    })
}

/// 把整个批次写成 JSONL 文件
async fn write_jsonl(
    path: &Path,
    chunk: &[PromptRecord],
    endpoint: &str,
    chat_params: &Map<String, Value>,
) -> DispatchResult<()> {
    let mut out = String::new();
    for record in chunk {
        out.push_str(&serde_json::to_string(&build_line(record, endpoint, chat_params))?);
        out.push('\n');
    }
    tokio::fs::write(path, out).await?;
    Ok(())
}

/// 把一行输出转换为结果记录
///
/// 关联标识无法解析时跳过该行（记警告），不影响其他行
fn line_to_record(item: &Value) -> Option<(usize, ResultRecord)> {
    let id = match parse_custom_id(item) {
        Some(id) => id,
        None => {
            warn!("跳过关联标识无法解析的输出行: {}", item);
            return None;
        }
    };

    let content = extractor::extract_line(item);
    let error = item
        .get("error")
        .filter(|e| !e.is_null())
        .map(|e| e.to_string());

    Some((id, ResultRecord { id, content, error }))
}

/// 解析关联标识，兼容字符串和数字两种形状
fn parse_custom_id(item: &Value) -> Option<usize> {
    match item.get("custom_id")? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        _ => None,
    }
}

// ========== 日志辅助函数 ==========

fn log_chunk_start(chunk_num: usize, total_chunks: usize, chunk: &[PromptRecord]) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", chunk_num, total_chunks);
    if let (Some(first), Some(last)) = (chunk.first(), chunk.last()) {
        info!("📄 本批提示词: {}-{}", first.id, last.id);
    }
    info!("{}", "=".repeat(60));
}

fn log_chunk_complete(chunk_num: usize, size: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 共 {} 条", chunk_num, size);
    info!("{}", "─".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tag_prompts;
    use serde_json::json;

    #[test]
    fn test_build_line_shape() {
        let records = tag_prompts(&["你好".to_string()]);
        let mut chat_params = Map::new();
        chat_params.insert("temperature".to_string(), json!(0.2));

        let line = build_line(&records[0], "/v1/chat/completions", &chat_params);

        assert_eq!(line["custom_id"], "0");
        assert_eq!(line["method"], "POST");
        assert_eq!(line["url"], "/v1/chat/completions");
        assert_eq!(line["body"]["temperature"], 0.2);
        assert_eq!(line["body"]["messages"][0]["role"], "user");
        assert_eq!(line["body"]["messages"][0]["content"], "你好");
    }

    #[test]
    fn test_build_line_custom_id_is_string() {
        let prompts: Vec<String> = (0..12).map(|i| format!("提示词 {}", i)).collect();
        let records = tag_prompts(&prompts);
        let line = build_line(&records[11], "/v1/chat/completions", &Map::new());

        // 关联标识必须是字符串形式的整数
        assert_eq!(line["custom_id"], Value::String("11".to_string()));
    }

    #[test]
    fn test_poll_outcome_success_with_output() {
        let job = RemoteJob {
            job_id: "job-1".to_string(),
            status: JobStatus::Success,
            output_file: Some("file-out".to_string()),
        };
        assert_eq!(poll_outcome(&job).unwrap(), Some("file-out".to_string()));
    }

    #[test]
    fn test_poll_outcome_success_without_output_is_error() {
        let job = RemoteJob {
            job_id: "job-1".to_string(),
            status: JobStatus::Success,
            output_file: None,
        };
        assert!(matches!(
            poll_outcome(&job),
            Err(DispatchError::JobOutputMissing { .. })
        ));
    }

    #[test]
    fn test_poll_outcome_failed_terminal_aborts_before_download() {
        // FAILED 终态在 DOWNLOAD 之前就中止，错误携带任务 ID 和状态
        for status in [
            JobStatus::Failed,
            JobStatus::TimeoutExceeded,
            JobStatus::Cancelled,
        ] {
            let job = RemoteJob {
                job_id: "job-9".to_string(),
                status: status.clone(),
                output_file: None,
            };
            match poll_outcome(&job) {
                Err(DispatchError::JobFailed {
                    job_id,
                    status: got,
                }) => {
                    assert_eq!(job_id, "job-9");
                    assert_eq!(got, status);
                }
                other => panic!("预期 JobFailed，实际: {:?}", other),
            }
        }
    }

    #[test]
    fn test_poll_outcome_pending_continues() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Other("VALIDATING".to_string()),
        ] {
            let job = RemoteJob {
                job_id: "job-2".to_string(),
                status,
                output_file: None,
            };
            assert_eq!(poll_outcome(&job).unwrap(), None);
        }
    }

    #[test]
    fn test_line_to_record_success_and_error_lines() {
        let ok_line = json!({
            "custom_id": "3",
            "response": {"choices": [{"message": {"content": "答案"}}]}
        });
        let (id, record) = line_to_record(&ok_line).unwrap();
        assert_eq!(id, 3);
        assert_eq!(record.content, "答案");
        assert!(record.error.is_none());

        let err_line = json!({
            "custom_id": "4",
            "error": {"message": "boom"}
        });
        let (id, record) = line_to_record(&err_line).unwrap();
        assert_eq!(id, 4);
        assert_eq!(record.content, crate::models::FIELD_SENTINEL);
        assert!(record.error.is_some());
    }

    #[test]
    fn test_line_with_bad_custom_id_skipped() {
        let line = json!({
            "custom_id": "abc",
            "response": {"choices": [{"message": {"content": "答案"}}]}
        });
        assert!(line_to_record(&line).is_none());

        let line = json!({"response": {}});
        assert!(line_to_record(&line).is_none());
    }

    #[test]
    fn test_numeric_custom_id_accepted() {
        let line = json!({
            "custom_id": 7,
            "response": {"choices": [{"message": {"content": "答案"}}]}
        });
        let (id, _) = line_to_record(&line).unwrap();
        assert_eq!(id, 7);
    }

    #[test]
    fn test_write_jsonl_one_line_per_record() {
        let prompts = vec!["甲".to_string(), "乙".to_string()];
        let records = tag_prompts(&prompts);
        let path = std::env::temp_dir().join("llm_batch_submit_test_chunk.jsonl");

        tokio_test::block_on(async {
            write_jsonl(&path, &records, "/v1/chat/completions", &Map::new())
                .await
                .unwrap();
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        for (i, line) in lines.iter().enumerate() {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["custom_id"], i.to_string());
        }

        std::fs::remove_file(&path).unwrap();
    }
}
