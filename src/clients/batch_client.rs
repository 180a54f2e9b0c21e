//! 批处理 API 客户端
//!
//! 封装批处理路径的四个远程操作：上传批次文件、创建任务、
//! 查询任务状态、流式下载输出。每个调用都带 Bearer 头。

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::multipart;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};
use crate::models::job::{FileUploadResponse, JobCreateResponse, JobPollResponse};
use crate::models::{JobStatus, RemoteJob};

/// 批处理 API 客户端
#[derive(Clone)]
pub struct BatchClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl BatchClient {
    /// 创建新的批处理客户端
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.clone(),
        }
    }

    /// 上传 JSONL 批次文件，返回文件引用
    ///
    /// 此处失败对整个运行是致命的：批次文件传不上去，
    /// 后续任务创建无从谈起，以独立的错误类别中止。
    pub async fn upload_jsonl(&self, path: &Path) -> DispatchResult<String> {
        debug!("上传批次文件: {}", path.display());

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "batch.jsonl".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/jsonl")
            .map_err(|e| DispatchError::UploadFailed { source: e })?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("purpose", "batch");

        let response: FileUploadResponse = self
            .http
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DispatchError::UploadFailed { source: e })?
            .error_for_status()
            .map_err(|e| DispatchError::UploadFailed { source: e })?
            .json()
            .await
            .map_err(|e| DispatchError::UploadFailed { source: e })?;

        debug!("✓ 文件上传成功: {}", response.id);
        Ok(response.id)
    }

    /// 创建批处理任务，返回任务 ID
    pub async fn create_job(
        &self,
        file_id: &str,
        model: &str,
        endpoint: &str,
        timeout_hours: u64,
    ) -> DispatchResult<String> {
        let payload = serde_json::json!({
            "input_files": [file_id],
            "model": model,
            "endpoint": endpoint,
            "timeout_hours": timeout_hours,
        });

        let response: JobCreateResponse = self
            .http
            .post(format!("{}/v1/batch/jobs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::JobCreateFailed { source: e })?
            .error_for_status()
            .map_err(|e| DispatchError::JobCreateFailed { source: e })?
            .json()
            .await
            .map_err(|e| DispatchError::JobCreateFailed { source: e })?;

        debug!("✓ 任务创建成功: {}", response.id);
        Ok(response.id)
    }

    /// 查询任务当前状态
    pub async fn fetch_job(&self, job_id: &str) -> DispatchResult<RemoteJob> {
        let response: JobPollResponse = self
            .http
            .get(format!("{}/v1/batch/jobs/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(RemoteJob {
            job_id: job_id.to_string(),
            status: JobStatus::parse(&response.status),
            output_file: response.output_file,
        })
    }

    /// 流式下载任务输出，逐行解析为 JSON 记录
    ///
    /// 单行解析失败只影响该行：记一条警告后跳过，
    /// 不中断整个下载。
    pub async fn download_output_lines(&self, file_id: &str) -> DispatchResult<Vec<Value>> {
        debug!("下载输出文件: {}", file_id);

        let response = self
            .http
            .get(format!("{}/v1/files/{}/content", self.base_url, file_id))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(120))
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut items = Vec::new();

        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                push_parsed_line(&line[..line.len() - 1], &mut items);
            }
        }
        // 末尾可能有不带换行符的最后一行
        push_parsed_line(&buffer, &mut items);

        debug!("✓ 下载完成，共 {} 行", items.len());
        Ok(items)
    }
}

/// 解析一行输出，空行跳过，坏行警告后跳过
fn push_parsed_line(line: &[u8], items: &mut Vec<Value>) {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return;
    }
    match serde_json::from_slice::<Value>(line) {
        Ok(value) => items.push(value),
        Err(e) => warn!("跳过无法解析的输出行: {} ({})", String::from_utf8_lossy(line), e),
    }
}
