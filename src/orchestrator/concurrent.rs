//! 并发派发器 - 编排层
//!
//! ## 职责
//!
//! 每条提示词一个逻辑任务，在单个事件循环上交错执行：
//!
//! 1. **并发控制**：使用 Semaphore 限制同时在途的请求数量
//! 2. **独立重试**：每条请求用共享的重试策略独立退避重试
//! 3. **失败隔离**：单条请求的永久失败只影响自己，绝不取消兄弟任务
//!
//! 完成顺序不作任何保证，输入顺序由最终的结果汇总步骤恢复。
//! 哨兵值转换只发生在任务汇合点（汇总边界），叶子函数一律返回
//! `Result`。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::clients::{ApiErrorKind, ChatClient};
use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{PromptRecord, ResultRecord, FIELD_SENTINEL};
use crate::services::{extractor, Backoff, RetryPolicy};

/// 并发派发器
pub struct ConcurrentDispatcher {
    client: ChatClient,
    policy: RetryPolicy,
    transport_retry: Duration,
    max_concurrent: usize,
}

impl ConcurrentDispatcher {
    /// 创建新的并发派发器
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        let backoff = Backoff::new(
            Duration::from_secs(config.retry_base_secs),
            Duration::from_secs(config.retry_cap_secs),
        );
        Self {
            client: ChatClient::new(http, config),
            policy: RetryPolicy::new(config.max_retries, backoff),
            transport_retry: Duration::from_millis(config.transport_retry_ms),
            max_concurrent: config.max_concurrent_requests,
        }
    }

    /// 并发派发全部提示词
    ///
    /// # 参数
    /// - `records`: 已编号的提示词记录
    ///
    /// # 返回
    /// 返回 id → 结果记录 的映射，所有任务完成（或重试耗尽）后
    /// 才汇合；重试耗尽的记录在汇合点转换为哨兵记录
    pub async fn dispatch(
        &self,
        records: &[PromptRecord],
    ) -> DispatchResult<HashMap<usize, ResultRecord>> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(records.len());

        for record in records {
            let permit = semaphore.clone().acquire_owned().await?;
            let client = self.client.clone();
            let policy = self.policy;
            let transport_retry = self.transport_retry;
            let id = record.id;
            let text = record.text.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                call_with_retry(&client, &text, policy, transport_retry).await
            });
            handles.push((id, handle));
        }

        // 汇合点：哨兵值转换只发生在这里，单条失败不波及其他任务
        let mut results = HashMap::with_capacity(handles.len());
        for (id, handle) in handles {
            let record = match handle.await {
                Ok(Ok(content)) => ResultRecord::ok(id, content),
                Ok(Err(e)) => {
                    warn!("[请求 {}] ⚠️ 降级为哨兵值: {}", id, e);
                    ResultRecord::sentinel_with_error(id, e.to_string())
                }
                Err(e) => {
                    error!("[请求 {}] 任务执行失败: {}", id, e);
                    ResultRecord::sentinel_with_error(id, e.to_string())
                }
            };
            results.insert(id, record);
        }

        Ok(results)
    }
}

/// 发送单条提示词，失败时按策略重试
///
/// - 限流错误：按退避调度器等待后重试
/// - 传输层错误：固定短暂等待后重试，计入同一重试预算
/// - 其他 API 错误：服务端有应答但载荷不可用，降级为字段级哨兵
/// - 预算耗尽：返回 Err，由汇合点转换为记录级哨兵
async fn call_with_retry(
    client: &ChatClient,
    prompt: &str,
    policy: RetryPolicy,
    transport_retry: Duration,
) -> DispatchResult<String> {
    for attempt in 0..=policy.max_attempts {
        let body = match client.send_prompt(prompt).await {
            Ok(body) => body,
            Err(e) => {
                warn!("请求失败: {} (第 {} 次尝试)", e, attempt + 1);
                tokio::time::sleep(transport_retry).await;
                continue;
            }
        };

        match ChatClient::classify_error(&body) {
            Some(ApiErrorKind::RateLimited { message }) => {
                let delay = policy.backoff.next_delay(attempt);
                warn!("请求被限流: {} ({:?} 后重试)", message, delay);
                tokio::time::sleep(delay).await;
            }
            Some(ApiErrorKind::Other { message }) => {
                warn!("API 返回错误: {}", message);
                return Ok(FIELD_SENTINEL.to_string());
            }
            None => {
                return Ok(extractor::extract_message_content(&body).unwrap_or_else(|| {
                    warn!("无法从响应提取内容: {}", body);
                    FIELD_SENTINEL.to_string()
                }));
            }
        }
    }

    Err(DispatchError::RetryExhausted {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_dispatch_empty_records() {
        let config = Config {
            api_key: "test-key".to_string(),
            ..Default::default()
        };
        let dispatcher = ConcurrentDispatcher::new(reqwest::Client::new(), &config);

        let results = dispatcher.dispatch(&[]).await.unwrap();
        assert!(results.is_empty());
    }
}
