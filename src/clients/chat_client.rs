//! 聊天补全客户端
//!
//! 封装并发路径的单条补全调用。凭证以 Bearer 头透传，
//! 本模块不生成也不校验密钥。

use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::DispatchResult;

/// API 错误载荷的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 限流错误，可退避重试
    RateLimited { message: String },
    /// 其他 API 错误，不重试
    Other { message: String },
}

/// 聊天补全客户端
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    completions_url: String,
    model_name: String,
}

impl ChatClient {
    /// 创建新的聊天补全客户端
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            completions_url: format!("{}{}", config.api_base_url, config.endpoint),
            model_name: config.model_name.clone(),
        }
    }

    /// 发送单条提示词，返回原始响应体
    ///
    /// 错误响应（包括限流）同样带 JSON body，状态码不在此处检查，
    /// 由调用方按载荷内容分类处理。只有网络/解码失败才返回 Err。
    pub async fn send_prompt(&self, prompt: &str) -> DispatchResult<Value> {
        debug!("调用补全 API，模型: {}", self.model_name);

        let payload = json!({
            "model": self.model_name,
            "messages": [{"role": "user", "content": prompt}],
        });

        let body: Value = self
            .http
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        Ok(body)
    }

    /// 检查响应体是否带错误标记，并区分限流与其他错误
    ///
    /// 兼容两种错误形状：
    /// - 顶层 `{ "object": "error", "message": ... }`
    /// - 嵌套 `{ "error": { "code": ..., "message": ... } }`
    pub fn classify_error(body: &Value) -> Option<ApiErrorKind> {
        if body.get("object").and_then(|v| v.as_str()) == Some("error") {
            let message = body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("未知错误")
                .to_string();
            if message.contains("Rate limit") {
                return Some(ApiErrorKind::RateLimited { message });
            }
            return Some(ApiErrorKind::Other { message });
        }

        if let Some(error) = body.get("error") {
            if !error.is_null() {
                let code = error.get("code").and_then(|v| v.as_str()).unwrap_or("");
                let message = error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("未知错误")
                    .to_string();
                if code == "rate_limit_exceeded" {
                    return Some(ApiErrorKind::RateLimited { message });
                }
                return Some(ApiErrorKind::Other { message });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_top_level_rate_limit() {
        let body = json!({
            "object": "error",
            "message": "Rate limit exceeded"
        });
        assert_eq!(
            ChatClient::classify_error(&body),
            Some(ApiErrorKind::RateLimited {
                message: "Rate limit exceeded".to_string()
            })
        );
    }

    #[test]
    fn test_classify_nested_rate_limit_code() {
        let body = json!({
            "error": {"code": "rate_limit_exceeded", "message": "Too many requests"}
        });
        assert!(matches!(
            ChatClient::classify_error(&body),
            Some(ApiErrorKind::RateLimited { .. })
        ));
    }

    #[test]
    fn test_classify_other_api_error() {
        let body = json!({
            "object": "error",
            "message": "Invalid model"
        });
        assert_eq!(
            ChatClient::classify_error(&body),
            Some(ApiErrorKind::Other {
                message: "Invalid model".to_string()
            })
        );
    }

    #[test]
    fn test_success_body_is_not_an_error() {
        let body = json!({
            "choices": [{"message": {"content": "答案"}}]
        });
        assert_eq!(ChatClient::classify_error(&body), None);
    }

    #[test]
    fn test_null_error_field_is_not_an_error() {
        let body = json!({
            "error": null,
            "choices": [{"message": {"content": "答案"}}]
        });
        assert_eq!(ChatClient::classify_error(&body), None);
    }
}
