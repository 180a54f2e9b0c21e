//! 响应提取 - 业务能力层
//!
//! 只负责"把一条响应载荷拍平成文本"能力，不关心流程
//!
//! 服务端的内容字段形状不固定：可能是单个字符串，也可能是
//! 多片段列表，批处理输出还会多包一层 `body`。这里统一建模为
//! 带标签的 `Content` 变体，由单一归一化函数处理，
//! 任何异常形状都降级为哨兵值，绝不把错误抛出本模块边界。

use serde_json::Value;
use tracing::warn;

use crate::models::FIELD_SENTINEL;

/// 响应内容的归一化表示
#[derive(Debug, Clone)]
pub enum Content {
    /// 单个字符串
    PlainText(String),
    /// 多片段列表，只保留携带文本的片段
    Fragments(Vec<String>),
    /// 无法识别的形状，保留原始载荷供诊断
    Unknown(Value),
}

impl Content {
    /// 对内容字段分类
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Content::PlainText(s.clone()),
            Value::Array(items) => {
                let texts: Vec<String> = items.iter().filter_map(fragment_text).collect();
                if texts.is_empty() {
                    Content::Unknown(value.clone())
                } else {
                    Content::Fragments(texts)
                }
            }
            other => Content::Unknown(other.clone()),
        }
    }

    /// 拍平成文本，无法识别的形状返回 None
    pub fn into_text(self) -> Option<String> {
        match self {
            Content::PlainText(s) => Some(s),
            Content::Fragments(texts) => Some(texts.concat()),
            Content::Unknown(_) => None,
        }
    }
}

/// 取出单个片段携带的文本
///
/// 片段可能是裸字符串，也可能是带 `text` 字段的对象，
/// 其他形状（图片、音频等）跳过
fn fragment_text(frag: &Value) -> Option<String> {
    match frag {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => frag
            .get("text")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string()),
        _ => None,
    }
}

/// 从聊天补全响应体中提取首个 choice 的消息内容
///
/// 兼容批处理输出中嵌套 `body` 一层的形状。
/// 内容缺失或形状不符时返回 None，由调用方决定降级方式。
pub fn extract_message_content(body: &Value) -> Option<String> {
    // 批处理输出会把补全响应包在 body 字段里
    let container = body.get("body").unwrap_or(body);

    let content = container
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;

    if content.is_null() {
        return None;
    }

    Content::from_value(content).into_text()
}

/// 提取一条批处理输出行的内容
///
/// # 参数
/// - `item`: 下载的单行 JSON 记录，形如 `{ custom_id, response|error }`
///
/// # 返回
/// 返回拍平后的文本；带错误标记或形状异常时返回字段级哨兵值。
/// 本函数不会 panic，也不会返回 Err。
pub fn extract_line(item: &Value) -> String {
    if let Some(error) = item.get("error") {
        if !error.is_null() {
            warn!("输出行带错误标记: {}", error);
            return FIELD_SENTINEL.to_string();
        }
    }

    match item.get("response").and_then(extract_message_content) {
        Some(content) => content,
        None => {
            warn!("无法从输出行提取内容: {}", item);
            FIELD_SENTINEL.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_content() {
        let item = json!({
            "custom_id": "0",
            "response": {
                "choices": [{"message": {"content": "12 RUE DE LA PAIX"}}]
            }
        });
        assert_eq!(extract_line(&item), "12 RUE DE LA PAIX");
    }

    #[test]
    fn test_plain_string_fragments_concatenated() {
        let item = json!({
            "custom_id": "10",
            "response": {
                "choices": [{"message": {"content": ["Foo", "Bar"]}}]
            }
        });
        assert_eq!(extract_line(&item), "FooBar");
    }

    #[test]
    fn test_fragment_list_concatenated_in_order() {
        let item = json!({
            "custom_id": "1",
            "response": {
                "choices": [{"message": {"content": [
                    {"type": "text", "text": "Foo"},
                    {"type": "text", "text": "Bar"}
                ]}}]
            }
        });
        assert_eq!(extract_line(&item), "FooBar");
    }

    #[test]
    fn test_fragments_skip_non_text_parts() {
        let item = json!({
            "custom_id": "2",
            "response": {
                "choices": [{"message": {"content": [
                    {"type": "text", "text": "前"},
                    {"type": "image_url", "image_url": {"url": "http://example.com/a.png"}},
                    {"type": "text", "text": "后"}
                ]}}]
            }
        });
        assert_eq!(extract_line(&item), "前后");
    }

    #[test]
    fn test_nested_body_wrapper() {
        let item = json!({
            "custom_id": "3",
            "response": {
                "body": {
                    "choices": [{"message": {"content": "嵌套内容"}}]
                }
            }
        });
        assert_eq!(extract_line(&item), "嵌套内容");
    }

    #[test]
    fn test_error_marker_yields_field_sentinel() {
        let item = json!({
            "custom_id": "4",
            "error": {"message": "invalid request"}
        });
        assert_eq!(extract_line(&item), FIELD_SENTINEL);
    }

    #[test]
    fn test_missing_choices_yields_sentinel_without_panic() {
        let item = json!({
            "custom_id": "5",
            "response": {"id": "resp-abc"}
        });
        assert_eq!(extract_line(&item), FIELD_SENTINEL);
    }

    #[test]
    fn test_null_content_yields_sentinel() {
        let item = json!({
            "custom_id": "6",
            "response": {
                "choices": [{"message": {"content": null}}]
            }
        });
        assert_eq!(extract_line(&item), FIELD_SENTINEL);
    }

    #[test]
    fn test_fragment_list_without_text_yields_sentinel() {
        let item = json!({
            "custom_id": "7",
            "response": {
                "choices": [{"message": {"content": [{"type": "audio"}]}}]
            }
        });
        assert_eq!(extract_line(&item), FIELD_SENTINEL);
    }

    #[test]
    fn test_null_error_is_not_an_error() {
        let item = json!({
            "custom_id": "8",
            "error": null,
            "response": {
                "choices": [{"message": {"content": "正常内容"}}]
            }
        });
        assert_eq!(extract_line(&item), "正常内容");
    }

    #[test]
    fn test_chat_response_without_wrapper() {
        // 并发路径的补全响应没有 response/body 包装
        let body = json!({
            "choices": [{"message": {"content": "直接响应"}}]
        });
        assert_eq!(extract_message_content(&body), Some("直接响应".to_string()));
    }
}
