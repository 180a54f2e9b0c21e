//! 请求/结果记录模型
//!
//! 定义派发层的核心数据结构：带编号的提示词记录（PromptRecord）和
//! 带编号的结果记录（ResultRecord）。编号（id）是唯一的排序锚点，
//! 由输入顺序决定，贯穿上传、轮询、下载全过程。

use serde::{Deserialize, Serialize};

/// 字段级哨兵值（4 个字段）
///
/// 仅由响应提取器产生：服务端有应答，但载荷不可用
/// （带错误标记、缺少 choices、内容形状不符）。
/// 占位的是答案字段本身，下游后处理会自行追加置信度列。
pub const FIELD_SENTINEL: &str = "N/A;N/A;N/A;N/A";

/// 记录级哨兵值（5 个字段，含置信度槽位）
///
/// 仅在汇总边界产生：该 id 完全没有可用结果
/// （结果映射中缺失，或并发路径重试耗尽）。
pub const RECORD_SENTINEL: &str = "N/A;N/A;N/A;N/A;N/A";

/// 提示词记录
///
/// `id` 等于该提示词在调用方输入序列中的下标（0 开始），
/// 创建后不可变。序列化到线上格式时 `id` 转为十进制字符串
/// 作为 `custom_id`，下载时再解析回整数完成对账。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRecord {
    /// 输入序列中的下标
    pub id: usize,
    /// 提示词内容
    pub text: String,
}

impl PromptRecord {
    /// 生成线上格式的关联标识
    pub fn custom_id(&self) -> String {
        self.id.to_string()
    }
}

/// 为一批提示词分配稳定编号
///
/// # 参数
/// - `prompts`: 调用方给定顺序的提示词列表
///
/// # 返回
/// 返回编号后的记录列表，`records[i].id == i`，同一次调用内编号唯一
pub fn tag_prompts(prompts: &[String]) -> Vec<PromptRecord> {
    prompts
        .iter()
        .enumerate()
        .map(|(id, text)| PromptRecord {
            id,
            text: text.clone(),
        })
        .collect()
}

/// 结果记录
///
/// 由批处理输出行解析或单条请求直接产生，
/// 最终经结果汇总器落入稠密有序列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// 对应提示词的编号
    pub id: usize,
    /// 响应内容（或哨兵值）
    pub content: String,
    /// 错误信息（无错误时为 None）
    pub error: Option<String>,
}

impl ResultRecord {
    /// 创建成功结果
    pub fn ok(id: usize, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            error: None,
        }
    }

    /// 创建哨兵结果（所有字段均为 N/A）
    pub fn sentinel(id: usize) -> Self {
        Self {
            id,
            content: RECORD_SENTINEL.to_string(),
            error: Some("N/A".to_string()),
        }
    }

    /// 创建带错误说明的哨兵结果
    pub fn sentinel_with_error(id: usize, error: impl Into<String>) -> Self {
        Self {
            id,
            content: RECORD_SENTINEL.to_string(),
            error: Some(error.into()),
        }
    }

    /// 判断是否为哨兵结果
    pub fn is_sentinel(&self) -> bool {
        self.content == RECORD_SENTINEL || self.content == FIELD_SENTINEL
    }
}
