//! 批次规划 - 业务能力层
//!
//! 只负责"切批次"能力，不关心流程
//!
//! 批处理路径按配置的批次上限把有序记录切成连续分片，
//! 每个分片对应一个远程任务，分片之间严格顺序处理。

use crate::models::PromptRecord;

/// 把记录序列切成大小不超过 `batch_size` 的连续批次
///
/// 前置条件：`batch_size > 0`（由 `Config::validate` 保证）。
///
/// # 参数
/// - `records`: 已编号的提示词记录
/// - `batch_size`: 单批次记录数上限
///
/// # 返回
/// 返回按输入顺序排列的批次列表：恰好覆盖输入一次，
/// 不遗漏、不重复。空输入返回空列表；`batch_size`
/// 大于输入长度时返回单个批次。
pub fn plan_chunks(records: &[PromptRecord], batch_size: usize) -> Vec<&[PromptRecord]> {
    if records.is_empty() {
        return Vec::new();
    }
    records.chunks(batch_size).collect()
}
