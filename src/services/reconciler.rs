//! 结果汇总 - 业务能力层
//!
//! 只负责"把稀疏结果映射还原成稠密有序列表"能力，不关心流程
//!
//! 这是整个系统中唯一决定"结果缺失"语义的地方：
//! 调用方永远看不到原始的空洞。

use std::collections::HashMap;

use crate::models::ResultRecord;

/// 按输入顺序汇总结果
///
/// # 参数
/// - `results`: id → 结果记录的稀疏映射
/// - `total`: 原始提示词数量 N
///
/// # 返回
/// 返回恰好 `total` 个元素的有序列表：第 i 个槽位取映射中
/// id 为 i 的记录，缺失则填入哨兵记录。计算是确定性的，
/// 对同一输入重复执行产出完全相同的列表。
pub fn reconcile(results: &HashMap<usize, ResultRecord>, total: usize) -> Vec<ResultRecord> {
    (0..total)
        .map(|id| {
            results
                .get(&id)
                .cloned()
                .unwrap_or_else(|| ResultRecord::sentinel(id))
        })
        .collect()
}
