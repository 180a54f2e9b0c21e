//! 日志工具模块
//!
//! 提供日志初始化、进度输出和运行摘要的辅助函数

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DispatchMode};
use crate::models::ResultRecord;

/// 初始化日志输出
///
/// 过滤级别由 `RUST_LOG` 环境变量控制，默认 `info`
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 程序配置
/// - `total_prompts`: 提示词总数
pub fn log_startup(config: &Config, total_prompts: usize) {
    let mode_desc = match config.mode {
        DispatchMode::Batch => "批处理模式",
        DispatchMode::Concurrent => "并发模式",
    };
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", mode_desc);
    info!("🤖 模型: {}", config.model_name);
    info!("📊 提示词总数: {}", total_prompts);
    match config.mode {
        DispatchMode::Batch => info!("📦 批次上限: {}", config.batch_size),
        DispatchMode::Concurrent => {
            info!("📋 最大并发数: {}", config.max_concurrent_requests)
        }
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `results`: 汇总后的结果列表
/// - `elapsed`: 总耗时
/// - `output_file`: 结果输出文件路径
pub fn print_final_stats(results: &[ResultRecord], elapsed: Duration, output_file: &str) {
    let failed = results.iter().filter(|r| r.is_sentinel()).count();
    let success = results.len() - failed;

    info!("\n{}", "=".repeat(60));
    info!("📊 全部派发完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, results.len());
    info!("❌ 降级为哨兵值: {}", failed);
    info!("⏱️ 总耗时: {:.2} 秒", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_file);
}

/// 追加运行摘要到日志文件
///
/// # 参数
/// - `log_file_path`: 摘要日志文件路径
/// - `rows`: 处理的提示词数量
/// - `model`: 模型名称
/// - `elapsed`: 总耗时
/// - `prompts_file`: 提示词文件路径
pub fn append_run_summary(
    log_file_path: &str,
    rows: usize,
    model: &str,
    elapsed: Duration,
    prompts_file: &str,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(
        file,
        "Rows processed: {}, Model: {}, Time: {:.2} seconds",
        rows,
        model,
        elapsed.as_secs_f64()
    )?;
    writeln!(file, "Prompt file used: {}", prompts_file)?;
    writeln!(file)?;

    Ok(())
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("这是一段很长的文本内容", 5), "这是一段很...");
    }
}
