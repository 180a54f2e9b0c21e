use std::time::Instant;

use anyhow::{Context, Result};
use tracing::warn;

use llm_batch_submit::utils::logging;
use llm_batch_submit::{Config, Dispatcher, ResultRecord};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置：config.toml 存在则读文件，否则读环境变量
    let config = Config::load("config.toml")?;

    // 加载提示词（每行一条）
    let prompts = load_prompts(&config.prompts_file).await?;
    if prompts.is_empty() {
        warn!("⚠️ 没有找到待派发的提示词，程序结束");
        return Ok(());
    }

    logging::log_startup(&config, prompts.len());

    // 派发
    let dispatcher = Dispatcher::new(config.clone())?;
    let start = Instant::now();
    let results = dispatcher.run(&prompts).await?;
    let elapsed = start.elapsed();

    // 写出结果并记录运行摘要
    write_results(&config.output_file, &results).await?;
    logging::append_run_summary(
        &config.run_log_file,
        results.len(),
        &config.model_name,
        elapsed,
        &config.prompts_file,
    )?;

    logging::print_final_stats(&results, elapsed, &config.output_file);

    Ok(())
}

/// 从文本文件加载提示词，每行一条，忽略空行
async fn load_prompts(path: &str) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取提示词文件: {}", path))?;

    Ok(content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect())
}

/// 把结果按输入顺序逐行写出
async fn write_results(path: &str, results: &[ResultRecord]) -> Result<()> {
    let mut out = String::new();
    for record in results {
        out.push_str(&record.content);
        out.push('\n');
    }

    tokio::fs::write(path, out)
        .await
        .with_context(|| format!("无法写入结果文件: {}", path))?;

    Ok(())
}
