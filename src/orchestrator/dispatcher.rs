//! 派发入口 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个派发层的入口，负责：
//!
//! 1. **配置校验**：构造时一次性校验，拒绝无法工作的参数
//! 2. **资源管理**：唯一持有 HTTP 客户端，两条路径共享
//! 3. **路径选择**：按配置走批处理路径或并发路径
//! 4. **结果汇总**：把稀疏结果映射还原成稠密有序列表
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单条请求的细节，向下委托
//! - **统一出口**：调用方只会拿到与输入等长、同序的结果列表，
//!   或一个描述首个致命错误的 Err

use tracing::{info, warn};

use crate::config::{Config, DispatchMode};
use crate::error::DispatchResult;
use crate::models::{tag_prompts, ResultRecord};
use crate::orchestrator::{BatchPipeline, ConcurrentDispatcher};
use crate::services::reconcile;

/// 提示词派发器
pub struct Dispatcher {
    config: Config,
    http: reqwest::Client,
}

impl Dispatcher {
    /// 创建新的派发器
    ///
    /// 配置在此一次性校验；HTTP 客户端在此创建，
    /// 两条路径共享同一个连接池。
    pub fn new(config: Config) -> DispatchResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { config, http })
    }

    /// 派发一批提示词
    ///
    /// # 参数
    /// - `prompts`: 调用方给定顺序的提示词列表
    ///
    /// # 返回
    /// 返回恰好 `prompts.len()` 个元素、按输入顺序排列的结果列表。
    /// 无论远程服务实际返回了多少条结果，缺失槽位都以哨兵记录填充。
    pub async fn run(&self, prompts: &[String]) -> DispatchResult<Vec<ResultRecord>> {
        let records = tag_prompts(prompts);

        if records.is_empty() {
            warn!("⚠️ 没有待派发的提示词");
            return Ok(Vec::new());
        }

        info!("共 {} 条提示词待派发", records.len());

        // 详细日志（如果启用）
        if self.config.verbose_logging {
            for record in records.iter().take(3) {
                info!(
                    "[提示词 {}] {}",
                    record.id,
                    crate::utils::truncate_text(&record.text, 80)
                );
            }
        }

        let results = match self.config.mode {
            DispatchMode::Batch => {
                BatchPipeline::new(self.http.clone(), &self.config)
                    .run(&records)
                    .await?
            }
            DispatchMode::Concurrent => {
                ConcurrentDispatcher::new(self.http.clone(), &self.config)
                    .dispatch(&records)
                    .await?
            }
        };

        Ok(reconcile(&results, records.len()))
    }

    /// 当前配置
    pub fn config(&self) -> &Config {
        &self.config
    }
}
