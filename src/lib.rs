//! # LLM Batch Submit
//!
//! 一个把大量独立提示词派发到远程 LLM 补全服务、
//! 并按原始顺序收集响应的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的三层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 持有 HTTP 能力，只做线上协议
//! - `BatchClient` - 文件上传 / 任务创建 / 状态查询 / 流式下载
//! - `ChatClient` - 单条补全调用与错误载荷分类
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个模块只有一种能力
//! - `chunker` - 切批次能力
//! - `backoff` - 退避计算能力（两条路径共用）
//! - `extractor` - 响应载荷归一化能力
//! - `reconciler` - 稀疏结果还原为稠密有序列表的能力
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 派发入口，选路与汇总
//! - `orchestrator/batch_pipeline` - 批处理路径的状态机
//! - `orchestrator/concurrent` - 并发路径的有界扇出
//!
//! ## 两条执行路径
//!
//! - **批处理路径**：整批上传成文件，远程任务离线执行，
//!   本地只做带退避的轮询等待
//! - **并发路径**：每条提示词一个请求，Semaphore 限制在途数量，
//!   每条独立重试
//!
//! 两条路径都以 `id → 结果` 的稀疏映射收尾，由结果汇总器
//! 统一还原成与输入等长、同序的列表。

pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::{Config, DispatchMode};
pub use error::{DispatchError, DispatchResult};
pub use models::{PromptRecord, ResultRecord};
pub use orchestrator::Dispatcher;
