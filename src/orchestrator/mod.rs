//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责两条派发路径的流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 派发入口
//! - 校验配置，持有共享的 HTTP 客户端
//! - 为提示词分配稳定编号
//! - 按配置选择批处理或并发路径
//! - 汇总出与输入等长、同序的结果列表
//!
//! ### `batch_pipeline` - 批处理提交流水线
//! - 切批次、序列化 JSONL、上传、创建远程任务
//! - 带退避地轮询到终态，受总等待上限约束
//! - 流式下载输出并逐行提取
//! - 批次之间严格顺序处理
//!
//! ### `concurrent` - 并发派发器
//! - 每条提示词一个逻辑任务，Semaphore 限制在途数量
//! - 限流退避重试，传输错误短暂等待后重试
//! - 单条失败只影响自己，汇合点统一降级为哨兵值
//!
//! ## 层次关系
//!
//! ```text
//! dispatcher (选路 + 汇总)
//!     ↓
//! batch_pipeline / concurrent (驱动一条路径)
//!     ↓
//! services (能力层：chunker / backoff / extractor / reconciler)
//!     ↓
//! clients (基础设施：BatchClient / ChatClient)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：dispatcher 管选路，两条流水线各管一种执行策略
//! 2. **资源隔离**：只有编排层持有 HTTP 客户端和临时文件
//! 3. **向下依赖**：编排层 → services → clients
//! 4. **失败边界**：致命错误向上抛，条目级错误就地降级

pub mod batch_pipeline;
pub mod concurrent;
pub mod dispatcher;

// 重新导出主要类型
pub use batch_pipeline::BatchPipeline;
pub use concurrent::ConcurrentDispatcher;
pub use dispatcher::Dispatcher;
