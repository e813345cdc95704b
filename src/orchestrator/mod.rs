//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量页面处理器
//! - 管理应用生命周期（初始化、运行）
//! - 按模式规划源目录和输出目录
//! - 持有导出器（以及其中的宿主程序执行器）
//! - 输出全局统计信息
//!
//! ### `scheduler` - 分批调度器
//! - 按并发上限切分批次，一批全部结束后再开始下一批
//! - 批次之间按 `pacing` 暂停
//! - 把任务错误和 panic 记为失败结果
//!
//! ### `fetch_processor` - 素材下载处理器
//! - 读取清单，复用调度器并发下载
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Page>)
//!     ↓
//! scheduler (分批 + 并发)
//!     ↓
//! workflow::PageFlow (处理单个 Page)
//!     ↓
//! services (能力层：assemble / export / fetch / run log)
//!     ↓
//! infrastructure (基础设施：HostExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管规划和资源，scheduler 管并发
//! 2. **资源隔离**：只有编排层创建 HostExecutor
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;
pub mod fetch_processor;
pub mod scheduler;

// 重新导出主要类型
pub use batch_processor::{plan_targets, App, RunTarget};
pub use fetch_processor::run_fetch;
pub use scheduler::BatchScheduler;
