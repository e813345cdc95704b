//! # layerstack
//!
//! 把每页一组固定顺序的透明图层合成为分层文档（SVG / .ai / PSD），
//! 并以有上限的并发分批处理大量页面。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（宿主图形程序），只暴露能力
//! - `HostExecutor` - 唯一的宿主程序调用方，提供 run_script() 能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面 / 单个对象
//! - `PageAssembler` - 图层装配能力
//! - `DocumentExporter` - 文档导出能力（svg / host / psd）
//! - `AssetFetcher` - 远程素材下载能力
//! - `RunLogWriter` - 写运行日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一页"的完整处理流程
//! - `PageCtx` - 上下文封装（page_id + 序号 + 收货方式）
//! - `PageFlow` - 流程编排（assemble → export）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量页面处理器，管理资源和运行规划
//! - `orchestrator/scheduler` - 分批调度器，控制并发和批次间隔
//! - `orchestrator/fetch_processor` - 素材下载处理器
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FetchConfig};
pub use error::{AppError, AppResult};
pub use infrastructure::{Capability, HostExecutor};
pub use models::{ExportMode, ExportOptions, LayerSpec, LayerStack, Page, PageId, RunSummary};
pub use orchestrator::{run_fetch, App, BatchScheduler};
pub use services::{DocumentExporter, PageAssembler};
pub use workflow::{PageCtx, PageFlow};
