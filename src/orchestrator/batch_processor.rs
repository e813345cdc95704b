//! 批量页面处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量页面的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、探测宿主程序、创建导出器、初始化运行日志
//! 2. **运行规划**：按模式决定源目录和输出目录（标准 / 按收货方式 / 白板验证）
//! 3. **批量加载**：扫描所有页面目录，按数值顺序排列
//! 4. **分批处理**：交给 `BatchScheduler`，每批完成后再开始下一批
//! 5. **全局统计**：汇总结果并写入运行日志
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 `HostExecutor` 的模块（通过导出器）
//! - **向下委托**：单个页面交给 `workflow::PageFlow`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ConfigError, DiscoveryError};
use crate::infrastructure::HostExecutor;
use crate::models::{
    discover_pages, ExportMode, ExportOptions, LayerSpec, Page, ReceiveType, RunSummary,
    TargetEncoding, VectorBackend,
};
use crate::orchestrator::scheduler::BatchScheduler;
use crate::services::{build_exporter, DocumentExporter, PageAssembler, RunLogWriter};
use crate::utils::logging;
use crate::workflow::{PageCtx, PageFlow};

/// 一个源目录到一个输出目录的运行目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// 用于日志和运行汇总
    pub label: String,
    pub source_root: PathBuf,
    pub output_dir: PathBuf,
    pub receive_type: Option<ReceiveType>,
}

/// 应用主结构
pub struct App {
    config: Config,
    options: ExportOptions,
    spec: LayerSpec,
    exporter: Arc<dyn DocumentExporter>,
    run_log: RunLogWriter,
}

impl App {
    /// 初始化应用
    ///
    /// 配置错误和宿主程序缺失在这里报出，不会处理任何页面。
    pub fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        let options = config.export_options();
        let spec = config.layer_spec()?;

        let host = if options.encoding == TargetEncoding::Vector
            && options.vector_backend == VectorBackend::Host
        {
            let executor = HostExecutor::new(config.host_config());
            let capability = executor.probe();
            info!("🔎 宿主程序 {}: {:?}", executor.program(), capability);
            if !capability.is_found() {
                return Err(ConfigError::HostUnavailable {
                    program: executor.program().to_string(),
                }
                .into());
            }
            Some(Arc::new(executor))
        } else {
            None
        };

        let exporter = build_exporter(&options, host)?;

        let run_log = RunLogWriter::new(&config.run_log_file);
        run_log.init("layerstack 运行日志")?;

        logging::log_startup(
            &format!("{} 导出 ({:?})", exporter.name(), config.mode),
            options.concurrency_limit,
            config.pacing_ms,
        );

        Ok(Self {
            config,
            options,
            spec,
            exporter,
            run_log,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        let targets = plan_targets(
            self.config.mode,
            &self.config.source_root,
            &self.config.output_root,
            &self.options,
        )?;

        let mut total = RunSummary::default();
        for target in targets {
            info!("\n📁 正在扫描 {} ...", target.source_root.display());
            let pages = discover_pages(&target.source_root).await?;

            if pages.is_empty() {
                warn!("⚠️ {} 中没有找到页面目录", target.source_root.display());
            }

            let summary = self.process_target(&target, pages).await?;
            self.run_log.append_summary(&target.label, &summary)?;
            total.merge(summary);
        }

        logging::print_final_stats(&total, self.run_log.path());
        Ok(total)
    }

    /// 处理一个运行目标下的所有页面
    async fn process_target(&self, target: &RunTarget, pages: Vec<Page>) -> Result<RunSummary> {
        info!(
            "📤 {} → {}",
            target.source_root.display(),
            target.output_dir.display()
        );

        let scheduler = BatchScheduler::new(self.options.concurrency_limit, self.options.pacing)?;
        let flow = Arc::new(PageFlow::new(
            PageAssembler::new(self.spec.clone()),
            self.exporter.clone(),
            self.options.clone(),
            &target.output_dir,
        ));
        let receive_type = target.receive_type;

        let summary = scheduler
            .run(pages, move |page: Page, index| {
                let flow = flow.clone();
                async move {
                    let ctx = PageCtx::new(page.id.clone(), index, receive_type);
                    flow.run(page, &ctx).await
                }
            })
            .await;

        Ok(summary)
    }
}

/// 按运行模式规划源目录和输出目录
///
/// 按收货方式拆分时，缺失的类型目录只记警告；全部缺失才算发现错误。
pub fn plan_targets(
    mode: ExportMode,
    source_root: &Path,
    output_root: &Path,
    options: &ExportOptions,
) -> Result<Vec<RunTarget>, DiscoveryError> {
    let base = options.encoding_dir();

    match mode {
        ExportMode::Standard => Ok(vec![RunTarget {
            label: base.to_string(),
            source_root: source_root.to_path_buf(),
            output_dir: output_root.join(base),
            receive_type: None,
        }]),
        ExportMode::KnockoutTest => {
            let label = format!("{}_test", base);
            Ok(vec![RunTarget {
                source_root: source_root.to_path_buf(),
                output_dir: output_root.join(&label),
                label,
                receive_type: None,
            }])
        }
        ExportMode::ReceiveType => {
            let targets: Vec<RunTarget> = ReceiveType::ALL
                .into_iter()
                .filter_map(|t| {
                    let source = source_root.join(t.source_dir_name());
                    if !source.is_dir() {
                        warn!("⚠️ 跳过收货方式 {}: 目录不存在 {}", t.name(), source.display());
                        return None;
                    }
                    let label = format!("{}_{}", base, t.name());
                    Some(RunTarget {
                        source_root: source,
                        output_dir: output_root.join(&label),
                        label,
                        receive_type: Some(t),
                    })
                })
                .collect();

            if targets.is_empty() {
                return Err(DiscoveryError::SourceRootMissing {
                    path: source_root.to_path_buf(),
                });
            }
            Ok(targets)
        }
    }
}
