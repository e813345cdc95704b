//! 素材下载处理器 - 编排层
//!
//! 读取清单中的对象键，复用 `BatchScheduler` 并发下载，
//! 可选写出本地化清单。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::models::{load_manifest, RunSummary};
use crate::orchestrator::scheduler::BatchScheduler;
use crate::services::{AssetFetcher, RunLogWriter};
use crate::utils::logging;

/// 下载清单中引用的所有素材
pub async fn run_fetch(config: &Config) -> Result<RunSummary> {
    let fetch = &config.fetch;
    let manifest_path = fetch.manifest.as_ref().ok_or(ConfigError::Missing {
        key: "fetch.manifest",
    })?;
    let base_url = fetch.base_url.as_deref().ok_or(ConfigError::Missing {
        key: "fetch.base_url",
    })?;

    logging::log_startup("素材下载", fetch.concurrency_limit, 0);

    let manifest = load_manifest(manifest_path).await?;
    let keys = manifest.keys();
    info!("🔗 清单中共有 {} 个不重复的对象键", keys.len());

    let fetcher = Arc::new(AssetFetcher::new(base_url, &fetch.output_dir, fetch.force));
    let scheduler = BatchScheduler::new(fetch.concurrency_limit, Duration::ZERO)?;

    let job_fetcher = fetcher.clone();
    let summary = scheduler
        .run(keys, move |key: String, _| {
            let fetcher = job_fetcher.clone();
            async move {
                let task = fetcher.task_for(&key)?;
                fetcher.fetch(&task).await.map_err(AppError::from)
            }
        })
        .await;

    if fetch.update_manifest {
        if summary.succeeded > 0 {
            let written = manifest.write_localized(fetcher.output_dir()).await?;
            info!("📝 已写出本地化清单: {}", written.display());
        } else {
            info!("没有成功下载的文件，不写出本地化清单");
        }
    }

    let run_log = RunLogWriter::new(&config.run_log_file);
    run_log.append_summary("fetch_assets", &summary)?;
    logging::print_final_stats(&summary, run_log.path());

    Ok(summary)
}
