//! 运行日志写入服务 - 业务能力层
//!
//! 只负责"写运行日志文件"能力，不关心流程

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::RunSummary;

/// 运行日志写入服务
///
/// 职责：
/// - 运行开始时创建日志文件并写入时间戳头
/// - 运行结束时追加汇总和失败列表
pub struct RunLogWriter {
    path: PathBuf,
}

impl RunLogWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 创建（覆盖）日志文件并写入头部
    pub fn init(&self, title: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建日志目录: {}", parent.display()))?;
        }

        let mut file = std::fs::File::create(&self.path)
            .with_context(|| format!("无法创建日志文件: {}", self.path.display()))?;
        writeln!(file, "{}", title)?;
        writeln!(
            file,
            "开始时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(file, "{}", "=".repeat(60))?;
        Ok(())
    }

    /// 追加一次运行的汇总
    ///
    /// # 参数
    /// - `label`: 运行名称，如输出目录
    /// - `summary`: 运行汇总
    pub fn append_summary(&self, label: &str, summary: &RunSummary) -> Result<()> {
        debug!(
            "写入运行日志: {} | 成功 {} | 失败 {}",
            label, summary.succeeded, summary.failed
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("无法打开日志文件: {}", self.path.display()))?;

        writeln!(file)?;
        writeln!(
            file,
            "[{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            label
        )?;
        writeln!(
            file,
            "发现: {} | 成功: {} | 跳过: {} | 失败: {} | 耗时: {:.2}s",
            summary.discovered,
            summary.succeeded,
            summary.skipped,
            summary.failed,
            summary.elapsed.as_secs_f64()
        )?;

        for result in summary.failures() {
            if let Some(error) = &result.error {
                writeln!(file, "  ❌ {} | {} | {}", result.id, error.code, error.message)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchResult, FailureDetail};
    use std::time::Duration;

    #[test]
    fn summary_lists_failures() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RunLogWriter::new(dir.path().join("logs").join("run.log"));
        writer.init("layerstack").unwrap();

        let summary = RunSummary::from_results(
            vec![
                BatchResult::succeeded("1", Duration::from_millis(5)),
                BatchResult::failed(
                    "2",
                    Duration::from_millis(1),
                    FailureDetail::new("NoLayersFound", "页面 2 没有找到任何图层文件"),
                ),
            ],
            Duration::from_millis(20),
        );
        writer.append_summary("svg_output", &summary).unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert!(text.starts_with("layerstack\n开始时间: "));
        assert!(text.contains("成功: 1"));
        assert!(text.contains("失败: 1"));
        assert!(text.contains("❌ 2 | NoLayersFound"));
        assert_eq!(text.matches("❌").count(), 1);
    }
}
