/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::models::RunSummary;

/// 初始化 tracing 订阅器
///
/// 级别由 `RUST_LOG` 控制，默认 `info`。重复调用无副作用。
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
/// - `title`: 运行名称
/// - `max_concurrent`: 最大并发数
/// - `pacing_ms`: 批次间隔
pub fn log_startup(title: &str, max_concurrent: usize, pacing_ms: u64) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", title);
    info!("📊 最大并发数: {} | 批次间隔: {}ms", max_concurrent, pacing_ms);
    info!("{}", "=".repeat(60));
}

/// 记录任务加载信息
pub fn log_items_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的任务", total);
    info!("📋 将以每批 {} 个的方式处理", max_concurrent);
    info!("💡 每批完成后再开始下一批\n");
}

/// 记录批次开始信息
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始编号
/// - `end`: 结束编号
/// - `total`: 任务总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理第 {}/{} 批", batch_num, total_batches);
    info!("📄 本批任务: {}-{} / 共 {} 个", start, end, total);
    info!("{}", "=".repeat(60));
}

pub fn log_batch_complete(batch_num: usize, success: usize, total: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 第 {} 批完成: 成功 {}/{}", batch_num, success, total);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息，失败的任务逐个列出
pub fn print_final_stats(summary: &RunSummary, log_file_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.succeeded, summary.discovered);
    if summary.skipped > 0 {
        info!("⏭️ 跳过: {}", summary.skipped);
    }
    info!("❌ 失败: {}", summary.failed);
    info!("⏱️ 耗时: {:.2}s", summary.elapsed.as_secs_f64());
    for result in summary.failures() {
        if let Some(detail) = &result.error {
            error!(
                "   [{}] {}: {}",
                result.id,
                detail.code,
                truncate_text(&detail.message, 120)
            );
        }
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
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
    fn truncates_by_chars_not_bytes() {
        assert_eq!(truncate_text("页面没有图层", 2), "页面...");
        assert_eq!(truncate_text("short", 10), "short");
    }

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
    }
}
