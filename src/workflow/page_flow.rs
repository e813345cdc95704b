//! 页面处理流程 - 流程层
//!
//! 核心职责：定义"一页"的完整处理流程
//!
//! 流程顺序：
//! 1. 装配图层栈（阻塞线程池）
//! 2. 导出为一个文档

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{ExportOptions, Outcome, Page, PageId};
use crate::services::{DocumentExporter, PageAssembler};
use crate::workflow::page_ctx::PageCtx;

/// 页面处理流程
///
/// - 编排装配和导出
/// - 不持有宿主程序资源，导出器自己管理
/// - 错误原样返回，由调度器记为失败结果
pub struct PageFlow {
    assembler: PageAssembler,
    exporter: Arc<dyn DocumentExporter>,
    options: ExportOptions,
    output_dir: PathBuf,
}

impl PageFlow {
    pub fn new(
        assembler: PageAssembler,
        exporter: Arc<dyn DocumentExporter>,
        options: ExportOptions,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            assembler,
            exporter,
            options,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<id>.<ext>`
    pub fn destination(&self, id: &PageId) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", id, self.exporter.extension(&self.options)))
    }

    pub async fn run(&self, page: Page, ctx: &PageCtx) -> AppResult<Outcome> {
        debug!("{} 📂 {}", ctx, page.source_dir().display());

        let assembler = self.assembler.clone();
        let stack = tokio::task::spawn_blocking(move || assembler.assemble(&page))
            .await
            .map_err(|e| AppError::task(format!("装配任务异常退出: {}", e)))??;

        info!(
            "{} 🧩 {} 个图层，{}x{}",
            ctx,
            stack.len(),
            stack.size().width,
            stack.size().height
        );

        let destination = self.destination(stack.page_id());
        self.exporter
            .export(&stack, &destination, &self.options)
            .await?;

        info!("{} ✅ 已导出 → {}", ctx, destination.display());
        Ok(Outcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExportMode, LayerSpec};
    use crate::services::exporter::SvgExporter;
    use image::{Rgba, RgbaImage};

    fn flow(output_dir: &Path) -> PageFlow {
        let options = ExportOptions {
            compress: false,
            ..ExportOptions::default()
        };
        PageFlow::new(
            PageAssembler::new(LayerSpec::for_mode(ExportMode::Standard, false)),
            Arc::new(SvgExporter),
            options,
            output_dir,
        )
    }

    #[tokio::test]
    async fn exports_one_document_per_page() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let page_dir = src.path().join("5");
        std::fs::create_dir(&page_dir).unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]))
            .save(page_dir.join("sheet_background.png"))
            .unwrap();

        let flow = flow(out.path());
        let page = Page::new(PageId::new("5"), &page_dir);
        let ctx = PageCtx::new(PageId::new("5"), 1, None);

        assert_eq!(flow.run(page, &ctx).await.unwrap(), Outcome::Done);
        assert!(out.path().join("5.svg").is_file());
    }

    #[tokio::test]
    async fn empty_page_fails_without_output() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        let flow = flow(out.path());
        let page = Page::new(PageId::new("2"), src.path());
        let ctx = PageCtx::new(PageId::new("2"), 1, None);

        let err = flow.run(page, &ctx).await.unwrap_err();
        assert_eq!(err.code(), "NoLayersFound");
        assert!(!flow.destination(&PageId::new("2")).exists());
    }
}
