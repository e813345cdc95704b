//! 文档导出 - 业务能力层
//!
//! ## 导出器
//!
//! - `svg` - 矢量编码，直接写出 SVG（可选 gzip 压缩为 .svgz）
//! - `host` - 矢量编码，生成脚本交给宿主图形程序保存 .ai
//! - `psd` - 分层位图编码，写出 PSD
//!
//! 所有导出器都先写入目标目录下的临时文件，成功后原子替换目标文件，
//! 目标文件已存在时直接覆盖。

pub mod host;
pub mod packbits;
pub mod psd;
pub mod svg;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConfigError, ExportError};
use crate::infrastructure::HostExecutor;
use crate::models::{ExportOptions, LayerStack, TargetEncoding, VectorBackend};

pub use host::HostScriptExporter;
pub use psd::PsdExporter;
pub use svg::SvgExporter;

/// 文档导出器
///
/// 栈中最后一个图层在输出文档中位于最上层；每次调用恰好产生一个输出文件。
#[async_trait]
pub trait DocumentExporter: Send + Sync {
    /// 后端名称（用于日志和错误信息）
    fn name(&self) -> &'static str;

    /// 输出文件扩展名
    fn extension(&self, options: &ExportOptions) -> &'static str;

    /// 检查选项组合，运行开始前调用一次
    fn check_options(&self, options: &ExportOptions) -> Result<(), ExportError>;

    /// 导出一页
    async fn export(
        &self,
        stack: &LayerStack,
        destination: &Path,
        options: &ExportOptions,
    ) -> Result<(), ExportError>;
}

/// 按选项构建导出器
///
/// 宿主后端需要调用方提供执行器。
pub fn build_exporter(
    options: &ExportOptions,
    host: Option<Arc<HostExecutor>>,
) -> Result<Arc<dyn DocumentExporter>, ConfigError> {
    let exporter: Arc<dyn DocumentExporter> = match (options.encoding, options.vector_backend) {
        (TargetEncoding::LayeredRaster, _) => Arc::new(PsdExporter),
        (TargetEncoding::Vector, VectorBackend::Svg) => Arc::new(SvgExporter),
        (TargetEncoding::Vector, VectorBackend::Host) => {
            let executor = host.ok_or(ConfigError::Missing { key: "host_program" })?;
            Arc::new(HostScriptExporter::new(executor))
        }
    };

    exporter.check_options(options)?;
    Ok(exporter)
}

/// 不构建导出器，只检查选项组合
pub fn validate_options(options: &ExportOptions) -> Result<(), ExportError> {
    match (options.encoding, options.vector_backend) {
        (TargetEncoding::LayeredRaster, _) => PsdExporter.check_options(options),
        (TargetEncoding::Vector, VectorBackend::Svg) => SvgExporter.check_options(options),
        (TargetEncoding::Vector, VectorBackend::Host) => host::check_host_options(options),
    }
}

/// 确保目标目录存在
pub(crate) fn ensure_parent_dir(destination: &Path) -> Result<&Path, ExportError> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| ExportError::write_failed(parent, e))?;
    Ok(parent)
}

/// 链接到文档里的路径一律转成绝对路径
pub(crate) fn absolute_path(path: &Path) -> Result<PathBuf, ExportError> {
    std::path::absolute(path).map_err(|source| ExportError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// 写入同目录临时文件后原子替换目标文件
///
/// 写入失败时临时文件随作用域删除，目标文件保持原样。
pub(crate) fn publish_atomically<F>(destination: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    let parent = ensure_parent_dir(destination)?;

    let temp = tempfile::Builder::new()
        .prefix(".layerstack-")
        .suffix(".partial")
        .tempfile_in(parent)
        .map_err(|e| ExportError::write_failed(parent, e))?;

    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| ExportError::write_failed(destination, e))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| ExportError::write_failed(destination, e))?;

    temp.persist(destination)
        .map_err(|e| ExportError::write_failed(destination, e.error))?;
    Ok(())
}

/// 在阻塞线程池中运行 CPU 密集的导出
pub(crate) async fn run_blocking<F>(job: F) -> Result<(), ExportError>
where
    F: FnOnce() -> Result<(), ExportError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ExportError::HostFailed {
            message: format!("导出任务异常退出: {}", e),
        })?
}
