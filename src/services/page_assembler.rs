//! 页面装配服务 - 业务能力层
//!
//! 把一个页面目录解析成图层栈：找出存在的图层，确定页面尺寸，
//! 按图层规格的顺序自下而上排列。

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AssemblyError;
use crate::models::{LayerSpec, LayerStack, Page, PageSize, ResolvedLayer};

/// 页面装配器
///
/// 职责：
/// - 只处理单个页面
/// - 不写任何文件
/// - 缺失的图层直接跳过，一个图层都没有时报 `NoLayersFound`
#[derive(Debug, Clone)]
pub struct PageAssembler {
    spec: LayerSpec,
}

impl PageAssembler {
    pub fn new(spec: LayerSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    /// 装配单个页面
    ///
    /// 页面尺寸取自按规格顺序第一个存在的图层的原始像素尺寸；
    /// 所有图层都拉伸铺满这个尺寸，不保留各自的宽高比。
    pub fn assemble(&self, page: &Page) -> Result<LayerStack, AssemblyError> {
        if !page.source_dir().is_dir() {
            return Err(AssemblyError::SourceMissing {
                path: page.source_dir().to_path_buf(),
            });
        }

        // 图层路径写进导出文档，必须与工作目录无关
        let root = std::path::absolute(page.source_dir()).map_err(|source| {
            AssemblyError::SourceUnresolved {
                path: page.source_dir().to_path_buf(),
                source,
            }
        })?;
        let page = &Page::new(page.id.clone(), root);

        let present = self.present_layers(page);
        let Some((first_name, first_path)) = present.first() else {
            return Err(AssemblyError::NoLayersFound {
                page: page.id.to_string(),
            });
        };

        let size = probe_size(first_path)?;
        debug!(
            "[页面 {}] 尺寸 {}x{} 取自 {}",
            page.id, size.width, size.height, first_name
        );

        let layers = present
            .into_iter()
            .map(|(name, path)| ResolvedLayer::full_page(name, path, size))
            .collect();

        LayerStack::new(page.id.clone(), size, layers)
    }

    /// 按规格顺序列出存在的图层文件
    fn present_layers(&self, page: &Page) -> Vec<(String, PathBuf)> {
        self.spec
            .names()
            .filter_map(|name| {
                let path = page.layer_path(name);
                if path.is_file() {
                    Some((name.to_string(), path))
                } else {
                    debug!("[页面 {}] 跳过缺失图层: {}", page.id, name);
                    None
                }
            })
            .collect()
    }
}

/// 只读取图像头部获取原始尺寸，读取器在返回前释放
pub fn probe_size(path: &Path) -> Result<PageSize, AssemblyError> {
    let (width, height) =
        image::image_dimensions(path).map_err(|source| AssemblyError::ProbeFailed {
            path: path.to_path_buf(),
            source,
        })?;

    if width == 0 || height == 0 {
        return Err(AssemblyError::EmptyImage {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    Ok(PageSize::new(width, height))
}
