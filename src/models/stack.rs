//! 图层栈
//!
//! 装配结果：一页中实际存在的图层，自下而上排列，全部铺满页面。

use std::path::{Path, PathBuf};

use crate::error::AssemblyError;
use crate::models::page::PageId;

/// 页面尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 坐标系原点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// y 轴向下（SVG、PSD）
    TopLeft,
    /// y 轴向上（Illustrator 脚本坐标）
    BottomLeft,
}

/// 图层在目标坐标系中的位置和尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    /// 铺满整页、锚定在视觉左上角的位置
    ///
    /// 原点在底部的坐标系中，左上角的纵坐标是页面高度。
    pub fn full_page(size: PageSize, origin: Origin) -> Self {
        let y = match origin {
            Origin::TopLeft => 0.0,
            Origin::BottomLeft => f64::from(size.height),
        };
        Self {
            x: 0.0,
            y,
            width: f64::from(size.width),
            height: f64::from(size.height),
        }
    }
}

/// 磁盘上实际存在的一个图层
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayer {
    pub name: String,
    pub source: PathBuf,
    /// 始终等于页面尺寸，原始分辨率不同时拉伸铺满
    pub extent: PageSize,
}

impl ResolvedLayer {
    pub fn full_page(name: impl Into<String>, source: impl Into<PathBuf>, size: PageSize) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            extent: size,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// 一页的图层栈，自下而上，最后一个元素在最上层
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    page_id: PageId,
    size: PageSize,
    layers: Vec<ResolvedLayer>,
}

impl LayerStack {
    /// 构建图层栈，空栈视为装配失败
    pub fn new(
        page_id: PageId,
        size: PageSize,
        layers: Vec<ResolvedLayer>,
    ) -> Result<Self, AssemblyError> {
        if layers.is_empty() {
            return Err(AssemblyError::NoLayersFound {
                page: page_id.to_string(),
            });
        }
        Ok(Self {
            page_id,
            size,
            layers,
        })
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn size(&self) -> PageSize {
        self.size
    }

    /// 自下而上
    pub fn layers(&self) -> &[ResolvedLayer] {
        &self.layers
    }

    pub fn top(&self) -> Option<&ResolvedLayer> {
        self.layers.last()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }
}
