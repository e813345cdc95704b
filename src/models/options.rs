//! 导出选项与运行模式

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::layer_spec::{LayerSpec, LABEL_LAYER};

/// 输出文档编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetEncoding {
    /// 矢量文档：每个图层是一个命名容器，内含一张置入的位图
    Vector,
    /// 分层位图文档：每个图层是一组与页面等大的位图通道
    LayeredRaster,
}

impl TargetEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TargetEncoding::Vector => "vector",
            TargetEncoding::LayeredRaster => "layered-raster",
        }
    }
}

impl FromStr for TargetEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(TargetEncoding::Vector),
            "layered-raster" | "layered_raster" | "raster" => Ok(TargetEncoding::LayeredRaster),
            _ => Err(ConfigError::invalid("encoding", s, "vector | layered-raster")),
        }
    }
}

impl fmt::Display for TargetEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 矢量编码的实现后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorBackend {
    /// 直接写出 SVG 文档
    Svg,
    /// 生成脚本交给宿主图形程序保存为 .ai
    Host,
}

impl FromStr for VectorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(VectorBackend::Svg),
            "host" | "illustrator" => Ok(VectorBackend::Host),
            _ => Err(ConfigError::invalid("vector_backend", s, "svg | host")),
        }
    }
}

/// 运行模式
///
/// 决定源目录和输出目录的布局，图层顺序在各模式下固定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportMode {
    /// `<source>/<id>/` → `<output>/<encoding dir>/`
    Standard,
    /// 按收货方式拆分：`<source>/output_receive_<t>/<id>/` → `<output>/<encoding dir>_<type>/`
    ReceiveType,
    /// 白板（knockout）验证：`<source>/<id>/` → `<output>/<encoding dir>_test/`
    KnockoutTest,
}

impl FromStr for ExportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ExportMode::Standard),
            "receive-type" | "receive_type" => Ok(ExportMode::ReceiveType),
            "knockout-test" | "knockout_test" => Ok(ExportMode::KnockoutTest),
            _ => Err(ConfigError::invalid(
                "mode",
                s,
                "standard | receive-type | knockout-test",
            )),
        }
    }
}

/// 收货方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiveType {
    /// 活动现场领取
    EventPickup,
    /// 配送
    Delivery,
}

impl ReceiveType {
    pub const ALL: [ReceiveType; 2] = [ReceiveType::EventPickup, ReceiveType::Delivery];

    /// 订单数据中的代码
    pub fn code(self) -> &'static str {
        match self {
            ReceiveType::EventPickup => "0",
            ReceiveType::Delivery => "1",
        }
    }

    /// 输出目录使用的名称
    pub fn name(self) -> &'static str {
        match self {
            ReceiveType::EventPickup => "event_pickup",
            ReceiveType::Delivery => "delivery",
        }
    }

    /// 源目录名
    pub fn source_dir_name(self) -> String {
        format!("output_receive_{}", self.code())
    }
}

/// 导出选项
///
/// 一次批量运行内不可变。
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub encoding: TargetEncoding,
    pub vector_backend: VectorBackend,
    /// 格式版本标记，`None` 表示各后端的当前版本
    pub compatibility_profile: Option<u16>,
    pub compress: bool,
    pub embed_assets: bool,
    pub pdf_compatible: bool,
    /// 仅分层位图编码使用
    pub thumbnail: bool,
    pub skip_label_layer: bool,
    pub concurrency_limit: usize,
    pub pacing: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            encoding: TargetEncoding::Vector,
            vector_backend: VectorBackend::Svg,
            compatibility_profile: None,
            compress: true,
            embed_assets: true,
            pdf_compatible: false,
            thumbnail: true,
            skip_label_layer: false,
            concurrency_limit: 3,
            pacing: Duration::from_millis(1000),
        }
    }
}

impl ExportOptions {
    /// 该编码的输出目录基础名
    pub fn encoding_dir(&self) -> &'static str {
        match (self.encoding, self.vector_backend) {
            (TargetEncoding::Vector, VectorBackend::Svg) => "svg_output",
            (TargetEncoding::Vector, VectorBackend::Host) => "ai_output",
            (TargetEncoding::LayeredRaster, _) => "psd_output",
        }
    }

    /// 按这些选项裁剪后的图层规格
    ///
    /// `custom` 为自定义图层顺序，`None` 时使用模式的标准词表。
    pub fn layer_spec(
        &self,
        mode: ExportMode,
        custom: Option<&[String]>,
    ) -> Result<LayerSpec, ConfigError> {
        match custom {
            Some(names) => LayerSpec::new(
                names
                    .iter()
                    .filter(|name| !(self.skip_label_layer && *name == LABEL_LAYER)),
            ),
            None => Ok(LayerSpec::for_mode(mode, self.skip_label_layer)),
        }
    }
}
