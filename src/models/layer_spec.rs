//! 图层规格
//!
//! 一页由固定顺序的命名图层组成，顺序为自下而上：背景在最前，
//! 标签 / 裁切线在最后（最上层）。

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::models::options::ExportMode;

/// 图层文件扩展名
pub const LAYER_FILE_EXTENSION: &str = "png";

/// 标签图层，`skip_label_layer` 时被移除
pub const LABEL_LAYER: &str = "sheet_labels";

/// 标准图层词表（自下而上）
pub const STANDARD_LAYERS: [&str; 9] = [
    "sheet_background",
    "sheet_bg_knock",
    "sheet_char_knock",
    "sheet_character",
    "sheet_logo_knock",
    "sheet_logos",
    "sheet_glare",
    "sheet_cutline",
    LABEL_LAYER,
];

/// 有序、无重复的图层名称列表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    names: Vec<String>,
}

impl LayerSpec {
    /// 从自下而上的名称列表构建，拒绝空列表和重复名称
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::EmptyLayerSpec);
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateLayer { name: name.clone() });
            }
        }

        Ok(Self { names })
    }

    /// 指定模式下的图层规格
    ///
    /// 三种模式共用同一词表，差别只在目录布局上。
    pub fn for_mode(mode: ExportMode, skip_label_layer: bool) -> Self {
        let names = match mode {
            ExportMode::Standard | ExportMode::ReceiveType | ExportMode::KnockoutTest => {
                STANDARD_LAYERS.iter()
            }
        };

        Self {
            names: names
                .filter(|name| !(skip_label_layer && **name == LABEL_LAYER))
                .map(|name| name.to_string())
                .collect(),
        }
    }

    /// 自下而上遍历图层名
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// 图层对应的文件名
    pub fn file_name(name: &str) -> String {
        format!("{}.{}", name, LAYER_FILE_EXTENSION)
    }
}
