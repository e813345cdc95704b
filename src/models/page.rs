//! 页面标识与页面

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::layer_spec::LayerSpec;

/// 页面标识
///
/// 纯数字标识按数值排序（"2" < "10"），且不受前导零和位数限制；
/// 非数字标识排在数字之后，按字典序排序。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// 去掉前导零后的数字部分
    fn digits(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for PageId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let (a, b) = (self.digits(), other.digits());
                a.len()
                    .cmp(&b.len())
                    .then_with(|| a.cmp(b))
                    .then_with(|| self.0.cmp(&other.0))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一个生产单位（例如一张印刷卡片的一面）
///
/// 只在一次装配 + 导出的过程中存在。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub source_dir: PathBuf,
}

impl Page {
    pub fn new(id: PageId, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source_dir: source_dir.into(),
        }
    }

    /// 图层文件在页面目录中的路径
    pub fn layer_path(&self, layer_name: &str) -> PathBuf {
        self.source_dir.join(LayerSpec::file_name(layer_name))
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
