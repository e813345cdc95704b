use crate::error::DiscoveryError;
use crate::models::page::{Page, PageId};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::fs;

/// 页面目录名必须是纯 ASCII 数字
fn page_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+$").expect("静态正则表达式"))
}

/// 扫描源目录，返回按页面编号数值升序排列的页面列表
///
/// 源目录不存在是致命错误；目录存在但没有页面时返回空列表。
pub async fn discover_pages(source_root: &Path) -> Result<Vec<Page>, DiscoveryError> {
    if !source_root.is_dir() {
        return Err(DiscoveryError::SourceRootMissing {
            path: source_root.to_path_buf(),
        });
    }

    let read_failed = |source| DiscoveryError::ReadFailed {
        path: source_root.to_path_buf(),
        source,
    };

    let mut pages = Vec::new();
    let mut entries = fs::read_dir(source_root).await.map_err(read_failed)?;

    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            tracing::debug!("跳过非 UTF-8 目录名: {}", path.display());
            continue;
        };

        if page_dir_pattern().is_match(name) {
            pages.push(Page::new(PageId::new(name), path.clone()));
        } else {
            tracing::debug!("跳过非页面目录: {}", name);
        }
    }

    pages.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(pages)
}
