use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 清单中引用远程对象的字段
pub const ASSET_FIELDS: [&str; 2] = ["char", "bg"];

/// 远程素材清单
///
/// 一个 JSON 数组，每个元素的 `char` / `bg` 字段是对象键，其余字段原样保留。
#[derive(Debug, Clone)]
pub struct AssetManifest {
    pub path: PathBuf,
    pub entries: Vec<Value>,
}

/// 去掉对象键开头的斜杠
pub fn normalize_key(raw: &str) -> &str {
    raw.trim_start_matches('/')
}

impl AssetManifest {
    /// 按出现顺序列出所有对象键（已去重）
    pub fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        for entry in &self.entries {
            for field in ASSET_FIELDS {
                if let Some(raw) = entry.get(field).and_then(Value::as_str) {
                    let key = normalize_key(raw);
                    if !key.is_empty() && seen.insert(key.to_string()) {
                        keys.push(key.to_string());
                    }
                }
            }
        }

        keys
    }

    /// 将对象键替换为本地路径后的清单内容
    pub fn localized(&self, local_dir: &Path) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| {
                let mut entry = entry.clone();
                for field in ASSET_FIELDS {
                    let local = entry
                        .get(field)
                        .and_then(Value::as_str)
                        .map(|raw| local_dir.join(normalize_key(raw)));
                    if let (Some(local), Some(obj)) = (local, entry.as_object_mut()) {
                        obj.insert(
                            field.to_string(),
                            Value::String(local.to_string_lossy().to_string()),
                        );
                    }
                }
                entry
            })
            .collect()
    }

    /// 本地化清单的输出路径：`<name>_local.json`
    pub fn local_manifest_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "manifest".to_string());
        self.path.with_file_name(format!("{}_local.json", stem))
    }

    /// 写出本地化清单
    pub async fn write_localized(&self, local_dir: &Path) -> Result<PathBuf> {
        let out_path = self.local_manifest_path();
        let content = serde_json::to_string_pretty(&self.localized(local_dir))?;
        fs::write(&out_path, content)
            .await
            .with_context(|| format!("无法写入清单: {}", out_path.display()))?;
        Ok(out_path)
    }
}

/// 读取素材清单
pub async fn load_manifest(path: &Path) -> Result<AssetManifest> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取清单文件: {}", path.display()))?;

    let entries: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("无法解析清单文件: {}", path.display()))?;

    tracing::info!("已加载清单 {}，共 {} 条记录", path.display(), entries.len());

    Ok(AssetManifest {
        path: path.to_path_buf(),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest() -> AssetManifest {
        AssetManifest {
            path: PathBuf::from("/tmp/download_images.json"),
            entries: vec![
                json!({"orderId": 1, "char": "/chars/a.png", "bg": "bgs/x.png"}),
                json!({"orderId": 2, "char": "chars/a.png"}),
                json!({"orderId": 3, "bg": ""}),
            ],
        }
    }

    #[test]
    fn keys_are_normalized_and_deduplicated() {
        assert_eq!(manifest().keys(), vec!["chars/a.png", "bgs/x.png"]);
    }

    #[test]
    fn localized_rewrites_only_asset_fields() {
        let local = manifest().localized(Path::new("images"));
        assert_eq!(local[0]["orderId"], json!(1));
        assert_eq!(
            local[0]["char"],
            json!(Path::new("images").join("chars/a.png").to_string_lossy())
        );
        assert!(local[1].get("bg").is_none());
    }

    #[test]
    fn local_manifest_sits_next_to_source() {
        assert_eq!(
            manifest().local_manifest_path(),
            PathBuf::from("/tmp/download_images_local.json")
        );
    }

    #[tokio::test]
    async fn load_manifest_reads_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(&path, r#"[{"char": "/a.png"}]"#).unwrap();

        let loaded = load_manifest(&path).await.unwrap();
        assert_eq!(loaded.keys(), vec!["a.png"]);
    }
}
