//! 远程素材下载服务 - 业务能力层
//!
//! 只负责"把一个对象键下载到本地"，不关心清单和批次

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{FetchError, ResourceCleanupError};
use crate::models::{normalize_key, Outcome};

/// 单个下载任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub key: String,
    pub url: String,
    pub local_path: PathBuf,
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// 素材下载器
///
/// 职责：
/// - 对象键 → URL 和本地路径
/// - 下载单个对象，先写 `.part` 再重命名
/// - 本地已存在时跳过（除非 force）
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    base_url: String,
    output_dir: PathBuf,
    force: bool,
}

impl AssetFetcher {
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            output_dir: output_dir.into(),
            force,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 为对象键创建下载任务
    ///
    /// 拒绝空键和会跳出输出目录的键。
    pub fn task_for(&self, raw_key: &str) -> Result<FetchTask, FetchError> {
        let key = normalize_key(raw_key.trim());
        let escapes = Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(FetchError::InvalidKey {
                key: raw_key.to_string(),
            });
        }

        Ok(FetchTask {
            key: key.to_string(),
            url: format!("{}/{}", self.base_url, key),
            local_path: self.output_dir.join(key),
        })
    }

    /// 下载单个对象
    pub async fn fetch(&self, task: &FetchTask) -> Result<Outcome, FetchError> {
        if !self.force && fs::try_exists(&task.local_path).await.unwrap_or(false) {
            debug!("[{}] 本地已存在，跳过", task.key);
            return Ok(Outcome::Skipped);
        }

        let response = self
            .client
            .get(&task.url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: task.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: task.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Request {
            url: task.url.clone(),
            source,
        })?;

        let write_failed = |source| FetchError::WriteFailed {
            path: task.local_path.clone(),
            source,
        };
        if let Some(parent) = task.local_path.parent() {
            fs::create_dir_all(parent).await.map_err(write_failed)?;
        }

        let partial = partial_path(&task.local_path);
        if let Err(e) = fs::write(&partial, &body).await {
            discard_partial(&partial).await;
            return Err(write_failed(e));
        }
        if let Err(e) = fs::rename(&partial, &task.local_path).await {
            discard_partial(&partial).await;
            return Err(write_failed(e));
        }

        debug!("[{}] 已下载 {} 字节", task.key, body.len());
        Ok(Outcome::Done)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// 删除失败下载留下的 `.part` 文件，删除失败只记警告
async fn discard_partial(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => ResourceCleanupError {
            resource: path.to_path_buf(),
            source,
        }
        .log(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_maps_key_to_url_and_local_path() {
        let fetcher = AssetFetcher::new("https://cdn.example.com/", "/data/images", false);
        let task = fetcher.task_for("/chars/a.png").unwrap();
        assert_eq!(task.key, "chars/a.png");
        assert_eq!(task.url, "https://cdn.example.com/chars/a.png");
        assert_eq!(task.local_path, PathBuf::from("/data/images/chars/a.png"));
        assert_eq!(task.to_string(), "chars/a.png");
    }

    #[test]
    fn rejects_keys_outside_output_dir() {
        let fetcher = AssetFetcher::new("https://cdn.example.com", "images", false);
        for key in ["", "/", "../secret.png", "a/../../b.png"] {
            let err = fetcher.task_for(key).unwrap_err();
            assert_eq!(err.code(), "InvalidKey", "key {:?}", key);
        }
    }

    #[tokio::test]
    async fn existing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("bgs")).unwrap();
        std::fs::write(dir.path().join("bgs/x.png"), b"cached").unwrap();

        // 地址不可达，只有跳过才能成功
        let fetcher = AssetFetcher::new("http://127.0.0.1:1", dir.path(), false);
        let task = fetcher.task_for("bgs/x.png").unwrap();
        assert_eq!(fetcher.fetch(&task).await.unwrap(), Outcome::Skipped);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AssetFetcher::new("http://127.0.0.1:1", dir.path(), true);
        let task = fetcher.task_for("chars/a.png").unwrap();

        let err = fetcher.fetch(&task).await.unwrap_err();
        assert_eq!(err.code(), "RequestFailed");
        assert!(!task.local_path.exists());
    }

    /// 本地 HTTP 服务，对任意请求返回固定内容
    async fn serve_once(body: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn downloaded_body_lands_at_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = AssetFetcher::new(serve_once(b"png").await, dir.path(), false);
        let task = fetcher.task_for("chars/a.png").unwrap();

        assert_eq!(fetcher.fetch(&task).await.unwrap(), Outcome::Done);
        assert_eq!(std::fs::read(&task.local_path).unwrap(), b"png");
        assert!(!partial_path(&task.local_path).exists());
    }

    #[tokio::test]
    async fn failed_rename_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // 目标位置被非空目录占据，重命名必然失败
        let blocker = dir.path().join("chars/a.png");
        std::fs::create_dir_all(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), b"x").unwrap();

        let fetcher = AssetFetcher::new(serve_once(b"png").await, dir.path(), true);
        let task = fetcher.task_for("chars/a.png").unwrap();

        let err = fetcher.fetch(&task).await.unwrap_err();
        assert_eq!(err.code(), "WriteFailed");
        assert!(!partial_path(&task.local_path).exists());
        assert_eq!(std::fs::read_dir(dir.path().join("chars")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn discarding_a_missing_partial_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("gone.png.part");
        discard_partial(&partial).await;

        std::fs::write(&partial, b"half").unwrap();
        discard_partial(&partial).await;
        assert!(!partial.exists());
    }

    #[test]
    fn partial_file_sits_next_to_target() {
        assert_eq!(
            partial_path(Path::new("/a/b/c.png")),
            PathBuf::from("/a/b/c.png.part")
        );
    }
}
