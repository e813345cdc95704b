//! 宿主程序执行器 - 基础设施层
//!
//! 持有唯一的宿主图形程序资源，只暴露"执行脚本"的能力

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ExportError, ResourceCleanupError};

/// 脚本路径占位符
pub const SCRIPT_PLACEHOLDER: &str = "{script}";

/// 平台资源探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Found,
    NotFound,
}

impl Capability {
    pub fn is_found(self) -> bool {
        matches!(self, Capability::Found)
    }
}

/// 宿主程序调用方式
///
/// `args` 中的 `{script}` 会被替换为脚本文件路径，
/// 其它 `{name}` 占位符由调用方通过替换表提供。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            program: "osascript".to_string(),
            args: vec![
                "-e".to_string(),
                format!(
                    r#"tell application id "com.adobe.illustrator" to do javascript file "{}""#,
                    SCRIPT_PLACEHOLDER
                ),
            ],
        }
    }
}

/// 在 PATH 中查找程序，进程启动时调用一次
pub fn probe_program(program: &str) -> Capability {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Capability::Found
        } else {
            Capability::NotFound
        };
    }

    let Some(paths) = env::var_os("PATH") else {
        return Capability::NotFound;
    };

    let found = env::split_paths(&paths).any(|dir| {
        let full = dir.join(program);
        full.is_file() || (cfg!(windows) && full.with_extension("exe").is_file())
    });

    if found {
        Capability::Found
    } else {
        Capability::NotFound
    }
}

/// 宿主程序执行器
///
/// 职责：
/// - 持有宿主程序的调用配置
/// - 暴露 run_script() 能力
/// - 不认识图层 / 页面
/// - 临时脚本文件在任何退出路径上都会被删除
#[derive(Debug)]
pub struct HostExecutor {
    config: HostConfig,
}

impl HostExecutor {
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }

    pub fn program(&self) -> &str {
        &self.config.program
    }

    pub fn probe(&self) -> Capability {
        probe_program(&self.config.program)
    }

    /// 执行脚本并返回宿主程序的标准输出
    ///
    /// # 参数
    /// - `script`: 脚本内容
    /// - `substitutions`: 额外的占位符替换，如 `("output", path)`
    pub async fn run_script(
        &self,
        script: &str,
        substitutions: &[(&str, &Path)],
    ) -> Result<String, ExportError> {
        let script_path = write_scratch_script(script)?;
        debug!("临时脚本: {}", script_path.display());

        let args = self.expand_args(&script_path, substitutions);
        let output = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        release_scratch_script(script_path);

        let output = output.map_err(|e| ExportError::HostFailed {
            message: format!("无法启动 {}: {}", self.config.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::HostFailed {
                message: format!("{} 退出状态 {}: {}", self.config.program, output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn expand_args(&self, script: &Path, substitutions: &[(&str, &Path)]) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| {
                let mut arg = arg.replace(SCRIPT_PLACEHOLDER, &script.to_string_lossy());
                for (name, value) in substitutions {
                    arg = arg.replace(&format!("{{{}}}", name), &value.to_string_lossy());
                }
                arg
            })
            .collect()
    }
}

fn write_scratch_script(script: &str) -> Result<PathBuf, ExportError> {
    let dir = env::temp_dir();
    let mut file = tempfile::Builder::new()
        .prefix("layerstack_")
        .suffix(".jsx")
        .tempfile_in(&dir)
        .map_err(|e| ExportError::write_failed(&dir, e))?;

    file.write_all(script.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| ExportError::write_failed(file.path(), e))?;

    // 关闭句柄后再交给宿主程序读取，删除由 release_scratch_script 负责
    let (_, path) = file.keep().map_err(|e| ExportError::write_failed(&dir, e.error))?;
    Ok(path)
}

fn release_scratch_script(path: PathBuf) {
    if let Err(source) = std::fs::remove_file(&path) {
        ResourceCleanupError {
            resource: path,
            source,
        }
        .log();
    }
}
