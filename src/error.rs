use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
///
/// 页面级错误（装配、导出、下载）在任务边界被捕获并记为失败结果，
/// 只有发现错误和配置错误会中止整个运行。
#[derive(Debug, Error)]
pub enum AppError {
    /// 页面发现错误
    #[error("发现错误: {0}")]
    Discovery(#[from] DiscoveryError),
    /// 图层装配错误
    #[error("装配错误: {0}")]
    Assembly(#[from] AssemblyError),
    /// 文档导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 远程资源下载错误
    #[error("下载错误: {0}")]
    Fetch(#[from] FetchError),
    /// 后台任务异常退出（panic 或被取消）
    #[error("任务执行失败: {message}")]
    Task { message: String },
}

impl AppError {
    /// 稳定的错误代码，用于运行汇总和日志
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Discovery(e) => e.code(),
            AppError::Assembly(e) => e.code(),
            AppError::Export(e) => e.code(),
            AppError::Config(_) => "ConfigInvalid",
            AppError::Fetch(e) => e.code(),
            AppError::Task { .. } => "TaskFailed",
        }
    }

    /// 创建任务失败错误
    pub fn task(message: impl Into<String>) -> Self {
        AppError::Task {
            message: message.into(),
        }
    }
}

/// 页面发现错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 源目录不存在
    #[error("源目录不存在: {}", .path.display())]
    SourceRootMissing { path: PathBuf },
    /// 读取源目录失败
    #[error("无法读取源目录 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DiscoveryError {
    pub fn code(&self) -> &'static str {
        match self {
            DiscoveryError::SourceRootMissing { .. } => "SourceRootMissing",
            DiscoveryError::ReadFailed { .. } => "DiscoveryReadFailed",
        }
    }
}

/// 图层装配错误
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// 页面目录不存在
    #[error("页面目录不存在: {}", .path.display())]
    SourceMissing { path: PathBuf },
    /// 无法解析页面目录的绝对路径
    #[error("无法解析页面目录 ({}): {source}", .path.display())]
    SourceUnresolved {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 页面目录中没有任何图层文件
    #[error("页面 {page} 没有找到任何图层文件")]
    NoLayersFound { page: String },
    /// 探测图像尺寸失败
    #[error("无法读取图像尺寸 ({}): {source}", .path.display())]
    ProbeFailed {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// 图像尺寸为零
    #[error("图像尺寸无效 ({}): {width}x{height}", .path.display())]
    EmptyImage {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

impl AssemblyError {
    pub fn code(&self) -> &'static str {
        match self {
            AssemblyError::SourceMissing { .. } => "SourceMissing",
            AssemblyError::SourceUnresolved { .. } => "SourceUnresolved",
            AssemblyError::NoLayersFound { .. } => "NoLayersFound",
            AssemblyError::ProbeFailed { .. } => "ProbeFailed",
            AssemblyError::EmptyImage { .. } => "EmptyImage",
        }
    }
}

/// 文档导出错误
#[derive(Debug, Error)]
pub enum ExportError {
    /// 写入输出文件失败
    #[error("写入文件失败 ({}): {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 读取图层源文件失败
    #[error("读取图层文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 解码图层图像失败
    #[error("解码图层图像失败 ({}): {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// 编码输出图像失败
    #[error("页面 {page} 编码失败: {source}")]
    Encode {
        page: String,
        #[source]
        source: image::ImageError,
    },
    /// 编码格式不支持该选项
    #[error("{encoding} 不支持选项: {option}")]
    UnsupportedOption {
        encoding: &'static str,
        option: String,
    },
    /// 宿主程序执行失败
    #[error("宿主程序执行失败: {message}")]
    HostFailed { message: String },
}

impl ExportError {
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::WriteFailed { .. } => "WriteFailed",
            ExportError::ReadFailed { .. } => "ReadFailed",
            ExportError::Decode { .. } => "DecodeFailed",
            ExportError::Encode { .. } => "EncodeFailed",
            ExportError::UnsupportedOption { .. } => "UnsupportedOption",
            ExportError::HostFailed { .. } => "HostFailed",
        }
    }

    pub fn unsupported(encoding: &'static str, option: impl Into<String>) -> Self {
        ExportError::UnsupportedOption {
            encoding,
            option: option.into(),
        }
    }

    pub fn write_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExportError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置值无法解析或超出范围
    #[error("配置项 {key} 的值 '{value}' 无效，期望 {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
    /// 读取配置文件失败
    #[error("无法读取配置文件 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({}): {source}", .path.display())]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 图层列表为空
    #[error("图层列表不能为空")]
    EmptyLayerSpec,
    /// 图层名称重复
    #[error("图层名称重复: {name}")]
    DuplicateLayer { name: String },
    /// 导出选项组合不受支持
    #[error("导出选项不受支持: {0}")]
    Unsupported(#[from] ExportError),
    /// 宿主程序不可用
    #[error("找不到宿主程序: {program}")]
    HostUnavailable { program: String },
    /// 缺少必需的配置项
    #[error("缺少配置项: {key}")]
    Missing { key: &'static str },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            expected,
        }
    }
}

/// 远程资源下载错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 对象键无效
    #[error("对象键无效: '{key}'")]
    InvalidKey { key: String },
    /// HTTP 请求失败
    #[error("请求失败 ({url}): {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 服务器返回错误状态码
    #[error("服务器返回错误状态 ({url}): {status}")]
    Status { url: String, status: u16 },
    /// 写入本地文件失败
    #[error("写入本地文件失败 ({}): {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::InvalidKey { .. } => "InvalidKey",
            FetchError::Request { .. } => "RequestFailed",
            FetchError::Status { .. } => "BadStatus",
            FetchError::WriteFailed { .. } => "WriteFailed",
        }
    }
}

/// 资源释放失败
///
/// 只记录日志，永远不向上传播。
#[derive(Debug, Error)]
#[error("释放临时资源失败 ({}): {source}", .resource.display())]
pub struct ResourceCleanupError {
    pub resource: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ResourceCleanupError {
    /// 以警告级别记录，不中断调用方
    pub fn log(self) {
        tracing::warn!("⚠️ {}", self);
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_pass_through_app_error() {
        let err: AppError = AssemblyError::NoLayersFound {
            page: "2".to_string(),
        }
        .into();
        assert_eq!(err.code(), "NoLayersFound");

        let err: AppError = ExportError::unsupported("svg", "pdf-compatible").into();
        assert_eq!(err.code(), "UnsupportedOption");
        assert!(err.to_string().contains("pdf-compatible"));

        assert_eq!(AppError::task("panicked").code(), "TaskFailed");
    }

    #[test]
    fn config_error_wraps_export_error() {
        let err: ConfigError = ExportError::unsupported("psd", "compatibility profile 2").into();
        assert!(matches!(err, ConfigError::Unsupported(_)));
    }
}
