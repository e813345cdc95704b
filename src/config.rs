use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::infrastructure::HostConfig;
use crate::models::{ExportMode, ExportOptions, LayerSpec, TargetEncoding, VectorBackend};
use crate::services::exporter;

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_PATH_VAR: &str = "LAYERSTACK_CONFIG";

/// 程序配置文件
///
/// 加载顺序：默认值 → `LAYERSTACK_CONFIG` 指定的 TOML 文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 页面源目录根
    pub source_root: PathBuf,
    /// 输出目录根
    pub output_root: PathBuf,
    pub mode: ExportMode,
    pub encoding: TargetEncoding,
    pub vector_backend: VectorBackend,
    /// 每批同时处理的页面数量
    pub concurrency_limit: usize,
    /// 批次之间的暂停（毫秒）
    pub pacing_ms: u64,
    pub embed_assets: bool,
    pub compress: bool,
    pub pdf_compatible: bool,
    pub compatibility_profile: Option<u16>,
    pub skip_label_layer: bool,
    pub thumbnail: bool,
    /// 自定义图层列表（自下而上），不设置时使用标准词表
    pub layers: Option<Vec<String>>,
    /// 运行日志文件
    pub run_log_file: PathBuf,
    // --- 宿主程序 ---
    pub host_program: String,
    pub host_args: Vec<String>,
    // --- 远程素材下载 ---
    pub fetch: FetchConfig,
}

/// 远程素材下载配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// JSON 清单路径
    pub manifest: Option<PathBuf>,
    pub base_url: Option<String>,
    pub output_dir: PathBuf,
    pub concurrency_limit: usize,
    pub force: bool,
    /// 成功后写出 `<name>_local.json`
    pub update_manifest: bool,
}

impl Default for Config {
    fn default() -> Self {
        let host = HostConfig::default();
        Self {
            source_root: PathBuf::from("output"),
            output_root: PathBuf::from("."),
            mode: ExportMode::Standard,
            encoding: TargetEncoding::Vector,
            vector_backend: VectorBackend::Svg,
            concurrency_limit: 3,
            pacing_ms: 1000,
            embed_assets: true,
            compress: true,
            pdf_compatible: false,
            compatibility_profile: None,
            skip_label_layer: false,
            thumbnail: true,
            layers: None,
            run_log_file: PathBuf::from("layerstack_run.log"),
            host_program: host.program,
            host_args: host.args,
            fetch: FetchConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            base_url: None,
            output_dir: PathBuf::from("images"),
            concurrency_limit: 5,
            force: false,
            update_manifest: false,
        }
    }
}

impl Config {
    /// 默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides_from(|key| std::env::var(key).ok())
    }

    /// 完整加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_toml_file(Path::new(&path))?,
            None => Self::default(),
        };
        let config = base.with_overrides_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取，缺省的字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 用查找函数提供的值覆盖配置
    ///
    /// 查找函数通常是环境变量，测试中可以换成 HashMap。
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("LAYERSTACK_SOURCE_ROOT") {
            self.source_root = PathBuf::from(v);
        }
        if let Some(v) = get("LAYERSTACK_OUTPUT_ROOT") {
            self.output_root = PathBuf::from(v);
        }
        if let Some(v) = get("LAYERSTACK_MODE") {
            self.mode = v.parse()?;
        }
        if let Some(v) = get("LAYERSTACK_ENCODING") {
            self.encoding = v.parse()?;
        }
        if let Some(v) = get("LAYERSTACK_VECTOR_BACKEND") {
            self.vector_backend = v.parse()?;
        }
        if let Some(v) = get("LAYERSTACK_CONCURRENCY") {
            self.concurrency_limit = parse_number("LAYERSTACK_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_PACING_MS") {
            self.pacing_ms = parse_number("LAYERSTACK_PACING_MS", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_EMBED_ASSETS") {
            self.embed_assets = parse_bool("LAYERSTACK_EMBED_ASSETS", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_COMPRESS") {
            self.compress = parse_bool("LAYERSTACK_COMPRESS", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_PDF_COMPATIBLE") {
            self.pdf_compatible = parse_bool("LAYERSTACK_PDF_COMPATIBLE", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_COMPAT_PROFILE") {
            self.compatibility_profile = Some(parse_number("LAYERSTACK_COMPAT_PROFILE", &v)?);
        }
        if let Some(v) = get("LAYERSTACK_SKIP_LABELS") {
            self.skip_label_layer = parse_bool("LAYERSTACK_SKIP_LABELS", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_THUMBNAIL") {
            self.thumbnail = parse_bool("LAYERSTACK_THUMBNAIL", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_RUN_LOG") {
            self.run_log_file = PathBuf::from(v);
        }
        if let Some(v) = get("LAYERSTACK_HOST_PROGRAM") {
            self.host_program = v;
        }

        // --- 远程素材下载 ---
        if let Some(v) = get("LAYERSTACK_FETCH_MANIFEST") {
            self.fetch.manifest = Some(PathBuf::from(v));
        }
        if let Some(v) = get("LAYERSTACK_FETCH_BASE_URL") {
            self.fetch.base_url = Some(v);
        }
        if let Some(v) = get("LAYERSTACK_FETCH_DIR") {
            self.fetch.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LAYERSTACK_FETCH_CONCURRENCY") {
            self.fetch.concurrency_limit = parse_number("LAYERSTACK_FETCH_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_FETCH_FORCE") {
            self.fetch.force = parse_bool("LAYERSTACK_FETCH_FORCE", &v)?;
        }
        if let Some(v) = get("LAYERSTACK_FETCH_UPDATE_MANIFEST") {
            self.fetch.update_manifest = parse_bool("LAYERSTACK_FETCH_UPDATE_MANIFEST", &v)?;
        }

        Ok(self)
    }

    /// 运行开始前的校验，失败即中止整个运行
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::invalid("concurrency_limit", "0", "a positive integer"));
        }
        if self.fetch.concurrency_limit == 0 {
            return Err(ConfigError::invalid(
                "fetch.concurrency_limit",
                "0",
                "a positive integer",
            ));
        }
        self.layer_spec()?;
        exporter::validate_options(&self.export_options())?;
        Ok(())
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            encoding: self.encoding,
            vector_backend: self.vector_backend,
            compatibility_profile: self.compatibility_profile,
            compress: self.compress,
            embed_assets: self.embed_assets,
            pdf_compatible: self.pdf_compatible,
            thumbnail: self.thumbnail,
            skip_label_layer: self.skip_label_layer,
            concurrency_limit: self.concurrency_limit,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }

    /// 当前模式下的图层规格
    pub fn layer_spec(&self) -> Result<LayerSpec, ConfigError> {
        self.export_options()
            .layer_spec(self.mode, self.layers.as_deref())
    }

    pub fn host_config(&self) -> HostConfig {
        HostConfig {
            program: self.host_program.clone(),
            args: self.host_args.clone(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, value, "a non-negative integer"))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "true | false")),
    }
}
