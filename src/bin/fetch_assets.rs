use anyhow::Result;
use layerstack::utils::logging;
use layerstack::{run_fetch, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load()?;

    // 下载清单中的素材
    let summary = run_fetch(&config).await?;

    if !summary.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
