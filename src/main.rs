use anyhow::Result;
use layerstack::utils::logging;
use layerstack::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::load()?;

    // 初始化并运行应用
    let summary = App::initialize(config)?.run().await?;

    if !summary.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
