use anyhow::Context;
use laserdeck::{console, init_logging, ClientSettings, BUILD_DATE, VERSION};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_file = std::env::var_os("LASERDECK_LOG").map(PathBuf::from);
    init_logging(log_file.as_deref())?;

    let settings_path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => ClientSettings::default_path()?,
    };
    let settings = ClientSettings::load_or_default(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

    tracing::info!("LaserDeck {} (built {})", VERSION, BUILD_DATE);
    console::run(settings).await
}
