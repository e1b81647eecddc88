mod app;
mod config;
mod controls;
mod hardware;
mod knob;
mod system;
mod util;

#[cfg(feature = "hardware")]
use anyhow::Result;

#[cfg(feature = "hardware")]
fn main() -> Result<()> {
    init_tracing();

    let config = app::AppConfig::load();
    let mut app = app::App::new(config)?;
    app.set_shutdown_channel(app::install_shutdown_signals()?);
    app.run()
}

#[cfg(not(feature = "hardware"))]
fn main() {
    init_tracing();
    eprintln!(
        "musicbox_ctrl was built without the `hardware` feature. Enable it to read the knobs over GPIO."
    );
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .compact()
        .try_init();
}
