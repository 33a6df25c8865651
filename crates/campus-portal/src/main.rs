use std::path::PathBuf;

use clap::Parser;

mod application;
mod config;
mod logger;
mod server;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Sets a port to start the portal server
    #[arg(short, long, value_name = "PORT", env = "CAMPUS_PORTAL_PORT")]
    pub port: Option<u16>,
    /// Sets the base url of the hosted session store
    #[arg(long, env = "CAMPUS_PORTAL_SESSION_STORE_URL")]
    pub session_store_url: Option<String>,
    /// Sets the api key of the hosted session store
    #[arg(long, env = "CAMPUS_PORTAL_SESSION_STORE_KEY", hide_env_values = true)]
    pub session_store_key: Option<String>,
    /// Uses the built-in demo accounts even when a hosted store is configured
    #[arg(long, env = "CAMPUS_PORTAL_DEMO_MODE")]
    pub demo_mode: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let app_config = config::load_config(args)?;

    logger::init_logger(&app_config.log);

    let application = application::Application::new(&app_config)?;

    server::run(application, (&app_config).into()).await?;
    Ok(())
}
