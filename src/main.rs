mod app;
mod cli;
mod config;
mod conversation;
mod page;
mod paths;
mod provider;
mod secrets;
mod turn;
mod web;

#[cfg(feature = "tui")]
mod tui;

use clap::Parser;
use config::Settings;
use turn::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config_dir = paths::ConfigDir::locate()?;
    let cfg = config::Config::load_optional(&config_dir.config_file())?;
    tracing::debug!(?config_dir, ?cfg, "resolved config");

    let store = secrets::SecretStore::new(config_dir.secrets_file());
    let http = app::http_client()?;

    let bind = match args.cmd {
        #[cfg(feature = "tui")]
        Some(cli::Command::Tui) => {
            let settings = Settings::resolve(cfg.as_ref(), args.model, args.provider, None);
            // Credential failure ends the process before the terminal is taken over.
            let client = app::build_client(&http, &settings, &store)?;
            let session = Session::new(settings.system_instruction.clone());
            return tui::run_tui(&settings.title, client, session).await;
        }
        Some(cli::Command::Serve { bind }) => bind,
        None => None,
    };

    let settings = Settings::resolve(cfg.as_ref(), args.model, args.provider, bind);

    let state = match app::build_client(&http, &settings, &store) {
        Ok(client) => web::AppState::ready(
            settings.title.clone(),
            client,
            Session::new(settings.system_instruction.clone()),
        ),
        Err(e) => {
            tracing::error!("startup halted: {e:#}");
            web::AppState::halted(settings.title.clone(), format!("{e:#}"))
        }
    };

    web::serve(state, &settings.bind).await
}
