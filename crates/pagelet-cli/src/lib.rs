use clap::Parser;
use pagelet_web::{AxumPageletAdapter, PageletEngine, SiteConfig, load_site_config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Serve a directory of page scripts as server-rendered HTML.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagelet", version, about)]
pub struct Cli {
    /// Content root holding `<page>.js` scripts and `index.tmpl`.
    #[arg(default_value = ".")]
    pub root: PathBuf,
    #[arg(long, default_value_t = 8080)]
    pub port: u16,
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

pub async fn run_from_env() -> Result<(), String> {
    run(Cli::parse()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<(), String> {
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;
    run(cli).await
}

pub async fn run(cli: Cli) -> Result<(), String> {
    init_tracing(cli.verbose);

    let root = cli
        .root
        .canonicalize()
        .map_err(|e| format!("failed to resolve {}: {e}", cli.root.display()))?;
    let config = load_site_config(&root).map_err(|e| e.to_string())?;
    run_server(config, &cli.bind, cli.port).await
}

/// Installs the fmt subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(filter),
        )
        .try_init();
}

async fn run_server(config: SiteConfig, bind: &str, port: u16) -> Result<(), String> {
    if !config.template_path().is_file() {
        warn!(
            template = %config.template_path().display(),
            "template not found; every page will fail until it exists"
        );
    }

    let root = config.root_path.clone();
    let engine = Arc::new(PageletEngine::new(config));
    let app = AxumPageletAdapter::new(engine).router();

    let host = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&host)
        .await
        .map_err(|e| format!("failed to bind {host}: {e}"))?;
    info!(root = %root.display(), url = %format!("http://localhost:{port}"), "serving pages");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server failed: {e}"))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_development_server() {
        let cli = Cli::try_parse_from(["pagelet"]).expect("no args is valid");
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.bind, "0.0.0.0");
        assert!(!cli.verbose);
    }

    #[test]
    fn test_root_and_flags_parse() {
        let cli = Cli::try_parse_from(["pagelet", "site", "--port", "3000", "-v"])
            .expect("args are valid");
        assert_eq!(cli.root, PathBuf::from("site"));
        assert_eq!(cli.port, 3000);
        assert!(cli.verbose);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Cli::try_parse_from(["pagelet", "--port", "http"]).is_err());
    }

    #[tokio::test]
    async fn test_missing_root_fails_before_binding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        let err = run_from_args(vec![
            "pagelet".to_string(),
            missing.display().to_string(),
        ])
        .await
        .unwrap_err();
        assert!(err.contains("failed to resolve"), "{err}");
    }
}
