//! optimg - An HTTP image delivery server.
//!
//! This binary loads the configuration, wires the resolver together, and
//! starts the HTTP listener.

use std::process::ExitCode;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use optimg::{
    config::Cli,
    server::{create_router, RouterConfig},
    Config, ImageService, ImageTranscoder, JobLimiter, ProfileStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {:?}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    run_serve(config).await
}

async fn run_serve(config: Config) -> ExitCode {
    info!("Configuration:");
    info!("  Originals root: {:?}", config.originals_base);
    info!(
        "  Auto-optimize: {}",
        if config.auto_optimize.enable { "enabled" } else { "disabled" }
    );
    if config.job_limit == 0 {
        info!("  Job limit: unlimited");
    } else {
        info!("  Job limit: {}", config.job_limit);
    }

    let profiles = Arc::new(ProfileStore::from_config(&config.preset_optimize));
    info!("  Presets: {} configured", profiles.len());

    let limiter = JobLimiter::new(config.job_limit);
    let transcoder = Arc::new(ImageTranscoder::new());

    let service = ImageService::new(
        config.originals_base.clone(),
        config.auto_optimize.clone(),
        profiles,
        limiter,
        transcoder,
    );

    let (max_age, stale) = config.browser_ttl();
    let router_config = RouterConfig::new()
        .with_metrics(config.metrics)
        .with_browser_ttl(max_age, stale);
    let router = create_router(service, router_config);

    let addr: std::net::SocketAddr = match config.bind.address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {:?}: {}", config.bind.address(), e);
            return ExitCode::FAILURE;
        }
    };

    let serve_result = match config.bind.tls {
        Some(ref tls) => {
            info!("Server listening on https://{}", addr);
            let rustls_config =
                match RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file).await {
                    Ok(rustls_config) => rustls_config,
                    Err(e) => {
                        error!("Failed to load TLS material: {}", e);
                        return ExitCode::FAILURE;
                    }
                };
            axum_server::bind_rustls(addr, rustls_config)
                .serve(router.into_make_service())
                .await
        }
        None => {
            info!("Server listening on http://{}", addr);
            axum_server::bind(addr)
                .serve(router.into_make_service())
                .await
        }
    };

    if let Err(e) = serve_result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "optimg=debug,tower_http=debug"
    } else {
        "optimg=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
