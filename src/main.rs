use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docsum::{
    api, config, logging,
    processing::{self, FileRegistration, PipelineService},
    store::{InMemoryStore, LifecycleStore},
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "docsum",
    version,
    about = "Summarize documents with a map-reduce language-model pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Register and summarize one file, printing the summary record as JSON.
    Summarize {
        path: PathBuf,
        #[arg(long)]
        media_type: Option<String>,
        #[arg(long)]
        upload_id: Option<String>,
    },
    /// Print the detected type of a file.
    Detect {
        path: PathBuf,
        #[arg(long)]
        media_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::init_config().context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Summarize {
            path,
            media_type,
            upload_id,
        } => summarize(config, path, media_type, upload_id).await,
        Command::Detect { path, media_type } => {
            println!("{}", processing::detect(&path, media_type.as_deref()));
            Ok(())
        }
    }
}

async fn serve(config: &config::Config) -> Result<()> {
    let store: Arc<dyn LifecycleStore> = Arc::new(InMemoryStore::new());
    let service = PipelineService::from_config(config, store)?;
    let app = api::create_router(Arc::new(service));

    if config.storage_root.is_none() && !config.server_host.is_loopback() {
        tracing::warn!(
            host = %config.server_host,
            "STORAGE_ROOT is unset; remote clients can register any readable path"
        );
    }
    let (listener, address) = bind_listener(config.server_host, config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://{address}");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn summarize(
    config: &config::Config,
    path: PathBuf,
    media_type: Option<String>,
    upload_id: Option<String>,
) -> Result<()> {
    let store: Arc<dyn LifecycleStore> = Arc::new(InMemoryStore::new());
    let service = PipelineService::from_config(config, store)?;
    let file = service
        .register_file(FileRegistration {
            path,
            filename: None,
            declared_media_type: media_type,
            upload_id,
        })
        .await?;
    let record = service.process_stored(&file.id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn bind_listener(
    host: IpAddr,
    configured_port: Option<u16>,
) -> Result<(TcpListener, SocketAddr), std::io::Error> {
    if let Some(port) = configured_port {
        let listener = TcpListener::bind((host, port)).await?;
        let address = listener.local_addr()?;
        return Ok((listener, address));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4200..=4299;
    for port in PORT_RANGE {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                let address = listener.local_addr()?;
                return Ok((listener, address));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4200-4299",
    ))
}
