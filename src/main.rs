use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hls_restream::{Mode, RegistryConfig, RestartPolicy, RestreamServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "restream")]
#[command(about = "Restream remote HLS or MPEG-TS sources as local HLS")]
#[command(version)]
struct Args {
    /// Stream policy: single or multi
    #[arg(long, env = "RESTREAM_MODE", default_value = "single")]
    mode: Mode,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Directory the transcoders write manifests and segments into
    #[arg(long, env = "RESTREAM_OUTPUT_DIR", default_value = "public/stream")]
    output_dir: PathBuf,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Seconds before an exited transcoder is restarted, 0 to never restart
    /// (defaults to 5 in single mode and 0 in multi mode)
    #[arg(long)]
    restart_delay: Option<u64>,

    /// Target segment duration in seconds
    #[arg(long, default_value_t = 4)]
    hls_time: u32,

    /// Segments kept in the playlist
    #[arg(long, default_value_t = 6)]
    hls_list_size: u32,

    /// Do not serve the output directory under /stream
    #[arg(long)]
    no_serve_output: bool,

    /// Do not serve the HTML form at /
    #[arg(long)]
    no_index: bool,
}

impl Args {
    fn registry_config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::with_mode(self.mode)
            .output_dir(&self.output_dir)
            .ffmpeg_path(&self.ffmpeg)
            .hls_time(self.hls_time)
            .hls_list_size(self.hls_list_size);

        if let Some(secs) = self.restart_delay {
            config = config.restart_policy(match secs {
                0 => RestartPolicy::Never,
                secs => RestartPolicy::After(Duration::from_secs(secs)),
            });
        }

        config
    }

    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::with_addr(SocketAddr::new(self.host, self.port));
        if self.no_serve_output {
            config = config.disable_output_serving();
        }
        if self.no_index {
            config = config.disable_index_page();
        }
        config
    }
}

#[tokio::main]
async fn main() -> hls_restream::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let server = RestreamServer::new(args.server_config(), args.registry_config());

    server.run_until(shutdown_signal()).await
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
