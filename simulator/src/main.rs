use anyhow::Context;
use clap::Parser;
use replay::{replay, ReplayOptions};
use service::config::SimulatorConfig;
use sigcore::config::Domain;
use sigcore::interface::HttpBackend;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;

mod analysis;
mod generator;
mod replay;
mod service;

#[derive(Parser)]
#[command(author, version, about = "Mock analysis service and headless dashboard replay")]
struct Args {
    /// Run the mock analysis service until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Address the service binds to (overrides the config file)
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Load simulator and dashboard settings from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Play a WAV file through the dashboard controller and log every frame
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Service the replay talks to; an in-process service is started when omitted
    #[arg(long)]
    base_url: Option<String>,
    /// Audio page to emulate: drone, human or doppler
    #[arg(long)]
    domain: Option<Domain>,
    /// Also stream the resampled comparison viewer during replay
    #[arg(long, default_value_t = false)]
    compare: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        SimulatorConfig::load(path)?
    } else {
        SimulatorConfig::default()
    };
    if let Some(bind) = args.bind {
        config.service.bind = bind;
    }
    if let Some(domain) = args.domain {
        config.dashboard.backend.domain = domain;
    }

    if args.replay.is_none() && !args.serve {
        log::warn!("nothing to do: pass --serve and/or --replay <wav>");
        return Ok(());
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    runtime.block_on(async move {
        if let Some(path) = &args.replay {
            match &args.base_url {
                Some(url) => config.dashboard.backend.base_url = url.clone(),
                None => {
                    let addr = service::spawn_ephemeral(config.service.clone());
                    config.dashboard.backend.base_url = format!("http://{}/api", addr);
                }
            }
            let backend = HttpBackend::new(&config.dashboard.backend, &config.dashboard.controller);
            let options = ReplayOptions {
                compare: args.compare,
                ..ReplayOptions::default()
            };
            let summary = replay(path, backend, &config.dashboard, &options)
                .await
                .with_context(|| format!("replaying {}", path.display()))?;
            println!(
                "Replay -> prediction {}, windows {}, members {:?}, chunk requests {} (peak in flight {})",
                summary.prediction.as_deref().unwrap_or("none"),
                summary.windows,
                summary.members,
                summary.metrics.chunk.issued,
                summary.metrics.peak_outstanding_chunks
            );
        }
        if args.serve {
            service::serve(config.service).await?;
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}
