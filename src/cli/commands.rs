use crate::cli::Commands;
use crate::config::Config;
use crate::directory::PodDirectory;
use crate::dns::{DnsServer, Forwarder, Handler, PodDnsHandler};
use crate::k8s::{user_pod_records, DirectorySynchronizer, KubeletClient, PodSource};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn handle_command(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Serve { bind, upstream } => {
            if let Some(addr) = bind {
                config.dns.bind_addr = addr;
            }
            if upstream.is_some() {
                config.dns.upstream = upstream;
            }
            handle_serve(config).await
        }
        Commands::Pods => handle_pods(config).await,
    }
}

async fn handle_serve(config: Config) -> Result<()> {
    let client = KubeletClient::new(config.kubelet.clone(), config.instance_id.clone())
        .context("Failed to create kubelet client")?;

    match client.healthy().await {
        Ok(true) => info!("Kubelet is healthy"),
        Ok(false) => warn!("Kubelet healthz check did not return 200"),
        Err(e) => warn!(error = %e, "Kubelet healthz check failed"),
    }

    let shutdown = CancellationToken::new();
    let directory = PodDirectory::new();

    let sync = DirectorySynchronizer::new(
        Arc::new(client),
        directory.clone(),
        config.sync_interval(),
    )
    .with_cancellation(shutdown.clone())
    .spawn();

    let mut handler =
        PodDnsHandler::new(directory, config.record_ttl).with_no_match(config.no_match);
    if let Some(upstream) = config.dns.upstream {
        info!(upstream = %upstream, "Forwarding names outside cluster.local.");
        handler = handler.with_next(Arc::new(Forwarder::new(
            upstream,
            config.dns.forward_timeout(),
        )));
    }
    let handler: Arc<dyn Handler> = Arc::new(handler);

    let server = DnsServer::bind(config.dns.bind_addr, handler)
        .await
        .with_context(|| format!("Failed to bind {}", config.dns.bind_addr))?
        .with_cancellation(shutdown.clone());
    let server = tokio::spawn(server.run());

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    server.await??;
    sync.await?;
    Ok(())
}

async fn handle_pods(config: Config) -> Result<()> {
    let client = KubeletClient::new(config.kubelet, config.instance_id)
        .context("Failed to create kubelet client")?;

    let pods = client.list_pods().await.context("Failed to list pods")?;
    let records = user_pod_records(&pods);

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
