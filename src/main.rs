use job_distributor::config::Config;
use job_distributor::distributor::handlers::routes;
use job_distributor::distributor::service::DistributorService;
use job_distributor::node_client::registry::ClientRegistry;
use job_distributor::store::memory::MemoryStore;
use job_distributor::store::store::Store;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let Some(path) = args.get(i + 1) else {
                    eprintln!("Usage: {} [--config <path.json>]", args[0]);
                    std::process::exit(1);
                };
                config_path = Some(PathBuf::from(path));
                i += 2;
            }
            "--help" | "-h" => {
                eprintln!("Usage: {} [--config <path.json>]", args[0]);
                eprintln!("Example: JD_PORT=50051 {} --config nodes.json", args[0]);
                return Ok(());
            }
            _ => {
                i += 1;
            }
        }
    }

    let config = Config::load(config_path)?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .init();

    // 1. State and node clients:
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clients = ClientRegistry::new(config.node_timeout());
    let service = DistributorService::new(store, clients);

    // 2. Nodes declared in the config file:
    connect_configured_nodes(&service, &config).await;

    // 3. HTTP API:
    let app = routes(service.clone());

    tracing::info!("Job distributor listening on {}", config.bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Registers every configured node and tries to connect it.
/// A node that cannot be reached stays registered without a client.
async fn connect_configured_nodes(service: &DistributorService, config: &Config) {
    for node_config in &config.nodes {
        let node = match service.register_node(
            &node_config.name,
            &node_config.public_key,
            node_config.labels.clone(),
        ) {
            Ok(node) => node,
            Err(e) => {
                tracing::error!("Skipping configured node {}: {}", node_config.name, e);
                continue;
            }
        };

        match service
            .connect_node(&node.id, &node_config.url, node_config.credentials.clone())
            .await
        {
            Ok(_) => tracing::info!("Node {} ({}) connected", node.name, node.id),
            Err(e) => tracing::warn!(
                "Node {} ({}) registered but not connected: {}",
                node.name,
                node.id,
                e
            ),
        }
    }

    if !config.nodes.is_empty() {
        tracing::info!(
            "{} of {} configured node(s) connected: {:?}",
            service.clients().len(),
            config.nodes.len(),
            service.clients().node_ids()
        );
    }
}
