use musconfig::get_config;
use musrelay::{RelayApiDoc, RelayState, create_router};
use musserver::{LoggingOptions, ServerBuilder};
use tracing::info;
use utoipa::OpenApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();

    // ========== PHASE 1 : Serveur et journalisation ==========

    let mut server = ServerBuilder::new_configured().build();
    server
        .init_logging(LoggingOptions::from_config(&config))
        .await;
    info!(config_dir = config.directory(), "Configuration loaded");

    // Route de statut : {status, versao, ambiente}
    let ambiente = config.get_environment();
    server
        .add_route("/", move || {
            let ambiente = ambiente.clone();
            async move {
                serde_json::json!({
                    "status": "online",
                    "versao": env!("CARGO_PKG_VERSION"),
                    "ambiente": ambiente,
                })
            }
        })
        .await;

    // ========== PHASE 2 : Relais média ==========

    info!("🎵 Initializing media relay...");
    let relay = RelayState::from_config(&config)?;
    server.add_router("/", create_router(relay)).await;
    server.add_swagger(RelayApiDoc::openapi(), "relay").await;

    // ========== PHASE 3 : Démarrage du serveur ==========

    info!("🌐 Starting HTTP server...");
    server.start().await?;

    info!("✅ Musica is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
