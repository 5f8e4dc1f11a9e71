//! # musserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate fournit la façade HTTP de Musica :
//!
//! - **API de haut niveau** : routes JSON, handlers avec état, sous-routers
//! - **Journal d'accès** : une ligne `tracing` par requête (méthode, uri, statut, durée)
//! - **Logs SSE** : buffer circulaire des logs consultable en temps réel
//! - **Documentation OpenAPI** : Swagger UI pour chaque API montée
//! - **Erreurs JSON** : enveloppe `{"erro", "detalhes"}` et fallback 404
//! - **Arrêt gracieux** : gestion de Ctrl+C
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use musserver::{ServerBuilder, logs::LoggingOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = ServerBuilder::new("Musica", "localhost", 3000).build();
//!     server.init_logging(LoggingOptions::default()).await;
//!
//!     server
//!         .add_route("/api/status", || async { serde_json::json!({"status": "ok"}) })
//!         .await;
//!
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod error;
pub mod logs;
pub mod server;

pub use error::{ErrorBody, error_response, not_found};
pub use logs::{LogState, LoggingOptions, SseLayer, log_dump, log_sse};
pub use server::{Server, ServerBuilder, ServerInfo};
