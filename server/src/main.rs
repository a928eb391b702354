//! LiveLink Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use livelink_server::{config::ServerConfig, logging::logging_initialisieren, Server};

/// Umgebungsvariable fuer den Pfad der Konfigurationsdatei
const CONFIG_ENV: &str = "LIVELINK_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());

    // Standardwerte falls Datei fehlt
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "LiveLink Server wird initialisiert"
    );

    let server = Server::neu(config)?;
    server.ausfuehren().await
}
