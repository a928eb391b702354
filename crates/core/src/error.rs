//! Fehlertypen fuer LiveLink
//!
//! Zentraler Fehler-Enum fuer server-weite Fehler (Konfiguration, Dateizugriff).
//! Protokoll- und Verbindungsfehler haben eigene Typen in den jeweiligen
//! Crates.

use thiserror::Error;

/// Globaler Result-Alias fuer LiveLink
pub type Result<T> = std::result::Result<T, LiveLinkError>;

/// Server-weite Fehler
#[derive(Debug, Error)]
pub enum LiveLinkError {
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl LiveLinkError {
    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
