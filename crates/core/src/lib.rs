//! livelink-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von Protokoll-, WebSocket-
//! und Server-Crate gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{LiveLinkError, Result};
pub use types::ClientId;
