//! Gemeinsame Identifikationstypen fuer LiveLink
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen.

use uuid::Uuid;

/// Eindeutige ID einer WebSocket-Verbindung
///
/// Wird nach erfolgreichem Handshake vergeben und bleibt fuer die gesamte
/// Lebensdauer der Verbindung gleich. Eine neu aufgebaute Verbindung
/// desselben Peers bekommt eine neue ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Erstellt eine neue zufaellige ClientId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}
