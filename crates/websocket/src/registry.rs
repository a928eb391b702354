//! Client-Registry – alle Clients mit abgeschlossenem Handshake
//!
//! Eine einzige Sperre schuetzt die Liste. Wer iterieren will (Broadcast,
//! Stop), holt sich eine Momentaufnahme und arbeitet ohne Sperre weiter.

use livelink_core::ClientId;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::client::ClientHandle;

/// Registrierte Clients in Verbindungsreihenfolge
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<Vec<ClientHandle>>,
}

impl ClientRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen Client
    pub fn hinzufuegen(&self, client: ClientHandle) {
        tracing::debug!(client = %client.id(), "Client registriert");
        self.clients.lock().push(client);
    }

    /// Registriert einen Client nur wenn weniger als `maximum` registriert sind
    ///
    /// Pruefung und Einfuegen unter derselben Sperre.
    pub fn hinzufuegen_wenn_platz(&self, client: ClientHandle, maximum: usize) -> bool {
        let mut clients = self.clients.lock();
        if clients.len() >= maximum {
            return false;
        }
        tracing::debug!(client = %client.id(), "Client registriert");
        clients.push(client);
        true
    }

    /// Entfernt einen Client
    ///
    /// Idempotent: `false` wenn der Client nicht (mehr) registriert war.
    pub fn entfernen(&self, id: &ClientId) -> bool {
        let mut clients = self.clients.lock();
        match clients.iter().position(|c| c.id() == *id) {
            Some(index) => {
                clients.remove(index);
                true
            }
            None => false,
        }
    }

    /// Anzahl registrierter Clients
    pub fn anzahl(&self) -> usize {
        self.clients.lock().len()
    }

    /// Prueft ob ein Client registriert ist
    pub fn enthaelt(&self, id: &ClientId) -> bool {
        self.clients.lock().iter().any(|c| c.id() == *id)
    }

    /// Kopie der aktuellen Liste
    pub fn momentaufnahme(&self) -> Vec<ClientHandle> {
        self.clients.lock().iter().map(Arc::clone).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
