//! Ereignisse, die Netzwerk-Tasks an den Dispatcher uebergeben

use crate::client::ClientHandle;

/// Verbindungs-Ereignis (eigene Queue, getrennt von Nachrichten)
#[derive(Debug, Clone)]
pub enum VerbindungsEreignis {
    /// Handshake abgeschlossen, Client registriert
    Verbunden(ClientHandle),
    /// Client abgebaut und aus der Registry entfernt
    Getrennt(ClientHandle),
    /// Server-weiter Fehler (Bind, Accept)
    Fehler(String),
}

/// Eine vollstaendig zusammengesetzte Text-Nachricht
#[derive(Debug, Clone)]
pub struct NachrichtEreignis {
    pub client: ClientHandle,
    pub text: String,
}
