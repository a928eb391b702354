//! Fehlertypen fuer den WebSocket-Server

use livelink_core::ClientId;
use livelink_protocol::HandshakeError;
use thiserror::Error;

/// Fehlertyp fuer den WebSocket-Server
#[derive(Debug, Error)]
pub enum WebSocketError {
    /// IO-Fehler (Bind, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// `starten()` auf einem laufenden Server
    #[error("Server laeuft bereits")]
    LaeuftBereits,

    /// Client ist bereits getrennt
    #[error("Client {0} ist nicht verbunden")]
    NichtVerbunden(ClientId),

    /// Ausgehende Queue des Clients ist voll
    #[error("Sende-Queue von {0} ist voll")]
    SendeQueueVoll(ClientId),

    /// Upgrade-Handshake fehlgeschlagen
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(#[from] HandshakeError),

    /// Zeitlimit ueberschritten
    #[error("Timeout")]
    Timeout,
}

/// Result-Typ fuer den WebSocket-Server
pub type WebSocketResult<T> = Result<T, WebSocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehlermeldungen() {
        let id = ClientId::new();
        assert_eq!(
            WebSocketError::NichtVerbunden(id).to_string(),
            format!("Client {id} ist nicht verbunden")
        );
        assert_eq!(
            WebSocketError::Handshake(HandshakeError::MissingKey).to_string(),
            "Handshake fehlgeschlagen: Header Sec-WebSocket-Key fehlt"
        );
    }
}
