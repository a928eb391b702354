//! Konfiguration des WebSocket-Servers

use std::net::SocketAddr;
use std::time::Duration;

use livelink_protocol::DEFAULT_MAX_FRAME_SIZE;

/// Standard-Port
pub const STANDARD_PORT: u16 = 8080;

/// Laufzeit-Konfiguration des WebSocket-Servers
#[derive(Debug, Clone)]
pub struct WebSocketKonfig {
    /// Adresse des Listeners (Port 0 waehlt einen freien Port)
    pub bind_addr: SocketAddr,
    /// Maximale Anzahl gleichzeitig registrierter Clients
    pub max_clients: usize,
    /// Obergrenze fuer einen Frame und fuer eine zusammengesetzte Nachricht
    pub max_frame_groesse: usize,
    /// Zeit fuer den kompletten Upgrade-Handshake
    pub handshake_timeout: Duration,
    /// Zeitlimit fuer das Schreiben eines Frames
    pub schreib_timeout: Duration,
    /// Intervall fuer Server-Pings (`None` = aus)
    pub keepalive_intervall: Option<Duration>,
    /// Trennen nach so langer Funkstille (`None` = aus)
    pub verbindungs_timeout: Option<Duration>,
    /// Kapazitaet der ausgehenden Queue pro Client
    pub sende_queue_groesse: usize,
}

impl WebSocketKonfig {
    /// Standard-Konfiguration auf allen Interfaces mit dem gegebenen Port
    pub fn mit_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            ..Self::default()
        }
    }
}

impl Default for WebSocketKonfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], STANDARD_PORT)),
            max_clients: 512,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: Duration::from_secs(5),
            schreib_timeout: Duration::from_millis(5000),
            keepalive_intervall: Some(Duration::from_secs(30)),
            verbindungs_timeout: Some(Duration::from_secs(90)),
            sende_queue_groesse: 64,
        }
    }
}
