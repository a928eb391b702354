//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.
//!
//! ```toml
//! [server]
//! name = "LiveLink"
//! echo = true
//!
//! [netzwerk]
//! bind_adresse = "0.0.0.0"
//! port = 8080
//!
//! [websocket]
//! keepalive_sek = 30        # 0 = aus
//!
//! [dispatch]
//! tick_ms = 16
//! ```

use livelink_core::{LiveLinkError, Result};
use livelink_websocket::WebSocketKonfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::logging::{log_format_gueltig, log_level_gueltig};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Limits und Timeouts der WebSocket-Verbindungen
    pub websocket: WebSocketEinstellungen,
    /// Takt des Dispatchers
    pub dispatch: DispatchEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
    /// Empfangene Nachrichten an den Absender zurueckschicken
    pub echo: bool,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "LiveLink Server".into(),
            echo: true,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den WebSocket-Listener
    pub bind_adresse: String,
    /// Port fuer den WebSocket-Listener (0 = beliebiger freier Port)
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// WebSocket-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketEinstellungen {
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: usize,
    /// Maximale Frame- bzw. Nachrichtengroesse in KiB
    pub max_frame_kib: usize,
    /// Zeitlimit fuer den Upgrade-Handshake in Sekunden
    pub handshake_timeout_sek: u64,
    /// Zeitlimit fuer das Schreiben eines Frames in Millisekunden
    pub schreib_timeout_ms: u64,
    /// Ping-Intervall in Sekunden (0 = aus)
    pub keepalive_sek: u64,
    /// Trennen nach so vielen Sekunden ohne Empfang (0 = aus)
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet der ausgehenden Queue pro Client
    pub sende_queue_groesse: usize,
}

impl Default for WebSocketEinstellungen {
    fn default() -> Self {
        Self {
            max_clients: 512,
            max_frame_kib: 16 * 1024,
            handshake_timeout_sek: 5,
            schreib_timeout_ms: 5000,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            sende_queue_groesse: 64,
        }
    }
}

/// Dispatcher-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchEinstellungen {
    /// Fester Takt in Millisekunden (neue Ereignisse wecken zusaetzlich sofort)
    pub tick_ms: u64,
}

impl Default for DispatchEinstellungen {
    fn default() -> Self {
        Self { tick_ms: 16 }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error" (Direktiven nur per Umgebung)
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt).map_err(|e| {
                LiveLinkError::konfiguration(format!("Fehler in '{pfad}': {e}"))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Prueft alle Werte auf Plausibilitaet
    pub fn validieren(&self) -> Result<()> {
        self.bind_adresse()?;

        let ws = &self.websocket;
        if ws.max_clients == 0 {
            return Err(LiveLinkError::konfiguration("websocket.max_clients muss > 0 sein"));
        }
        if ws.max_frame_kib == 0 {
            return Err(LiveLinkError::konfiguration("websocket.max_frame_kib muss > 0 sein"));
        }
        if ws.handshake_timeout_sek == 0 || ws.schreib_timeout_ms == 0 {
            return Err(LiveLinkError::konfiguration(
                "websocket: Handshake- und Schreib-Timeout muessen > 0 sein",
            ));
        }
        if ws.sende_queue_groesse == 0 {
            return Err(LiveLinkError::konfiguration(
                "websocket.sende_queue_groesse muss > 0 sein",
            ));
        }
        // Ohne Ping muss ein Client von sich aus senden; mit Ping muss der
        // Timeout mindestens ein Intervall abdecken
        if ws.keepalive_sek > 0
            && ws.verbindungs_timeout_sek > 0
            && ws.verbindungs_timeout_sek <= ws.keepalive_sek
        {
            return Err(LiveLinkError::konfiguration(format!(
                "websocket.verbindungs_timeout_sek ({}) muss groesser als keepalive_sek ({}) sein",
                ws.verbindungs_timeout_sek, ws.keepalive_sek
            )));
        }

        if self.dispatch.tick_ms == 0 {
            return Err(LiveLinkError::konfiguration("dispatch.tick_ms muss > 0 sein"));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(LiveLinkError::konfiguration(format!(
                "Ungueltiger Log-Level: '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(LiveLinkError::konfiguration(format!(
                "Ungueltiges Log-Format: '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.netzwerk.bind_adresse.parse().map_err(|_| {
            LiveLinkError::konfiguration(format!(
                "Ungueltige Bind-Adresse: '{}'",
                self.netzwerk.bind_adresse
            ))
        })?;
        Ok(SocketAddr::new(ip, self.netzwerk.port))
    }

    /// Uebersetzt die Einstellungen in die Konfiguration des WebSocket-Servers
    pub fn websocket_konfig(&self) -> Result<WebSocketKonfig> {
        let ws = &self.websocket;
        let sekunden_oder_aus = |sek: u64| (sek > 0).then(|| Duration::from_secs(sek));

        Ok(WebSocketKonfig {
            bind_addr: self.bind_adresse()?,
            max_clients: ws.max_clients,
            max_frame_groesse: ws.max_frame_kib * 1024,
            handshake_timeout: Duration::from_secs(ws.handshake_timeout_sek),
            schreib_timeout: Duration::from_millis(ws.schreib_timeout_ms),
            keepalive_intervall: sekunden_oder_aus(ws.keepalive_sek),
            verbindungs_timeout: sekunden_oder_aus(ws.verbindungs_timeout_sek),
            sende_queue_groesse: ws.sende_queue_groesse,
        })
    }

    /// Takt des Dispatchers
    pub fn tick_intervall(&self) -> Duration {
        Duration::from_millis(self.dispatch.tick_ms)
    }
}
