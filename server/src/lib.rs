//! livelink-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod logging;

use anyhow::Result;
use config::ServerConfig;
use livelink_websocket::{Dispatcher, ServerCallbacks, WebSocketServer};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Praefix der Echo-Antwort
pub const ECHO_PRAEFIX: &str = "Server-Echo: ";

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    config: ServerConfig,
    websocket: WebSocketServer,
    dispatcher: Option<Dispatcher>,
    dispatch_abbruch: CancellationToken,
    dispatch_task: Option<JoinHandle<Dispatcher>>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        config.validieren()?;

        let websocket = WebSocketServer::neu(config.websocket_konfig()?);
        let callbacks = anwendungs_callbacks(&websocket, config.server.echo);
        let dispatcher = Dispatcher::neu(&websocket, callbacks);

        Ok(Self {
            config,
            websocket,
            dispatcher: Some(dispatcher),
            dispatch_abbruch: CancellationToken::new(),
            dispatch_task: None,
        })
    }

    /// Zugriff auf den WebSocket-Server (Senden, Abfragen)
    pub fn websocket(&self) -> &WebSocketServer {
        &self.websocket
    }

    /// Startet Listener und Dispatcher
    pub async fn starten(&mut self) -> Result<SocketAddr> {
        let adresse = self.websocket.starten().await?;

        if let Some(mut dispatcher) = self.dispatcher.take() {
            let intervall = self.config.tick_intervall();
            let abbruch = self.dispatch_abbruch.child_token();
            self.dispatch_task = Some(tokio::spawn(async move {
                dispatcher.ausfuehren(intervall, abbruch).await;
                dispatcher
            }));
        }

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            echo = self.config.server.echo,
            "Server laeuft"
        );
        Ok(adresse)
    }

    /// Stoppt den Listener, trennt alle Clients und beendet den Dispatcher
    ///
    /// Der Dispatcher verarbeitet vorher noch die Trenn-Ereignisse.
    pub async fn beenden(&mut self) {
        self.websocket.stoppen().await;

        if let Some(task) = self.dispatch_task.take() {
            self.dispatch_abbruch.cancel();
            match task.await {
                Ok(dispatcher) => self.dispatcher = Some(dispatcher),
                Err(e) => tracing::error!(fehler = %e, "Dispatcher-Task abgebrochen"),
            }
            self.dispatch_abbruch = CancellationToken::new();
        }
    }

    /// Laeuft bis Ctrl-C
    pub async fn ausfuehren(mut self) -> Result<()> {
        self.starten().await?;

        tracing::info!("Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        self.beenden().await;
        Ok(())
    }
}

/// Echo-Anwendung: protokolliert den Lebenszyklus und spiegelt Nachrichten
fn anwendungs_callbacks(websocket: &WebSocketServer, echo: bool) -> ServerCallbacks {
    let sender = websocket.clone();
    let bei_verbindung = websocket.clone();
    let bei_trennung = websocket.clone();

    ServerCallbacks::neu(move |text, client| {
        tracing::debug!(client = %client.id(), laenge = text.len(), "Nachricht empfangen");
        if echo {
            if let Err(e) = sender.an_client_senden(client, &format!("{ECHO_PRAEFIX}{text}")) {
                tracing::warn!(client = %client.id(), fehler = %e, "Echo fehlgeschlagen");
            }
        }
    })
    .bei_verbindung(move |client| {
        tracing::info!(
            client = %client.id(),
            peer = %client.peer_addr(),
            clients = bei_verbindung.client_anzahl(),
            "Client verbunden"
        );
    })
    .bei_trennung(move |client| {
        let dauer = chrono::Utc::now() - client.verbunden_seit();
        tracing::info!(
            client = %client.id(),
            peer = %client.peer_addr(),
            verbunden_sek = dauer.num_seconds(),
            clients = bei_trennung.client_anzahl(),
            "Client getrennt"
        );
    })
    .bei_fehler(|fehler| {
        tracing::error!(fehler = %fehler, "Serverfehler");
    })
}
