//! WebSocketServer – oeffentliche Fassade
//!
//! Start/Stop, Senden und Abfragen. Der Server ist `Clone`; alle Klone
//! teilen denselben Zustand, ein Klon kann also z.B. in einen Callback
//! verschoben werden, um dort zu antworten.

use livelink_protocol::Frame;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::acceptor;
use crate::client::ClientHandle;
use crate::config::WebSocketKonfig;
use crate::error::{WebSocketError, WebSocketResult};
use crate::state::{Laufzeit, ServerZustand, TrennGrund};

/// WebSocket-Server auf rohem TCP
#[derive(Clone)]
pub struct WebSocketServer {
    pub(crate) zustand: Arc<ServerZustand>,
}

impl WebSocketServer {
    /// Erstellt einen Server (noch ohne Listener)
    pub fn neu(konfig: WebSocketKonfig) -> Self {
        Self {
            zustand: ServerZustand::neu(konfig),
        }
    }

    pub fn konfig(&self) -> &WebSocketKonfig {
        &self.zustand.konfig
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Bindet den Listener und startet die Accept-Loop
    ///
    /// Gibt die tatsaechlich gebundene Adresse zurueck (relevant bei Port 0).
    /// Ein Bind-Fehler wird zusaetzlich als Fehler-Ereignis gemeldet.
    pub async fn starten(&self) -> WebSocketResult<SocketAddr> {
        // Ein zweiter Aufruf wartet hier und sieht danach die Laufzeit
        let _start = self.zustand.start_sperre.lock().await;
        if self.laeuft() {
            return Err(WebSocketError::LaeuftBereits);
        }

        let bind_addr = self.zustand.konfig.bind_addr;
        let listener = match TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(adresse = %bind_addr, fehler = %e, "Bind fehlgeschlagen");
                self.zustand
                    .fehler_melden(format!("Server konnte nicht starten ({bind_addr}): {e}"));
                return Err(e.into());
            }
        };
        let adresse = listener.local_addr()?;

        let mut laufzeit = self.zustand.laufzeit.lock();
        let abbruch = CancellationToken::new();
        let accept_task = tokio::spawn(acceptor::accept_loop(
            Arc::clone(&self.zustand),
            listener,
            abbruch.clone(),
        ));
        *laufzeit = Some(Laufzeit {
            abbruch,
            adresse,
            accept_task,
        });

        tracing::info!(adresse = %adresse, "WebSocket-Server gestartet");
        Ok(adresse)
    }

    /// Stoppt den Server
    ///
    /// Beendet die Accept-Loop, gibt den Listener frei und trennt alle
    /// Clients mit Close 1001. Jeder getrennte Client erzeugt ein
    /// Trenn-Ereignis. Mehrfacher Aufruf ist harmlos.
    pub async fn stoppen(&self) {
        let laufzeit = self.zustand.laufzeit.lock().take();
        let Some(laufzeit) = laufzeit else {
            tracing::debug!("stoppen(): Server laeuft nicht");
            return;
        };

        laufzeit.abbruch.cancel();
        if let Err(e) = laufzeit.accept_task.await {
            tracing::error!(fehler = %e, "Accept-Task abgebrochen");
        }

        let clients = self.zustand.registry.momentaufnahme();
        for client in &clients {
            self.zustand.client_trennen(client, TrennGrund::ServerStopp);
        }

        tracing::info!(
            adresse = %laufzeit.adresse,
            getrennt = clients.len(),
            "WebSocket-Server gestoppt"
        );
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Sendet eine Text-Nachricht an einen Client
    ///
    /// Kehrt sofort zurueck; geschrieben wird im Schreib-Task des Clients.
    pub fn an_client_senden(&self, client: &ClientHandle, text: &str) -> WebSocketResult<()> {
        client.frame_einreihen(Frame::text(text))?;
        tracing::trace!(client = %client.id(), laenge = text.len(), "Nachricht eingereiht");
        Ok(())
    }

    /// Sendet eine Text-Nachricht an alle verbundenen Clients
    ///
    /// Gibt die Anzahl der Clients zurueck, fuer die der Frame eingereiht
    /// wurde. Ein Fehler bei einem Client betrifft die anderen nicht.
    pub fn an_alle_senden(&self, text: &str) -> usize {
        let frame = Frame::text(text);
        let clients = self.zustand.registry.momentaufnahme();

        let gesendet = clients
            .iter()
            .filter(|client| match client.frame_einreihen(frame.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(client = %client.id(), fehler = %e, "Broadcast uebersprungen");
                    false
                }
            })
            .count();

        tracing::trace!(gesendet, gesamt = clients.len(), "Broadcast eingereiht");
        gesendet
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn laeuft(&self) -> bool {
        self.zustand.laufzeit.lock().is_some()
    }

    /// Gebundene Adresse, solange der Server laeuft
    pub fn lokale_adresse(&self) -> Option<SocketAddr> {
        self.zustand.laufzeit.lock().as_ref().map(|l| l.adresse)
    }

    /// Anzahl registrierter Clients
    pub fn client_anzahl(&self) -> usize {
        self.zustand.registry.anzahl()
    }

    /// Momentaufnahme aller registrierten Clients
    pub fn alle_clients(&self) -> Vec<ClientHandle> {
        self.zustand.registry.momentaufnahme()
    }
}

impl std::fmt::Debug for WebSocketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketServer")
            .field("adresse", &self.lokale_adresse())
            .field("clients", &self.client_anzahl())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::VerbindungsEreignis;

    fn lokale_konfig() -> WebSocketKonfig {
        WebSocketKonfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..WebSocketKonfig::default()
        }
    }

    #[tokio::test]
    async fn starten_und_stoppen() {
        let server = WebSocketServer::neu(lokale_konfig());
        assert!(!server.laeuft());

        let adresse = server.starten().await.unwrap();
        assert_ne!(adresse.port(), 0);
        assert!(server.laeuft());
        assert_eq!(server.lokale_adresse(), Some(adresse));

        server.stoppen().await;
        assert!(!server.laeuft());
        assert_eq!(server.lokale_adresse(), None);

        // Listener ist freigegeben
        tokio::net::TcpListener::bind(adresse).await.unwrap();
    }

    #[tokio::test]
    async fn doppelter_start_wird_abgelehnt() {
        let server = WebSocketServer::neu(lokale_konfig());
        server.starten().await.unwrap();

        let fehler = server.starten().await.unwrap_err();
        assert!(matches!(fehler, WebSocketError::LaeuftBereits));

        server.stoppen().await;
    }

    #[tokio::test]
    async fn gleichzeitiger_start_auf_festem_port() {
        let frei = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bind_addr = frei.local_addr().unwrap();
        drop(frei);

        let server = WebSocketServer::neu(WebSocketKonfig {
            bind_addr,
            ..WebSocketKonfig::default()
        });
        let (a, b) = tokio::join!(server.starten(), server.starten());

        let erfolgreich = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(erfolgreich, 1, "a: {a:?}, b: {b:?}");
        assert!([a, b]
            .into_iter()
            .any(|r| matches!(r, Err(WebSocketError::LaeuftBereits))));
        assert!(
            server.zustand.verbindungen.entnehmen().is_empty(),
            "kein Fehler-Ereignis erwartet"
        );

        server.stoppen().await;
    }

    #[tokio::test]
    async fn stoppen_ist_idempotent() {
        let server = WebSocketServer::neu(lokale_konfig());
        server.stoppen().await;

        server.starten().await.unwrap();
        server.stoppen().await;
        server.stoppen().await;
        assert!(!server.laeuft());
    }

    #[tokio::test]
    async fn neustart_nach_stopp() {
        let server = WebSocketServer::neu(lokale_konfig());
        server.starten().await.unwrap();
        server.stoppen().await;

        server.starten().await.unwrap();
        assert!(server.laeuft());
        server.stoppen().await;
    }

    #[tokio::test]
    async fn bind_fehler_wird_gemeldet() {
        let belegt = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = WebSocketServer::neu(WebSocketKonfig {
            bind_addr: belegt.local_addr().unwrap(),
            ..WebSocketKonfig::default()
        });

        assert!(matches!(server.starten().await, Err(WebSocketError::Io(_))));
        assert!(!server.laeuft());

        let ereignisse = server.zustand.verbindungen.entnehmen();
        assert!(matches!(ereignisse.front(), Some(VerbindungsEreignis::Fehler(_))));
    }

    #[test]
    fn broadcast_ohne_clients() {
        let server = WebSocketServer::neu(lokale_konfig());
        assert_eq!(server.an_alle_senden("niemand da"), 0);
        assert!(server.alle_clients().is_empty());
    }
}
