//! Accept-Loop und Handshake
//!
//! Die Accept-Loop nimmt TCP-Verbindungen an und startet fuer jede einen
//! eigenen Task. Der Handshake laeuft in diesem Task, die Loop wartet also
//! nie auf einen langsamen Client.

use bytes::BytesMut;
use livelink_protocol::handshake::{self, HandshakeRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::connection;
use crate::error::{WebSocketError, WebSocketResult};
use crate::event::VerbindungsEreignis;
use crate::state::{ServerZustand, TrennGrund};

/// Pause nach einem Accept-Fehler (z.B. zu viele offene Dateien)
const ACCEPT_FEHLER_PAUSE: Duration = Duration::from_millis(10);

/// Accept-Loop, laeuft bis `abbruch` ausgeloest wird
///
/// Der Listener wird beim Verlassen freigegeben.
pub(crate) async fn accept_loop(
    zustand: Arc<ServerZustand>,
    listener: TcpListener,
    abbruch: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = abbruch.cancelled() => break,

            ergebnis = listener.accept() => {
                match ergebnis {
                    Ok((stream, peer_addr)) => {
                        // Client-Limit pruefen
                        let online = zustand.registry.anzahl();
                        if online >= zustand.konfig.max_clients {
                            tracing::warn!(
                                peer = %peer_addr,
                                max = zustand.konfig.max_clients,
                                "Server voll – Verbindung abgelehnt"
                            );
                            drop(stream);
                            continue;
                        }

                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                        }
                        tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                        tokio::spawn(verbindung_annehmen(
                            Arc::clone(&zustand),
                            stream,
                            peer_addr,
                            abbruch.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        zustand.fehler_melden(format!("Accept fehlgeschlagen: {e}"));
                        tokio::time::sleep(ACCEPT_FEHLER_PAUSE).await;
                    }
                }
            }
        }
    }

    tracing::debug!("Accept-Loop beendet");
}

/// Handshake, Registrierung und Uebergabe an die Verbindungs-Tasks
async fn verbindung_annehmen(
    zustand: Arc<ServerZustand>,
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    server_abbruch: CancellationToken,
) {
    let ergebnis = tokio::select! {
        _ = server_abbruch.cancelled() => return,
        ergebnis = handshake_ausfuehren(&mut stream, zustand.konfig.handshake_timeout) => ergebnis,
    };

    let (request, rest) = match ergebnis {
        Ok(teile) => teile,
        Err(e) => {
            // Kein Client, kein Ereignis: der Socket wird einfach geschlossen
            tracing::warn!(peer = %peer_addr, fehler = %e, "Handshake fehlgeschlagen");
            return;
        }
    };

    let (sende_tx, sende_rx) = mpsc::channel(zustand.konfig.sende_queue_groesse);
    let client = Client::neu(peer_addr, sende_tx);

    // Waehrend des Handshakes koennen weitere Verbindungen die Pruefung in
    // der Accept-Loop passiert haben
    if !zustand
        .registry
        .hinzufuegen_wenn_platz(Arc::clone(&client), zustand.konfig.max_clients)
    {
        tracing::warn!(
            peer = %peer_addr,
            max = zustand.konfig.max_clients,
            "Server voll nach Handshake – Verbindung geschlossen"
        );
        return;
    }
    zustand
        .verbindungen
        .einreihen(VerbindungsEreignis::Verbunden(Arc::clone(&client)));
    tracing::info!(
        client = %client.id(),
        peer = %peer_addr,
        pfad = %request.path,
        "Client verbunden"
    );

    // Stop kann zwischen Handshake und Registrierung passiert sein
    if server_abbruch.is_cancelled() {
        zustand.client_trennen(&client, TrennGrund::ServerStopp);
    }

    connection::verarbeiten(zustand, client, stream, rest, sende_rx).await;
}

async fn handshake_ausfuehren(
    stream: &mut TcpStream,
    timeout: Duration,
) -> WebSocketResult<(HandshakeRequest, BytesMut)> {
    let ergebnis = tokio::time::timeout(timeout, handshake::accept(stream))
        .await
        .map_err(|_| WebSocketError::Timeout)??;
    Ok(ergebnis)
}
