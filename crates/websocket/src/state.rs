//! Gemeinsamer Server-Zustand
//!
//! Wird als `Arc<ServerZustand>` zwischen Fassade, Dispatcher, Accept-Loop
//! und allen Verbindungs-Tasks geteilt. Hier liegt auch der einzige Pfad,
//! ueber den ein Client abgebaut wird.

use livelink_protocol::{close_code, Frame, FrameError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::ClientHandle;
use crate::config::WebSocketKonfig;
use crate::event::{NachrichtEreignis, VerbindungsEreignis};
use crate::queue::EreignisQueue;
use crate::registry::ClientRegistry;

// ---------------------------------------------------------------------------
// Trenn-Grund
// ---------------------------------------------------------------------------

/// Warum ein Client abgebaut wird
#[derive(Debug)]
pub(crate) enum TrennGrund {
    /// Client hat einen Close-Frame geschickt (mit optionalem Code)
    ClientClose(Option<u16>),
    /// Peer hat den Socket ohne Close-Frame geschlossen
    Geschlossen,
    /// Dekodier- oder Protokollfehler
    Frame(FrameError),
    /// Nichts empfangen innerhalb des Verbindungs-Timeouts
    Timeout,
    /// Schreiben fehlgeschlagen oder zu langsam
    SchreibFehler,
    /// `stoppen()` auf dem Server
    ServerStopp,
}

impl TrennGrund {
    /// Close-Frame, der vor dem Schliessen noch gesendet wird
    fn close_frame(&self) -> Option<Frame> {
        match self {
            TrennGrund::ClientClose(code) => {
                Some(Frame::close(code.unwrap_or(close_code::NORMAL), ""))
            }
            TrennGrund::Frame(fehler) => fehler
                .close_code()
                .map(|code| Frame::close(code, &fehler.to_string())),
            TrennGrund::ServerStopp => {
                Some(Frame::close(close_code::GOING_AWAY, "Server wird beendet"))
            }
            TrennGrund::Geschlossen | TrennGrund::Timeout | TrennGrund::SchreibFehler => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerZustand
// ---------------------------------------------------------------------------

/// Handles eines laufenden Servers
pub(crate) struct Laufzeit {
    pub abbruch: CancellationToken,
    pub adresse: SocketAddr,
    pub accept_task: JoinHandle<()>,
}

/// Gemeinsamer Zustand (thread-safe, Arc-geteilt)
pub(crate) struct ServerZustand {
    pub konfig: WebSocketKonfig,
    pub registry: ClientRegistry,
    pub verbindungen: EreignisQueue<VerbindungsEreignis>,
    pub nachrichten: EreignisQueue<NachrichtEreignis>,
    /// Weckt den Dispatcher bei jedem neuen Ereignis
    pub signal: Arc<Notify>,
    /// `Some` solange der Server laeuft
    pub laufzeit: Mutex<Option<Laufzeit>>,
    /// Serialisiert `starten()` ueber den Bind hinweg
    pub start_sperre: tokio::sync::Mutex<()>,
}

impl ServerZustand {
    pub fn neu(konfig: WebSocketKonfig) -> Arc<Self> {
        let signal = Arc::new(Notify::new());
        Arc::new(Self {
            konfig,
            registry: ClientRegistry::neu(),
            verbindungen: EreignisQueue::neu(Arc::clone(&signal)),
            nachrichten: EreignisQueue::neu(Arc::clone(&signal)),
            signal,
            laufzeit: Mutex::new(None),
            start_sperre: tokio::sync::Mutex::new(()),
        })
    }

    /// Meldet einen server-weiten Fehler an den Dispatcher
    pub fn fehler_melden(&self, beschreibung: String) {
        self.verbindungen
            .einreihen(VerbindungsEreignis::Fehler(beschreibung));
    }

    /// Baut einen Client ab
    ///
    /// Darf von jedem Pfad (Empfang, Schreiben, Stop) aufgerufen werden;
    /// nur der erste Aufruf wirkt. Reihenfolge: aus der Registry entfernen,
    /// Close-Frame einreihen, Tasks abbrechen, Trenn-Ereignis einreihen.
    pub fn client_trennen(&self, client: &ClientHandle, grund: TrennGrund) {
        if !client.trennung_markieren() {
            return;
        }

        self.registry.entfernen(&client.id());

        if let Some(frame) = grund.close_frame() {
            if !client.close_einreihen(frame) {
                tracing::debug!(client = %client.id(), "Close-Frame nicht einreihbar");
            }
        }
        client.abbruch().cancel();

        match &grund {
            TrennGrund::ClientClose(_) | TrennGrund::Geschlossen | TrennGrund::ServerStopp => {
                tracing::info!(
                    client = %client.id(),
                    peer = %client.peer_addr(),
                    grund = ?grund,
                    "Client getrennt"
                );
            }
            _ => {
                tracing::warn!(
                    client = %client.id(),
                    peer = %client.peer_addr(),
                    grund = ?grund,
                    "Client wegen Fehler getrennt"
                );
            }
        }

        self.verbindungen
            .einreihen(VerbindungsEreignis::Getrennt(Arc::clone(client)));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
