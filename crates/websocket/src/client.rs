//! Client – eine Verbindung nach erfolgreichem Handshake
//!
//! Ein `Client` wird von Registry, Events und Anwendung gemeinsam als
//! `ClientHandle` gehalten. Den Socket besitzt er nicht selbst: gelesen wird
//! im Empfangs-Task, geschrieben ausschliesslich im Schreib-Task, der die
//! ausgehende Queue abarbeitet.

use chrono::{DateTime, Utc};
use livelink_core::ClientId;
use livelink_protocol::Frame;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{WebSocketError, WebSocketResult};

/// Geteilte Referenz auf einen Client
pub type ClientHandle = Arc<Client>;

/// Ein verbundener WebSocket-Client
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    peer_addr: SocketAddr,
    verbunden_seit: DateTime<Utc>,
    verbunden: AtomicBool,
    sende_tx: mpsc::Sender<Frame>,
    abbruch: CancellationToken,
}

impl Client {
    pub(crate) fn neu(peer_addr: SocketAddr, sende_tx: mpsc::Sender<Frame>) -> ClientHandle {
        Arc::new(Self {
            id: ClientId::new(),
            peer_addr,
            verbunden_seit: Utc::now(),
            verbunden: AtomicBool::new(true),
            sende_tx,
            abbruch: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Adresse des Peers
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Zeitpunkt des erfolgreichen Handshakes
    pub fn verbunden_seit(&self) -> DateTime<Utc> {
        self.verbunden_seit
    }

    /// `false` sobald der Abbau begonnen hat
    pub fn ist_verbunden(&self) -> bool {
        self.verbunden.load(Ordering::Acquire)
    }

    /// Reiht einen Frame in die ausgehende Queue ein (nicht-blockierend)
    pub(crate) fn frame_einreihen(&self, frame: Frame) -> WebSocketResult<()> {
        if !self.ist_verbunden() {
            return Err(WebSocketError::NichtVerbunden(self.id));
        }
        match self.sende_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client = %self.id, "Sende-Queue voll – Frame verworfen");
                Err(WebSocketError::SendeQueueVoll(self.id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(WebSocketError::NichtVerbunden(self.id))
            }
        }
    }

    /// Markiert den Client als getrennt
    ///
    /// Gibt nur beim ersten Aufruf `true` zurueck; der Aufrufer fuehrt dann
    /// den Abbau durch.
    pub(crate) fn trennung_markieren(&self) -> bool {
        self.verbunden.swap(false, Ordering::AcqRel)
    }

    /// Letzter Frame vor dem Abbau, unabhaengig vom Verbindungs-Flag
    pub(crate) fn close_einreihen(&self, frame: Frame) -> bool {
        self.sende_tx.try_send(frame).is_ok()
    }

    /// Signal fuer Empfangs- und Schreib-Task
    pub(crate) fn abbruch(&self) -> &CancellationToken {
        &self.abbruch
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
