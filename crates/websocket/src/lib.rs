//! livelink-websocket – WebSocket-Server auf rohem TCP
//!
//! Dieser Crate implementiert den Server-Teil von RFC 6455 ohne fremde
//! WebSocket-Bibliothek: Accept-Loop, Handshake, ein Empfangs- und ein
//! Schreib-Task pro Client, Registry und die Uebergabe aller Ereignisse an
//! einen einzigen Dispatcher.
//!
//! ## Architektur
//!
//! ```text
//! TcpListener (Accept-Loop)
//!     |
//!     v
//! Handshake-Task (pro Verbindung)
//!     |  101 Switching Protocols -> Client registrieren
//!     v
//! Empfangs-Loop ──> MessageAssembler ──> Nachrichten-Queue ──┐
//!     |                                                      ├──> Dispatcher::tick()
//!     +── Abbau ──> Registry entfernen ──> Verbindungs-Queue ─┘        |
//!                                                                     v
//! Schreib-Task <── mpsc<Frame> <── an_client_senden / an_alle_senden   ServerCallbacks
//! ```
//!
//! Callbacks laufen nie parallel: nur der Dispatcher ruft sie auf.

pub mod callbacks;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod queue;
pub mod registry;
pub mod server;

mod acceptor;
mod connection;
mod state;

// Bequeme Re-Exporte
pub use callbacks::ServerCallbacks;
pub use client::{Client, ClientHandle};
pub use config::WebSocketKonfig;
pub use dispatch::Dispatcher;
pub use error::{WebSocketError, WebSocketResult};
pub use server::WebSocketServer;
