//! Anwendungs-Callbacks
//!
//! Alle Callbacks laufen ausschliesslich im Dispatcher, also nie parallel
//! zueinander. Sie duerfen deshalb `FnMut` sein und eigenen Zustand halten.

use crate::client::ClientHandle;

type NachrichtCallback = Box<dyn FnMut(&str, &ClientHandle) + Send>;
type ClientCallback = Box<dyn FnMut(&ClientHandle) + Send>;
type FehlerCallback = Box<dyn FnMut(&str) + Send>;

/// Callbacks der Anwendung
///
/// Nur der Nachrichten-Callback ist Pflicht:
///
/// ```ignore
/// let callbacks = ServerCallbacks::neu(|text, client| println!("{}: {text}", client.id()))
///     .bei_verbindung(|client| println!("+ {}", client.id()))
///     .bei_trennung(|client| println!("- {}", client.id()));
/// ```
pub struct ServerCallbacks {
    bei_nachricht: NachrichtCallback,
    bei_verbindung: Option<ClientCallback>,
    bei_trennung: Option<ClientCallback>,
    bei_fehler: Option<FehlerCallback>,
}

impl ServerCallbacks {
    pub fn neu<F>(bei_nachricht: F) -> Self
    where
        F: FnMut(&str, &ClientHandle) + Send + 'static,
    {
        Self {
            bei_nachricht: Box::new(bei_nachricht),
            bei_verbindung: None,
            bei_trennung: None,
            bei_fehler: None,
        }
    }

    /// Callback fuer neue Verbindungen
    pub fn bei_verbindung<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ClientHandle) + Send + 'static,
    {
        self.bei_verbindung = Some(Box::new(f));
        self
    }

    /// Callback fuer getrennte Verbindungen
    pub fn bei_trennung<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ClientHandle) + Send + 'static,
    {
        self.bei_trennung = Some(Box::new(f));
        self
    }

    /// Callback fuer server-weite Fehler
    pub fn bei_fehler<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.bei_fehler = Some(Box::new(f));
        self
    }

    pub(crate) fn nachricht(&mut self, text: &str, client: &ClientHandle) {
        (self.bei_nachricht)(text, client);
    }

    pub(crate) fn verbunden(&mut self, client: &ClientHandle) {
        if let Some(f) = self.bei_verbindung.as_mut() {
            f(client);
        }
    }

    pub(crate) fn getrennt(&mut self, client: &ClientHandle) {
        if let Some(f) = self.bei_trennung.as_mut() {
            f(client);
        }
    }

    pub(crate) fn fehler(&mut self, beschreibung: &str) {
        match self.bei_fehler.as_mut() {
            Some(f) => f(beschreibung),
            None => tracing::debug!(fehler = %beschreibung, "Kein Fehler-Callback registriert"),
        }
    }
}

impl std::fmt::Debug for ServerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCallbacks")
            .field("bei_verbindung", &self.bei_verbindung.is_some())
            .field("bei_trennung", &self.bei_trennung.is_some())
            .field("bei_fehler", &self.bei_fehler.is_some())
            .finish_non_exhaustive()
    }
}
