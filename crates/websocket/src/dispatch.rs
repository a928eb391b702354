//! Dispatcher – einziger Ort, an dem Anwendungs-Callbacks laufen
//!
//! Netzwerk-Tasks reihen nur ein. Der Dispatcher leert beide Queues pro
//! Tick und ruft die Callbacks ausserhalb jeder Sperre auf: erst alle
//! Verbindungs-Ereignisse, dann alle Nachrichten.
//!
//! Der Tick kann von aussen getrieben werden (`tick()`, z.B. einmal pro
//! Frame einer Render-Loop) oder mit `ausfuehren()` als eigener Task laufen.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::callbacks::ServerCallbacks;
use crate::event::VerbindungsEreignis;
use crate::server::WebSocketServer;
use crate::state::ServerZustand;

/// Verteilt Ereignisse an die Callbacks
pub struct Dispatcher {
    zustand: Arc<ServerZustand>,
    callbacks: ServerCallbacks,
}

impl Dispatcher {
    pub fn neu(server: &WebSocketServer, callbacks: ServerCallbacks) -> Self {
        Self {
            zustand: Arc::clone(&server.zustand),
            callbacks,
        }
    }

    /// Verarbeitet alle bisher eingereihten Ereignisse
    ///
    /// Gibt die Anzahl verarbeiteter Ereignisse zurueck.
    pub fn tick(&mut self) -> usize {
        // Nachrichten zuerst entnehmen: jede entnommene Nachricht hat dann
        // ihr Verbunden-Ereignis spaetestens in dieser Runde
        let nachrichten = self.zustand.nachrichten.entnehmen();
        let verbindungen = self.zustand.verbindungen.entnehmen();
        let anzahl = nachrichten.len() + verbindungen.len();

        for ereignis in verbindungen {
            match ereignis {
                VerbindungsEreignis::Verbunden(client) => self.callbacks.verbunden(&client),
                VerbindungsEreignis::Getrennt(client) => self.callbacks.getrennt(&client),
                VerbindungsEreignis::Fehler(beschreibung) => self.callbacks.fehler(&beschreibung),
            }
        }

        for nachricht in nachrichten {
            self.callbacks.nachricht(&nachricht.text, &nachricht.client);
        }

        if anzahl > 0 {
            tracing::trace!(anzahl, "Dispatch-Tick");
        }
        anzahl
    }

    /// Treibt `tick()` bis `abbruch` ausgeloest wird
    ///
    /// Tickt sofort bei neuen Ereignissen und zusaetzlich im festen
    /// `intervall`. Nach dem Abbruch folgt ein letzter Tick, damit
    /// Trenn-Ereignisse aus `stoppen()` noch ankommen.
    pub async fn ausfuehren(&mut self, intervall: Duration, abbruch: CancellationToken) {
        let signal = Arc::clone(&self.zustand.signal);
        let mut takt = tokio::time::interval(intervall);
        takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = abbruch.cancelled() => break,
                _ = signal.notified() => {}
                _ = takt.tick() => {}
            }
            self.tick();
        }

        self.tick();
        tracing::debug!("Dispatcher beendet");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientHandle};
    use crate::config::WebSocketKonfig;
    use crate::event::NachrichtEreignis;
    use crate::state::TrennGrund;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    type Protokoll = Arc<Mutex<Vec<String>>>;

    fn aufzeichnende_callbacks(protokoll: &Protokoll) -> ServerCallbacks {
        let p1 = Arc::clone(protokoll);
        let p2 = Arc::clone(protokoll);
        let p3 = Arc::clone(protokoll);
        let p4 = Arc::clone(protokoll);
        ServerCallbacks::neu(move |text, _| p1.lock().push(format!("nachricht:{text}")))
            .bei_verbindung(move |_| p2.lock().push("verbunden".into()))
            .bei_trennung(move |_| p3.lock().push("getrennt".into()))
            .bei_fehler(move |f| p4.lock().push(format!("fehler:{f}")))
    }

    fn test_client(server: &WebSocketServer) -> (ClientHandle, mpsc::Receiver<livelink_protocol::Frame>) {
        let (tx, rx) = mpsc::channel(4);
        let client = Client::neu("127.0.0.1:7000".parse().unwrap(), tx);
        server.zustand.registry.hinzufuegen(Arc::clone(&client));
        (client, rx)
    }

    #[test]
    fn verbindungen_vor_nachrichten() {
        let server = WebSocketServer::neu(WebSocketKonfig::default());
        let protokoll = Protokoll::default();
        let mut dispatcher = Dispatcher::neu(&server, aufzeichnende_callbacks(&protokoll));
        let (client, _rx) = test_client(&server);

        // Nachricht wird vor dem Verbunden-Ereignis eingereiht
        server.zustand.nachrichten.einreihen(NachrichtEreignis {
            client: Arc::clone(&client),
            text: "hallo".into(),
        });
        server
            .zustand
            .verbindungen
            .einreihen(VerbindungsEreignis::Verbunden(Arc::clone(&client)));

        assert_eq!(dispatcher.tick(), 2);
        assert_eq!(*protokoll.lock(), vec!["verbunden", "nachricht:hallo"]);

        assert_eq!(dispatcher.tick(), 0);
    }

    #[test]
    fn nachrichten_in_reihenfolge() {
        let server = WebSocketServer::neu(WebSocketKonfig::default());
        let protokoll = Protokoll::default();
        let mut dispatcher = Dispatcher::neu(&server, aufzeichnende_callbacks(&protokoll));
        let (client, _rx) = test_client(&server);

        for text in ["eins", "zwei", "drei"] {
            server.zustand.nachrichten.einreihen(NachrichtEreignis {
                client: Arc::clone(&client),
                text: text.into(),
            });
        }
        dispatcher.tick();

        assert_eq!(
            *protokoll.lock(),
            vec!["nachricht:eins", "nachricht:zwei", "nachricht:drei"]
        );
    }

    #[test]
    fn trennung_und_fehler() {
        let server = WebSocketServer::neu(WebSocketKonfig::default());
        let protokoll = Protokoll::default();
        let mut dispatcher = Dispatcher::neu(&server, aufzeichnende_callbacks(&protokoll));
        let (client, _rx) = test_client(&server);

        server.zustand.client_trennen(&client, TrennGrund::Geschlossen);
        server.zustand.fehler_melden("kaputt".into());
        dispatcher.tick();

        assert_eq!(*protokoll.lock(), vec!["getrennt", "fehler:kaputt"]);
        assert!(server.alle_clients().is_empty());
    }

    #[test]
    fn optionale_callbacks_fehlen() {
        let server = WebSocketServer::neu(WebSocketKonfig::default());
        let empfangen = Arc::new(Mutex::new(0));
        let zaehler = Arc::clone(&empfangen);
        let mut dispatcher =
            Dispatcher::neu(&server, ServerCallbacks::neu(move |_, _| *zaehler.lock() += 1));
        let (client, _rx) = test_client(&server);

        server
            .zustand
            .verbindungen
            .einreihen(VerbindungsEreignis::Verbunden(Arc::clone(&client)));
        server.zustand.fehler_melden("ignoriert".into());
        server.zustand.nachrichten.einreihen(NachrichtEreignis {
            client,
            text: "x".into(),
        });

        assert_eq!(dispatcher.tick(), 3);
        assert_eq!(*empfangen.lock(), 1);
    }

    #[tokio::test]
    async fn ausfuehren_reagiert_auf_signal_und_abbruch() {
        let server = WebSocketServer::neu(WebSocketKonfig::default());
        let protokoll = Protokoll::default();
        let mut dispatcher = Dispatcher::neu(&server, aufzeichnende_callbacks(&protokoll));
        let abbruch = CancellationToken::new();

        let task_abbruch = abbruch.clone();
        let task = tokio::spawn(async move {
            dispatcher
                .ausfuehren(Duration::from_secs(60), task_abbruch)
                .await;
        });

        server.zustand.fehler_melden("erstes".into());
        tokio::time::timeout(Duration::from_secs(2), async {
            while protokoll.lock().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Dispatcher muss auf das Signal reagieren");

        abbruch.cancel();
        server.zustand.fehler_melden("letztes".into());
        task.await.unwrap();

        let protokoll = protokoll.lock();
        assert_eq!(protokoll.first().map(String::as_str), Some("fehler:erstes"));
        assert_eq!(protokoll.last().map(String::as_str), Some("fehler:letztes"));
    }
}
