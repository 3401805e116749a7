use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::{OrchestratorMessage, PresenterMessage, TabId};

type PresenterSender = mpsc::UnboundedSender<PresenterMessage>;

/// Presenters reachable by tab.
///
/// Delivery is fire-and-forget: nothing is acknowledged and a message for a
/// tab without a live presenter is dropped.
#[derive(Clone, Default)]
pub struct Presenters {
    senders: Arc<RwLock<HashMap<TabId, PresenterSender>>>,
}

impl Presenters {
    /// Registers a presenter for `tab`, replacing any previous one.
    pub fn register(&self, tab: TabId) -> mpsc::UnboundedReceiver<PresenterMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.attach(tab, tx);
        rx
    }

    /// Routes messages for `tab` into an existing channel.
    pub fn attach(&self, tab: TabId, sender: PresenterSender) {
        self.senders.write().unwrap().insert(tab, sender);
        debug!("registered presenter for {tab}");
    }

    pub fn unregister(&self, tab: TabId) {
        self.senders.write().unwrap().remove(&tab);
    }

    // A presenter may have registered for the tab since `closed` was looked up.
    fn remove_closed(&self, tab: TabId, closed: &PresenterSender) {
        let mut senders = self.senders.write().unwrap();
        if senders
            .get(&tab)
            .is_some_and(|current| current.same_channel(closed))
        {
            senders.remove(&tab);
        }
    }

    pub fn send_to_tab(&self, tab: TabId, message: PresenterMessage) {
        let sender = self.senders.read().unwrap().get(&tab).cloned();
        match sender {
            Some(sender) => {
                if sender.send(message).is_err() {
                    warn!("presenter for {tab} is gone, dropping message");
                    self.remove_closed(tab, &sender);
                }
            }
            None => warn!("no presenter for {tab}, dropping message"),
        }
    }
}

/// In-process message bus connecting triggers, the orchestrator and presenters.
///
/// The orchestrator only holds [`Presenters`], so it stops once every `Bus`
/// handle is dropped.
#[derive(Clone)]
pub struct Bus {
    orchestrator: mpsc::UnboundedSender<OrchestratorMessage>,
    presenters: Presenters,
}

impl Bus {
    /// Creates a bus and the receiving end of the orchestrator inbox.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrchestratorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Self {
            orchestrator: tx,
            presenters: Presenters::default(),
        };
        (bus, rx)
    }

    pub fn presenters(&self) -> Presenters {
        self.presenters.clone()
    }

    pub fn register(&self, tab: TabId) -> mpsc::UnboundedReceiver<PresenterMessage> {
        self.presenters.register(tab)
    }

    pub fn send_to_orchestrator(&self, message: OrchestratorMessage) -> Result<()> {
        self.orchestrator
            .send(message)
            .map_err(|_| eyre!("orchestrator is not running"))
    }

    pub fn send_to_tab(&self, tab: TabId, message: PresenterMessage) {
        self.presenters.send_to_tab(tab, message);
    }
}
