use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    config::ChatConfig,
    events::{Outbound, Request},
    hub::{Hub, HubStats},
    now_ms,
    presence::ConnId,
};

enum Command {
    Connect {
        conn: ConnId,
        outbox: mpsc::Sender<Outbound>,
    },
    Event {
        conn: ConnId,
        request: Request,
    },
    Disconnect {
        conn: ConnId,
    },
    Stats {
        reply: oneshot::Sender<HubStats>,
    },
}

/// Cloneable front door to the hub task.
///
/// All state lives in the task spawned by [`HubHandle::spawn`]; handles
/// only queue commands, so events are applied strictly one at a time.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<Command>,
    outbox_capacity: usize,
}

impl HubHandle {
    pub fn spawn(config: ChatConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox_capacity = config.outbox_capacity;
        let task = tokio::spawn(run(Hub::new(config), rx));
        (Self { tx, outbox_capacity }, task)
    }

    /// Opens a connection and returns the receiving end of its outbox.
    /// The hub drops the connection if this end falls too far behind.
    pub fn connect(&self, conn: ConnId) -> mpsc::Receiver<Outbound> {
        let (outbox, rx) = mpsc::channel(self.outbox_capacity);
        self.submit(Command::Connect { conn, outbox });
        rx
    }

    pub fn send(&self, conn: ConnId, request: Request) {
        self.submit(Command::Event { conn, request });
    }

    pub fn disconnect(&self, conn: ConnId) {
        self.submit(Command::Disconnect { conn });
    }

    pub async fn stats(&self) -> anyhow::Result<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Stats { reply })
            .map_err(|_| anyhow::anyhow!("hub task has stopped"))?;
        Ok(rx.await?)
    }

    fn submit(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::error!("hub task has stopped, command dropped");
        }
    }
}

async fn run(mut hub: Hub, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Connect { conn, outbox } => hub.connect(conn, outbox),
            Command::Event { conn, request } => {
                hub.handle(conn, request, now_ms());
            }
            Command::Disconnect { conn } => {
                hub.disconnect(conn, now_ms());
            }
            Command::Stats { reply } => {
                let _ = reply.send(hub.stats());
            }
        }
    }
    tracing::debug!("hub task finished");
}
