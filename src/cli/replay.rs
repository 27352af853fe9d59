//! Replay of recorded transport activity.
//!
//! A replay script is JSON lines, one step per line. Blank lines and lines
//! starting with `#` are skipped:
//!
//! ```text
//! # register a peer, send it action info, then deliver a file
//! {"step":"register","peer_id":"p1","display_name":"Alice's phone"}
//! {"step":"metadata","peer_id":"p1","payload":{"photo.jpg":{"album":"trip"}}}
//! {"step":"event","event":{"type":"transfer_finished","peer_id":"p1","resource_name":"photo.jpg","source_path":"/tmp/x"}}
//! ```

use crate::peer::{ConnectionState, PeerId, PeerItem};
use crate::session::{SessionEvent, SessionEventHandler, TransportDelegate, TransportEvent};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

fn default_visible() -> bool {
    true
}

fn default_state() -> ConnectionState {
    ConnectionState::Connected
}

/// One line of a replay script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReplayStep {
    /// Add a peer to the registry, as discovery would
    Register {
        peer_id: PeerId,
        display_name: String,
        #[serde(default = "default_visible")]
        visible: bool,
        #[serde(default = "default_state")]
        state: ConnectionState,
    },
    /// Deliver an action info payload. A string is sent verbatim, anything
    /// else is sent as its JSON encoding.
    Metadata { peer_id: PeerId, payload: Value },
    /// Deliver a raw transport event
    Event { event: TransportEvent },
}

impl ReplayStep {
    /// The transport event this step delivers, if any
    pub fn into_transport_event(self) -> Result<Option<TransportEvent>> {
        match self {
            Self::Register { .. } => Ok(None),
            Self::Metadata { peer_id, payload } => {
                let data = match payload {
                    Value::String(raw) => raw.into_bytes(),
                    other => serde_json::to_vec(&other)
                        .context("Failed to encode metadata payload")?,
                };
                Ok(Some(TransportEvent::DataReceived { peer_id, data }))
            }
            Self::Event { event } => Ok(Some(event)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    pub fn parse(content: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step = serde_json::from_str(line)
                .with_context(|| format!("Invalid replay step on line {}", index + 1))?;
            steps.push(step);
        }
        Ok(Self { steps })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Run `script` through `handler` step by step and return every application
/// event it produced, in emission order.
pub async fn replay(handler: &SessionEventHandler, script: ReplayScript) -> Result<Vec<SessionEvent>> {
    let mut subscription = handler.subscribe();
    let total = script.len();

    for (index, step) in script.steps.into_iter().enumerate() {
        debug!("Replaying step {}/{}: {:?}", index + 1, total, step);
        if let ReplayStep::Register {
            peer_id,
            display_name,
            visible,
            state,
        } = &step
        {
            handler.registry().insert(
                PeerItem::new(peer_id.clone(), display_name.clone(), *visible).with_state(*state),
            );
            continue;
        }
        if let Some(event) = step.into_transport_event()? {
            handler.dispatch(event).await;
        }
        if handler.is_shut_down() {
            warn!("Replay stopped after step {}/{}: handler shut down", index + 1, total);
            break;
        }
    }

    let events = subscription.drain();
    handler.unsubscribe(subscription.id());
    info!("Replayed {} steps, {} events emitted", total, events.len());
    Ok(events)
}

/// Like [`replay`], but shuts the handler down once `shutdown_signal`
/// completes.
///
/// The replay keeps running after the signal so the step in flight observes
/// the cancellation: its copy is discarded and reported as failed. No further
/// steps are started.
pub async fn replay_until<S>(
    handler: &SessionEventHandler,
    script: ReplayScript,
    shutdown_signal: S,
) -> Result<Vec<SessionEvent>>
where
    S: Future<Output = ()>,
{
    let run = replay(handler, script);
    tokio::pin!(run);

    tokio::select! {
        biased;
        events = &mut run => return events,
        _ = shutdown_signal => {
            warn!("Shutdown requested, cancelling in-flight copies");
            handler.shutdown();
        }
    }

    run.await
}
