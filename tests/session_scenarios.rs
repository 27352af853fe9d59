//! End-to-end scenarios for the session event handler
//!
//! Each test drives a handler only through `TransportDelegate::dispatch`, the
//! way a transport would, and checks the application events and on-disk
//! results. Unit tests for individual components live next to their modules.

use nearby_session::{
    ConnectionState, PeerId, PeerItem, ServiceConfig, SessionEvent, SessionEventHandler,
    TransferProgress, TransferState, TransportDelegate, TransportEvent,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    handler: Arc<SessionEventHandler>,
    storage: TempDir,
    sources: TempDir,
}

impl Harness {
    fn new() -> Self {
        let storage = TempDir::new().unwrap();
        let sources = TempDir::new().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.storage_root = storage.path().to_path_buf();

        Self {
            handler: Arc::new(SessionEventHandler::new(&config)),
            storage,
            sources,
        }
    }

    fn register(&self, id: &str, visible: bool) -> PeerId {
        let peer_id = PeerId::from(id);
        self.handler.registry().insert(
            PeerItem::new(peer_id.clone(), format!("{} device", id), visible)
                .with_state(ConnectionState::Connected),
        );
        peer_id
    }

    fn source_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.sources.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn staging(&self) -> PathBuf {
        self.storage.path().join("pending_action")
    }

    fn archive(&self) -> PathBuf {
        self.storage.path().join("received")
    }
}

fn finished(peer_id: &PeerId, resource_name: &str, source_path: Option<PathBuf>) -> TransportEvent {
    TransportEvent::TransferFinished {
        peer_id: peer_id.clone(),
        resource_name: resource_name.to_string(),
        source_path,
        error: None,
    }
}

#[tokio::test]
async fn test_metadata_then_transfer_lands_in_staging() {
    let harness = Harness::new();
    let peer_id = harness.register("alice", true);
    let mut events = harness.handler.subscribe();
    let source = harness.source_file("tmp-1", b"jpeg bytes");

    harness
        .handler
        .dispatch(TransportEvent::DataReceived {
            peer_id: peer_id.clone(),
            data: br#"{"photo.jpg": {"album": "trip"}}"#.to_vec(),
        })
        .await;
    harness
        .handler
        .dispatch(TransportEvent::TransferStarted {
            peer_id: peer_id.clone(),
            resource_name: "photo.jpg".to_string(),
            progress: TransferProgress::new(10),
        })
        .await;
    harness
        .handler
        .dispatch(finished(&peer_id, "photo.jpg", Some(source.clone())))
        .await;

    let events = events.drain();
    assert_eq!(events.len(), 2, "events: {:?}", events);
    assert!(matches!(
        &events[0],
        SessionEvent::DidStartReceivingResource { resource_name, .. } if resource_name == "photo.jpg"
    ));

    match &events[1] {
        SessionEvent::DidReceiveResource {
            resource_name,
            peer,
            destination_path,
            action_info,
        } => {
            let expected = harness.staging().join("photo.jpg");
            assert_eq!(resource_name, "photo.jpg");
            assert_eq!(peer.as_ref().map(|p| p.id.clone()), Some(peer_id.clone()));
            assert_eq!(destination_path.as_deref(), Some(expected.as_path()));
            assert_eq!(
                serde_json::Value::Object(action_info.clone().unwrap()),
                serde_json::json!({"album": "trip"})
            );
            assert_eq!(fs::read(&expected).unwrap(), b"jpeg bytes");
        }
        other => panic!("unexpected event {:?}", other),
    }

    // The transport's temporary file is copied, not moved
    assert!(source.exists());
    assert!(harness.handler.action_info().is_empty());
    let peer = harness.handler.registry().get(&peer_id).unwrap();
    assert_eq!(peer.transfer_state, TransferState::Idle);
    assert!(peer.progress.is_none());
}

fn staged_action_info(events: &[SessionEvent]) -> (PathBuf, serde_json::Value) {
    match events.last() {
        Some(SessionEvent::DidReceiveResource {
            destination_path: Some(path),
            action_info: Some(info),
            ..
        }) => (path.clone(), serde_json::Value::Object(info.clone())),
        other => panic!("expected DidReceiveResource with action info, got {:?}", other),
    }
}

#[tokio::test]
async fn test_metadata_during_transfer_lands_in_staging() {
    let harness = Harness::new();
    let peer_id = harness.register("alice", true);
    let mut events = harness.handler.subscribe();
    let source = harness.source_file("tmp-during", b"video");

    harness
        .handler
        .dispatch(TransportEvent::TransferStarted {
            peer_id: peer_id.clone(),
            resource_name: "clip.mp4".to_string(),
            progress: TransferProgress::new(5),
        })
        .await;
    harness
        .handler
        .dispatch(TransportEvent::DataReceived {
            peer_id: peer_id.clone(),
            data: br#"{"clip.mp4": {"action": "play"}}"#.to_vec(),
        })
        .await;
    harness
        .handler
        .dispatch(finished(&peer_id, "clip.mp4", Some(source)))
        .await;

    let (destination, action_info) = staged_action_info(&events.drain());
    assert_eq!(destination, harness.staging().join("clip.mp4"));
    assert_eq!(action_info, serde_json::json!({"action": "play"}));
    assert_eq!(fs::read(&destination).unwrap(), b"video");
    assert!(harness.handler.action_info().is_empty());
}

#[tokio::test]
async fn test_metadata_from_another_peer_still_applies() {
    let harness = Harness::new();
    let announcer = harness.register("laptop", true);
    let sender = harness.register("phone", true);
    let mut events = harness.handler.subscribe();
    let source = harness.source_file("tmp-cross", b"pdf");

    harness
        .handler
        .dispatch(TransportEvent::DataReceived {
            peer_id: announcer,
            data: br#"{"slides.pdf": {"open": "presenter"}}"#.to_vec(),
        })
        .await;
    harness
        .handler
        .dispatch(finished(&sender, "slides.pdf", Some(source)))
        .await;

    let events = events.drain();
    let (destination, action_info) = staged_action_info(&events);
    assert_eq!(destination, harness.staging().join("slides.pdf"));
    assert_eq!(action_info, serde_json::json!({"open": "presenter"}));
    assert_eq!(events.last().unwrap().peer_id(), Some(&sender));
}

#[tokio::test]
async fn test_transfer_without_metadata_lands_in_archive() {
    let harness = Harness::new();
    let peer_id = harness.register("bob", true);
    let mut events = harness.handler.subscribe();
    let source = harness.source_file("tmp-2", b"some notes");

    harness
        .handler
        .dispatch(finished(&peer_id, "notes.txt", Some(source)))
        .await;

    let events = events.drain();
    assert_eq!(events.len(), 1);
    match &events[0] {
        SessionEvent::DidReceiveResource {
            destination_path,
            action_info,
            ..
        } => {
            assert!(action_info.is_none());
            let destination = destination_path.as_ref().unwrap();
            assert!(destination.starts_with(harness.archive()));
            assert_eq!(fs::read(destination).unwrap(), b"some notes");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_archive_never_overwrites_earlier_resources() {
    let harness = Harness::new();
    let peer_id = harness.register("bob", true);

    for contents in [b"first".as_slice(), b"second", b"third"] {
        let source = harness.source_file("tmp", contents);
        harness
            .handler
            .dispatch(finished(&peer_id, "notes.txt", Some(source)))
            .await;
    }

    let archive = harness.archive();
    assert_eq!(fs::read(archive.join("notes.txt")).unwrap(), b"first");
    assert_eq!(fs::read(archive.join("notes (1).txt")).unwrap(), b"second");
    assert_eq!(fs::read(archive.join("notes (2).txt")).unwrap(), b"third");
}

#[tokio::test]
async fn test_transport_error_emits_nothing_and_returns_to_idle() {
    let harness = Harness::new();
    let peer_id = harness.register("carol", true);

    harness
        .handler
        .dispatch(TransportEvent::TransferStarted {
            peer_id: peer_id.clone(),
            resource_name: "movie.mov".to_string(),
            progress: TransferProgress::new(1_000),
        })
        .await;
    assert!(harness.handler.registry().get(&peer_id).unwrap().is_receiving());

    let mut events = harness.handler.subscribe();
    harness
        .handler
        .dispatch(TransportEvent::TransferFinished {
            peer_id: peer_id.clone(),
            resource_name: "movie.mov".to_string(),
            source_path: None,
            error: Some("connection lost".to_string()),
        })
        .await;

    assert!(events.drain().is_empty());
    let peer = harness.handler.registry().get(&peer_id).unwrap();
    assert_eq!(peer.transfer_state, TransferState::Idle);
    assert!(peer.progress.is_none());
    assert!(!harness.staging().join("movie.mov").exists());
}

#[tokio::test]
async fn test_unregistered_peer_is_ignored() {
    let harness = Harness::new();
    let known = harness.register("known", true);
    let stranger = PeerId::from("stranger");
    let mut events = harness.handler.subscribe();

    for event in [
        TransportEvent::PeerStateChanged {
            peer_id: stranger.clone(),
            display_name: "Stranger".to_string(),
            state: ConnectionState::Connected,
        },
        TransportEvent::DataReceived {
            peer_id: stranger.clone(),
            data: br#"{"secret.txt": {"k": "v"}}"#.to_vec(),
        },
        TransportEvent::TransferStarted {
            peer_id: stranger.clone(),
            resource_name: "secret.txt".to_string(),
            progress: TransferProgress::default(),
        },
        TransportEvent::ByteStreamOpened {
            peer_id: stranger.clone(),
            stream_name: "stream".to_string(),
        },
    ] {
        harness.handler.dispatch(event).await;
    }

    assert!(events.drain().is_empty());
    assert!(harness.handler.action_info().is_empty());
    assert!(!harness.handler.registry().contains(&stranger));
    assert_eq!(harness.handler.registry().len(), 1);
    assert!(harness.handler.registry().contains(&known));
    assert_eq!(harness.handler.registry().lane_count(), 0);
}

#[tokio::test]
async fn test_invisible_peer_lifecycle() {
    let harness = Harness::new();
    let visible = harness.register("visible", true);
    let hidden = harness.register("hidden", false);
    let mut events = harness.handler.subscribe();

    for peer_id in [&visible, &hidden] {
        harness
            .handler
            .dispatch(TransportEvent::PeerStateChanged {
                peer_id: peer_id.clone(),
                display_name: peer_id.to_string(),
                state: ConnectionState::NotConnected,
            })
            .await;
    }

    let events = events.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].peer_id(), Some(&visible));

    let registry = harness.handler.registry();
    assert!(!registry.contains(&hidden));
    assert_eq!(
        registry.get(&visible).unwrap().connection_state,
        ConnectionState::NotConnected
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_peers_keep_their_own_order() {
    let harness = Harness::new();
    let peers: Vec<PeerId> = (0..8)
        .map(|i| harness.register(&format!("peer-{}", i), true))
        .collect();
    let mut events = harness.handler.subscribe();

    let mut tasks = Vec::new();
    for (i, peer_id) in peers.iter().enumerate() {
        let handler = Arc::clone(&harness.handler);
        let peer_id = peer_id.clone();
        let resource_name = format!("file-{}.bin", i);
        let source = harness.source_file(&format!("tmp-{}", i), format!("payload {}", i).as_bytes());

        tasks.push(tokio::spawn(async move {
            handler
                .dispatch(TransportEvent::TransferStarted {
                    peer_id: peer_id.clone(),
                    resource_name: resource_name.clone(),
                    progress: TransferProgress::new(9),
                })
                .await;
            handler
                .dispatch(finished(&peer_id, &resource_name, Some(source)))
                .await;
        }));
    }
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    let events = events.drain();
    assert_eq!(events.len(), peers.len() * 2);
    for peer_id in &peers {
        let kinds: Vec<bool> = events
            .iter()
            .filter(|event| event.peer_id() == Some(peer_id))
            .map(|event| matches!(event, SessionEvent::DidReceiveResource { .. }))
            .collect();
        assert_eq!(kinds, vec![false, true], "out of order for {}", peer_id);
    }
    assert_eq!(harness.handler.registry().lane_count(), peers.len());
    assert_eq!(fs::read_dir(harness.archive()).unwrap().count(), peers.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_name_transfers_get_distinct_paths() {
    let harness = Harness::new();
    let mut tasks = Vec::new();

    for i in 0..6 {
        let handler = Arc::clone(&harness.handler);
        let peer_id = harness.register(&format!("sender-{}", i), true);
        let source = harness.source_file(&format!("tmp-{}", i), format!("{}", i).as_bytes());
        tasks.push(tokio::spawn(async move {
            handler
                .handle_transfer_finish(&peer_id, "report.pdf", Some(source), None)
                .await
                .unwrap()
        }));
    }

    let mut paths: Vec<PathBuf> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
    for path in &paths {
        assert!(path.starts_with(harness.archive()));
    }
}
