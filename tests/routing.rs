//! End-to-end routing through a session backed by the in-memory MIDI backend.

use std::sync::Arc;
use std::thread;

use midi_router::midi::MemoryBackend;
use midi_router::start_session;

mod common;

const NOTE_ON: [u8; 3] = [0x90, 60, 100];

#[tokio::test]
async fn test_message_forwarded_and_counted() {
    let routes = common::route_file("A = Keys\nB = Synth\nA -> B\n");
    let backend = MemoryBackend::new(&["Keys MIDI 1"], &["Synth MIDI 1"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();

    assert_eq!(backend.inject("Keys MIDI 1", &NOTE_ON), 1);

    assert_eq!(backend.sent_to("Synth MIDI 1"), vec![NOTE_ON.to_vec()]);
    let stats = session.router().stats().clone();
    assert_eq!(stats.peek("A").unwrap().received, 1);
    assert_eq!(stats.peek("B").unwrap().sent, 1);

    session.stop().await;
}

#[tokio::test]
async fn test_unresolved_destination_produces_no_send() {
    let routes = common::route_file("A = Keys\nC = Missing Device\nA -> C\n");
    let backend = MemoryBackend::new(&["Keys"], &["Synth"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();
    let port = session.registry().get("C").unwrap();
    assert!(!port.has_input() && !port.has_output());

    backend.inject("Keys", &NOTE_ON);

    assert!(backend.sent().is_empty());
    assert_eq!(session.router().stats().peek("A").unwrap().received, 1);
    session.stop().await;
}

#[tokio::test]
async fn test_fan_out_and_loopback_endpoint() {
    // One endpoint can be both a source and a destination
    let routes = common::route_file(
        "keys = Keys\nsynth = Synth\nbox = Interface\n\
         keys -> synth, box\nbox -> synth\n",
    );
    let backend = MemoryBackend::new(&["Keys", "Interface"], &["Synth", "Interface"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();

    backend.inject("Keys", &NOTE_ON);
    backend.inject("Interface", &[0xF8]);

    assert_eq!(backend.sent_to("Synth"), vec![NOTE_ON.to_vec(), vec![0xF8]]);
    assert_eq!(backend.sent_to("Interface"), vec![NOTE_ON.to_vec()]);

    let snapshot = session.router().stats().take_snapshot();
    let synth = snapshot.iter().find(|r| r.id == "synth").unwrap();
    assert_eq!(synth.sent, 2);
    let interface = snapshot.iter().find(|r| r.id == "box").unwrap();
    assert_eq!((interface.received, interface.sent), (1, 1));

    session.stop().await;
}

#[tokio::test]
async fn test_config_warnings_do_not_stop_startup() {
    let routes = common::route_file("A = Keys\nA = Other\nZ -> A\ngarbage\nB = Synth\nA -> B\n");
    let backend = MemoryBackend::new(&["Keys"], &["Synth", "Other"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();
    assert_eq!(session.config().warnings.len(), 3);
    assert_eq!(session.config().definition("A").unwrap().match_key, "Keys");

    backend.inject("Keys", &NOTE_ON);
    assert_eq!(backend.sent_to("Synth").len(), 1);
    assert!(backend.sent_to("Other").is_empty());

    session.stop().await;
}

#[tokio::test]
async fn test_concurrent_sources_lose_no_counts() {
    let routes = common::route_file("a = In A\nb = In B\nout = Out\na -> out\nb -> out\n");
    let backend = MemoryBackend::new(&["In A", "In B"], &["Out"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();

    let workers: Vec<_> = ["In A", "In B"]
        .into_iter()
        .map(|input| {
            let backend = backend.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    backend.inject(input, &NOTE_ON);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let stats = session.router().stats();
    assert_eq!(stats.peek("a").unwrap().received, 500);
    assert_eq!(stats.peek("b").unwrap().received, 500);
    assert_eq!(stats.peek("out").unwrap().sent, 1000);
    assert_eq!(backend.sent_to("Out").len(), 1000);

    session.stop().await;
}

#[tokio::test]
async fn test_virtual_fallback_creates_ports() {
    let routes = common::route_file("v = Router Port\nsynth = Synth\nv -> synth\n");
    let backend = MemoryBackend::new(&[], &["Synth"]);

    let mut settings = common::quiet_settings(&routes);
    settings.virtual_fallback = true;
    let mut session = start_session(&settings, Arc::new(backend.clone())).await.unwrap();

    // Virtual input receives traffic from other applications
    backend.inject("Router Port", &NOTE_ON);
    assert_eq!(backend.sent_to("Synth").len(), 1);

    session.stop().await;
    assert_eq!(backend.open_ports(), 0);
}

#[tokio::test]
async fn test_stop_closes_every_device_while_session_alive() {
    let routes = common::route_file("keys = Keys\nsynth = Synth\nbox = Interface\nkeys -> synth, box\n");
    let backend = MemoryBackend::new(&["Keys", "Interface"], &["Synth", "Interface"]);

    let mut session = start_session(&common::quiet_settings(&routes), Arc::new(backend.clone())).await.unwrap();
    assert_eq!(backend.open_ports(), 4);

    assert_eq!(session.stop().await, 4);
    assert_eq!(backend.open_ports(), 0);

    assert_eq!(backend.inject("Keys", &NOTE_ON), 0);
    let outcome = session.router().dispatch("keys", &NOTE_ON);
    assert_eq!(outcome.skipped, 2);
    assert!(backend.sent().is_empty());
}
