//! Polling subscription behavior against an in-process store.

mod common;

use common::{endpoint, memory_manager, wait_until, RecordingSurface, WAIT};
use matchsync::{ChannelId, Message, MemoryStore, SubscriptionManager};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn record(sender: &str, recipient: &str, text: &str, timestamp: i64) -> serde_json::Value {
    json!({
        "remitenteId": sender,
        "destinatarioId": recipient,
        "texto": text,
        "timestamp": timestamp
    })
}

// --- Delivery ---

#[test]
fn test_first_cycle_delivers_stored_record() {
    let (store, manager) = memory_manager();
    store.put("mensajes/A_B/m1", record("A", "B", "hi", 1000)).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded();
    manager
        .subscribe(ChannelId::derive("A", "B"), endpoint(), tx)
        .unwrap();

    let msg = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(
        msg,
        Message {
            id: "m1".to_string(),
            sender_id: "A".to_string(),
            recipient_id: "B".to_string(),
            text: "hi".to_string(),
            timestamp_millis: 1000,
        }
    );
    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
}

#[test]
fn test_each_record_delivered_once_across_cycles() {
    let (store, manager) = memory_manager();
    let channel = ChannelId::derive("A", "B");
    store.put("mensajes/A_B/m1", record("A", "B", "one", 1)).unwrap();
    store.put("mensajes/A_B/m2", record("B", "A", "two", 2)).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    manager
        .subscribe(channel.clone(), endpoint(), move |_: &Message| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(WAIT, || manager.stats(&channel).unwrap().cycles >= 5));
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(manager.stats(&channel).unwrap().delivered, 2);
}

#[test]
fn test_conversation_scenario() {
    let (store, manager) = memory_manager();
    let channel = ChannelId::derive("B", "A");
    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(channel.clone(), endpoint(), tx).unwrap();

    store.put("mensajes/A_B/m1", record("A", "B", "first", 1)).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "m1");

    store.put("mensajes/A_B/m2", record("B", "A", "second", 2)).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "m2");
    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

    assert!(manager.unsubscribe(&channel));
    // Let any in-flight cycle finish before the backend changes.
    thread::sleep(Duration::from_millis(100));
    let late: Vec<Message> = rx.try_iter().collect();
    assert!(late.iter().all(|m| m.id != "m3"));

    store.put("mensajes/A_B/m3", record("A", "B", "third", 3)).unwrap();
    thread::sleep(Duration::from_millis(150));
    assert!(rx.try_iter().all(|m| m.id != "m3"));
}

#[test]
fn test_meta_record_is_not_a_message() {
    let (store, manager) = memory_manager();
    store.put("mensajes/A_B/meta", json!({"a": "A", "b": "B"})).unwrap();
    store.put("mensajes/A_B/m1", record("A", "B", "hi", 1)).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager
        .subscribe(ChannelId::derive("A", "B"), endpoint(), tx)
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "m1");
    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
}

#[test]
fn test_resubscribe_redelivers_history() {
    let (store, manager) = memory_manager();
    let channel = ChannelId::derive("A", "B");
    store.put("mensajes/A_B/m1", record("A", "B", "hi", 1)).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(channel.clone(), endpoint(), tx.clone()).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "m1");
    manager.unsubscribe(&channel);

    manager.subscribe(channel.clone(), endpoint(), tx).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "m1");
}

// --- Absent collections and failures ---

#[test]
fn test_missing_collection_delivers_nothing() {
    let (_store, manager) = memory_manager();
    let channel = ChannelId::derive("A", "B");
    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(channel.clone(), endpoint(), tx).unwrap();

    assert!(wait_until(WAIT, || manager.stats(&channel).unwrap().cycles >= 3));
    let stats = manager.stats(&channel).unwrap();
    assert_eq!(stats.failed_cycles, 0);
    assert_eq!(stats.delivered, 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_transport_failure_keeps_schedule() {
    let (store, manager) = memory_manager();
    let channel = ChannelId::derive("A", "B");
    store.set_offline(true);

    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(channel.clone(), endpoint(), tx).unwrap();

    assert!(wait_until(WAIT, || manager.stats(&channel).unwrap().failed_cycles >= 3));
    assert!(manager.is_subscribed(&channel));

    store.set_offline(false);
    store.put("mensajes/A_B/m1", record("A", "B", "back", 1)).unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap().text, "back");
}

// --- Registry ---

#[test]
fn test_concurrent_subscribe_creates_one() {
    let (store, manager) = memory_manager();
    let manager = Arc::new(manager);
    let channel = ChannelId::derive("A", "B");
    let deliveries = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let channel = channel.clone();
            let deliveries = Arc::clone(&deliveries);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager
                    .subscribe(channel, endpoint(), move |_: &Message| {
                        deliveries.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap()
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();
    assert_eq!(created, 1);
    assert_eq!(manager.subscription_count(), 1);

    store.put("mensajes/A_B/m1", record("A", "B", "hi", 1)).unwrap();
    assert!(wait_until(WAIT, || deliveries.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(100));
    assert_eq!(deliveries.load(Ordering::SeqCst), 1);
}

#[test]
fn test_second_listener_is_ignored() {
    let (store, manager) = memory_manager();
    let channel = ChannelId::derive("A", "B");
    let (first_tx, first_rx) = crossbeam_channel::unbounded::<Message>();
    let (second_tx, second_rx) = crossbeam_channel::unbounded::<Message>();

    assert!(manager.subscribe(channel.clone(), endpoint(), first_tx).unwrap());
    assert!(!manager.subscribe(channel, endpoint(), second_tx).unwrap());

    store.put("mensajes/A_B/m1", record("A", "B", "hi", 1)).unwrap();
    assert_eq!(first_rx.recv_timeout(WAIT).unwrap().id, "m1");
    // The ignored listener was dropped with its sender.
    assert!(second_rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_channels_poll_independently() {
    let (store, manager) = memory_manager();
    let (ab_tx, ab_rx) = crossbeam_channel::unbounded::<Message>();
    let (ac_tx, ac_rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(ChannelId::derive("A", "B"), endpoint(), ab_tx).unwrap();
    manager.subscribe(ChannelId::derive("A", "C"), endpoint(), ac_tx).unwrap();

    store.put("mensajes/A_C/x", record("C", "A", "to c", 1)).unwrap();
    assert_eq!(ac_rx.recv_timeout(WAIT).unwrap().text, "to c");
    assert!(ab_rx.recv_timeout(Duration::from_millis(100)).is_err());

    manager.unsubscribe(&ChannelId::derive("A", "C"));
    store.put("mensajes/A_B/y", record("B", "A", "to b", 2)).unwrap();
    assert_eq!(ab_rx.recv_timeout(WAIT).unwrap().text, "to b");
}

#[test]
fn test_shutdown_stops_polling() {
    let (store, manager) = memory_manager();
    for peer in ["B", "C"] {
        manager
            .subscribe(ChannelId::derive("A", peer), endpoint(), |_: &Message| {})
            .unwrap();
    }
    assert!(wait_until(WAIT, || store.read_count() >= 4));

    manager.shutdown();
    let reads = store.read_count();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(store.read_count(), reads);
}

// --- Notifications ---

fn notifying_manager(surface: &Arc<RecordingSurface>) -> (Arc<MemoryStore>, SubscriptionManager) {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let manager = SubscriptionManager::new(store.clone(), common::fast_config())
        .with_notifications(surface.clone());
    (store, manager)
}

#[test]
fn test_background_delivery_posts_notification() {
    let surface = Arc::new(RecordingSurface::default());
    let (store, manager) = notifying_manager(&surface);
    store.put("mensajes/A_B/m1", record("A", "B", "hola", 1)).unwrap();

    manager
        .subscribe(ChannelId::derive("A", "B"), endpoint(), |_: &Message| {})
        .unwrap();

    assert!(wait_until(WAIT, || surface.posts.lock().len() == 1));
    assert_eq!(
        surface.posts.lock()[0],
        ("Nuevo mensaje".to_string(), "hola".to_string())
    );
    assert_eq!(surface.channels.lock().len(), 1);
}

#[test]
fn test_foreground_suppresses_notification() {
    let surface = Arc::new(RecordingSurface::default());
    surface.foreground.store(true, Ordering::SeqCst);
    let (store, manager) = notifying_manager(&surface);
    store.put("mensajes/A_B/m1", record("A", "B", "hola", 1)).unwrap();

    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    manager.subscribe(ChannelId::derive("A", "B"), endpoint(), tx).unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap().text, "hola");
    thread::sleep(Duration::from_millis(50));
    assert!(surface.posts.lock().is_empty());
    assert!(surface.channels.lock().is_empty());
}
