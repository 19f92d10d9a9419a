//! Concurrent appends against the in-process list store.

use std::sync::Arc;

use parley_memory::{InMemoryListStore, MemoryWindowStore};

#[tokio::test]
async fn test_concurrent_appends_never_exceed_window() {
    let windows = Arc::new(
        MemoryWindowStore::new(Arc::new(InMemoryListStore::new()))
            .with_window_length(5)
            .unwrap(),
    );
    let key = MemoryWindowStore::key_for_room(1, "PUBLIC");

    let mut handles = Vec::new();
    for task in 0..8 {
        let windows = Arc::clone(&windows);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                windows.append(&key, &format!("t{task}-{i}")).await.unwrap();
                let len = windows.window(&key).await.unwrap().len();
                assert!(len <= 5);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(windows.window(&key).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_windows_are_isolated_per_key() {
    let windows = MemoryWindowStore::new(Arc::new(InMemoryListStore::new()));
    let private = MemoryWindowStore::key_for_session(2, "s-1-2");
    let room = MemoryWindowStore::key_for_room(2, "r1");

    windows.append(&private, "Peer: hi").await.unwrap();
    windows.append(&room, "Broadcast: all").await.unwrap();

    assert_eq!(windows.window(&private).await.unwrap(), vec!["Peer: hi"]);
    assert_eq!(windows.window(&room).await.unwrap(), vec!["Broadcast: all"]);
}
