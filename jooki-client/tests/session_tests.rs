//! End-to-end session tests over an in-process transport.
//!
//! The `TransportHandle` plays the device: it observes what the session
//! publishes and answers with state notifications, the only feedback channel
//! the real device has.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use jooki_client::{
    topics, ChannelTransport, ClientError, PlaybackState, PlaylistUpdate, ReadOutcome, Session,
    TransportHandle,
};
use jooki_discovery::DeviceDescriptor;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        hostname: "jooki-1a2b".to_string(),
        id: "dev-1".to_string(),
        address: "192.168.1.50".to_string(),
    }
}

async fn connect() -> (Session, TransportHandle) {
    init_tracing();
    let (transport, handle) = ChannelTransport::new();
    let session = Session::connect(Arc::new(transport), descriptor(), "2.5.1")
        .await
        .unwrap();
    (session, handle)
}

/// Answer the first publish on `command` with one state notification.
fn respond_to(handle: TransportHandle, command: &str, state_payload: String) {
    let topic = topics::command(command);
    tokio::spawn(async move {
        loop {
            if !handle.published_to(&topic).is_empty() {
                assert!(handle.send_state(&state_payload).await);
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });
}

#[tokio::test]
async fn test_handshake_order_and_shape() {
    let (_session, handle) = connect().await;

    assert_eq!(
        handle.subscriptions(),
        vec![
            topics::QUIT.to_string(),
            topics::STATE.to_string(),
            topics::ERROR.to_string(),
            topics::PONG.to_string(),
        ]
    );

    let published = handle.published();
    assert_eq!(published[0].topic, topics::PING);
    assert_eq!(published[1].topic, topics::command("CONNECT"));
    assert_eq!(published[2].topic, topics::command("GET_STATE"));

    let hello: serde_json::Value = serde_json::from_slice(&published[1].payload).unwrap();
    assert_eq!(hello["jooki"]["label"], "jooki-1a2b *");
    assert_eq!(hello["jooki"]["ip"]["address"], "jooki-1a2b");
    assert_eq!(hello["jooki"]["ip"]["ping"], "LIVE");
    assert_eq!(hello["jooki"]["live"], "jooki-1a2b");
    assert_eq!(hello["jooki"]["version"], "2.5.1");

    let get_state: serde_json::Value = serde_json::from_slice(&published[2].payload).unwrap();
    assert_eq!(get_state, serde_json::json!({}));
}

#[tokio::test]
async fn test_state_notifications_accumulate_in_order() {
    let (session, handle) = connect().await;

    let mut awaiter = session.add_awaiter().unwrap();
    for volume in [1u8, 2, 3] {
        assert!(
            handle
                .send_state(&format!(r#"{{"audio": {{"config": {{"volume": {volume}}}}}}}"#))
                .await
        );
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    for _ in 0..3 {
        assert_eq!(awaiter.read_until(deadline).await, ReadOutcome::Received);
    }
    let window = awaiter.close();
    let volumes: Vec<_> = window.deltas.iter().map(|delta| delta.volume()).collect();
    assert_eq!(volumes, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(window.before.volume(), None);
    assert_eq!(window.after.volume(), Some(3));
    assert_eq!(session.state().volume(), Some(3));
}

#[tokio::test]
async fn test_play_resolves_on_state_evidence() {
    let (session, handle) = connect().await;

    respond_to(
        handle,
        "DO_PLAY",
        r#"{"audio": {
            "nowPlaying": {"track": "Song", "trackId": "t1"},
            "playback": {"state": "PLAYING", "position_ms": 0}
        }}"#
            .to_string(),
    );

    let audio = session.play().await.unwrap();
    assert_eq!(
        audio.playback.unwrap().state,
        Some(PlaybackState::Playing)
    );
    assert_eq!(audio.now_playing.unwrap().title.as_deref(), Some("Song"));
}

#[tokio::test]
async fn test_set_volume_matches_sparse_delta() {
    let (session, handle) = connect().await;

    // The device answers with a delta carrying nothing but the new volume.
    respond_to(
        handle.clone(),
        "SET_VOL",
        r#"{"audio": {"config": {"volume": 42}}}"#.to_string(),
    );

    session.set_volume(42).await.unwrap();
    assert_eq!(session.state().volume(), Some(42));

    let sent: serde_json::Value =
        serde_json::from_slice(&handle.published_to(&topics::command("SET_VOL"))[0]).unwrap();
    assert_eq!(sent, serde_json::json!({"vol": 42}));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_command_times_out_with_last_state() {
    let (session, handle) = connect().await;
    assert!(handle.send_state(r#"{"bt": "on"}"#).await);
    // Give the dispatch task a chance to apply the merge.
    tokio::time::sleep(Duration::from_millis(10)).await;

    match session.play().await {
        Err(ClientError::PredicateTimeout { last }) => {
            assert_eq!(last.bluetooth.as_deref(), Some("on"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_loss_fails_waits_as_closed_not_timeout() {
    let (session, handle) = connect().await;
    let session = Arc::new(session);

    let player = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.play().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.drop_connection("broker went away").await);

    match player.await.unwrap() {
        Err(ClientError::SessionClosed { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session.is_closed());

    // Commands on a closed session fail fast.
    match session.pause().await {
        Err(ClientError::NotConnected) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_loss_unblocks_every_inflight_command() {
    let (session, handle) = connect().await;
    let session = Arc::new(session);

    let player = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.play().await })
    };
    let volume = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.set_volume(11).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.drop_connection("broker went away").await);

    for result in [player.await.unwrap(), volume.await.unwrap()] {
        match result {
            Err(ClientError::SessionClosed { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_create_playlist_finds_the_new_key() {
    let (session, handle) = connect().await;
    // An existing playlist with the same title must not be picked up.
    assert!(
        handle
            .send_state(r#"{"db": {"playlists": {"p1": {"title": "Bedtime"}}}}"#)
            .await
    );
    tokio::time::sleep(Duration::from_millis(20)).await;

    respond_to(
        handle,
        "PLAYLIST_NEW",
        r#"{"db": {"playlists": {
            "p1": {"title": "Bedtime"},
            "p2": {"title": "Bedtime", "tracks": []}
        }}}"#
            .to_string(),
    );

    let playlist = session.create_playlist("Bedtime").await.unwrap();
    assert_eq!(playlist.id.as_deref(), Some("p2"));
    assert_eq!(playlist.title.as_deref(), Some("Bedtime"));
}

#[tokio::test]
async fn test_update_playlist_waits_for_exact_track_list() {
    let (session, handle) = connect().await;

    respond_to(
        handle.clone(),
        "PLAYLIST_UPDATE",
        r#"{"db": {"playlists": {"p1": {"title": "Road Trip", "tracks": ["t1", "t2"]}}}}"#
            .to_string(),
    );

    let playlist = session
        .update_playlist(&PlaylistUpdate {
            id: "p1".to_string(),
            tracks: Some(vec!["t1".to_string(), "t2".to_string()]),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(playlist.id.as_deref(), Some("p1"));
    assert_eq!(playlist.tracks.unwrap().len(), 2);

    let sent: serde_json::Value =
        serde_json::from_slice(&handle.published_to(&topics::command("PLAYLIST_UPDATE"))[0])
            .unwrap();
    assert_eq!(
        sent,
        serde_json::json!({"playlist": {"id": "p1", "tracks": ["t1", "t2"]}})
    );
}

#[tokio::test]
async fn test_add_track_waits_for_it_to_be_last() {
    let (session, handle) = connect().await;

    respond_to(
        handle,
        "PLAYLIST_ADD_TRACK",
        r#"{"db": {"playlists": {"p1": {"tracks": ["t1", "t9"]}}}}"#.to_string(),
    );

    let playlist = session.add_track_to_playlist("p1", "t9").await.unwrap();
    assert_eq!(
        playlist.tracks.unwrap().last().map(String::as_str),
        Some("t9")
    );
}

#[tokio::test]
async fn test_undecodable_notification_does_not_poison_the_session() {
    let (session, handle) = connect().await;

    assert!(handle.send_message(topics::STATE, b"not json").await);
    respond_to(
        handle,
        "SET_VOL",
        r#"{"audio": {"config": {"volume": 7}}}"#.to_string(),
    );

    session.set_volume(7).await.unwrap();
    assert_eq!(session.state().volume(), Some(7));
}

#[tokio::test]
async fn test_device_error_is_recorded_not_fatal() {
    let (session, handle) = connect().await;

    assert!(handle.send_message(topics::ERROR, b"nfc fault").await);
    respond_to(
        handle,
        "SET_VOL",
        r#"{"audio": {"config": {"volume": 9}}}"#.to_string(),
    );

    session.set_volume(9).await.unwrap();
    assert_eq!(session.last_device_error().as_deref(), Some("nfc fault"));
}

#[tokio::test]
async fn test_await_update_collects_whatever_arrives() {
    let (session, handle) = connect().await;

    let collector = {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.send_state(r#"{"wifi": {"ssid": "home"}}"#).await
        })
    };

    let window = session.await_update(Duration::from_secs(2)).await.unwrap();
    assert!(collector.await.unwrap());
    assert_eq!(
        window.after.wifi.and_then(|wifi| wifi.ssid).as_deref(),
        Some("home")
    );
}

#[tokio::test]
async fn test_quit_notice_closes_the_session() {
    let (session, handle) = connect().await;

    assert!(handle.send_message(topics::QUIT, b"").await);

    let deadline = Instant::now() + Duration::from_secs(2);
    while !session.is_closed() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_closes_awaiters() {
    let (session, _handle) = connect().await;
    let mut awaiter = session.add_awaiter().unwrap();

    session.disconnect();
    session.disconnect();

    let deadline = Instant::now() + Duration::from_secs(2);
    assert_eq!(awaiter.read_until(deadline).await, ReadOutcome::Closed);
    assert!(matches!(
        session.add_awaiter(),
        Err(ClientError::NotConnected)
    ));
}
