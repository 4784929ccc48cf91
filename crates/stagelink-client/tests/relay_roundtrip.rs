//! End-to-end tests against an in-process relay

use stagelink_client::{ConnectOptions, Controller, RelayConnection, Viewer};
use stagelink_core::{CameraPose, ServerEvent};
use stagelink_relay::{server, AppState, Config};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct TestRelay {
    ws_url: String,
    // Holds the store directory alive for the test
    #[allow(dead_code)]
    dir: tempfile::TempDir,
    models_path: std::path::PathBuf,
}

async fn spawn_relay() -> TestRelay {
    let dir = tempfile::tempdir().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = Config::default();
    config.daemon.bind = addr.to_string();
    config.daemon.public_url = Some(format!("http://{}", addr));
    config.models.path = dir.path().to_string_lossy().to_string();

    let state = AppState::new(config).unwrap();
    let app = server::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestRelay {
        ws_url: format!("ws://{}/ws", addr),
        models_path: dir.path().to_path_buf(),
        dir,
    }
}

fn connect(relay: &TestRelay) -> RelayConnection {
    RelayConnection::connect(
        relay.ws_url.clone(),
        ConnectOptions {
            reconnect_delay: Duration::from_millis(50),
            ..ConnectOptions::default()
        },
    )
}

/// Pump events into the controller until its arbitration state settles
async fn await_verdict(
    controller: &mut Controller,
    events: &mut broadcast::Receiver<ServerEvent>,
) -> ServerEvent {
    loop {
        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        controller.on_event(&event);
        if matches!(
            event,
            ServerEvent::ControlGranted | ServerEvent::ControlDenied
        ) {
            return event;
        }
    }
}

#[tokio::test]
async fn control_grant_and_pose_roundtrip() {
    let relay = spawn_relay().await;

    let viewer_conn = connect(&relay);
    assert!(viewer_conn.wait_connected(WAIT).await);
    let mut viewer_events = viewer_conn.subscribe();
    let mut viewer = Viewer::new(viewer_conn);

    let controller_conn = connect(&relay);
    assert!(controller_conn.wait_connected(WAIT).await);
    let mut controller_events = controller_conn.subscribe();
    let mut controller = Controller::new(controller_conn);

    controller.request_control();
    let verdict = await_verdict(&mut controller, &mut controller_events).await;
    assert_eq!(verdict, ServerEvent::ControlGranted);
    assert!(controller.has_control());

    let pose = CameraPose {
        position: [1.0, 2.0, 3.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        zoom: Some(1.5),
    };

    // Two frames with the same pose: exactly one event must go out
    assert!(controller.publish_pose(&pose));
    assert!(!controller.publish_pose(&pose));

    let event = timeout(WAIT, viewer_events.recv()).await.unwrap().unwrap();
    viewer.apply_event(&event);
    assert_eq!(viewer.camera.position, pose.position);
    assert_eq!(viewer.camera.rotation, pose.rotation);
    assert_eq!(viewer.camera.zoom, 1.5);

    // A changed pose arrives as the next event, with no duplicate between
    let moved = CameraPose {
        position: [4.0, 2.0, 3.0],
        ..pose.clone()
    };
    assert!(controller.publish_pose(&moved));
    let event = timeout(WAIT, viewer_events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ServerEvent::CameraUpdate(moved));
}

#[tokio::test]
async fn second_controller_denied_until_first_disconnects() {
    let relay = spawn_relay().await;

    let first_conn = connect(&relay);
    assert!(first_conn.wait_connected(WAIT).await);
    let mut first_events = first_conn.subscribe();
    let mut first = Controller::new(first_conn);
    first.request_control();
    assert_eq!(
        await_verdict(&mut first, &mut first_events).await,
        ServerEvent::ControlGranted
    );

    let second_conn = connect(&relay);
    assert!(second_conn.wait_connected(WAIT).await);
    let mut second_events = second_conn.subscribe();
    let mut second = Controller::new(second_conn);
    second.request_control();
    assert_eq!(
        await_verdict(&mut second, &mut second_events).await,
        ServerEvent::ControlDenied
    );
    assert!(!second.has_control());

    // Transport teardown is the release path
    drop(first);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let third_conn = connect(&relay);
    assert!(third_conn.wait_connected(WAIT).await);
    let mut third_events = third_conn.subscribe();
    let mut third = Controller::new(third_conn);
    third.request_control();
    assert_eq!(
        await_verdict(&mut third, &mut third_events).await,
        ServerEvent::ControlGranted
    );
}

#[tokio::test]
async fn settings_propagate_to_viewer() {
    let relay = spawn_relay().await;

    let viewer_conn = connect(&relay);
    assert!(viewer_conn.wait_connected(WAIT).await);
    let mut viewer_events = viewer_conn.subscribe();
    let mut viewer = Viewer::new(viewer_conn);

    let controller_conn = connect(&relay);
    assert!(controller_conn.wait_connected(WAIT).await);
    let mut controller_events = controller_conn.subscribe();
    let mut controller = Controller::new(controller_conn);
    controller.request_control();
    await_verdict(&mut controller, &mut controller_events).await;

    controller.update_setting("lightIntensity", 2.0);
    controller.update_setting("autoSwitch", true);

    // The second snapshot carries both keys wholesale
    let mut last = None;
    for _ in 0..2 {
        let event = timeout(WAIT, viewer_events.recv()).await.unwrap().unwrap();
        viewer.apply_event(&event);
        last = Some(event);
    }
    assert!(matches!(last, Some(ServerEvent::SettingsUpdate(_))));
    assert_eq!(
        viewer.scene_settings().get("lightIntensity"),
        Some(&serde_json::json!(2.0))
    );
    assert_eq!(
        viewer.scene_settings().get("autoSwitch"),
        Some(&serde_json::json!(true))
    );
}

#[tokio::test]
async fn presigned_upload_handshake() {
    let relay = spawn_relay().await;

    let viewer_conn = connect(&relay);
    assert!(viewer_conn.wait_connected(WAIT).await);
    let mut viewer_events = viewer_conn.subscribe();

    let controller_conn = connect(&relay);
    assert!(controller_conn.wait_connected(WAIT).await);
    let mut controller = Controller::new(controller_conn);

    // A 10 MB .glb goes through the full handshake
    let upload_dir = tempfile::tempdir().unwrap();
    let path = upload_dir.path().join("robot.glb");
    std::fs::write(&path, vec![0u8; 10 * 1024 * 1024]).unwrap();

    controller
        .upload(&path, Some("alice".to_string()), None)
        .await
        .unwrap();

    assert!(relay.models_path.join("robot.glb").exists());

    // Other clients are notified of the new asset
    let event = loop {
        let event = timeout(WAIT, viewer_events.recv()).await.unwrap().unwrap();
        if matches!(event, ServerEvent::ModelUploaded { .. }) {
            break event;
        }
    };
    match event {
        ServerEvent::ModelUploaded {
            file_name, author, ..
        } => {
            assert_eq!(file_name, "robot.glb");
            assert_eq!(author.as_deref(), Some("alice"));
        }
        _ => unreachable!(),
    }

    // And the catalog now lists it
    let catalog_conn = connect(&relay);
    assert!(catalog_conn.wait_connected(WAIT).await);
    let mut catalog_events = catalog_conn.subscribe();
    let viewer2 = Viewer::new(catalog_conn);
    viewer2.refresh_catalog();
    let event = timeout(WAIT, catalog_events.recv()).await.unwrap().unwrap();
    match event {
        ServerEvent::FilesList(models) => {
            assert_eq!(models.len(), 1);
            assert_eq!(models[0].name, "robot.glb");
            assert_eq!(models[0].author.as_deref(), Some("alice"));
        }
        other => panic!("expected files_list, got {:?}", other),
    }
}

#[tokio::test]
async fn non_holder_camera_updates_dropped() {
    let relay = spawn_relay().await;

    let viewer_conn = connect(&relay);
    assert!(viewer_conn.wait_connected(WAIT).await);
    let mut viewer_events = viewer_conn.subscribe();

    let holder_conn = connect(&relay);
    assert!(holder_conn.wait_connected(WAIT).await);
    let mut holder_events = holder_conn.subscribe();
    let mut holder = Controller::new(holder_conn);
    holder.request_control();
    await_verdict(&mut holder, &mut holder_events).await;

    // A rogue connection emits a camera_update without holding control;
    // the relay drops it, so the only event the viewer sees is the
    // holder's pose that follows.
    let rogue = connect(&relay);
    assert!(rogue.wait_connected(WAIT).await);
    rogue.emit(stagelink_core::ClientEvent::CameraUpdate(CameraPose {
        position: [9.0, 9.0, 9.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        zoom: None,
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pose = CameraPose {
        position: [1.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        zoom: None,
    };
    assert!(holder.publish_pose(&pose));

    let event = timeout(WAIT, viewer_events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ServerEvent::CameraUpdate(pose));
}
