//! End-to-end tests of the controller against the simulated server.
//!
//! Each test starts `remote-sim` on an ephemeral port and drives a real
//! `HttpTransport`, so these run on wall-clock time with short delays.
//!
//! Run with: cargo test -p remote-client --test sim_roundtrip

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use remote_client::{Controller, HttpTransport, PanelEvent, PanelHandle};
use remote_proto::config::{ServerConfig, UiSettings};
use remote_proto::protocol::{paths, Payload};
use remote_sim::{start_server, SimOptions, Simulation};
use tokio::sync::{broadcast, RwLock};

const WAIT: Duration = Duration::from_secs(5);

fn fast_settings() -> UiSettings {
    UiSettings {
        update_poll: true,
        update_interval_ms: 100,
        use_animation_frame: false,
        animation_delay_ms: 50,
        edit_update_delay_ms: 50,
        spinner_delay_ms: 100,
    }
}

fn server_config(addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        base_url: format!("http://{}", addr),
        connect_timeout_ms: 500,
        request_timeout_ms: 1000,
    }
}

async fn start_sim() -> anyhow::Result<SocketAddr> {
    let sim = Arc::new(RwLock::new(Simulation::new()));
    let (addr, _server) =
        start_server("127.0.0.1:0".parse()?, sim, SimOptions::default()).await?;
    Ok(addr)
}

fn start_panel(config: &ServerConfig) -> anyhow::Result<(PanelHandle, broadcast::Receiver<PanelEvent>)> {
    let transport = Arc::new(HttpTransport::new(config)?);
    let (controller, handle) = Controller::new(transport, fast_settings());
    let rx = handle.subscribe();
    tokio::spawn(controller.run());
    Ok((handle, rx))
}

/// Wait for the first event matching `pred`.
async fn wait_for<F>(rx: &mut broadcast::Receiver<PanelEvent>, mut pred: F) -> anyhow::Result<PanelEvent>
where
    F: FnMut(&PanelEvent) -> bool,
{
    let found = tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(evt) if pred(&evt) => return Ok(evt),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => return Err(anyhow::anyhow!("event stream closed: {}", e)),
            }
        }
    })
    .await??;
    Ok(found)
}

fn stars_checked(evt: &PanelEvent) -> Option<bool> {
    match evt {
        PanelEvent::Actions(groups) => groups
            .values()
            .flatten()
            .find(|a| a.id == "actionShow_Stars")
            .map(|a| a.is_checked),
        _ => None,
    }
}

#[tokio::test]
async fn test_initial_load() -> anyhow::Result<()> {
    let addr = start_sim().await?;
    let (handle, mut rx) = start_panel(&server_config(addr))?;

    wait_for(&mut rx, |e| stars_checked(e) == Some(true)).await?;
    wait_for(&mut rx, |e| matches!(e, PanelEvent::Locations(l) if !l.is_empty())).await?;
    let status = wait_for(&mut rx, |e| matches!(e, PanelEvent::Status(_))).await?;
    if let PanelEvent::Status(status) = status {
        assert_eq!(status.view.fov, 60.0);
        assert!(status.selection().is_some());
    }

    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_toggle_action_round_trip() -> anyhow::Result<()> {
    let addr = start_sim().await?;
    let (handle, mut rx) = start_panel(&server_config(addr))?;
    wait_for(&mut rx, |e| stars_checked(e) == Some(true)).await?;

    handle.toggle_action("actionShow_Stars").await?;
    wait_for(&mut rx, |e| stars_checked(e) == Some(false)).await?;

    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_rejected_command_raises_alert() -> anyhow::Result<()> {
    let addr = start_sim().await?;
    let (handle, mut rx) = start_panel(&server_config(addr))?;
    wait_for(&mut rx, |e| matches!(e, PanelEvent::Status(_))).await?;

    handle
        .send(paths::FOV, Payload::new().field("fov", -5))
        .await?;
    let alert = wait_for(&mut rx, |e| matches!(e, PanelEvent::Alert(_))).await?;
    assert!(matches!(alert, PanelEvent::Alert(m) if m == "Invalid parameter"));

    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_debounced_edit_reaches_server() -> anyhow::Result<()> {
    let addr = start_sim().await?;
    let (handle, mut rx) = start_panel(&server_config(addr))?;
    wait_for(&mut rx, |e| matches!(e, PanelEvent::Status(_))).await?;

    for fov in [10, 20, 30] {
        handle.edit(paths::FOV, Payload::new().field("fov", fov)).await?;
    }
    wait_for(&mut rx, |e| matches!(e, PanelEvent::EditFlushed { path } if path == paths::FOV))
        .await?;
    wait_for(&mut rx, |e| matches!(e, PanelEvent::Status(s) if s.view.fov == 30.0)).await?;

    handle.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_reports_lost_connection() -> anyhow::Result<()> {
    // Reserve a port, then free it so nothing listens there.
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?
    };
    let (handle, mut rx) = start_panel(&server_config(addr))?;

    wait_for(&mut rx, |e| matches!(e, PanelEvent::ConnectionLost)).await?;
    wait_for(&mut rx, |e| matches!(e, PanelEvent::Disconnected { secs } if *secs >= 1)).await?;

    handle.shutdown();
    Ok(())
}
