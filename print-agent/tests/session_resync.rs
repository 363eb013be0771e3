//! Session tests against an in-process WebSocket backend.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use print_agent::core::tasks::BackgroundTasks;
use print_agent::session::{
    spawn_session, ConnectionState, SessionConfig, SessionSignal,
};
use shared::{
    ClientMessage, PrintJob, PrinterCapabilities, PrinterDescriptor, PrinterMetadata,
    PrinterType, ServerMessage, Transport,
};

type ServerWs = WebSocketStream<TcpStream>;

fn sample_descriptor() -> PrinterDescriptor {
    PrinterDescriptor {
        system_name: "TM-T88V".into(),
        display_name: "EPSON TM-T88V".into(),
        printer_type: PrinterType::Thermal,
        transport: Transport::Usb,
        capabilities: PrinterCapabilities {
            color: false,
            duplex: false,
            paper_sizes: vec!["80mm".into(), "58mm".into()],
            max_width_mm: 80,
            has_cutter: true,
            has_cash_drawer: true,
        },
        metadata: PrinterMetadata {
            is_default: true,
            status: "idle".into(),
            port_name: "USB001".into(),
            location: None,
            comment: None,
        },
    }
}

fn sample_job(id: &str) -> PrintJob {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "printerSystemName": "TM-T88V",
        "documentType": "receipt",
        "content": {"storeName": "S", "total": 9.99}
    }))
    .unwrap()
}

async fn recv_client_msg(ws: &mut ServerWs) -> ClientMessage {
    loop {
        match ws
            .next()
            .await
            .expect("client stream open")
            .expect("client frame")
        {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(data) => {
                let _ = ws.send(Message::Pong(data)).await;
            }
            Message::Close(frame) => panic!("client closed: {frame:?}"),
            _ => {}
        }
    }
}

async fn send_server_msg(ws: &mut ServerWs, msg: &ServerMessage) {
    ws.send(Message::Text(serde_json::to_string(msg).unwrap().into()))
        .await
        .unwrap();
}

/// Accept one client connection and complete the auth handshake.
async fn accept_and_auth(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    match recv_client_msg(&mut ws).await {
        ClientMessage::Authenticate {
            tenant_id,
            client_id,
            ..
        } => {
            assert_eq!(tenant_id, "t1");
            assert_eq!(client_id, "c1");
        }
        other => panic!("expected authenticate, got {other:?}"),
    }
    send_server_msg(&mut ws, &ServerMessage::Authenticated { success: true }).await;
    ws
}

fn test_config(addr: std::net::SocketAddr) -> SessionConfig {
    let mut config = SessionConfig::new(format!("ws://{addr}/print"), "t1", "c1", "tok", "key");
    config.reconnect_delays = vec![Duration::from_millis(50)];
    config.heartbeat_interval = Duration::from_secs(600);
    config
}

#[tokio::test]
async fn test_connect_register_and_job_delivery() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let mut tasks = BackgroundTasks::new();
    let handle = spawn_session(test_config(addr), signal_tx, &mut tasks);

    let mut server = accept_and_auth(&listener).await;

    match signals.recv().await.unwrap() {
        SessionSignal::Connected => {}
        other => panic!("expected Connected, got {other:?}"),
    }
    assert_eq!(handle.state(), ConnectionState::Connected);

    // Register a printer: the ack must echo the correlation id.
    let register = tokio::spawn({
        let handle = handle.clone();
        let descriptor = sample_descriptor();
        async move { handle.register_printer(descriptor).await }
    });
    match recv_client_msg(&mut server).await {
        ClientMessage::RegisterPrinter {
            request_id,
            printer,
        } => {
            assert!(request_id.is_some());
            assert_eq!(printer.system_name, "TM-T88V");
            send_server_msg(
                &mut server,
                &ServerMessage::PrinterRegistered {
                    request_id,
                    printer_id: Some("p-1".into()),
                },
            )
            .await;
        }
        other => panic!("expected register_printer, got {other:?}"),
    }
    register.await.unwrap().unwrap();

    // Push a job; it surfaces as a NewJob signal.
    send_server_msg(&mut server, &ServerMessage::NewPrintJob(sample_job("J1"))).await;
    match signals.recv().await.unwrap() {
        SessionSignal::NewJob(job) => assert_eq!(job.id, "J1"),
        other => panic!("expected NewJob, got {other:?}"),
    }

    // Pending job sync round-trip.
    let pending = tokio::spawn({
        let handle = handle.clone();
        async move { handle.get_all_pending_jobs().await }
    });
    match recv_client_msg(&mut server).await {
        ClientMessage::GetPendingJobs {
            request_id,
            client_id,
            ..
        } => {
            assert_eq!(client_id.as_deref(), Some("c1"));
            send_server_msg(
                &mut server,
                &ServerMessage::PendingJobs {
                    request_id,
                    jobs: vec![sample_job("J1")],
                },
            )
            .await;
        }
        other => panic!("expected get_pending_jobs, got {other:?}"),
    }
    let jobs = pending.await.unwrap().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "J1");

    // Fire-and-forget job status arrives with no reply expected.
    handle.update_job_status("J1", "completed", serde_json::json!({}));
    match recv_client_msg(&mut server).await {
        ClientMessage::JobStatus { job_id, status, .. } => {
            assert_eq!(job_id, "J1");
            assert_eq!(status, "completed");
        }
        other => panic!("expected job_status, got {other:?}"),
    }

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_replays_printer_registrations() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let mut tasks = BackgroundTasks::new();
    let handle = spawn_session(test_config(addr), signal_tx, &mut tasks);

    let mut server = accept_and_auth(&listener).await;
    match signals.recv().await.unwrap() {
        SessionSignal::Connected => {}
        other => panic!("expected Connected, got {other:?}"),
    }

    // Register one printer so the replay cache has content.
    let register = tokio::spawn({
        let handle = handle.clone();
        async move { handle.register_printer(sample_descriptor()).await }
    });
    match recv_client_msg(&mut server).await {
        ClientMessage::RegisterPrinter { request_id, .. } => {
            send_server_msg(
                &mut server,
                &ServerMessage::PrinterRegistered {
                    request_id,
                    printer_id: None,
                },
            )
            .await;
        }
        other => panic!("expected register_printer, got {other:?}"),
    }
    register.await.unwrap().unwrap();

    // Kill the connection: the session must come back on its own.
    drop(server);

    let mut server = accept_and_auth(&listener).await;

    // The cached registration is replayed fire-and-forget.
    match recv_client_msg(&mut server).await {
        ClientMessage::RegisterPrinter {
            request_id,
            printer,
        } => {
            assert!(request_id.is_none());
            assert_eq!(printer.system_name, "TM-T88V");
        }
        other => panic!("expected replayed register_printer, got {other:?}"),
    }

    // Signals observed along the way: Disconnected → Reconnecting →
    // Reconnected (connect failures may interleave).
    let mut saw_reconnecting = false;
    loop {
        match signals.recv().await.unwrap() {
            SessionSignal::Reconnected { .. } => break,
            SessionSignal::Reconnecting { .. } => saw_reconnecting = true,
            SessionSignal::Disconnected { .. } | SessionSignal::ReconnectFailed { .. } => {}
            other => panic!("unexpected signal {other:?}"),
        }
    }
    assert!(saw_reconnecting);
    assert_eq!(handle.state(), ConnectionState::Connected);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_auth_rejection_goes_dormant() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (signal_tx, mut signals) = mpsc::unbounded_channel();
    let mut tasks = BackgroundTasks::new();
    let handle = spawn_session(test_config(addr), signal_tx, &mut tasks);

    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    match recv_client_msg(&mut ws).await {
        ClientMessage::Authenticate { .. } => {}
        other => panic!("expected authenticate, got {other:?}"),
    }
    send_server_msg(
        &mut ws,
        &ServerMessage::AuthError {
            message: "invalid token".into(),
        },
    )
    .await;

    match signals.recv().await.unwrap() {
        SessionSignal::AuthFailed { message } => assert_eq!(message, "invalid token"),
        other => panic!("expected AuthFailed, got {other:?}"),
    }

    // Dormant: requests are refused, not queued forever.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    let result = handle.register_printer(sample_descriptor()).await;
    assert!(result.is_err());

    tasks.shutdown().await;
}
