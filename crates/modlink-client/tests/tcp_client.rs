//! TCP transaction engine tests against in-process listener peers.

use modlink_client::{Client, ClientError, TcpClient, TcpConfig};
use modlink_core::DecodeError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn bind_peer() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn client_for(port: u16) -> TcpClient {
    Client::tcp(
        TcpConfig::new("127.0.0.1", 1)
            .with_port(port)
            .with_max_response(Duration::from_millis(500)),
    )
}

#[tokio::test]
async fn read_holding_registers_golden_frames() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        assert_eq!(
            request,
            [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02]
        );
        socket
            .write_all(&[
                0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14,
            ])
            .await
            .unwrap();
    });

    let client = client_for(port);
    client.connect().await.unwrap();
    let data = client.read_holding_registers(0, 2).await.unwrap();
    assert_eq!(data, [0x00, 0x0A, 0x00, 0x14]);
    server.await.unwrap();
}

#[tokio::test]
async fn transaction_id_increments_per_request() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        for expected_tid in 1u16..=2 {
            let mut request = [0u8; 12];
            socket.read_exact(&mut request).await.unwrap();
            let tid = u16::from_be_bytes([request[0], request[1]]);
            assert_eq!(tid, expected_tid);

            let mut response = vec![0u8; 0];
            response.extend_from_slice(&tid.to_be_bytes());
            response.extend_from_slice(&[0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A]);
            socket.write_all(&response).await.unwrap();
        }
    });

    let client = client_for(port);
    client.connect().await.unwrap();
    assert_eq!(client.read_holding_registers(0, 1).await.unwrap(), [0x00, 0x2A]);
    assert_eq!(client.read_holding_registers(0, 1).await.unwrap(), [0x00, 0x2A]);
    server.await.unwrap();
}

#[tokio::test]
async fn mismatched_transaction_id_disconnects_client() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        socket
            .write_all(&[0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A])
            .await
            .unwrap();
    });

    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    match err {
        ClientError::TransactionMismatch { expected, got } => {
            assert_eq!(expected, 1);
            assert_eq!(got, 9);
        }
        other => panic!("expected transaction mismatch, got {other:?}"),
    }

    assert!(!client.is_connected().await);
    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected), "got {err:?}");
    server.await.unwrap();
}

#[tokio::test]
async fn non_zero_protocol_id_is_rejected() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        socket
            .write_all(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2A])
            .await
            .unwrap();
    });

    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Decode(DecodeError::InvalidValue)),
        "got {err:?}"
    );
    assert!(!client.is_connected().await);
    server.await.unwrap();
}

#[tokio::test]
async fn write_single_coil_normalizes_to_ff00() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        // Any non-zero value becomes the canonical ON pattern.
        assert_eq!(&request[7..], &[0x05, 0x00, 0x03, 0xFF, 0x00]);
        let mut response = request[..7].to_vec();
        response.extend_from_slice(&[0x05, 0x00, 0x03, 0xFF, 0x00]);
        socket.write_all(&response).await.unwrap();
    });

    let client = client_for(port);
    client.connect().await.unwrap();
    client.write_single_coil(3, 5).await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn slave_exception_does_not_disconnect_transport_state() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        socket
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, 0x02])
            .await
            .unwrap();
    });

    let client = client_for(port);
    client.connect().await.unwrap();

    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    assert!(matches!(err, ClientError::Exception(_)), "got {err:?}");
    // The exception is an application-level reply; the link stays usable.
    assert!(client.is_connected().await);
    server.await.unwrap();
}

#[tokio::test]
async fn close_interrupts_a_blocked_transaction() {
    let (listener, port) = bind_peer().await;

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 12];
        socket.read_exact(&mut request).await.unwrap();
        // Never answer; the client sits in its read deadline.
        socket
    });

    let client = Arc::new(Client::tcp(
        TcpConfig::new("127.0.0.1", 1)
            .with_port(port)
            .with_max_response(Duration::from_secs(5)),
    ));
    client.connect().await.unwrap();

    let caller = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.read_holding_registers(0, 1).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let closing = Instant::now();
    client.close().await.unwrap();
    assert!(
        closing.elapsed() < Duration::from_secs(1),
        "close queued behind the blocked transaction"
    );

    let err = caller.await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::NotConnected), "got {err:?}");
    assert!(!client.is_connected().await);
    drop(server.await.unwrap());
}

#[tokio::test]
async fn close_then_call_fails_fast() {
    let (listener, port) = bind_peer().await;
    let _keep_listener_alive = tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let client = client_for(port);
    client.connect().await.unwrap();
    assert!(client.is_connected().await);

    client.close().await.unwrap();
    assert!(!client.is_connected().await);

    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    assert!(matches!(err, ClientError::NotConnected), "got {err:?}");
}

#[tokio::test]
async fn connect_is_idempotent() {
    let (listener, port) = bind_peer().await;
    let _server = tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let client = client_for(port);
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert!(client.is_connected().await);
}
