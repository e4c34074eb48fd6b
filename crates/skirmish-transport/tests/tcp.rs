//! Integration tests for the TCP transport.
//!
//! These open real loopback sockets and check that link operations come
//! back through the completion port with the right session id.

#[cfg(feature = "tcp")]
mod tcp {
    use std::time::Duration;

    use skirmish_protocol::SessionId;
    use skirmish_transport::{
        Completion, CompletionPort, CompletionReceiver, IoOp, Link, TcpLink, TcpTransport,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::runtime::Handle;

    /// Accepts one client and wraps the server side in a link.
    async fn connected_pair(port: &CompletionPort, session: SessionId) -> (TcpLink, TcpStream) {
        let transport = TcpTransport::bind("127.0.0.1:0").await.expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let client = TcpStream::connect(addr).await.expect("client should connect");
        let (stream, _) = transport.accept().await.expect("should accept");

        let link = TcpLink::new(session, stream, port.sender(), Handle::current());
        (link, client)
    }

    /// Waits for the next completion without blocking the runtime.
    async fn next_completion(rx: &CompletionReceiver) -> Completion {
        let rx = rx.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            tokio::task::spawn_blocking(move || rx.wait()),
        )
        .await
        .expect("completion should arrive")
        .expect("blocking task should finish")
    }

    #[tokio::test]
    async fn test_receive_completes_with_session_id() {
        let port = CompletionPort::new();
        let rx = port.receiver();
        let (link, mut client) = connected_pair(&port, SessionId(3)).await;

        link.arm_receive(64);
        client.write_all(&[4, 0, 10, 0]).await.unwrap();

        match next_completion(&rx).await {
            Completion::Received { session, data } => {
                assert_eq!(session, SessionId(3));
                assert_eq!(data, vec![4, 0, 10, 0]);
            }
            other => panic!("expected Received, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receive_respects_max_len() {
        let port = CompletionPort::new();
        let rx = port.receiver();
        let (link, mut client) = connected_pair(&port, SessionId(1)).await;

        client.write_all(&[1, 2, 3, 4, 5, 6]).await.unwrap();
        link.arm_receive(2);

        match next_completion(&rx).await {
            Completion::Received { data, .. } => assert!(data.len() <= 2 && !data.is_empty()),
            other => panic!("expected Received, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_peer_close_completes_with_empty_data() {
        let port = CompletionPort::new();
        let rx = port.receiver();
        let (link, client) = connected_pair(&port, SessionId(9)).await;

        link.arm_receive(64);
        drop(client);

        match next_completion(&rx).await {
            Completion::Received { session, data } => {
                assert_eq!(session, SessionId(9));
                assert!(data.is_empty());
            }
            Completion::Failed { op, .. } => assert_eq!(op, IoOp::Receive),
            other => panic!("expected end of stream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_writes_whole_frame_and_reports_bytes() {
        let port = CompletionPort::new();
        let rx = port.receiver();
        let (link, mut client) = connected_pair(&port, SessionId(2)).await;

        let frame = vec![7u8; 1000];
        link.begin_send(frame.clone());

        match next_completion(&rx).await {
            Completion::Sent { session, bytes } => {
                assert_eq!(session, SessionId(2));
                assert_eq!(bytes, 1000);
            }
            other => panic!("expected Sent, got {other:?}"),
        }

        let mut received = vec![0u8; 1000];
        client.read_exact(&mut received).await.unwrap();
        assert_eq!(received, frame);
    }

    #[tokio::test]
    async fn test_close_cancels_pending_receive_and_ends_stream() {
        let port = CompletionPort::new();
        let rx = port.receiver();
        let (link, mut client) = connected_pair(&port, SessionId(5)).await;

        link.arm_receive(64);
        link.close();

        // The client sees the write half shut down.
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
            .await
            .expect("client read should finish")
            .unwrap();
        assert_eq!(n, 0);

        // The cancelled receive never reports.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_wait().is_none());
    }
}
