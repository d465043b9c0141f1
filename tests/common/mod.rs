//! Shared helpers for integration tests

use std::sync::Arc;

use binkv::net::mem::MemServer;
use binkv::wire::HEADER_LEN;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

/// Serve a `MemServer` over a real TCP socket, one frame in, one frame
/// out per request. Returns the bound port; the accept loop runs until
/// the runtime shuts down.
pub async fn spawn_tcp_server(server: Arc<MemServer>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let server = server.clone();
            tokio::spawn(async move {
                loop {
                    let mut header = [0u8; HEADER_LEN];
                    if socket.read_exact(&mut header).await.is_err() {
                        break;
                    }
                    let body_len =
                        u32::from_be_bytes(header[5..9].try_into().unwrap()) as usize;
                    let mut rest = vec![0u8; body_len + 4];
                    if socket.read_exact(&mut rest).await.is_err() {
                        break;
                    }

                    let mut frame = header.to_vec();
                    frame.extend_from_slice(&rest);
                    let response = match server.handle(&frame) {
                        Ok(bytes) => bytes,
                        Err(_) => break,
                    };
                    if socket.write_all(&response).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    port
}
