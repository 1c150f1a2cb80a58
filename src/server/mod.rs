//! Readiness-driven request server.
//!
//! Everything runs on one thread: connections are tasks on a `LocalSet`,
//! so tree access never overlaps and the `Notebook` needs no lock. A
//! semaphore stands in for the fixed-size connection table; when it is
//! exhausted, new connections are rejected outright.
//!
//! Framing is deliberately primitive: one drain cycle (read until the
//! socket would block) is treated as exactly one request document. That
//! holds for a client that writes a request and waits for the reply, and
//! breaks for pipelined or slow-trickle senders. Known limitation.

use std::io::ErrorKind;
use std::rc::Rc;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::commands;
use crate::db::Notebook;

/// Open connections served at once; accepts beyond this are rejected.
pub const MAX_CONNECTIONS: usize = 64;

const READ_CHUNK: usize = 4096;

pub async fn start(addr: &str, notebook: Rc<Notebook>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "notebook server listening");
    serve(listener, notebook, MAX_CONNECTIONS).await
}

pub async fn serve(
    listener: TcpListener,
    notebook: Rc<Notebook>,
    capacity: usize,
) -> std::io::Result<()> {
    let slots = Arc::new(Semaphore::new(capacity));
    loop {
        let (stream, peer) = listener.accept().await?;
        let permit = match Arc::clone(&slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // Dropping the stream closes it; existing connections are
                // unaffected.
                warn!(%peer, "connection table full, rejecting");
                continue;
            }
        };
        let notebook = Rc::clone(&notebook);
        tokio::task::spawn_local(async move {
            let _permit = permit;
            match handle_client(stream, notebook).await {
                Ok(()) => info!(%peer, "connection closed"),
                Err(err) => warn!(%peer, %err, "connection closed on error"),
            }
        });
    }
}

async fn handle_client(mut stream: TcpStream, notebook: Rc<Notebook>) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        buf.clear();
        let mut open = true;

        // One drain cycle: wait for readiness, then read until the socket
        // reports it would block. Whatever arrived is one request.
        while buf.is_empty() && open {
            stream.readable().await?;
            loop {
                match stream.try_read(&mut chunk) {
                    Ok(0) => {
                        open = false;
                        break;
                    }
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                    Err(err) => return Err(err),
                }
            }
        }

        if !buf.is_empty() {
            if let Some(reply) = commands::handle_request(&notebook, &buf) {
                stream.write_all(&reply).await?;
            }
        }
        if !open {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::io::AsyncReadExt;

    async fn read_reply(stream: &mut TcpStream) -> Value {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.expect("read reply");
            assert!(n > 0, "server closed before replying");
            buf.extend_from_slice(&chunk[..n]);
            if let Ok(value) = serde_json::from_slice(&buf) {
                return value;
            }
        }
    }

    #[test]
    fn insert_then_search_over_a_live_connection() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let notebook = Rc::new(Notebook::new());
            tokio::task::spawn_local(serve(listener, notebook, MAX_CONNECTIONS));

            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(br#"{"mode":"insert","payload":{"key":"cat","data":"C1"}}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut client).await;
            assert!(!reply["execPath"].as_str().unwrap().is_empty());

            client
                .write_all(br#"{"mode":"search","payload":{"key":"c"}}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut client).await;
            assert_eq!(reply["matchedNum"], 1);
            assert_eq!(reply["queryResult"], serde_json::json!(["C1"]));

            client
                .write_all(br#"{"mode":"get_tree"}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut client).await;
            let doc: Value =
                serde_json::from_str(reply["notebookJson"].as_str().unwrap()).unwrap();
            assert_eq!(doc["radix_tree"].as_array().unwrap().len(), 1);
        });
    }

    #[test]
    fn malformed_request_keeps_the_connection_open() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let notebook = Rc::new(Notebook::new());
            tokio::task::spawn_local(serve(listener, notebook, MAX_CONNECTIONS));

            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(b"this is not json").await.unwrap();
            // Let the server drain the garbage as its own cycle before the
            // next request goes out; no reply is expected for it.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            client
                .write_all(br#"{"mode":"search","payload":{"key":"x"}}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut client).await;
            assert_eq!(reply["matchedNum"], 0);
        });
    }

    #[test]
    fn connections_beyond_capacity_are_rejected() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let notebook = Rc::new(Notebook::new());
            tokio::task::spawn_local(serve(listener, notebook, 1));

            // A full round trip guarantees the single slot is taken.
            let mut first = TcpStream::connect(addr).await.unwrap();
            first
                .write_all(br#"{"mode":"insert","payload":{"key":"cat","data":"C1"}}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut first).await;
            assert_eq!(reply["execPath"], "O");

            // The next connection is closed without any reply.
            let mut second = TcpStream::connect(addr).await.unwrap();
            let mut chunk = [0u8; 16];
            let n = second.read(&mut chunk).await.unwrap_or(0);
            assert_eq!(n, 0);

            // The held connection still answers.
            first
                .write_all(br#"{"mode":"search","payload":{"key":"c"}}"#)
                .await
                .unwrap();
            let reply = read_reply(&mut first).await;
            assert_eq!(reply["matchedNum"], 1);
        });
    }
}
