//! Shared test utilities for client integration tests.
//!
//! `FakeDaemon` listens on an ephemeral localhost port, accepts a single
//! client and runs a script against it on its own thread. The script
//! asserts on what the client sends and writes canned replies.

#![allow(dead_code)]

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use amigactl_client::ClientConfig;
use amigactl_protocol::{Encoding, LineReader, ProtocolError, Response};
use bytes::Bytes;

pub const BANNER: &str = "AMIGACTL 0.1.0";

pub struct FakeDaemon {
    addr: SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl FakeDaemon {
    /// Greet with the standard banner, then run `script`.
    pub fn start<F>(script: F) -> Self
    where
        F: FnOnce(&mut Peer) + Send + 'static,
    {
        Self::with_banner(Some(BANNER), script)
    }

    /// `None` accepts the connection without greeting.
    pub fn with_banner<F>(banner: Option<&str>, script: F) -> Self
    where
        F: FnOnce(&mut Peer) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake daemon");
        let addr = listener.local_addr().expect("local addr");
        let banner = banner.map(str::to_string);

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            stream.set_nodelay(true).expect("nodelay");
            stream.set_read_timeout(Some(Duration::from_secs(10))).expect("read timeout");

            let mut peer = Peer {
                writer: stream.try_clone().expect("clone stream"),
                reader: LineReader::new(stream, Encoding::Latin1),
                received: Vec::new(),
            };
            if let Some(banner) = banner {
                peer.send(format!("{}\n", banner).as_bytes());
            }
            script(&mut peer);
            peer.received
        });

        FakeDaemon { addr, handle }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.addr.ip().to_string(), self.addr.port()).with_timeout(5)
    }

    /// Wait for the script to finish; returns every line the client sent.
    pub fn join(self) -> Vec<String> {
        self.handle.join().expect("fake daemon panicked")
    }
}

pub struct Peer {
    reader: LineReader<TcpStream>,
    writer: TcpStream,
    received: Vec<String>,
}

impl Peer {
    /// Next line from the client, `None` once it hung up.
    pub fn recv_line(&mut self) -> Option<String> {
        match self.reader.read_line() {
            Ok(line) => {
                self.received.push(line.clone());
                Some(line)
            }
            Err(ProtocolError::ConnectionClosed) => None,
            Err(e) => panic!("fake daemon read failed: {}", e),
        }
    }

    pub fn expect(&mut self, expected: &str) {
        let line = self.recv_line();
        assert_eq!(line.as_deref(), Some(expected));
    }

    pub fn recv_exact(&mut self, len: usize) -> Bytes {
        self.reader.read_exact_bytes(len).expect("read payload")
    }

    pub fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).expect("write to client");
        self.writer.flush().expect("flush");
    }

    /// Send one byte per write.
    pub fn trickle(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.send(std::slice::from_ref(byte));
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn respond(&mut self, response: &Response) {
        let buf = response.encode(Encoding::Latin1).expect("encode response");
        self.send(&buf);
    }

    /// Acknowledge a closing `QUIT`. A client that just hangs up is fine too.
    pub fn serve_quit(&mut self) {
        if let Some(line) = self.recv_line() {
            assert_eq!(line, "QUIT");
            self.respond(&Response::ok("", Vec::new()));
        }
    }
}

pub fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

/// `DATA <n>` header plus payload, as one streaming chunk.
pub fn data_chunk(payload: &[u8]) -> Vec<u8> {
    let mut buf = format!("DATA {}\n", payload.len()).into_bytes();
    buf.extend_from_slice(payload);
    buf
}
