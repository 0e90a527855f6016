// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client helper for talking to the optline host over Unix sockets
//! (CBOR-framed), exposed through the `HostBridge` and `WindowHost` ports.

use anyhow::{Context, Result};
use optline_bridge_proto::wire::{decode_message, encode_message, frame_len, HEADER_LEN};
use optline_bridge_proto::Message;
use optline_core::{BridgeReply, BridgeRequest, HostBridge, StoreError};
use optline_effects::WindowHost;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// How long a round-trip request waits for its reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sequence number used for fire-and-forget messages; never paired.
const UNPAIRED_SEQ: u64 = 0;

struct Shared {
    // `None` once shut down; dropping the sender ends the writer thread.
    outbox: Mutex<Option<Sender<Vec<u8>>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    pending: Mutex<HashMap<u64, Sender<Message>>>,
    color_subscribers: Mutex<Vec<Sender<String>>>,
    next_seq: AtomicU64,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Cloneable handle on one host connection.
///
/// Clones share the socket; replies are paired with requests by sequence
/// number so clones may be used from different threads.
#[derive(Clone)]
pub struct BridgeClient {
    shared: Arc<Shared>,
    timeout: Duration,
}

impl BridgeClient {
    /// Connect to the host at the given Unix socket path.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path)
            .with_context(|| format!("connecting to options host at {}", path.display()))?;
        Self::from_stream(stream).context("starting bridge client threads")
    }

    /// Wrap an already connected stream and start the I/O threads.
    pub fn from_stream(stream: UnixStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        let writer = thread::spawn(move || {
            let mut ws = stream;
            for buf in rx {
                if let Err(err) = ws.write_all(&buf) {
                    warn!(?err, "host connection write failed");
                    break;
                }
            }
        });
        let shared = Arc::new(Shared {
            outbox: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            pending: Mutex::new(HashMap::new()),
            color_subscribers: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(UNPAIRED_SEQ + 1),
            closed: AtomicBool::new(false),
        });

        let routes = Arc::clone(&shared);
        thread::spawn(move || read_loop(reader, &routes));

        Ok(Self {
            shared,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Use a different reply timeout on this handle (and its later clones).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the host side has hung up.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Flush every queued message to the socket and stop the writer.
    ///
    /// Affects all clones of this handle; later sends fail as closed.
    pub fn shutdown(self) {
        drop(lock(&self.shared.outbox).take());
        let writer = lock(&self.shared.writer).take();
        if let Some(writer) = writer {
            if writer.join().is_err() {
                warn!("bridge writer thread panicked");
            }
        }
    }

    fn send(&self, msg: &Message, seq: u64) -> Result<(), StoreError> {
        let pkt = encode_message(msg, seq).map_err(|e| StoreError::Bridge(e.to_string()))?;
        lock(&self.shared.outbox)
            .as_ref()
            .ok_or_else(|| StoreError::Bridge("connection closed".into()))?
            .send(pkt)
            .map_err(|_| StoreError::Bridge("connection closed".into()))
    }

    /// Send `msg` and wait for the reply carrying the same sequence number.
    pub fn round_trip(&self, msg: &Message) -> Result<Message, StoreError> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.pending).insert(seq, tx);
        if self.is_closed() {
            lock(&self.shared.pending).remove(&seq);
            return Err(StoreError::Bridge("connection closed".into()));
        }
        if let Err(err) = self.send(msg, seq) {
            lock(&self.shared.pending).remove(&seq);
            return Err(err);
        }
        match rx.recv_timeout(self.timeout) {
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.shared.pending).remove(&seq);
                Err(StoreError::Bridge(format!(
                    "{} timed out after {:?}",
                    msg.op_name(),
                    self.timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(StoreError::Bridge("connection closed".into()))
            }
        }
    }

    /// Send `msg` without waiting for anything back.
    pub fn post_message(&self, msg: &Message) -> Result<(), StoreError> {
        self.send(msg, UNPAIRED_SEQ)
    }
}

fn read_frame(stream: &mut UnixStream) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    match stream.read_exact(&mut header) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let total = frame_len(&header)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        .unwrap_or(HEADER_LEN);
    let mut packet = Vec::with_capacity(total);
    packet.extend_from_slice(&header);
    packet.resize(total, 0);
    stream.read_exact(&mut packet[HEADER_LEN..])?;
    Ok(Some(packet))
}

fn read_loop(mut stream: UnixStream, shared: &Shared) {
    loop {
        let packet = match read_frame(&mut stream) {
            Ok(Some(packet)) => packet,
            Ok(None) => break,
            Err(err) => {
                warn!(?err, "host connection failed");
                break;
            }
        };
        let (msg, seq, _) = match decode_message(&packet) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(?err, "failed to decode packet");
                break;
            }
        };
        route(shared, msg, seq);
    }
    shared.closed.store(true, Ordering::Release);
    // Dropping the reply senders wakes every waiting request.
    lock(&shared.pending).clear();
    lock(&shared.color_subscribers).clear();
}

fn route(shared: &Shared, msg: Message, seq: u64) {
    if let Some(waiter) = lock(&shared.pending).remove(&seq) {
        let _ = waiter.send(msg);
        return;
    }
    match msg {
        Message::WinColorChanged { color } => {
            lock(&shared.color_subscribers).retain(|tx| tx.send(color.clone()).is_ok());
        }
        Message::Error(err) => {
            warn!(code = err.code, name = %err.name, message = %err.message, "host error");
        }
        other => debug!(op = other.op_name(), seq, "unpaired message dropped"),
    }
}

impl HostBridge for BridgeClient {
    fn request(&mut self, request: BridgeRequest) -> Result<BridgeReply, StoreError> {
        let reply = self.round_trip(&Message::from(request))?;
        BridgeReply::try_from(reply)
    }

    fn post(&mut self, request: BridgeRequest) -> Result<(), StoreError> {
        self.post_message(&Message::from(request))
    }
}

impl WindowHost for BridgeClient {
    fn set_always_on_top(&self, on_top: bool) {
        if let Err(err) = self.post_message(&Message::AlwaysTop { on_top }) {
            warn!(?err, "always-on-top not delivered");
        }
    }

    fn subscribe_window_color(&self) -> Receiver<String> {
        let (tx, rx) = mpsc::channel();
        lock(&self.shared.color_subscribers).push(tx);
        rx
    }

    fn request_window_color(&self) {
        if let Err(err) = self.post_message(&Message::GetWinColor) {
            warn!(?err, "window color request not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optline_bridge_proto::ErrorPayload;
    use optline_core::{WireRecord, WireValue};

    /// Reads one packet from the host side of the pair.
    fn next_request(host: &mut UnixStream) -> (Message, u64) {
        let packet = read_frame(host).unwrap().unwrap();
        let (msg, seq, _) = decode_message(&packet).unwrap();
        (msg, seq)
    }

    fn reply(host: &mut UnixStream, msg: &Message, seq: u64) {
        host.write_all(&encode_message(msg, seq).unwrap()).unwrap();
    }

    #[test]
    fn requests_are_paired_with_replies_by_seq() {
        let (client_end, mut host) = UnixStream::pair().unwrap();
        let mut client = BridgeClient::from_stream(client_end).unwrap();

        let host_thread = thread::spawn(move || {
            let (msg, seq) = next_request(&mut host);
            assert_eq!(msg, Message::GetAll);
            // an unrelated push must not be mistaken for the reply
            reply(
                &mut host,
                &Message::WinColorChanged {
                    color: "#000".into(),
                },
                UNPAIRED_SEQ,
            );
            let mut record = WireRecord::new();
            record.insert("opt_dark".into(), WireValue::Text("true".into()));
            reply(&mut host, &Message::All(record), seq);
            host
        });

        let answer = client.request(BridgeRequest::GetAll).unwrap();
        let BridgeReply::All(record) = answer else {
            panic!("expected full record, got {answer:?}");
        };
        assert_eq!(record["opt_dark"], WireValue::Text("true".into()));
        host_thread.join().unwrap();
    }

    #[test]
    fn posts_and_window_messages_reach_the_host() {
        let (client_end, mut host) = UnixStream::pair().unwrap();
        let mut client = BridgeClient::from_stream(client_end).unwrap();

        client
            .post(BridgeRequest::SaveAll(WireRecord::new()))
            .unwrap();
        client.set_always_on_top(true);
        client.request_window_color();

        assert_eq!(
            next_request(&mut host),
            (Message::SaveAll(WireRecord::new()), UNPAIRED_SEQ)
        );
        assert_eq!(
            next_request(&mut host).0,
            Message::AlwaysTop { on_top: true }
        );
        assert_eq!(next_request(&mut host).0, Message::GetWinColor);
    }

    #[test]
    fn window_color_pushes_fan_out_to_subscribers() {
        let (client_end, mut host) = UnixStream::pair().unwrap();
        let client = BridgeClient::from_stream(client_end).unwrap();
        let first = client.subscribe_window_color();
        let second = client.clone().subscribe_window_color();

        reply(
            &mut host,
            &Message::WinColorChanged {
                color: "#223344".into(),
            },
            UNPAIRED_SEQ,
        );
        let wait = Duration::from_secs(2);
        assert_eq!(first.recv_timeout(wait).unwrap(), "#223344");
        assert_eq!(second.recv_timeout(wait).unwrap(), "#223344");
    }

    #[test]
    fn host_errors_and_closed_connections_surface_as_bridge_errors() {
        let (client_end, mut host) = UnixStream::pair().unwrap();
        let mut client = BridgeClient::from_stream(client_end).unwrap();

        let host_thread = thread::spawn(move || {
            let (_, seq) = next_request(&mut host);
            reply(
                &mut host,
                &Message::Error(ErrorPayload {
                    code: 2,
                    name: "E_UNEXPECTED_OP".into(),
                    message: "nope".into(),
                }),
                seq,
            );
            let _ = next_request(&mut host);
            drop(host);
        });

        let err = client
            .request(BridgeRequest::Get { name: "x".into() })
            .unwrap_err();
        assert!(err.to_string().contains("E_UNEXPECTED_OP"));

        let err = client.request(BridgeRequest::GetAll).unwrap_err();
        assert!(matches!(err, StoreError::Bridge(_)));
        host_thread.join().unwrap();
        assert!(client.request(BridgeRequest::GetAll).is_err());
    }

    #[test]
    fn shutdown_flushes_queued_posts() {
        let (client_end, mut host) = UnixStream::pair().unwrap();
        let mut client = BridgeClient::from_stream(client_end).unwrap();
        let spare = client.clone();

        for n in 0..32 {
            let mut record = WireRecord::new();
            record.insert("n".into(), WireValue::Text(n.to_string()));
            client.post(BridgeRequest::SaveAll(record)).unwrap();
        }
        client.shutdown();

        for n in 0..32 {
            let (msg, _) = next_request(&mut host);
            let Message::SaveAll(record) = msg else {
                panic!("expected save_all, got {msg:?}");
            };
            assert_eq!(record["n"], WireValue::Text(n.to_string()));
        }
        assert!(spare.post_message(&Message::GetWinColor).is_err());
    }

    #[test]
    fn silent_host_times_out() {
        let (client_end, _host) = UnixStream::pair().unwrap();
        let mut client = BridgeClient::from_stream(client_end)
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = client.request(BridgeRequest::GetAll).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
