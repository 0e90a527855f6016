// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless options host: owns the option record and serves it to
//! Host-Bridge clients over a CBOR-framed Unix socket.

use anyhow::Result;
use optline_bridge_proto::{
    default_socket_path,
    wire::{decode_message, encode_message, frame_len},
    ErrorPayload, Message,
};
use optline_config_fs::FsBlobStore;
use optline_core::{BlobStore, JsonBlobService, WireRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

const PREFS_KEY: &str = "optline_host";
const RECORD_KEY: &str = "optline_host_record";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HostPrefs {
    socket_path: String,
}

impl Default for HostPrefs {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path().display().to_string(),
        }
    }
}

struct ConnState {
    tx: mpsc::Sender<Vec<u8>>,
}

/// A message bound for one connection.
#[derive(Debug, PartialEq)]
struct Outbound {
    to: u64,
    msg: Message,
    seq: u64,
}

struct HostState<S> {
    next_conn_id: u64,
    conns: HashMap<u64, ConnState>,
    record: WireRecord,
    window_color: Option<String>,
    always_on_top: bool,
    blobs: Option<JsonBlobService<S>>,
}

impl<S: BlobStore> HostState<S> {
    fn new(blobs: Option<JsonBlobService<S>>) -> Self {
        let record = blobs
            .as_ref()
            .and_then(|b| match b.load::<WireRecord>(RECORD_KEY) {
                Ok(record) => record,
                Err(err) => {
                    warn!(?err, "stored record unreadable; starting empty");
                    None
                }
            })
            .unwrap_or_default();
        Self {
            next_conn_id: 0,
            conns: HashMap::new(),
            record,
            window_color: None,
            always_on_top: false,
            blobs,
        }
    }

    fn add_conn(&mut self, tx: mpsc::Sender<Vec<u8>>) -> u64 {
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        self.conns.insert(id, ConnState { tx });
        id
    }

    fn persist(&self) {
        if let Some(blobs) = &self.blobs {
            if let Err(err) = blobs.save(RECORD_KEY, &self.record) {
                warn!(?err, "failed to persist option record");
            }
        }
    }

    // Apply one inbound message and return what must be sent in response.
    fn apply(&mut self, msg: Message, seq: u64, from: u64) -> Vec<Outbound> {
        let reply = |msg| {
            vec![Outbound {
                to: from,
                msg,
                seq,
            }]
        };
        match msg {
            Message::GetAll => reply(Message::All(self.record.clone())),
            Message::Get { name } => reply(Message::One(self.record.get(&name).cloned())),
            Message::SaveAll(record) => {
                debug!(conn = from, entries = record.len(), "record replaced");
                self.record = record;
                self.persist();
                Vec::new()
            }
            Message::AlwaysTop { on_top } => {
                if on_top != self.always_on_top {
                    info!(on_top, "always-on-top changed");
                }
                self.always_on_top = on_top;
                Vec::new()
            }
            Message::GetWinColor => match self.window_color.clone() {
                Some(color) => reply(Message::WinColorChanged { color }),
                None => Vec::new(),
            },
            Message::WinColorChanged { color } => {
                self.window_color = Some(color.clone());
                self.conns
                    .keys()
                    .filter(|id| **id != from)
                    .map(|id| Outbound {
                        to: *id,
                        msg: Message::WinColorChanged {
                            color: color.clone(),
                        },
                        seq: 0,
                    })
                    .collect()
            }
            Message::Error(err) => {
                warn!(conn = from, code = err.code, name = %err.name, "client reported error");
                Vec::new()
            }
            other @ (Message::All(_) | Message::One(_)) => reply(Message::Error(ErrorPayload {
                code: 2,
                name: "E_UNEXPECTED_OP".into(),
                message: format!("{} is not a request", other.op_name()),
            })),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Config (best-effort)
    let config = match FsBlobStore::new() {
        Ok(store) => Some(JsonBlobService::new(store)),
        Err(err) => {
            warn!(?err, "no config dir; running without persistence");
            None
        }
    };

    let prefs: HostPrefs = config
        .as_ref()
        .and_then(|c| c.load::<HostPrefs>(PREFS_KEY).ok().flatten())
        .unwrap_or_default();

    // Persist defaults once if absent
    if let Some(cfg) = &config {
        let _ = cfg.save(PREFS_KEY, &prefs);
    }

    let socket_path = prefs.socket_path.clone();
    let hub = Arc::new(Mutex::new(HostState::new(config)));

    // Remove stale socket if present
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    info!("options host listening at {}", socket_path);

    loop {
        let (stream, _) = listener.accept().await?;
        let hub_state = Arc::clone(&hub);
        tokio::spawn(handle_client(stream, hub_state));
    }
}

async fn handle_client<S>(stream: UnixStream, hub: Arc<Mutex<HostState<S>>>)
where
    S: BlobStore,
{
    let (reader, writer) = tokio::io::split(stream);
    serve(reader, writer, hub).await;
}

// Connection loop; the connection is unregistered however it ends.
async fn serve<R, W, S>(mut reader: R, writer: W, hub: Arc<Mutex<HostState<S>>>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: BlobStore,
{
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(256);
    let conn_id = hub.lock().await.add_conn(tx);
    debug!(conn_id, "client connected");

    tokio::spawn(async move {
        let mut ws = writer;
        while let Some(buf) = rx.recv().await {
            if ws.write_all(&buf).await.is_err() {
                break;
            }
        }
    });

    let mut read_buf: Vec<u8> = vec![0u8; 16 * 1024];
    let mut acc: Vec<u8> = Vec::with_capacity(32 * 1024);
    'conn: loop {
        let n = match reader.read(&mut read_buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(?err, conn_id, "read failed; dropping connection");
                break;
            }
        };
        acc.extend_from_slice(&read_buf[..n]);

        // process as many frames as available
        loop {
            let total = match frame_len(&acc) {
                Ok(Some(total)) if acc.len() >= total => total,
                Ok(_) => break,
                Err(err) => {
                    warn!(?err, conn_id, "bad frame header; dropping connection");
                    break 'conn;
                }
            };
            let packet: Vec<u8> = acc.drain(..total).collect();
            match decode_message(&packet) {
                Ok((msg, seq, _)) => {
                    if let Err(err) = handle_message(msg, seq, conn_id, &hub).await {
                        warn!(?err, "dropping connection {}", conn_id);
                        break 'conn;
                    }
                }
                Err(err) => {
                    warn!(?err, conn_id, "failed to decode packet");
                    break 'conn;
                }
            }
        }
    }

    hub.lock().await.conns.remove(&conn_id);
    debug!(conn_id, "client disconnected");
}

// Handle a single inbound message from a connection.
async fn handle_message<S: BlobStore>(
    msg: Message,
    seq: u64,
    conn_id: u64,
    hub: &Arc<Mutex<HostState<S>>>,
) -> Result<()> {
    let deliveries = {
        let mut h = hub.lock().await;
        let outbound = h.apply(msg, seq, conn_id);
        let mut deliveries = Vec::with_capacity(outbound.len());
        for out in outbound {
            if let Some(conn) = h.conns.get(&out.to) {
                deliveries.push((conn.tx.clone(), encode_message(&out.msg, out.seq)?));
            }
        }
        deliveries
    };
    for (tx, pkt) in deliveries {
        let _ = tx.send(pkt).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optline_core::WireValue;
    use optline_dry_tests::InMemoryBlobStore;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use tokio::time::{timeout, Duration};

    type TestHub = Arc<Mutex<HostState<InMemoryBlobStore>>>;

    fn hub_over(blobs: &InMemoryBlobStore) -> TestHub {
        Arc::new(Mutex::new(HostState::new(Some(JsonBlobService::new(
            blobs.clone(),
        )))))
    }

    async fn add_conn(hub: &TestHub) -> (u64, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(64);
        let id = hub.lock().await.add_conn(tx);
        (id, rx)
    }

    async fn next(rx: &mut mpsc::Receiver<Vec<u8>>) -> (Message, u64) {
        let pkt = timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
            .expect("packet");
        let (msg, seq, _) = decode_message(&pkt).expect("decode");
        (msg, seq)
    }

    fn sample() -> WireRecord {
        let mut record = WireRecord::new();
        record.insert("language".into(), WireValue::Text("en-US".into()));
        record.insert("opt_dark".into(), WireValue::Native(true.into()));
        record
    }

    #[tokio::test]
    async fn save_all_is_persisted_and_served_back() {
        let blobs = InMemoryBlobStore::new();
        let hub = hub_over(&blobs);
        let (conn, mut rx) = add_conn(&hub).await;

        handle_message(Message::SaveAll(sample()), 0, conn, &hub)
            .await
            .unwrap();
        assert!(rx.try_recv().is_err(), "save_all is never answered");

        handle_message(Message::GetAll, 7, conn, &hub).await.unwrap();
        assert_eq!(next(&mut rx).await, (Message::All(sample()), 7));

        handle_message(Message::Get { name: "language".into() }, 8, conn, &hub)
            .await
            .unwrap();
        assert_eq!(
            next(&mut rx).await,
            (Message::One(Some(WireValue::Text("en-US".into()))), 8)
        );

        handle_message(Message::Get { name: "nope".into() }, 9, conn, &hub)
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await, (Message::One(None), 9));

        let restarted = HostState::new(Some(JsonBlobService::new(blobs)));
        assert_eq!(restarted.record, sample());
    }

    #[tokio::test]
    async fn window_color_is_relayed_to_other_connections() {
        let hub = hub_over(&InMemoryBlobStore::new());
        let (window, mut window_rx) = add_conn(&hub).await;
        let (client, mut client_rx) = add_conn(&hub).await;

        handle_message(Message::GetWinColor, 0, client, &hub)
            .await
            .unwrap();
        assert!(client_rx.try_recv().is_err(), "no color known yet");

        let changed = Message::WinColorChanged {
            color: "#202020".into(),
        };
        handle_message(changed.clone(), 0, window, &hub)
            .await
            .unwrap();
        assert_eq!(next(&mut client_rx).await, (changed.clone(), 0));
        assert!(window_rx.try_recv().is_err(), "sender is not echoed");

        handle_message(Message::GetWinColor, 0, client, &hub)
            .await
            .unwrap();
        assert_eq!(next(&mut client_rx).await.0, changed);
    }

    /// Reader whose every read fails.
    struct Reset;

    impl AsyncRead for Reset {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    #[tokio::test]
    async fn failed_read_unregisters_the_connection() {
        let hub = hub_over(&InMemoryBlobStore::new());
        let (window, _window_rx) = add_conn(&hub).await;

        serve(Reset, tokio::io::sink(), Arc::clone(&hub)).await;
        let conns: Vec<u64> = hub.lock().await.conns.keys().copied().collect();
        assert_eq!(conns, vec![window]);
    }

    #[test]
    fn reply_ops_from_clients_are_rejected() {
        let mut host = HostState::new(None::<JsonBlobService<InMemoryBlobStore>>);
        let out = host.apply(Message::One(None), 4, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].seq, 4);
        assert!(matches!(&out[0].msg, Message::Error(e) if e.name == "E_UNEXPECTED_OP"));

        assert!(host.apply(Message::AlwaysTop { on_top: true }, 0, 1).is_empty());
        assert!(host.always_on_top);
    }

    #[test]
    fn unreadable_stored_record_starts_empty() {
        let blobs = InMemoryBlobStore::new();
        blobs.set_fail_on_load(true);
        let host = HostState::new(Some(JsonBlobService::new(blobs)));
        assert!(host.record.is_empty());
    }
}
