//! courier-relay — TCP relay server for the courier secure transport.
//!
//! Accepts connections, runs the responder side of the DH handshake and
//! routes `message` objects between connected peers, acknowledging
//! everything it delivers.
//!
//! # Wire format
//!
//! Every TCP frame is `len: u32 LE ‖ payload` (plumbing, not protocol).
//! The first frame from a client is a plaintext hello —
//! `peer_id: u64 LE ‖ resume: u8 ‖ token bytes` — the second is the
//! opener's DH share; everything after is encrypted envelopes.
//!
//! # Run
//!
//! ```text
//! RUST_LOG=courier_relay=debug cargo run -p courier-relay -- 127.0.0.1:8080
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use courier_proto::{Action, Engine, HANDSHAKE_TIMEOUT};
use courier_tl::{Message, Object, Registry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Frames larger than this are rejected outright.
const MAX_FRAME_LEN: usize = 1 << 20;

/// Consecutive malformed frames tolerated before the connection is closed.
const MAX_STRIKES: u32 = 3;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// peer id → handle of that peer's connection task. Application-level
/// routing only; protocol state never crosses this table.
type Router = Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>>;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, no other threads reading env
        unsafe { std::env::set_var("RUST_LOG", "courier_relay=info,courier_proto=info") }
    }
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AnyError> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let registry = Arc::new(Registry::core());
    let router: Router = Arc::new(Mutex::new(HashMap::new()));

    let listener = TcpListener::bind(&addr).await?;
    log::info!("[relay] listening on {addr}");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let registry = registry.clone();
        let router = router.clone();
        tokio::spawn(async move {
            match handle_connection(stream, registry, router).await {
                Ok(()) => log::info!("[relay] {peer_addr} disconnected"),
                Err(e) => log::warn!("[relay] {peer_addr} closed: {e}"),
            }
        });
    }
}

// ─── Frame codec ──────────────────────────────────────────────────────────────

async fn recv_frame(reader: &mut OwnedReadHalf) -> io::Result<Vec<u8>> {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len).await?;
    let len = u32::from_le_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
    }
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(frame)
}

async fn send_frame(writer: &mut OwnedWriteHalf, data: &[u8]) -> io::Result<()> {
    writer.write_all(&(data.len() as u32).to_le_bytes()).await?;
    writer.write_all(data).await
}

// ─── Connection handling ──────────────────────────────────────────────────────

struct Hello {
    peer_id: u64,
    resume: bool,
    has_token: bool,
}

/// `peer_id: u64 LE ‖ resume: u8 ‖ token bytes` — the stand-in for the
/// connection's establishment parameters. The token is opaque here;
/// account management is someone else's job.
fn parse_hello(frame: &[u8]) -> Option<Hello> {
    if frame.len() < 9 {
        return None;
    }
    Some(Hello {
        peer_id: u64::from_le_bytes(frame[..8].try_into().unwrap()),
        resume: frame[8] != 0,
        has_token: frame.len() > 9,
    })
}

async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    router: Router,
) -> Result<(), AnyError> {
    let (mut reader, mut writer) = stream.into_split();

    let hello = parse_hello(&recv_frame(&mut reader).await?).ok_or("malformed hello frame")?;
    if hello.resume {
        // Resume needs key material this relay does not persist.
        return Err("resume requested but no session is stored".into());
    }
    log::info!(
        "[relay] peer {} connected (token: {})",
        hello.peer_id,
        if hello.has_token { "present" } else { "absent" }
    );

    // The opener speaks first; bound the wait for its DH share.
    let mut engine = Engine::respond(registry, Instant::now());
    let share = tokio::time::timeout(HANDSHAKE_TIMEOUT, recv_frame(&mut reader))
        .await
        .map_err(|_| "handshake timeout")??;
    for action in engine.handle_frame(&share, Instant::now())? {
        match action {
            Action::Send(bytes) => send_frame(&mut writer, &bytes).await?,
            Action::HandshakeComplete => {
                log::info!("[relay] handshake complete for peer {}", hello.peer_id)
            }
            Action::Deliver { .. } => {}
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    router.lock().await.insert(hello.peer_id, tx);

    let result = serve(reader, &mut writer, &mut engine, rx, &router, hello.peer_id).await;

    router.lock().await.remove(&hello.peer_id);
    log::info!("[relay] peer {} removed from routing table", hello.peer_id);
    result
}

/// Pump one established connection: decrypt and route inbound frames, seal
/// and send messages routed here from other connections.
///
/// A dedicated task reads whole frames off the socket so that the select
/// below only ever awaits channel receives, which are safe to cancel
/// mid-poll (a cancelled `read_exact` would lose a partial frame).
async fn serve(
    reader: OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
    engine: &mut Engine,
    mut routed: mpsc::UnboundedReceiver<Message>,
    router: &Router,
    peer_id: u64,
) -> Result<(), AnyError> {
    let (frame_tx, mut frames) = mpsc::channel::<io::Result<Vec<u8>>>(16);
    let reader_task = tokio::spawn(async move {
        let mut reader = reader;
        loop {
            let frame = recv_frame(&mut reader).await;
            let disconnected = frame.is_err();
            if frame_tx.send(frame).await.is_err() || disconnected {
                break;
            }
        }
    });

    let mut strikes = 0u32;
    let result = loop {
        tokio::select! {
            frame = frames.recv() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break Ok(()),
                    Some(Err(e)) => break Err(e.into()),
                    None => break Ok(()),
                };
                match engine.handle_frame(&frame, Instant::now()) {
                    Ok(actions) => {
                        strikes = 0;
                        let mut delivered = Vec::new();
                        for action in actions {
                            match action {
                                Action::Deliver { msg_id, object } => {
                                    if dispatch(object, router, peer_id).await {
                                        delivered.push(msg_id);
                                    }
                                }
                                Action::Send(bytes) => send_frame(writer, &bytes).await?,
                                Action::HandshakeComplete => {}
                            }
                        }
                        if !delivered.is_empty() {
                            let ack = engine.ack(&delivered)?;
                            send_frame(writer, &ack).await?;
                        }
                    }
                    Err(e) if e.is_fatal() => break Err(e.into()),
                    Err(e) => {
                        strikes += 1;
                        log::warn!(
                            "[relay] dropping malformed frame from peer {peer_id}: {e} \
                             ({strikes}/{MAX_STRIKES})"
                        );
                        if strikes >= MAX_STRIKES {
                            break Err("too many malformed frames".into());
                        }
                    }
                }
            }
            message = routed.recv() => {
                // The sender half lives in the routing table for as long as
                // this task runs, so the channel cannot be closed here.
                let Some(message) = message else { break Ok(()) };
                let envelope = engine.send(&Object::Message(message))?;
                send_frame(writer, &envelope).await?;
            }
        }
    };

    reader_task.abort();
    result
}

/// Route an inbound object. Returns whether it was a content message worth
/// acknowledging (acks themselves are never acked).
async fn dispatch(object: Object, router: &Router, from: u64) -> bool {
    match object {
        Object::Message(mut message) => {
            // Stamp the sender; peers cannot impersonate each other.
            message.from_user_id = from as i64;
            let dest = message.to_user_id as u64;
            // Dropping for absent peers is the documented policy; the
            // sender still gets an ack for receipt, not for delivery.
            let delivered = match router.lock().await.get(&dest) {
                Some(tx) => tx.send(message).is_ok(),
                None => false,
            };
            if delivered {
                log::debug!("[relay] routed message {from} → {dest}");
            } else {
                log::warn!("[relay] peer {dest} not connected, message from {from} dropped");
            }
            true
        }
        Object::MsgsAck(ack) => {
            log::debug!("[relay] peer {from} acked {:?}", ack.msg_ids);
            false
        }
    }
}
