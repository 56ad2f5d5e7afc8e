use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use courier_crypto::Side;
use courier_proto::transport::Transport;
use courier_proto::{Action, Engine, HANDSHAKE_TIMEOUT, MessageId, ProtocolError};
use courier_tl::{Message, Object, Registry};

fn registry() -> Arc<Registry> {
    Arc::new(Registry::core())
}

fn text_message(text: &str) -> Object {
    Object::Message(Message { from_user_id: 1, to_user_id: 2, text: text.into() })
}

/// Drive both engines through the share exchange.
fn establish() -> (Engine, Engine) {
    let registry = registry();
    let now = Instant::now();

    let (mut alice, share_a) = Engine::initiate(registry.clone(), now);
    let mut bob = Engine::respond(registry, now);

    let actions = bob.handle_frame(&share_a, now).unwrap();
    let Action::Send(share_b) = &actions[0] else {
        panic!("responder must reply with its share, got {actions:?}");
    };
    assert_eq!(actions[1], Action::HandshakeComplete);

    let actions = alice.handle_frame(share_b, now).unwrap();
    assert_eq!(actions, vec![Action::HandshakeComplete]);

    assert!(alice.is_established());
    assert!(bob.is_established());
    (alice, bob)
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[test]
fn handshake_completes_both_ways() {
    let (alice, bob) = establish();
    // Both ends hold the same key material.
    assert_eq!(
        alice.session().unwrap().auth_key_bytes(),
        bob.session().unwrap().auth_key_bytes()
    );
}

#[test]
fn responder_stays_silent_until_the_share_arrives() {
    let bob = Engine::respond(registry(), Instant::now());
    assert!(!bob.is_established());
    assert!(bob.handshake_deadline().is_some());
}

#[test]
fn invalid_share_is_fatal() {
    let mut bob = Engine::respond(registry(), Instant::now());
    let err = bob.handle_frame(&[0u8; 256], Instant::now()).unwrap_err();
    assert!(err.is_fatal());

    // The engine is unusable afterwards.
    assert!(matches!(
        bob.handle_frame(&[0u8; 256], Instant::now()),
        Err(ProtocolError::NotEstablished)
    ));
}

#[test]
fn late_share_is_a_fatal_timeout() {
    let now = Instant::now();
    let (mut alice, _) = Engine::initiate(registry(), now);

    let too_late = now + HANDSHAKE_TIMEOUT + Duration::from_secs(1);
    let err = alice.handle_frame(&[2u8; 256], too_late).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, ProtocolError::Handshake(_)));
}

#[test]
fn traffic_before_establishment_is_rejected() {
    let (mut alice, _) = Engine::initiate(registry(), Instant::now());
    assert!(matches!(alice.send(&text_message("hi")), Err(ProtocolError::NotEstablished)));
    assert!(matches!(alice.ack(&[MessageId(1)]), Err(ProtocolError::NotEstablished)));
}

// ── Encrypted traffic ─────────────────────────────────────────────────────────

#[test]
fn message_roundtrips_end_to_end() {
    let (mut alice, mut bob) = establish();

    let envelope = alice.send(&text_message("hi")).unwrap();
    let actions = bob.handle_frame(&envelope, Instant::now()).unwrap();

    assert_eq!(actions.len(), 1);
    let Action::Deliver { object: Object::Message(msg), .. } = &actions[0] else {
        panic!("expected a delivered message, got {actions:?}");
    };
    assert_eq!(msg.text, "hi");
    assert_eq!(msg.to_user_id, 2);
}

#[test]
fn messages_flow_in_both_directions() {
    let (mut alice, mut bob) = establish();

    let to_bob = alice.send(&text_message("ping")).unwrap();
    bob.handle_frame(&to_bob, Instant::now()).unwrap();

    let to_alice = bob.send(&text_message("pong")).unwrap();
    let actions = alice.handle_frame(&to_alice, Instant::now()).unwrap();
    let Action::Deliver { object: Object::Message(msg), .. } = &actions[0] else {
        panic!("expected a delivered message");
    };
    assert_eq!(msg.text, "pong");
}

#[test]
fn container_delivers_in_original_order() {
    let (mut alice, mut bob) = establish();

    let envelope = alice
        .send_container(&[text_message("a"), text_message("b")])
        .unwrap();
    let actions = bob.handle_frame(&envelope, Instant::now()).unwrap();

    let texts: Vec<&str> = actions
        .iter()
        .map(|action| match action {
            Action::Deliver { object: Object::Message(msg), .. } => msg.text.as_str(),
            other => panic!("unexpected action {other:?}"),
        })
        .collect();
    assert_eq!(texts, ["a", "b"]);
}

#[test]
fn ack_roundtrips_end_to_end() {
    let (mut alice, mut bob) = establish();

    let envelope = bob.ack(&[MessageId(7), MessageId(42)]).unwrap();
    let actions = alice.handle_frame(&envelope, Instant::now()).unwrap();

    assert_eq!(actions.len(), 1);
    let Action::Deliver { object: Object::MsgsAck(ack), .. } = &actions[0] else {
        panic!("expected an ack, got {actions:?}");
    };
    assert_eq!(ack.msg_ids, vec![7, 42]);
}

#[test]
fn garbled_envelope_is_dropped_not_fatal() {
    let (mut alice, mut bob) = establish();

    let mut envelope = alice.send(&text_message("hi")).unwrap();
    // Flip a bit in the first ciphertext block; IGE garbles the whole
    // plaintext frame from there on.
    envelope[24] ^= 0x01;

    let err = bob.handle_frame(&envelope, Instant::now()).unwrap_err();
    assert!(!err.is_fatal());

    // The connection survives: a clean retransmit still decodes.
    let envelope = alice.send(&text_message("hi again")).unwrap();
    let actions = bob.handle_frame(&envelope, Instant::now()).unwrap();
    assert_eq!(actions.len(), 1);
}

#[test]
fn misaligned_ciphertext_is_dropped_not_fatal() {
    let (_, mut bob) = establish();
    let err = bob.handle_frame(&[0u8; 25], Instant::now()).unwrap_err();
    assert!(matches!(err, ProtocolError::Cipher(_)));
    assert!(!err.is_fatal());
}

// ── Resume ────────────────────────────────────────────────────────────────────

#[test]
fn resumed_sessions_skip_the_handshake() {
    let (alice, bob) = establish();
    let key = alice.session().unwrap().auth_key_bytes();
    drop((alice, bob));

    let mut alice = Engine::resume(registry(), key, *b"saltsalt", *b"sessionA", Side::Initiator);
    let mut bob = Engine::resume(registry(), key, *b"saltsalt", *b"sessionB", Side::Responder);
    assert!(alice.is_established());
    assert!(bob.is_established());

    let envelope = alice.send(&text_message("resumed")).unwrap();
    let actions = bob.handle_frame(&envelope, Instant::now()).unwrap();
    let Action::Deliver { object: Object::Message(msg), .. } = &actions[0] else {
        panic!("expected a delivered message");
    };
    assert_eq!(msg.text, "resumed");
}

// ── Through a Transport ───────────────────────────────────────────────────────

/// In-memory frame pipe: what one end sends, the other receives.
struct Loopback {
    inbox: VecDeque<Vec<u8>>,
    outbox: VecDeque<Vec<u8>>,
}

impl Transport for Loopback {
    type Error = std::io::Error;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.outbox.push_back(data.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>, Self::Error> {
        self.inbox
            .pop_front()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::WouldBlock, "no frame queued"))
    }
}

#[test]
fn full_exchange_over_a_transport() {
    let registry = registry();
    let now = Instant::now();

    let mut wire_a = Loopback { inbox: VecDeque::new(), outbox: VecDeque::new() };
    let mut wire_b = Loopback { inbox: VecDeque::new(), outbox: VecDeque::new() };

    // Alice opens and speaks first.
    let (mut alice, share) = Engine::initiate(registry.clone(), now);
    wire_a.send(&share).unwrap();

    // Bob accepts, replies with his share.
    let mut bob = Engine::respond(registry, now);
    wire_b.inbox.push_back(wire_a.outbox.pop_front().unwrap());
    for action in bob.handle_frame(&wire_b.recv().unwrap(), now).unwrap() {
        if let Action::Send(bytes) = action {
            wire_b.send(&bytes).unwrap();
        }
    }

    // Alice finishes the handshake and sends a message.
    wire_a.inbox.push_back(wire_b.outbox.pop_front().unwrap());
    alice.handle_frame(&wire_a.recv().unwrap(), now).unwrap();
    wire_a.send(&alice.send(&text_message("hi")).unwrap()).unwrap();

    // Bob decrypts it and acks.
    wire_b.inbox.push_back(wire_a.outbox.pop_front().unwrap());
    let actions = bob.handle_frame(&wire_b.recv().unwrap(), now).unwrap();
    let Action::Deliver { msg_id, object: Object::Message(msg) } = &actions[0] else {
        panic!("expected a delivered message");
    };
    assert_eq!(msg.text, "hi");
    wire_b.send(&bob.ack(&[*msg_id]).unwrap()).unwrap();

    // Alice sees the ack for exactly that message id.
    wire_a.inbox.push_back(wire_b.outbox.pop_front().unwrap());
    let actions = alice.handle_frame(&wire_a.recv().unwrap(), now).unwrap();
    let Action::Deliver { object: Object::MsgsAck(ack), .. } = &actions[0] else {
        panic!("expected an ack");
    };
    assert_eq!(ack.msg_ids, vec![msg_id.0 as i64]);
}
