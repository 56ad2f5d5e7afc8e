use courier_crypto::aes::{ige_decrypt, ige_encrypt};
use courier_crypto::{AuthKey, DecryptError, Side, calc_key, msg_key, open_envelope, seal_envelope};

fn auth_key() -> AuthKey {
    AuthKey::from_bytes(core::array::from_fn(|i| (i * 3 + 1) as u8))
}

// ── AuthKey ───────────────────────────────────────────────────────────────────

#[test]
fn key_id_is_last_eight_bytes() {
    let data: [u8; 256] = core::array::from_fn(|i| i as u8);
    let key = AuthKey::from_bytes(data);
    assert_eq!(key.key_id(), <[u8; 8]>::try_from(&data[248..]).unwrap());
    assert_eq!(key.to_bytes(), data);
}

// ── AES-IGE ───────────────────────────────────────────────────────────────────

#[test]
fn ige_roundtrip() {
    let key = [0x11u8; 32];
    let iv: [u8; 32] = core::array::from_fn(|i| i as u8);
    let original: Vec<u8> = (0u8..96).collect();

    let mut buf = original.clone();
    ige_encrypt(&mut buf, &key, &iv);
    assert_ne!(buf, original);

    ige_decrypt(&mut buf, &key, &iv);
    assert_eq!(buf, original);
}

#[test]
fn ige_first_block_matches_chaining_formula() {
    use aes::Aes256;
    use aes::cipher::generic_array::GenericArray;
    use aes::cipher::{BlockEncrypt, KeyInit};

    let key = [0x42u8; 32];
    let iv: [u8; 32] = core::array::from_fn(|i| (i * 5) as u8);
    let plain = [0xA7u8; 16];

    let mut buf = plain;
    ige_encrypt(&mut buf, &key, &iv);

    // c1 = E(p1 ⊕ iv[16..]) ⊕ iv[..16]
    let cipher = Aes256::new(GenericArray::from_slice(&key));
    let mut expected = [0u8; 16];
    for i in 0..16 {
        expected[i] = plain[i] ^ iv[16 + i];
    }
    cipher.encrypt_block(GenericArray::from_mut_slice(&mut expected));
    for i in 0..16 {
        expected[i] ^= iv[i];
    }

    assert_eq!(buf, expected);
}

#[test]
fn ige_corruption_garbles_the_remainder_only() {
    let key = [0x33u8; 32];
    let iv = [0x55u8; 32];
    let original: Vec<u8> = (0u8..80).collect();

    let mut buf = original.clone();
    ige_encrypt(&mut buf, &key, &iv);

    // Flip one bit in the third ciphertext block.
    buf[35] ^= 0x01;
    ige_decrypt(&mut buf, &key, &iv);

    // Blocks before the corruption decrypt cleanly…
    assert_eq!(buf[..32], original[..32]);
    // …everything from the corrupted block onwards is garbage.
    assert_ne!(buf[32..48], original[32..48]);
    assert_ne!(buf[48..64], original[48..64]);
}

// ── Subkey derivation ─────────────────────────────────────────────────────────

#[test]
fn calc_key_is_deterministic() {
    let mk = [9u8; 16];
    let a = calc_key(&auth_key(), &mk, Side::Initiator);
    let b = calc_key(&auth_key(), &mk, Side::Initiator);
    assert_eq!(a, b);
}

#[test]
fn calc_key_differs_per_origin() {
    let mk = [9u8; 16];
    let initiator = calc_key(&auth_key(), &mk, Side::Initiator);
    let responder = calc_key(&auth_key(), &mk, Side::Responder);
    assert_ne!(initiator, responder);
}

#[test]
fn calc_key_differs_per_msg_key() {
    let a = calc_key(&auth_key(), &[1u8; 16], Side::Initiator);
    let b = calc_key(&auth_key(), &[2u8; 16], Side::Initiator);
    assert_ne!(a, b);
}

// ── msg_key ───────────────────────────────────────────────────────────────────

#[test]
fn msg_key_is_middle_slice_of_sha256() {
    use sha2::{Digest, Sha256};

    let key = auth_key();
    let plaintext = b"some frame bytes";

    let mut h = Sha256::new();
    h.update(&key.to_bytes()[88..120]);
    h.update(plaintext);
    let digest: [u8; 32] = h.finalize().into();

    assert_eq!(msg_key(&key, plaintext), digest[8..24]);
}

// ── Envelope ──────────────────────────────────────────────────────────────────

#[test]
fn envelope_roundtrip() {
    let key = auth_key();
    let plain = b"salted frame with a body".to_vec();

    let mut envelope = seal_envelope(plain.clone(), &key, Side::Responder);
    assert_eq!(envelope[..8], key.key_id());
    assert_eq!((envelope.len() - 24) % 16, 0);

    let opened = open_envelope(&mut envelope, &key, Side::Responder).unwrap();
    assert_eq!(&opened[..plain.len()], &plain[..]);

    let pad = opened.len() - plain.len();
    assert!((12..=28).contains(&pad), "padding {pad} out of range");
}

#[test]
fn envelope_rejects_foreign_key_id() {
    let mut envelope = seal_envelope(vec![1, 2, 3], &auth_key(), Side::Initiator);

    let other = AuthKey::from_bytes([0xEE; 256]);
    assert_eq!(
        open_envelope(&mut envelope, &other, Side::Initiator),
        Err(DecryptError::AuthKeyMismatch)
    );
}

#[test]
fn envelope_rejects_misaligned_ciphertext() {
    let key = auth_key();
    // Shorter than header + one block.
    assert_eq!(open_envelope(&mut [0u8; 24], &key, Side::Initiator), Err(DecryptError::InvalidBuffer));
    // Header present but ciphertext not block-aligned.
    assert_eq!(open_envelope(&mut [0u8; 41], &key, Side::Initiator), Err(DecryptError::InvalidBuffer));
}

#[test]
fn envelope_requires_matching_origin() {
    let key = auth_key();
    let plain = b"direction matters".to_vec();

    let mut envelope = seal_envelope(plain.clone(), &key, Side::Initiator);
    let opened = open_envelope(&mut envelope, &key, Side::Responder).unwrap();
    assert_ne!(&opened[..plain.len()], &plain[..]);
}
