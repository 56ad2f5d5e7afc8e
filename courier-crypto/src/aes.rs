//! AES-256 in IGE (Infinite Garble Extension) chaining mode.
//!
//! Every output block depends on the whole history of plaintext and
//! ciphertext blocks, so a single corrupted ciphertext byte garbles the
//! rest of the stream on decrypt. The raw single-block (ECB) primitive is
//! only ever invoked inside this chaining loop.

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

/// Encrypt `buffer` in place. Length must be a multiple of 16.
///
/// The 32-byte IV splits into the two chaining seeds: `iv[..16]` tracks
/// the previous plaintext block, `iv[16..]` the previous ciphertext block.
pub fn ige_encrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert!(buffer.len() % 16 == 0, "IGE needs 16-byte aligned input");

    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut x_prev = [0u8; 16];
    let mut y_prev = [0u8; 16];
    x_prev.copy_from_slice(&iv[..16]);
    y_prev.copy_from_slice(&iv[16..]);

    let mut plain = [0u8; 16];
    for block in buffer.chunks_mut(16) {
        plain.copy_from_slice(block);

        for i in 0..16 {
            block[i] ^= y_prev[i];
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        for i in 0..16 {
            block[i] ^= x_prev[i];
        }

        x_prev = plain;
        y_prev.copy_from_slice(block);
    }
}

/// Decrypt `buffer` in place. Length must be a multiple of 16.
///
/// Mirror of [`ige_encrypt`]; padding appended at encryption time is left
/// in place for the caller to skip via the frame's own length fields.
pub fn ige_decrypt(buffer: &mut [u8], key: &[u8; 32], iv: &[u8; 32]) {
    assert!(buffer.len() % 16 == 0, "IGE needs 16-byte aligned input");

    let cipher = Aes256::new(GenericArray::from_slice(key));

    let mut x_prev = [0u8; 16];
    let mut y_prev = [0u8; 16];
    x_prev.copy_from_slice(&iv[..16]);
    y_prev.copy_from_slice(&iv[16..]);

    let mut encrypted = [0u8; 16];
    for block in buffer.chunks_mut(16) {
        encrypted.copy_from_slice(block);

        for i in 0..16 {
            block[i] ^= x_prev[i];
        }
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        for i in 0..16 {
            block[i] ^= y_prev[i];
        }

        x_prev.copy_from_slice(block);
        y_prev = encrypted;
    }
}
