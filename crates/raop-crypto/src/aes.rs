//! AES-128 frame encryption for RAOP audio.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::ZeroizeOnDrop;

const BLOCK_SIZE: usize = 16;

/// Per-frame AES-128-CBC chainer.
///
/// The receiver expects every frame to be chained from an all-zero block,
/// and any trailing partial block to travel in the clear. The key is the
/// one advertised (RSA-wrapped) in the ANNOUNCE body.
#[derive(ZeroizeOnDrop)]
pub struct FrameCipher {
    key: [u8; 16],
    #[zeroize(skip)]
    cipher: Aes128,
}

impl FrameCipher {
    pub fn new(key: [u8; 16]) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(&key));
        Self { key, cipher }
    }

    /// Cipher keyed with the fixed all-zero session key.
    pub fn with_session_key() -> Self {
        Self::new(crate::keys::SESSION_KEY)
    }

    /// Encrypt one encoded frame. Full blocks are chained from a zero IV,
    /// the `len % 16` tail is copied through.
    pub fn encrypt_frame(&self, plaintext: &[u8]) -> Vec<u8> {
        let full_len = plaintext.len() - plaintext.len() % BLOCK_SIZE;
        let mut out = Vec::with_capacity(plaintext.len());
        let mut chain = [0u8; BLOCK_SIZE];

        for chunk in plaintext[..full_len].chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            for i in 0..BLOCK_SIZE {
                block[i] = chunk[i] ^ chain[i];
            }
            self.cipher
                .encrypt_block(aes::Block::from_mut_slice(&mut block));
            chain = block;
            out.extend_from_slice(&block);
        }

        out.extend_from_slice(&plaintext[full_len..]);
        out
    }

    /// Inverse of [`encrypt_frame`](Self::encrypt_frame).
    pub fn decrypt_frame(&self, ciphertext: &[u8]) -> Vec<u8> {
        let full_len = ciphertext.len() - ciphertext.len() % BLOCK_SIZE;
        let mut out = Vec::with_capacity(ciphertext.len());
        let mut chain = [0u8; BLOCK_SIZE];

        for chunk in ciphertext[..full_len].chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.cipher
                .decrypt_block(aes::Block::from_mut_slice(&mut block));
            for i in 0..BLOCK_SIZE {
                block[i] ^= chain[i];
            }
            chain.copy_from_slice(chunk);
            out.extend_from_slice(&block);
        }

        out.extend_from_slice(&ciphertext[full_len..]);
        out
    }

    pub fn key(&self) -> &[u8; 16] {
        &self.key
    }
}
