//! RSA key exchange primitives and credential hashing.
//!
//! Every session holds a fresh 2048-bit keypair; public keys travel as
//! PKCS#8/SPKI PEM blobs. Payloads are encrypted with OAEP over SHA-256,
//! which caps a single message at the OAEP capacity of the key (190 bytes
//! for 2048-bit keys), enough for the short command strings this protocol
//! carries.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Session key size in bits.
pub const KEY_BITS: usize = 2048;

/// Crypto operation error.
#[derive(Debug)]
pub enum CryptoError {
  Rsa(rsa::Error),
  Pem(String),
}

impl std::fmt::Display for CryptoError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CryptoError::Rsa(e) => write!(f, "RSA operation failed: {}", e),
      CryptoError::Pem(msg) => write!(f, "invalid public key PEM: {}", msg),
    }
  }
}

impl std::error::Error for CryptoError {}

impl From<rsa::Error> for CryptoError {
  fn from(e: rsa::Error) -> Self {
    CryptoError::Rsa(e)
  }
}

/// Generate a fresh session keypair. CPU-bound; call through
/// `tokio::task::spawn_blocking` from async contexts.
pub fn generate_keypair() -> Result<(RsaPrivateKey, RsaPublicKey), CryptoError> {
  let private_key = RsaPrivateKey::new(&mut OsRng, KEY_BITS)?;
  let public_key = RsaPublicKey::from(&private_key);
  Ok((private_key, public_key))
}

/// Encrypt a payload under the peer's public key.
pub fn encrypt(data: &[u8], public_key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
  Ok(public_key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)?)
}

/// Decrypt a payload with our private key.
pub fn decrypt(ciphertext: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
  Ok(private_key.decrypt(Oaep::new::<Sha256>(), ciphertext)?)
}

/// Encode a public key as SPKI PEM for the handshake.
pub fn public_key_to_pem(public_key: &RsaPublicKey) -> Result<String, CryptoError> {
  public_key
    .to_public_key_pem(LineEnding::LF)
    .map_err(|e| CryptoError::Pem(e.to_string()))
}

/// Parse a peer's SPKI PEM public key. Tolerates surrounding whitespace.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, CryptoError> {
  RsaPublicKey::from_public_key_pem(pem.trim()).map_err(|e| CryptoError::Pem(e.to_string()))
}

/// Hex-encoded SHA-256 digest, the stored form of credentials.
pub fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  format!("{:x}", hasher.finalize())
}
