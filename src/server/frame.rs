//! Length-prefixed envelope codec.
//!
//! Every message on the wire is a 4-byte big-endian length followed by that
//! many payload bytes. During the handshake payloads are raw (PEM blobs and
//! the ack literal); afterwards they are RSA ciphertext. Each read and write
//! re-arms the socket deadline, so a stalled peer is cut off per operation
//! rather than per session.

use rsa::{RsaPrivateKey, RsaPublicKey};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use crate::crypto::{self, CryptoError};

/// Largest accepted payload length. Checked before any allocation.
pub const MAX_FRAME: u32 = 65_536;

/// Envelope codec error. None of these are reported to the peer; any of them
/// terminates the session.
#[derive(Debug)]
pub enum FrameError {
  /// Declared length exceeds [`MAX_FRAME`].
  TooLarge(u32),
  /// Empty payload where ciphertext was required.
  Empty,
  /// Socket deadline elapsed.
  TimedOut,
  Io(std::io::Error),
  Crypto(CryptoError),
}

impl std::fmt::Display for FrameError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FrameError::TooLarge(len) => {
        write!(f, "declared frame length {} exceeds {}", len, MAX_FRAME)
      }
      FrameError::Empty => write!(f, "empty frame where ciphertext was expected"),
      FrameError::TimedOut => write!(f, "socket deadline exceeded"),
      FrameError::Io(e) => write!(f, "IO error: {}", e),
      FrameError::Crypto(e) => write!(f, "{}", e),
    }
  }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
  fn from(e: std::io::Error) -> Self {
    FrameError::Io(e)
  }
}

impl From<CryptoError> for FrameError {
  fn from(e: CryptoError) -> Self {
    FrameError::Crypto(e)
  }
}

impl From<tokio::time::error::Elapsed> for FrameError {
  fn from(_: tokio::time::error::Elapsed) -> Self {
    FrameError::TimedOut
  }
}

/// Reading half of the codec.
pub struct FrameReader<R> {
  inner: BufReader<R>,
  deadline: Duration,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
  pub fn new(reader: R, deadline: Duration) -> Self {
    Self {
      inner: BufReader::new(reader),
      deadline,
    }
  }

  /// Read one frame as-is. The deadline is re-armed before the length read
  /// and again before the payload read.
  pub async fn recv_plain(&mut self) -> Result<Vec<u8>, FrameError> {
    let length = timeout(self.deadline, self.inner.read_u32()).await??;
    if length > MAX_FRAME {
      return Err(FrameError::TooLarge(length));
    }
    let mut payload = vec![0u8; length as usize];
    timeout(self.deadline, self.inner.read_exact(&mut payload)).await??;
    Ok(payload)
  }

  /// Read one frame and decrypt it with our session key.
  pub async fn recv_encrypted(
    &mut self,
    private_key: &RsaPrivateKey,
  ) -> Result<Vec<u8>, FrameError> {
    let ciphertext = self.recv_plain().await?;
    if ciphertext.is_empty() {
      return Err(FrameError::Empty);
    }
    Ok(crypto::decrypt(&ciphertext, private_key)?)
  }
}

/// Writing half of the codec.
pub struct FrameWriter<W> {
  inner: W,
  deadline: Duration,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
  pub fn new(writer: W, deadline: Duration) -> Self {
    Self {
      inner: writer,
      deadline,
    }
  }

  /// Frame and send a payload as-is.
  pub async fn send_plain(&mut self, payload: &[u8]) -> Result<(), FrameError> {
    timeout(self.deadline, async {
      self.inner.write_u32(payload.len() as u32).await?;
      self.inner.write_all(payload).await?;
      self.inner.flush().await
    })
    .await??;
    Ok(())
  }

  /// Access the underlying writer, e.g. to hand a socket back.
  pub fn get_mut(&mut self) -> &mut W {
    &mut self.inner
  }

  /// Encrypt a payload under the peer's key, then frame and send it.
  pub async fn send_encrypted(
    &mut self,
    payload: &[u8],
    peer_key: &RsaPublicKey,
  ) -> Result<(), FrameError> {
    let ciphertext = crypto::encrypt(payload, peer_key)?;
    self.send_plain(&ciphertext).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DEADLINE: Duration = Duration::from_secs(5);

  #[tokio::test]
  async fn test_plain_roundtrip() {
    let (client, server) = tokio::io::duplex(1024);
    let mut writer = FrameWriter::new(client, DEADLINE);
    let mut reader = FrameReader::new(server, DEADLINE);

    writer.send_plain(b"SERVER RECEIVED KEY").await.unwrap();
    assert_eq!(reader.recv_plain().await.unwrap(), b"SERVER RECEIVED KEY");
  }

  #[tokio::test]
  async fn test_zero_length_frame_decodes_empty() {
    let (client, server) = tokio::io::duplex(64);
    let mut writer = FrameWriter::new(client, DEADLINE);
    let mut reader = FrameReader::new(server, DEADLINE);

    writer.send_plain(b"").await.unwrap();
    assert!(reader.recv_plain().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_oversized_length_rejected_before_allocation() {
    let (mut client, server) = tokio::io::duplex(64);
    let mut reader = FrameReader::new(server, DEADLINE);

    client.write_u32(u32::MAX).await.unwrap();
    match reader.recv_plain().await {
      Err(FrameError::TooLarge(len)) => assert_eq!(len, u32::MAX),
      other => panic!("expected TooLarge, got {:?}", other.map(|b| b.len())),
    }
  }

  #[tokio::test]
  async fn test_short_read_is_an_error() {
    let (mut client, server) = tokio::io::duplex(64);
    let mut reader = FrameReader::new(server, DEADLINE);

    client.write_u32(10).await.unwrap();
    client.write_all(b"abc").await.unwrap();
    drop(client);
    assert!(matches!(reader.recv_plain().await, Err(FrameError::Io(_))));
  }

  #[tokio::test]
  async fn test_stalled_peer_times_out() {
    let (_client, server) = tokio::io::duplex(64);
    let mut reader = FrameReader::new(server, Duration::from_millis(50));
    assert!(matches!(
      reader.recv_plain().await,
      Err(FrameError::TimedOut)
    ));
  }

  #[tokio::test]
  async fn test_encrypted_roundtrip() {
    let (private_key, public_key) = crate::crypto::generate_keypair().unwrap();
    let (client, server) = tokio::io::duplex(4096);
    let mut writer = FrameWriter::new(client, DEADLINE);
    let mut reader = FrameReader::new(server, DEADLINE);

    writer.send_encrypted(b"AUTH user pass", &public_key).await.unwrap();
    let plaintext = reader.recv_encrypted(&private_key).await.unwrap();
    assert_eq!(plaintext, b"AUTH user pass");
  }

  #[tokio::test]
  async fn test_empty_frame_rejected_where_ciphertext_expected() {
    let (private_key, _) = crate::crypto::generate_keypair().unwrap();
    let (client, server) = tokio::io::duplex(64);
    let mut writer = FrameWriter::new(client, DEADLINE);
    let mut reader = FrameReader::new(server, DEADLINE);

    writer.send_plain(b"").await.unwrap();
    assert!(matches!(
      reader.recv_encrypted(&private_key).await,
      Err(FrameError::Empty)
    ));
  }
}
