//! Per-connection session: key exchange, authorization gate, verb dispatch.
//!
//! A session moves through `Handshaking → Unauthorized → Authorized` and
//! ends on the first framing, crypto or IO failure. Protocol-level mistakes
//! (bad arity, unknown verb, bad credentials) are reported to the client and
//! keep the session alive; transport-level ones never are.

use rsa::RsaPublicKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use uuid::Uuid;

use super::credentials::Credentials;
use super::frame::{FrameError, FrameReader, FrameWriter};
use crate::cache::CacheStore;
use crate::crypto;

/// Ack literal sent after the client's public key is accepted.
pub const HANDSHAKE_ACK: &[u8] = b"SERVER RECEIVED KEY";

/// Shared server state handed to every session.
#[derive(Clone)]
pub struct SessionContext {
  pub store: Arc<CacheStore>,
  pub credentials: Arc<Credentials>,
  /// Per-operation socket deadline.
  pub deadline: Duration,
}

/// Drive one connection to completion. The caller owns the admission permit;
/// dropping it when this future resolves releases the pool slot.
pub async fn run_session(stream: TcpStream, ctx: SessionContext) -> Result<(), anyhow::Error> {
  let session_id = Uuid::new_v4();
  let peer = stream.peer_addr()?;
  tracing::debug!(%session_id, %peer, "session started");

  let (read_half, write_half) = stream.into_split();
  let mut reader = FrameReader::new(read_half, ctx.deadline);
  let mut writer = FrameWriter::new(write_half, ctx.deadline);

  // Fresh session keypair; never persisted. Keygen is CPU-bound, so it runs
  // off the IO threads.
  let (private_key, public_key) =
    tokio::task::spawn_blocking(crypto::generate_keypair).await??;

  let client_key = handshake(&mut reader, &mut writer, &public_key).await?;
  tracing::debug!(%session_id, "handshake complete");

  let mut authorized = false;
  loop {
    let request = match reader.recv_encrypted(&private_key).await {
      Ok(bytes) => bytes,
      Err(FrameError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
        tracing::debug!(%session_id, "peer closed connection");
        return Ok(());
      }
      Err(e) => {
        tracing::debug!(%session_id, "session ended: {}", e);
        return Ok(());
      }
    };

    let Ok(text) = String::from_utf8(request) else {
      tracing::debug!(%session_id, "request was not valid UTF-8");
      return Ok(());
    };

    let Some(reply) = dispatch(&ctx, session_id, &mut authorized, &text) else {
      continue;
    };
    if let Err(e) = writer.send_encrypted(reply.as_bytes(), &client_key).await {
      tracing::debug!(%session_id, "failed to send reply: {}", e);
      return Ok(());
    }
  }
}

/// Fixed five-step key exchange. The server side: receive the client's PEM
/// public key, ack it, send our own. Any failure terminates the session.
async fn handshake(
  reader: &mut FrameReader<OwnedReadHalf>,
  writer: &mut FrameWriter<OwnedWriteHalf>,
  public_key: &RsaPublicKey,
) -> Result<RsaPublicKey, anyhow::Error> {
  let client_pem = reader.recv_plain().await?;
  let client_key = crypto::public_key_from_pem(&String::from_utf8(client_pem)?)?;

  writer.send_plain(HANDSHAKE_ACK).await?;

  let own_pem = crypto::public_key_to_pem(public_key)?;
  writer.send_plain(own_pem.as_bytes()).await?;

  Ok(client_key)
}

/// Parse and execute one request. Returns the reply text, or `None` for an
/// empty request, which is skipped without a reply.
fn dispatch(
  ctx: &SessionContext,
  session_id: Uuid,
  authorized: &mut bool,
  text: &str,
) -> Option<String> {
  let fields: Vec<&str> = text.split_whitespace().collect();
  let verb = *fields.first()?;

  let reply = match verb {
    "AUTH" => {
      if fields.len() != 3 {
        wrong_arity("AUTH")
      } else if ctx.credentials.verify(fields[1], fields[2]) {
        tracing::info!(%session_id, user = fields[1], "authenticated");
        *authorized = true;
        "OK".to_string()
      } else {
        tracing::debug!(%session_id, "authentication failed");
        "ERR authentication failed".to_string()
      }
    }

    "SET" => {
      if !*authorized {
        unauthorized()
      } else if fields.len() != 3 {
        wrong_arity("SET")
      } else {
        // The tokenizer splits on whitespace; a literal space inside the
        // value arrives escaped as a backslash-u0020 sequence.
        let value = fields[2].replace("\\u0020", " ");
        tracing::debug!(%session_id, key = fields[1], "SET");
        match ctx.store.set(fields[1], value) {
          Ok(()) => "OK".to_string(),
          Err(e) => format!("ERR {}", e),
        }
      }
    }

    "GET" => {
      if !*authorized {
        unauthorized()
      } else if fields.len() != 2 {
        wrong_arity("GET")
      } else {
        tracing::debug!(%session_id, key = fields[1], "GET");
        match ctx.store.get(fields[1]) {
          Some(value) => format!("VALUE {}", value),
          None => "NOT_FOUND".to_string(),
        }
      }
    }

    "DELETE" => {
      if !*authorized {
        unauthorized()
      } else if fields.len() != 2 {
        wrong_arity("DELETE")
      } else {
        tracing::debug!(%session_id, key = fields[1], "DELETE");
        ctx.store.delete(fields[1]);
        "OK".to_string()
      }
    }

    _ => {
      if !*authorized {
        unauthorized()
      } else {
        tracing::debug!(%session_id, verb, "unknown verb");
        "ERR unknown verb".to_string()
      }
    }
  };

  Some(reply)
}

fn wrong_arity(verb: &str) -> String {
  format!("ERR wrong number of arguments for {}", verb)
}

fn unauthorized() -> String {
  "ERR unauthorized".to_string()
}
