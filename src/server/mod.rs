//! TCP server: configuration, admission, key exchange and verb dispatch.

mod config;
mod credentials;
mod daemon;
mod frame;
mod session;

pub use config::{PoolConfig, ServerConfig};
pub use credentials::Credentials;
pub use daemon::Daemon;
pub use frame::{FrameError, FrameReader, FrameWriter, MAX_FRAME};
pub use session::{run_session, SessionContext, HANDSHAKE_ACK};
