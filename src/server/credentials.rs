//! Hashed credential store.

use subtle::ConstantTimeEq;

use crate::crypto::sha256_hex;

/// The stored hex SHA-256 digests of user name and password, loaded from the
/// configuration at startup and immutable for the process lifetime.
pub struct Credentials {
  user_hash: String,
  password_hash: String,
}

impl Credentials {
  pub fn new(user_hash: String, password_hash: String) -> Self {
    Self {
      user_hash,
      password_hash,
    }
  }

  /// Hash the submitted values and compare both digests in constant time.
  /// Both comparisons always run; a caller learns only the combined verdict.
  pub fn verify(&self, user: &str, password: &str) -> bool {
    let user_digest = sha256_hex(user);
    let password_digest = sha256_hex(password);
    let user_ok = user_digest.as_bytes().ct_eq(self.user_hash.as_bytes());
    let password_ok = password_digest
      .as_bytes()
      .ct_eq(self.password_hash.as_bytes());
    bool::from(user_ok & password_ok)
  }
}
