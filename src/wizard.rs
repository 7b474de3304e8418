//! Interactive `init` wizard. Produces the server configuration file with
//! credentials already hashed; everything else about the terminal UX is
//! incidental to the core.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use crate::crypto::sha256_hex;
use crate::server::ServerConfig;

const MIN_PASSWORD_LEN: usize = 8;

/// Run the wizard and write the resulting config file.
///
/// With `use_defaults` only the name and credentials are asked for; every
/// pool option keeps its default.
pub fn run(use_defaults: bool, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
  let stdin = io::stdin();
  let mut input = stdin.lock();
  let mut config = ServerConfig::default();

  println!("Burrow cache server setup");
  config.name = prompt_line(&mut input, "Server name")?;
  let user = prompt_line(&mut input, "User")?;
  let password = prompt_password()?;

  config.user = sha256_hex(&user);
  config.password = sha256_hex(&password);

  if !use_defaults {
    config.port = prompt_value(&mut input, "Port", config.port)?;
    let pool = &mut config.pool_config;
    pool.max_conns = prompt_value(&mut input, "Maximum number of connections", pool.max_conns)?;
    pool.connection_timeout = prompt_value(
      &mut input,
      "Connection timeout in milliseconds",
      pool.connection_timeout,
    )?;
    pool.backup_on = prompt_yes_no(&mut input, "Turn on backup? (y/n)")?;
    if pool.backup_on {
      pool.backup_cycle =
        prompt_value(&mut input, "Backup cycle in milliseconds", pool.backup_cycle)?;
    }
    pool.time_to_live = prompt_value(&mut input, "Node time to live in seconds", pool.time_to_live)?;
    pool.node_limit = prompt_value(&mut input, "Limit for simultaneous nodes", pool.node_limit)?;
    pool.node_size = prompt_value(&mut input, "Node size limit in bytes", pool.node_size)?;
    pool.cache_limit = prompt_value(&mut input, "Cache limit in bytes", pool.cache_limit)?;
    pool.idle_threshold = prompt_value(
      &mut input,
      "Maximum idle time until memory cleanup in seconds",
      pool.idle_threshold,
    )?;
  }

  config.validate()?;

  let json = serde_json::to_string_pretty(&config)?;
  std::fs::write(&path, json)?;
  println!("Configuration written to {}", path.as_ref().display());
  Ok(())
}

/// Password prompt with confirmation, repeated until the inputs match and
/// meet the minimum length.
fn prompt_password() -> Result<String, anyhow::Error> {
  loop {
    let password = rpassword::prompt_password("Password: ")?;
    let repeat = rpassword::prompt_password("Repeat password: ")?;

    if password != repeat {
      eprintln!("Passwords do not match");
      continue;
    }
    if password.len() < MIN_PASSWORD_LEN {
      eprintln!("Password too short (minimum {} characters)", MIN_PASSWORD_LEN);
      continue;
    }
    return Ok(password);
  }
}

fn prompt_line(input: &mut impl BufRead, label: &str) -> Result<String, anyhow::Error> {
  loop {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
      anyhow::bail!("unexpected end of input");
    }
    let trimmed = line.trim();
    if !trimmed.is_empty() {
      return Ok(trimmed.to_string());
    }
  }
}

/// Numeric prompt; an empty line keeps the shown default.
fn prompt_value<T>(input: &mut impl BufRead, label: &str, default: T) -> Result<T, anyhow::Error>
where
  T: FromStr + std::fmt::Display,
{
  loop {
    print!("{} (DEFAULT {}): ", label, default);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
      anyhow::bail!("unexpected end of input");
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
      return Ok(default);
    }
    match trimmed.parse() {
      Ok(value) => return Ok(value),
      Err(_) => eprintln!("Invalid value '{}'", trimmed),
    }
  }
}

fn prompt_yes_no(input: &mut impl BufRead, label: &str) -> Result<bool, anyhow::Error> {
  loop {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
      anyhow::bail!("unexpected end of input");
    }
    match line.trim().to_lowercase().as_str() {
      "y" | "yes" => return Ok(true),
      "n" | "no" | "" => return Ok(false),
      other => eprintln!("Expected y or n, got '{}'", other),
    }
  }
}
