//! Generated account names and passwords.

use chrono::{DateTime, Utc};
use rand::RngExt;
use secrecy::SecretString;

/// RouterOS caps account names at 32 characters.
const MAX_USERNAME_LEN: usize = 32;

const SUFFIX_LEN: usize = 4;
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Reduce an actor identity to a username-safe prefix.
///
/// Lowercased, stripped to `[a-z0-9]`, truncated to `max_len`; an
/// actor with nothing usable left becomes `user`.
pub fn sanitize_actor(actor: &str, max_len: usize) -> String {
    let mut prefix: String = actor
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    prefix.truncate(max_len);
    if prefix.is_empty() {
        prefix.push_str("user");
    }
    prefix
}

/// Generate a device account name: `<actor>-<unix-ts>-<4 random>`.
///
/// The timestamp plus random suffix makes collisions rare; the store's
/// uniqueness check catches the rest, and the caller regenerates once
/// on conflict.
pub fn generate_username(actor: &str, now: DateTime<Utc>, prefix_len: usize) -> String {
    let prefix = sanitize_actor(actor, prefix_len);
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    let mut username = format!("{prefix}-{}-{suffix}", now.timestamp());
    username.truncate(MAX_USERNAME_LEN);
    username
}

/// Generate a random alphanumeric password.
pub fn generate_password(length: usize) -> SecretString {
    let mut rng = rand::rng();
    let password: String = (0..length)
        .map(|_| PASSWORD_CHARSET[rng.random_range(0..PASSWORD_CHARSET.len())] as char)
        .collect();
    SecretString::from(password)
}
