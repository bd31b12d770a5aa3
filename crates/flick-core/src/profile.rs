//! Author profiles as shown next to videos and channels.
//!
//! Rows come back from the backend with most columns optional. [`Profile`]
//! is the validated form every view renders; the fallback values are pure
//! functions of the user id and name so they can be computed anywhere.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

/// A profile row as fetched. Any column may be absent or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
  pub id:               Uuid,
  #[serde(default)]
  pub username:         Option<String>,
  #[serde(default)]
  pub avatar:           Option<String>,
  #[serde(default)]
  pub subscriber_count: Option<i64>,
}

/// A profile with every display field filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:          Uuid,
  pub username:    String,
  pub avatar:      String,
  pub subscribers: u64,
}

impl Profile {
  /// Build the display profile for `user_id` from an optional row.
  pub fn from_row(user_id: Uuid, row: Option<ProfileRow>) -> Self {
    let row = row.unwrap_or_default();
    let username = non_empty(row.username)
      .unwrap_or_else(|| fallback_username(user_id));
    let avatar = non_empty(row.avatar)
      .unwrap_or_else(|| fallback_avatar(&username));
    Self {
      id: if row.id.is_nil() { user_id } else { row.id },
      username,
      avatar,
      subscribers: row.subscriber_count.unwrap_or(0).max(0) as u64,
    }
  }
}

fn non_empty(s: Option<String>) -> Option<String> {
  s.filter(|s| !s.trim().is_empty())
}

/// `user_` followed by the first eight characters of the id.
pub fn fallback_username(user_id: Uuid) -> String {
  let id = user_id.hyphenated().to_string();
  format!("user_{}", &id[..8])
}

/// A generated initials avatar for `name`.
pub fn fallback_avatar(name: &str) -> String {
  format!("{AVATAR_SERVICE}?name={}&background=random", encode_component(name))
}

/// Percent-encode everything except the characters a URI component may carry
/// unescaped (`A-Z a-z 0-9 - _ . ! ~ * ' ( )`).
fn encode_component(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for byte in s.bytes() {
    match byte {
      b'A'..=b'Z'
      | b'a'..=b'z'
      | b'0'..=b'9'
      | b'-'
      | b'_'
      | b'.'
      | b'!'
      | b'~'
      | b'*'
      | b'\''
      | b'('
      | b')' => out.push(byte as char),
      _ => out.push_str(&format!("%{byte:02X}")),
    }
  }
  out
}
