//! Accounts and browser sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{REQUIRED, ValidationErrors};

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// How long a session stays valid after it is created.
pub const SESSION_TTL_DAYS: i64 = 14;

pub const FIELD_USERNAME: &str = "username";
pub const FIELD_PASSWORD1: &str = "password1";
pub const FIELD_PASSWORD2: &str = "password2";

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    i64,
  pub username:   String,
  pub created_at: DateTime<Utc>,
}

/// A user together with the stored password hash, for login checks only.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user:          User,
  /// PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// A browser session. Anonymous visitors get one too; it is their voting
/// identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
  pub session_key: String,
  pub user_id:     Option<i64>,
  pub created_at:  DateTime<Utc>,
  pub expires_at:  DateTime<Utc>,
}

/// Usernames are 1–150 characters of letters, digits and `@ . + - _`.
pub fn check_username(username: &str) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  if username.is_empty() {
    errors.add(FIELD_USERNAME, REQUIRED);
  } else if username.chars().count() > MAX_USERNAME_LEN {
    errors.add(
      FIELD_USERNAME,
      format!("Ensure this value has at most {MAX_USERNAME_LEN} characters."),
    );
  } else if !username
    .chars()
    .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
  {
    errors.add(
      FIELD_USERNAME,
      "Enter a valid username. This value may contain only letters, numbers, \
       and @/./+/-/_ characters.",
    );
  }
  errors
}

/// Signup password rules: both entries present, equal, and long enough.
pub fn check_new_password(password1: &str, password2: &str) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  if password1.is_empty() {
    errors.add(FIELD_PASSWORD1, REQUIRED);
  }
  if password2.is_empty() {
    errors.add(FIELD_PASSWORD2, REQUIRED);
  }
  if !errors.is_empty() {
    return errors;
  }
  if password1 != password2 {
    errors.add(FIELD_PASSWORD2, "The two password fields didn't match.");
  } else if password1.chars().count() < MIN_PASSWORD_LEN {
    errors.add(
      FIELD_PASSWORD2,
      format!(
        "This password is too short. It must contain at least \
         {MIN_PASSWORD_LEN} characters."
      ),
    );
  }
  errors
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn username_rules() {
    assert!(check_username("alice.b+c@d-e_f").is_empty());
    assert!(check_username("ёжик").is_empty());
    assert!(check_username("").has(FIELD_USERNAME));
    assert!(check_username("white space").has(FIELD_USERNAME));
    assert!(check_username(&"a".repeat(151)).has(FIELD_USERNAME));
  }

  #[test]
  fn password_rules() {
    assert!(check_new_password("correct horse", "correct horse").is_empty());
    assert!(check_new_password("", "").has(FIELD_PASSWORD1));
    assert!(check_new_password("longenough", "different!").has(FIELD_PASSWORD2));
    assert!(check_new_password("short", "short").has(FIELD_PASSWORD2));
  }
}
