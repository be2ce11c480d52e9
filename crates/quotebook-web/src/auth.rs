//! Browser sessions, voter identity and password hashing.
//!
//! Sessions are opaque random keys carried in a cookie and stored server-side.
//! Anonymous visitors get one the first time a handler needs a voter
//! identity; logging in rotates the key.

use std::net::{IpAddr, SocketAddr};

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, HeaderValue, Method, header, request::Parts},
  response::{IntoResponse, Response},
};
use quotebook_core::{
  store::QuoteStore,
  user::{SESSION_TTL_DAYS, SessionRecord, User},
  vote::Identity,
};
use rand_core::OsRng;

use crate::{AppState, ServerConfig, error::Error};

/// Header htmx sets on every request it issues.
pub const HX_REQUEST: &str = "hx-request";

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, Error> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for an unparseable stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(password_hash) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

// ─── Request helpers ─────────────────────────────────────────────────────────

/// Value of the cookie `name`, searching every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(key, _)| *key == name)
    .map(|(_, value)| value)
}

/// First `X-Forwarded-For` hop when it is an IP address, else the peer.
pub fn client_ip(parts: &Parts) -> Option<String> {
  let forwarded = parts
    .headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .and_then(|first| first.trim().parse::<IpAddr>().ok());

  forwarded
    .or_else(|| {
      parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    })
    .map(|ip| ip.to_string())
}

pub fn is_htmx(headers: &HeaderMap) -> bool { headers.contains_key(HX_REQUEST) }

// ─── Visitor ─────────────────────────────────────────────────────────────────

enum CookieChange {
  Set(String),
  Clear,
}

/// Who is making the request: their session (if any), the logged-in user
/// (if any) and their address.
pub struct Visitor {
  pub session: Option<SessionRecord>,
  pub user:    Option<User>,
  pub ip:      Option<String>,
  /// The request came from htmx and wants a fragment.
  pub htmx:    bool,
  /// Where to come back to after logging in.
  pub next:    String,
  cookie:      Option<CookieChange>,
}

impl Visitor {
  /// The loose voter identity: session key and/or address.
  pub fn identity(&self) -> Identity {
    Identity::new(
      self.session.as_ref().map(|s| s.session_key.clone()),
      self.ip.clone(),
    )
  }

  /// The logged-in user, or the rejection appropriate for this request.
  pub fn require_user(&self) -> Result<&User, Error> {
    match &self.user {
      Some(user) => Ok(user),
      None if self.htmx => Err(Error::LoginPrompt),
      None => Err(Error::LoginRequired { next: self.next.clone() }),
    }
  }

  /// Make sure the visitor has a session, creating an anonymous one.
  pub async fn ensure_session<S: QuoteStore>(&mut self, store: &S) -> Result<(), Error> {
    if self.session.is_none() {
      let session = store.create_session(None).await.map_err(Error::from_store)?;
      self.cookie = Some(CookieChange::Set(session.session_key.clone()));
      self.session = Some(session);
    }
    Ok(())
  }

  /// Bind a fresh session to `user`, discarding the current one.
  pub async fn log_in<S: QuoteStore>(&mut self, store: &S, user: User) -> Result<(), Error> {
    if let Some(old) = self.session.take() {
      store
        .delete_session(old.session_key)
        .await
        .map_err(Error::from_store)?;
    }
    let session = store
      .create_session(Some(user.user_id))
      .await
      .map_err(Error::from_store)?;
    tracing::info!(user_id = user.user_id, username = %user.username, "logged in");
    self.cookie = Some(CookieChange::Set(session.session_key.clone()));
    self.session = Some(session);
    self.user = Some(user);
    Ok(())
  }

  pub async fn log_out<S: QuoteStore>(&mut self, store: &S) -> Result<(), Error> {
    if let Some(old) = self.session.take() {
      store
        .delete_session(old.session_key)
        .await
        .map_err(Error::from_store)?;
    }
    if let Some(user) = self.user.take() {
      tracing::info!(user_id = user.user_id, "logged out");
    }
    self.cookie = Some(CookieChange::Clear);
    Ok(())
  }

  /// Finish a response, attaching `Set-Cookie` when the session changed.
  pub fn respond(self, config: &ServerConfig, res: impl IntoResponse) -> Response {
    let mut res = res.into_response();
    let Some(change) = self.cookie else {
      return res;
    };

    let secure = if config.secure_cookies { "; Secure" } else { "" };
    let name = &config.session_cookie;
    let cookie = match change {
      CookieChange::Set(key) => {
        let max_age = SESSION_TTL_DAYS * 24 * 60 * 60;
        format!("{name}={key}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax{secure}")
      }
      CookieChange::Clear => {
        format!("{name}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax{secure}")
      }
    };
    match HeaderValue::from_str(&cookie) {
      Ok(value) => {
        res.headers_mut().append(header::SET_COOKIE, value);
      }
      Err(_) => tracing::warn!(cookie = %name, "session cookie name is not a valid header value"),
    }
    res
  }
}

impl<S> FromRequestParts<AppState<S>> for Visitor
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let key = cookie_value(&parts.headers, &state.config.session_cookie)
      .filter(|key| !key.is_empty())
      .map(str::to_owned);

    let session = match key {
      Some(key) => state.store.get_session(key).await.map_err(Error::from_store)?,
      None => None,
    };
    let user = match session.as_ref().and_then(|s| s.user_id) {
      Some(user_id) => state.store.get_user(user_id).await.map_err(Error::from_store)?,
      None => None,
    };

    let next = if parts.method == Method::GET {
      parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| "/".to_owned())
    } else {
      "/".to_owned()
    };

    Ok(Visitor {
      session,
      user,
      ip: client_ip(parts),
      htmx: is_htmx(&parts.headers),
      next,
      cookie: None,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::Request;

  fn parts(req: Request<()>) -> Parts { req.into_parts().0 }

  #[test]
  fn hash_then_verify() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
    assert!(!verify_password("anything", "not a phc string"));
  }

  #[test]
  fn finds_cookie_among_others() {
    let req = Request::builder()
      .header(header::COOKIE, "theme=dark; sessionid=abc123")
      .header(header::COOKIE, "other=1")
      .body(())
      .unwrap();
    let headers = req.headers();
    assert_eq!(cookie_value(headers, "sessionid"), Some("abc123"));
    assert_eq!(cookie_value(headers, "other"), Some("1"));
    assert_eq!(cookie_value(headers, "missing"), None);
  }

  #[test]
  fn forwarded_for_wins_when_it_is_an_address() {
    let p = parts(
      Request::builder()
        .header("x-forwarded-for", " 1.2.3.4 , 10.0.0.1")
        .body(())
        .unwrap(),
    );
    assert_eq!(client_ip(&p).as_deref(), Some("1.2.3.4"));
  }

  #[test]
  fn garbage_forwarded_for_falls_back_to_peer() {
    let mut p = parts(
      Request::builder()
        .header("x-forwarded-for", "unknown")
        .body(())
        .unwrap(),
    );
    assert_eq!(client_ip(&p), None);

    p.extensions
      .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 9], 4242))));
    assert_eq!(client_ip(&p).as_deref(), Some("192.168.1.9"));
  }
}
