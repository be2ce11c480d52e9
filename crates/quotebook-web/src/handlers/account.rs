//! Login, logout and signup.

use axum::{
  Form, Json,
  extract::{Query, State},
  response::Response,
};
use quotebook_core::{
  ValidationErrors,
  store::QuoteStore,
  user::{FIELD_PASSWORD1, FIELD_PASSWORD2, FIELD_USERNAME, check_new_password, check_username},
  validation::{NON_FIELD, REQUIRED},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::see_other;
use crate::{
  AppState,
  auth::{Visitor, hash_password, verify_password},
  error::Error,
};

pub const FIELD_PASSWORD: &str = "password";

pub const INVALID_LOGIN: &str = "Please enter a correct username and password. \
                                 Note that both fields may be case-sensitive.";

/// `next` if it is a path on this site, else the home page.
fn local_redirect(next: &str) -> &str {
  let next = next.trim();
  if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
    next
  } else {
    "/"
  }
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct NextParam {
  #[serde(default)]
  pub next: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
  #[serde(default)]
  pub username: String,
  #[serde(default)]
  pub password: String,
  #[serde(default)]
  pub next:     String,
}

pub async fn login_form<S>(
  State(_state): State<AppState<S>>,
  Query(params): Query<NextParam>,
) -> Json<Value>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  Json(json!({
    "fields": [FIELD_USERNAME, FIELD_PASSWORD, "next"],
    "next": local_redirect(&params.next),
  }))
}

pub async fn login<S>(
  State(state): State<AppState<S>>,
  mut visitor: Visitor,
  Form(form): Form<LoginForm>,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let username = form.username.trim();
  let mut errors = ValidationErrors::new();
  if username.is_empty() {
    errors.add(FIELD_USERNAME, REQUIRED);
  }
  if form.password.is_empty() {
    errors.add(FIELD_PASSWORD, REQUIRED);
  }
  errors.into_result()?;

  let credentials = state
    .store
    .find_credentials(username.to_owned())
    .await
    .map_err(Error::from_store)?
    .filter(|c| verify_password(&form.password, &c.password_hash));

  let Some(credentials) = credentials else {
    tracing::info!(username, "failed login");
    return Err(ValidationErrors::single(NON_FIELD, INVALID_LOGIN).into());
  };

  visitor.log_in(state.store.as_ref(), credentials.user).await?;
  let res = see_other(local_redirect(&form.next));
  Ok(visitor.respond(&state.config, res))
}

pub async fn logout<S>(
  State(state): State<AppState<S>>,
  mut visitor: Visitor,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  visitor.log_out(state.store.as_ref()).await?;
  Ok(visitor.respond(&state.config, see_other("/")))
}

// ─── Signup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
  #[serde(default)]
  pub username:  String,
  #[serde(default)]
  pub password1: String,
  #[serde(default)]
  pub password2: String,
}

pub async fn signup_form<S>(State(_state): State<AppState<S>>) -> Json<Value>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  Json(json!({ "fields": [FIELD_USERNAME, FIELD_PASSWORD1, FIELD_PASSWORD2] }))
}

pub async fn signup<S>(
  State(state): State<AppState<S>>,
  mut visitor: Visitor,
  Form(form): Form<SignupForm>,
) -> Result<Response, Error>
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  let username = form.username.trim().to_owned();
  let mut errors = check_username(&username);
  errors.merge(check_new_password(&form.password1, &form.password2));
  errors.into_result()?;

  let password_hash = hash_password(&form.password1)?;
  let user = state
    .store
    .create_user(username, password_hash)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(user_id = user.user_id, username = %user.username, "user signed up");

  visitor.log_in(state.store.as_ref(), user).await?;
  Ok(visitor.respond(&state.config, see_other("/")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_local_paths_are_followed() {
    assert_eq!(local_redirect("/q/3/"), "/q/3/");
    assert_eq!(local_redirect("//evil.example/"), "/");
    assert_eq!(local_redirect("https://evil.example/"), "/");
    assert_eq!(local_redirect("/\\evil.example"), "/");
    assert_eq!(local_redirect(""), "/");
  }
}
