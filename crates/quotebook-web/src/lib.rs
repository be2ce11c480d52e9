//! HTTP layer for Quotebook.
//!
//! Exposes an axum [`Router`] serving the quote pages, voting, comments and
//! accounts, backed by any [`QuoteStore`]. Page responses are JSON view
//! models; form posts answer with a redirect, or with a JSON fragment when
//! the request carries the `HX-Request` header.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use quotebook_core::{report::DEFAULT_PAGE_SIZE, store::QuoteStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{account, comments, pages, quotes, votes};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `QUOTEBOOK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  #[serde(default = "default_session_cookie")]
  pub session_cookie: String,
  /// Mark the session cookie `Secure`; enable behind HTTPS.
  #[serde(default)]
  pub secure_cookies: bool,
  /// Popular list page size.
  #[serde(default = "default_page_size")]
  pub page_size:      i64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("quotebook.sqlite3") }
fn default_session_cookie() -> String { "sessionid".to_string() }
fn default_page_size() -> i64 { DEFAULT_PAGE_SIZE }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:           default_host(),
      port:           default_port(),
      store_path:     default_store_path(),
      session_cookie: default_session_cookie(),
      secure_cookies: false,
      page_size:      default_page_size(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: QuoteStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the site.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: QuoteStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/",                             get(pages::home::<S>))
    .route("/q/{quote_id}/",                get(pages::quote_detail::<S>))
    .route("/q/{quote_id}/delete/",         post(quotes::delete::<S>))
    .route("/add/",                         get(quotes::add_form::<S>).post(quotes::add::<S>))
    .route("/popular/",                     get(pages::popular::<S>))
    .route("/dashboard/",                   get(pages::dashboard::<S>))
    .route("/like/{quote_id}/",             post(votes::like::<S>))
    .route("/dislike/{quote_id}/",          post(votes::dislike::<S>))
    .route("/comment/{quote_id}/",          post(comments::add::<S>))
    .route("/comment-like/{comment_id}/",   post(comments::like::<S>))
    .route("/comment-dislike/{comment_id}/", post(comments::dislike::<S>))
    .route("/comment-delete/{comment_id}/", post(comments::delete::<S>))
    .route("/login/",                       get(account::login_form::<S>).post(account::login::<S>))
    .route("/logout/",                      get(account::logout::<S>).post(account::logout::<S>))
    .route("/signup/",                      get(account::signup_form::<S>).post(account::signup::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use quotebook_core::{
    quote::{FIELD_SOURCE_NAME, NewQuote, Quote},
    source::SourceKind,
  };
  use quotebook_store_sqlite::SqliteStore;
  use serde_json::Value;
  use tower::ServiceExt as _;

  const FORM: &str = "application/x-www-form-urlencoded";

  async fn make_state() -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig::default()),
    }
  }

  async fn seed_quote(state: &AppState<SqliteStore>, text: &str, source: &str) -> Quote {
    state
      .store
      .submit_quote(NewQuote::new(text, 1, source, SourceKind::Book))
      .await
      .unwrap()
  }

  async fn send(
    state:   &AppState<SqliteStore>,
    method:  &str,
    uri:     &str,
    headers: &[(&str, &str)],
    body:    &str,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(*k, *v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn json(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  /// `name=value` of the session cookie set by a response.
  fn set_cookie(res: &Response) -> Option<String> {
    res
      .headers()
      .get(header::SET_COOKIE)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.split(';').next())
      .map(str::to_owned)
  }

  fn location(res: &Response) -> &str {
    res.headers()[header::LOCATION].to_str().unwrap()
  }

  async fn sign_up(state: &AppState<SqliteStore>, username: &str) -> String {
    let body = format!("username={username}&password1=correct-horse&password2=correct-horse");
    let res = send(state, "POST", "/signup/", &[("content-type", FORM)], &body).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    set_cookie(&res).expect("signup sets the session cookie")
  }

  // ── Pages ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn home_on_empty_store() {
    let state = make_state().await;
    let res = send(&state, "GET", "/", &[], "").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(set_cookie(&res).unwrap().starts_with("sessionid="));
    let raw = res.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(raw.contains("Max-Age=1209600"), "{raw}");

    let body = json(res).await;
    assert!(body["quote"].is_null());
    assert_eq!(body["voted"], false);
  }

  #[tokio::test]
  async fn home_shows_a_quote_and_counts_the_view() {
    let state = make_state().await;
    let q = seed_quote(&state, "To be, or not to be", "Hamlet").await;

    let body = json(send(&state, "GET", "/", &[], "").await).await;
    assert_eq!(body["quote"]["quote_id"], q.quote_id);
    assert_eq!(body["quote"]["views"], 1);
    assert_eq!(body["quote"]["source"]["name"], "Hamlet");
  }

  #[tokio::test]
  async fn quote_detail_404_for_unknown_id() {
    let state = make_state().await;
    let res = send(&state, "GET", "/q/999/", &[], "").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn existing_session_cookie_is_reused() {
    let state = make_state().await;
    let first = send(&state, "GET", "/", &[], "").await;
    let cookie = set_cookie(&first).unwrap();

    let second = send(&state, "GET", "/", &[("cookie", cookie.as_str())], "").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(set_cookie(&second).is_none());
  }

  // ── Voting ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn same_ip_cannot_like_then_dislike() {
    let state = make_state().await;
    let q = seed_quote(&state, "vote on me", "Ballot").await;
    let headers = [("x-forwarded-for", "1.2.3.4"), ("hx-request", "true")];

    let res = send(&state, "POST", &format!("/like/{}/", q.quote_id), &headers, "").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["likes"], 1);
    assert_eq!(body["voted"], true);

    let res = send(&state, "POST", &format!("/dislike/{}/", q.quote_id), &headers, "").await;
    let body = json(res).await;
    assert_eq!(body["likes"], 1);
    assert_eq!(body["dislikes"], 0);

    assert_eq!(state.store.list_votes(q.quote_id).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn vote_without_htmx_redirects_home() {
    let state = make_state().await;
    let q = seed_quote(&state, "redirect me", "Ballot").await;

    let res = send(&state, "POST", &format!("/like/{}/", q.quote_id), &[], "").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/");
    assert!(set_cookie(&res).is_some());
  }

  #[tokio::test]
  async fn vote_on_missing_quote_is_404() {
    let state = make_state().await;
    let res = send(&state, "POST", "/like/12345/", &[], "").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(set_cookie(&res).is_none());
  }

  #[tokio::test]
  async fn voting_endpoints_reject_get() {
    let state = make_state().await;
    let q = seed_quote(&state, "no GETs", "Ballot").await;
    let res = send(&state, "GET", &format!("/like/{}/", q.quote_id), &[], "").await;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
  }

  // ── Submission ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn anonymous_submit_gets_a_login_prompt() {
    let state = make_state().await;
    let res = send(&state, "GET", "/add/", &[], "").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(
      &state,
      "POST",
      "/add/",
      &[("content-type", FORM)],
      "text=hi&weight=1&source_name=X&source_type=book",
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn login_is_checked_before_the_form_body() {
    let state = make_state().await;
    let q = seed_quote(&state, "no body", "Forum").await;

    let res = send(&state, "POST", "/add/", &[], "").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(&state, "POST", &format!("/comment/{}/", q.quote_id), &[], "").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/login/?next=/q/{}/", q.quote_id));

    let cookie = sign_up(&state, "alice").await;
    let res = send(&state, "POST", "/add/", &[("cookie", cookie.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
  }

  #[tokio::test]
  async fn signed_in_user_submits_until_the_source_is_full() {
    let state = make_state().await;
    let cookie = sign_up(&state, "alice").await;
    let headers = [("content-type", FORM), ("cookie", cookie.as_str())];

    for n in 1..=3 {
      let body = format!("text=Line+{n}&weight=2&source_name=Hamlet&source_type=book");
      let res = send(&state, "POST", "/add/", &headers, &body).await;
      assert_eq!(res.status(), StatusCode::SEE_OTHER, "submission {n}");
      assert_eq!(location(&res), "/");
    }

    let res = send(
      &state,
      "POST",
      "/add/",
      &headers,
      "text=Line+4&weight=2&source_name=Hamlet&source_type=book",
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(res).await;
    assert!(body[FIELD_SOURCE_NAME].is_array());
  }

  #[tokio::test]
  async fn only_the_creator_deletes_a_quote() {
    let state = make_state().await;
    let alice = sign_up(&state, "alice").await;
    let bob = sign_up(&state, "bob").await;

    let res = send(
      &state,
      "POST",
      "/add/",
      &[("content-type", FORM), ("cookie", alice.as_str())],
      "text=Mine&weight=1&source_name=Diary&source_type=other",
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let page = json(send(&state, "GET", "/popular/", &[], "").await).await;
    let quote_id = page["items"][0]["quote_id"].as_i64().unwrap();
    let uri = format!("/q/{quote_id}/delete/");

    let res = send(&state, "POST", &uri, &[("cookie", bob.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send(&state, "POST", &uri, &[("cookie", alice.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(state.store.get_quote(quote_id).await.unwrap().is_none());
  }

  // ── Comments ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn anonymous_comment_redirects_to_login() {
    let state = make_state().await;
    let q = seed_quote(&state, "discuss", "Forum").await;
    let res = send(
      &state,
      "POST",
      &format!("/comment/{}/", q.quote_id),
      &[("content-type", FORM)],
      "text=hello",
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/login/?next=/q/{}/", q.quote_id));
  }

  #[tokio::test]
  async fn comment_thread_vote_and_delete() {
    let state = make_state().await;
    let q = seed_quote(&state, "discuss", "Forum").await;
    let alice = sign_up(&state, "alice").await;
    let bob = sign_up(&state, "bob").await;
    let alice_htmx = [("content-type", FORM), ("cookie", alice.as_str()), ("hx-request", "true")];

    let res = send(&state, "POST", &format!("/comment/{}/", q.quote_id), &alice_htmx, "text=First").await;
    assert_eq!(res.status(), StatusCode::OK);
    let threads = json(res).await;
    let top_id = threads[0]["comment"]["comment_id"].as_i64().unwrap();

    let body = format!("text=Reply&parent_id={top_id}");
    let threads = json(
      send(&state, "POST", &format!("/comment/{}/", q.quote_id), &alice_htmx, &body).await,
    )
    .await;
    assert_eq!(threads.as_array().unwrap().len(), 1);
    assert_eq!(threads[0]["replies"][0]["text"], "Reply");

    let res = send(&state, "POST", &format!("/comment/{}/", q.quote_id), &alice_htmx, "text=+++").await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bob_htmx = [("cookie", bob.as_str()), ("hx-request", "true")];
    let like = format!("/comment-like/{top_id}/");
    let out = json(send(&state, "POST", &like, &bob_htmx, "").await).await;
    assert_eq!(out["state"], "liked");
    assert_eq!(out["comment"]["likes"], 1);

    let out = json(send(&state, "POST", &format!("/comment-dislike/{top_id}/"), &bob_htmx, "").await).await;
    assert_eq!(out["state"], "disliked");
    assert_eq!(out["comment"]["likes"], 0);
    assert_eq!(out["comment"]["dislikes"], 1);

    let delete = format!("/comment-delete/{top_id}/");
    let res = send(&state, "POST", &delete, &bob_htmx, "").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = send(&state, "POST", &delete, &[("cookie", alice.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), format!("/q/{}/", q.quote_id));
    assert!(state.store.comment_threads(q.quote_id).await.unwrap().is_empty());
  }

  // ── Accounts ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn login_checks_the_password_and_follows_next() {
    let state = make_state().await;
    sign_up(&state, "carol").await;

    let res = send(
      &state,
      "POST",
      "/login/",
      &[("content-type", FORM)],
      "username=carol&password=wrong-horse",
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json(res).await["__all__"].is_array());

    let res = send(
      &state,
      "POST",
      "/login/",
      &[("content-type", FORM)],
      "username=carol&password=correct-horse&next=%2Fdashboard%2F",
    )
    .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/dashboard/");
    assert!(set_cookie(&res).is_some());
  }

  #[tokio::test]
  async fn signup_rejects_mismatched_passwords_and_taken_names() {
    let state = make_state().await;
    sign_up(&state, "dave").await;

    let res = send(
      &state,
      "POST",
      "/signup/",
      &[("content-type", FORM)],
      "username=erin&password1=correct-horse&password2=other-horse",
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = send(
      &state,
      "POST",
      "/signup/",
      &[("content-type", FORM)],
      "username=dave&password1=correct-horse&password2=correct-horse",
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json(res).await["username"].is_array());
  }

  #[tokio::test]
  async fn logout_expires_the_session() {
    let state = make_state().await;
    let cookie = sign_up(&state, "frank").await;

    let res = send(&state, "POST", "/logout/", &[("cookie", cookie.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let cleared = res.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"), "{cleared}");

    let res = send(&state, "GET", "/add/", &[("cookie", cookie.as_str())], "").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }

  // ── Reports ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn popular_is_lenient_about_its_query() {
    let state = make_state().await;
    seed_quote(&state, "one", "Alpha").await;
    seed_quote(&state, "two", "Beta").await;

    let body = json(send(&state, "GET", "/popular/?type=radio", &[], "").await).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["number"], 1);

    let body = json(send(&state, "GET", "/popular/?page=abc&sort=bogus", &[], "").await).await;
    assert_eq!(body["number"], 1);
    assert_eq!(body["total"], 2);
    assert_eq!(body["sort"], "likes");

    let body = json(send(&state, "GET", "/popular/?source=alp&type=", &[], "").await).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["source"]["name"], "Alpha");
  }

  #[tokio::test]
  async fn dashboard_reports_totals() {
    let state = make_state().await;
    seed_quote(&state, "one", "Alpha").await;

    let res = send(&state, "GET", "/dashboard/", &[], "").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await;
    assert_eq!(body["totals"]["quotes"], 1);
    assert_eq!(body["totals"]["sources"], 1);
    assert_eq!(body["top_sources"][0]["name"], "Alpha");
  }
}
