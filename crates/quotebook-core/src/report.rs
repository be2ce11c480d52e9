//! Read-only rollups: the popular list and the dashboard.

use serde::{Deserialize, Serialize};

use crate::source::SourceKind;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const TOP_SOURCES_LIMIT: i64 = 10;

// ─── Popular list ────────────────────────────────────────────────────────────

/// Ordering of the popular list. Ties are always broken by id, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
  /// Likes desc, then views desc.
  #[default]
  Likes,
  /// Views desc, then likes desc.
  Views,
  /// Newest first.
  Created,
}

impl SortKey {
  /// Unknown or missing values fall back to [`SortKey::Likes`].
  pub fn parse_lenient(s: Option<&str>) -> Self {
    match s.map(str::trim) {
      Some("views") => Self::Views,
      Some("created") => Self::Created,
      _ => Self::Likes,
    }
  }
}

/// Parameters for [`crate::store::QuoteStore::popular`].
#[derive(Debug, Clone)]
pub struct PopularQuery {
  /// Case-insensitive substring of the source name.
  pub source:   Option<String>,
  /// Exact source category.
  pub kind:     Option<SourceKind>,
  pub sort:     SortKey,
  /// Requested 1-based page; `None` means the first page.
  pub page:     Option<i64>,
  pub per_page: i64,
}

impl Default for PopularQuery {
  fn default() -> Self {
    Self {
      source:   None,
      kind:     None,
      sort:     SortKey::default(),
      page:     None,
      per_page: DEFAULT_PAGE_SIZE,
    }
  }
}

/// Which slice of a result set a page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
  pub number:    i64,
  pub num_pages: i64,
  pub offset:    i64,
  pub limit:     i64,
}

impl PageWindow {
  /// Resolve a requested page against `total` rows. A missing page is the
  /// first page; a page outside `1..=num_pages` is clamped to the last page.
  /// An empty result set still has one (empty) page.
  pub fn resolve(requested: Option<i64>, total: i64, per_page: i64) -> Self {
    let per_page = per_page.max(1);
    let num_pages = ((total.max(0) + per_page - 1) / per_page).max(1);
    let number = match requested {
      None => 1,
      Some(n) if (1..=num_pages).contains(&n) => n,
      Some(_) => num_pages,
    };
    Self { number, num_pages, offset: (number - 1) * per_page, limit: per_page }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:        Vec<T>,
  pub number:       i64,
  pub num_pages:    i64,
  pub total:        i64,
  pub per_page:     i64,
  pub has_next:     bool,
  pub has_previous: bool,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
    Self {
      items,
      number: window.number,
      num_pages: window.num_pages,
      total,
      per_page: window.limit,
      has_next: window.number < window.num_pages,
      has_previous: window.number > 1,
    }
  }

  /// The single empty page of an empty result set.
  pub fn empty(per_page: i64) -> Self {
    Self::new(Vec::new(), PageWindow::resolve(None, 0, per_page), 0)
  }
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
  pub quotes:   i64,
  pub views:    i64,
  pub likes:    i64,
  pub dislikes: i64,
  pub sources:  i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLikes {
  pub name:        String,
  pub total_likes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
  pub totals:      Totals,
  /// At most [`TOP_SOURCES_LIMIT`] entries, most liked first.
  pub top_sources: Vec<SourceLikes>,
}
