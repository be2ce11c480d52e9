//! Core types and trait definitions for Quotebook, a community quote-sharing
//! site.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! invariant-carrying logic that does not need a database (weighted
//! selection, the comment-vote state machine, form-level validation and
//! pagination math) lives here as plain functions so every backend shares it.

pub mod comment;
pub mod error;
pub mod quote;
pub mod report;
pub mod selection;
pub mod source;
pub mod store;
pub mod user;
pub mod validation;
pub mod vote;

pub use error::{Error, Result};
pub use validation::ValidationErrors;
