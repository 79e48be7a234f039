//! Change tracking for NHK regional news feeds.
//!
//! NHK edits published articles in place; when a correction notice
//! (「おことわり」) appears or quietly disappears, the feed is the only
//! record. This crate fetches the regional feeds, classifies what changed
//! against the stored snapshot of each article, and keeps an append-only
//! change history.

pub mod classify;
pub mod config;
pub mod correction;
pub mod db;
pub mod diff;
pub mod error;
pub mod feed;
pub mod models;
pub mod notify;
pub mod report;

pub use error::{AppError, Result};
