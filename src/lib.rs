//! News Desk - a small news reader
//!
//! A login gate in front of a news view that pulls articles from a backend
//! API by category and search query, rendered as HTML for a local browser,
//! with optional text-to-speech for each article.

pub mod article;
pub mod config;
pub mod fetcher;
pub mod login;
pub mod routes;
pub mod speech;
pub mod view;
