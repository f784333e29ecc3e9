//! Integration tests for Doc-Ferry
//!
//! SQLite stores live in temporary directories; REST stores, the content
//! provider and the delivery endpoint are wiremock servers.

mod common;
mod crawl_tests;
mod store_tests;
mod transfer_tests;
