// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools used by the research pipeline.
//!
//! - [`shortener`]: reversible URL to product id encoding.
//! - [`rerank`]: relevance ordering of products and text windows.
//! - [`search`]: Serper-compatible search client and its memoizing wrapper.
//! - [`crawler`]: HTTP page fetcher rendering HTML to text.

pub mod crawler;
pub mod rerank;
pub mod search;
pub mod shortener;

pub use crawler::HttpCrawler;
pub use rerank::{chunk_rerank, rerank, Rankable};
pub use search::{CachedSearch, SerperSearch};
pub use shortener::{restore, shorten};
