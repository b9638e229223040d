// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process cache for outbound I/O.
//!
//! [`TtlCache`] is a bounded key-value map whose entries expire. [`Memoizer`]
//! wraps async functions on top of it, keyed either by an exact hash of the
//! call or, for string-keyed lookups, by similarity to a previous call.

pub mod memo;
pub mod ttl;

pub use memo::Memoizer;
pub use ttl::TtlCache;
