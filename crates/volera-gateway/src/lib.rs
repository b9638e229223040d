// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for Volera clients.
//!
//! Each socket on `/ws` is one conversation. Inbound frames are normalized
//! into user messages and run through the research graph; events the nodes
//! emit are routed back to the socket through the [`ChannelRegistry`].

pub mod channels;
pub mod conversation;
pub mod handlers;
pub mod server;
pub mod ws;

pub use channels::ChannelRegistry;
pub use conversation::ConversationService;
pub use server::{router, start_server, GatewayState};
