// SPDX-FileCopyrightText: 2026 Volera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing decisions returned by nodes.

use std::fmt;

/// Reserved name of the terminal sink.
pub const END: &str = "__end__";
/// Reserved name of the human suspension sink.
pub const HUMAN: &str = "__human__";
/// Name under which caller input is applied to the state.
pub const INPUT: &str = "__input__";

/// Where the executor goes after a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Goto {
    Node(String),
    /// Suspend until the next user message.
    Human,
    End,
}

impl Goto {
    pub fn node(name: impl Into<String>) -> Self {
        Goto::Node(name.into())
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, Goto::Human | Goto::End)
    }
}

impl fmt::Display for Goto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goto::Node(name) => f.write_str(name),
            Goto::Human => f.write_str(HUMAN),
            Goto::End => f.write_str(END),
        }
    }
}

/// A node's result: the next hop and a partial state update.
#[derive(Debug, Clone, PartialEq)]
pub struct Command<U> {
    pub goto: Goto,
    pub update: U,
}

impl<U> Command<U> {
    pub fn goto(node: impl Into<String>, update: U) -> Self {
        Self {
            goto: Goto::node(node),
            update,
        }
    }

    pub fn human(update: U) -> Self {
        Self {
            goto: Goto::Human,
            update,
        }
    }

    pub fn end(update: U) -> Self {
        Self {
            goto: Goto::End,
            update,
        }
    }
}

/// Which sink a run stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Human,
    End,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Human => f.write_str("human"),
            Sink::End => f.write_str("end"),
        }
    }
}
