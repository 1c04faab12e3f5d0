//! Journal domain model.
//!
//! # Responsibility
//! - Define campaigns, characters and journal entries.
//! - Keep validation pure so it runs without a database.
//!
//! # Invariants
//! - Every entity is identified by a stable, never reused UUID.
//! - Deletion is a hard delete with cascade, not a tombstone.

use std::fmt::{Display, Formatter};

pub mod campaign;
pub mod character;
pub mod entry;
pub mod text;
pub mod timestamp;
pub mod validation;

/// Entity type tag used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Campaign,
    Character,
    Entry,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::Character => "character",
            Self::Entry => "entry",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
