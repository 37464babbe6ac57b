//! Region-based memory allocation
//!
//! A [`Arena`] hands out memory by bumping a cursor through one contiguous
//! range and reclaims it all at once: by [`Arena::reset`], by restoring a
//! [`Snapshot`], or by closing a [`Scratch`] scope. On top of it sit
//! growable buffers ([`Slice`]) and immutable byte strings ([`Str`]) that
//! extend in place when they are the most recent allocation.
//!
//! ```
//! use region_arena::{Arena, Str};
//!
//! let arena = Arena::with_capacity(4096)?;
//! let greeting = Str::lit("hello").concat(&arena, Str::lit(", world"))?;
//! assert_eq!(greeting, "hello, world");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod adapter;
pub mod arena;
pub mod config;
pub mod error;
pub mod logging;
pub mod slice;
pub mod string;

pub use adapter::ArenaAllocator;
pub use arena::{
    page_size, AllocFlags, Arena, ArenaStats, OomPolicy, Scratch, Snapshot, DEFAULT_COMMIT_PAGE_COUNT,
    DEFAULT_SLICE_GROWTH, MAX_ALIGN, POISON_BYTE, RESERVE_FACTOR,
};
pub use config::{ArenaConfig, BackingKind};
pub use error::{AllocError, AllocResult, ConfigError, InitError};
pub use slice::Slice;
pub use string::{Split, SplitAny, Str};
