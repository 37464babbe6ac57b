//! Per-call allocation flags and per-region OOM policy

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifiers for a single allocation request
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AllocFlags: u32 {
        /// Skip zero-filling the returned memory
        const NO_INIT = 1 << 0;
        /// Return the error to the caller on exhaustion instead of applying the policy
        const OOM_NULL = 1 << 1;
    }
}

/// What a region does when an allocation without [`AllocFlags::OOM_NULL`] cannot be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OomPolicy {
    /// Log and abort the process
    Abort,
    /// Return `Err` to the innermost [`Arena::recover`](crate::Arena::recover) scope.
    /// Exhaustion outside of any recovery scope is a usage error and panics.
    #[default]
    Recover,
}

impl OomPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Recover => "recover",
        }
    }
}

impl std::str::FromStr for OomPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" | "trap" => Ok(Self::Abort),
            "recover" | "jump" => Ok(Self::Recover),
            other => Err(format!("unknown OOM policy '{}'", other)),
        }
    }
}
