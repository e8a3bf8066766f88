//! Compile-time security checks for provable contracts

pub mod hints_whitelist;
mod normalize;

pub use hints_whitelist::{HintWhitelist, HintWhitelistEntry};
pub use normalize::{normalize_hint, NormalizedHint};
