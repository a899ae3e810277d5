//! TTL result cache for tool invocations.
//!
//! Every tool call goes through a [`CachingTool`], which probes the shared
//! [`ToolCache`] before invoking the real tool and stores the value after a
//! successful invocation. Entries expire lazily: a stale entry is dropped the
//! first time it is read past its TTL.

pub mod key;
pub mod store;
pub mod wrapper;

pub use key::{CacheKey, canonicalize};
pub use store::{TtlPolicy, ToolCache};
pub use wrapper::CachingTool;
