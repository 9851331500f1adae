//! Human-readable renderings of the store.
pub mod trace;

pub use trace::format_trace;
