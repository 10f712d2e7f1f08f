//! Single-writer async runtime and event stream APIs.

/// Network reachability publisher.
pub mod connectivity;
/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;
