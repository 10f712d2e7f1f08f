//! Pure queue model: entries, transition table, scheduling and retention.

/// Queue entries and their delivery state.
pub mod entry;
/// Grouping helpers over a queue.
pub mod groups;
/// Load-time pruning and state coercion.
pub mod retention;
/// Next-step selection for the runtime loop.
pub mod schedule;
/// Aggregate queue state and transition table.
pub mod state;
