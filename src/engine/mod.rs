//! Delivery of queue entries to the remote service.

/// Apply-edits state machine and the deliverer that drives one submission.
pub mod coordinator;
/// Multipart HTTP transport.
pub mod http;
/// Error-message catalog and template rendering.
pub mod messages;
/// Photo reference resolution.
pub mod photo;
/// Transport and permit-invalidation seams.
pub mod traits;
