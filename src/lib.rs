//! Offline edit queue with single-writer delivery and SQLite-backed storage.
//!
//! Reports recorded on a frequently offline device are appended to a
//! persisted queue and delivered to the remote apply-edits operation one
//! entry at a time whenever the network allows.
//!
//! # Examples
//!
//! Pure queue transitions with [`core::state::EditQueueState`]:
//! ```
//! use editqueue::{
//!     core::{entry::NewEntry, schedule::{next_step, Step}, state::{EditQueueState, QueueStatus}},
//!     edit::{Attributes, Edit, Feature},
//!     op::QueueAction,
//!     types::FeatureLayer,
//! };
//!
//! let mut state = EditQueueState::with_queue(Vec::new());
//! let entry = NewEntry::new(
//!     "Forest damage",
//!     "damage",
//!     vec![Edit::adds(
//!         FeatureLayer::ForestDamage,
//!         vec![Feature { geometry: None, attributes: Attributes::new("2024-05-01T10:00:00Z") }],
//!     )],
//! )
//! .into_entry();
//! let id = entry.id;
//! state.apply(QueueAction::Enqueue { entry });
//! state.apply(QueueAction::StartSync);
//! assert_eq!(next_step(&state), Step::Start(id));
//! state.apply(QueueAction::SyncStart { id });
//! assert_eq!(state.status, QueueStatus::Active);
//! ```
//!
//! Runtime usage with a SQLite store and HTTP transport:
//! ```no_run
//! use std::sync::Arc;
//!
//! use editqueue::{
//!     config::{EngineConfig, TransportConfig},
//!     engine::{coordinator::Deliverer, http::HttpTransport, messages::ErrorMessageCatalog},
//!     persist::{sqlite::SqliteKvStore, QueueRepository},
//!     runtime::{connectivity::ConnectivityMonitor, handle::spawn_edit_queue},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = EngineConfig::for_user("user-1");
//! let store = SqliteKvStore::open("editqueue.db").expect("open sqlite");
//! let transport = HttpTransport::new(&TransportConfig {
//!     base_url: "https://example.invalid/api".to_string(),
//!     ..TransportConfig::default()
//! })
//! .expect("transport");
//! let deliverer = Deliverer::new(
//!     Arc::new(transport),
//!     ErrorMessageCatalog::default(),
//!     config.language.clone(),
//! );
//! let monitor = ConnectivityMonitor::new(false);
//! let handle = spawn_edit_queue(
//!     QueueRepository::new(Box::new(store), config.user_id.clone()),
//!     deliverer,
//!     Arc::new(|| println!("permits changed")),
//!     monitor.subscribe(),
//!     config,
//! );
//! monitor.set_connected(true);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Engine and transport configuration.
pub mod config;
/// Queue entries, transition table, scheduling and retention.
pub mod core;
/// Edit payload model.
pub mod edit;
/// Delivery coordinator, transport seam and HTTP implementation.
pub mod engine;
/// Queue actions and transition outcomes.
pub mod op;
/// Key/value persistence and the queue repository.
pub mod persist;
/// Single-writer runtime handle, connectivity and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
