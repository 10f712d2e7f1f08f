pub mod memory;
pub mod sqlite;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
    core::{entry::EditQueueEntry, groups::is_queue_idle},
    types::UserId,
};

/// Storage key used before queues were kept per user.
pub const LEGACY_QUEUE_KEY: &str = "EditQueue";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable key/value store holding JSON documents.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> PersistResult<Option<Value>>;
    fn set(&mut self, key: &str, value: &Value) -> PersistResult<()>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}

pub fn user_queue_key(user_id: &str) -> String {
    format!("{LEGACY_QUEUE_KEY}:{user_id}")
}

/// Reads and writes one user's queue through a [`KvStore`].
///
/// Stored entries that fail to decode are kept as raw JSON and appended
/// unchanged on every save, so a load never erases them.
pub struct QueueRepository {
    store: Box<dyn KvStore>,
    user_id: UserId,
    undecodable: Vec<Value>,
}

impl QueueRepository {
    pub fn new(store: Box<dyn KvStore>, user_id: impl Into<UserId>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            undecodable: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Loads the user's queue, falling back to the legacy flat key when the
    /// user has no record yet. Missing records load as an empty queue.
    pub fn load(&mut self) -> PersistResult<Vec<EditQueueEntry>> {
        let (queue, undecodable) = self.read()?;
        self.undecodable = undecodable;
        Ok(queue)
    }

    /// Replaces the user's stored queue. Undecodable entries seen by the
    /// last load follow `queue`.
    pub fn save(&mut self, queue: &[EditQueueEntry]) -> PersistResult<()> {
        let mut items = Vec::with_capacity(queue.len() + self.undecodable.len());
        for entry in queue {
            items.push(serde_json::to_value(entry)?);
        }
        items.extend(self.undecodable.iter().cloned());
        self.store
            .set(&user_queue_key(&self.user_id), &Value::Array(items))?;
        self.store.flush()
    }

    /// True when no stored entry is still pending or active.
    pub fn is_stored_queue_idle(&self) -> PersistResult<bool> {
        Ok(is_queue_idle(&self.read()?.0))
    }

    fn read(&self) -> PersistResult<(Vec<EditQueueEntry>, Vec<Value>)> {
        let value = match self.store.get(&user_queue_key(&self.user_id))? {
            Some(value) => Some(value),
            None => self.store.get(LEGACY_QUEUE_KEY)?,
        };
        Ok(value.map(decode_queue).unwrap_or_default())
    }
}

/// Decodes entries one by one so a single unreadable entry does not lose
/// the rest of the queue. Returns the decoded entries and the raw values that
/// failed.
fn decode_queue(value: Value) -> (Vec<EditQueueEntry>, Vec<Value>) {
    let Value::Array(items) = value else {
        warn!("stored edit queue is not an array; ignoring it");
        return (Vec::new(), Vec::new());
    };
    let mut queue = Vec::with_capacity(items.len());
    let mut undecodable = Vec::new();
    for item in items {
        match serde_json::from_value::<EditQueueEntry>(item.clone()) {
            Ok(entry) => queue.push(entry),
            Err(err) => {
                warn!(error = %err, "keeping undecodable stored queue entry as is");
                undecodable.push(item);
            }
        }
    }
    (queue, undecodable)
}
