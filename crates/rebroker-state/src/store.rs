//! StateStore: redb-backed persistence for instances and operations.
//!
//! Provides typed CRUD operations over instances and operations. All values
//! are JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Every check-then-write (duplicate detection on insert, read-modify-write on
//! state updates) happens inside a single write transaction, and redb
//! serializes write transactions, so concurrent callers never interleave on
//! the same key.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::traits::{InstanceStore, OperationStore};
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
        txn.open_table(META).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert a new instance, refusing to overwrite an existing one.
    pub fn insert_instance(&self, instance: &Instance) -> StateResult<()> {
        let key = instance.id.as_str();
        let value = serde_json::to_vec(instance).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let exists = table.get(key).map_err(map_err!(Read))?.is_some();
            if exists {
                return Err(StateError::AlreadyExists(format!("instance {key}")));
            }
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance_id = %key, "instance stored");
        Ok(())
    }

    /// Get an instance by id.
    pub fn get_instance(&self, id: &str) -> StateResult<Option<Instance>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let instance: Instance =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(instance))
            }
            None => Ok(None),
        }
    }

    /// List all instances.
    pub fn list_instances(&self) -> StateResult<Vec<Instance>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let instance: Instance =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(instance);
        }
        Ok(results)
    }

    /// Delete an instance by id. Returns true if it existed.
    pub fn delete_instance(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            existed = table.remove(id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance_id = %id, existed, "instance deleted");
        Ok(existed)
    }

    /// Set the state of an existing instance.
    pub fn set_instance_state(&self, id: &str, state: InstanceState) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Table))?;
            let mut instance: Instance = match table.get(id).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(format!("instance {id}"))),
            };
            instance.state = state;
            let value = serde_json::to_vec(&instance).map_err(map_err!(Serialize))?;
            table.insert(id, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(instance_id = %id, ?state, "instance state updated");
        Ok(())
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Insert a new operation and assign it the next insertion sequence number.
    ///
    /// Returns the stored operation (with `seq` filled in).
    pub fn insert_operation(&self, op: &InstanceOperation) -> StateResult<InstanceOperation> {
        let key = (op.instance_id.as_str(), op.operation_id.as_str());
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
            let exists = table.get(key).map_err(map_err!(Read))?.is_some();
            if exists {
                return Err(StateError::AlreadyExists(describe_operation(key.0, key.1)));
            }

            let mut meta = txn.open_table(META).map_err(map_err!(Table))?;
            let last = meta
                .get(OPERATION_SEQ_KEY)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            meta.insert(OPERATION_SEQ_KEY, last + 1)
                .map_err(map_err!(Write))?;

            let mut op = op.clone();
            op.seq = last + 1;
            let value = serde_json::to_vec(&op).map_err(map_err!(Serialize))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
            stored = op;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            instance_id = %stored.instance_id,
            operation_id = %stored.operation_id,
            seq = stored.seq,
            "operation stored"
        );
        Ok(stored)
    }

    /// Get a single operation by instance and operation id.
    pub fn get_operation(
        &self,
        instance_id: &str,
        operation_id: &str,
    ) -> StateResult<Option<InstanceOperation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
        match table
            .get((instance_id, operation_id))
            .map_err(map_err!(Read))?
        {
            Some(guard) => {
                let op: InstanceOperation =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(op))
            }
            None => Ok(None),
        }
    }

    /// List all operations of an instance, oldest first.
    pub fn list_operations_for_instance(
        &self,
        instance_id: &str,
    ) -> StateResult<Vec<InstanceOperation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range((instance_id, "")..)
            .map_err(map_err!(Read))?
        {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().0 != instance_id {
                break;
            }
            let op: InstanceOperation =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(op);
        }
        results.sort_by_key(|op| op.seq);
        Ok(results)
    }

    /// Apply `change` to a stored operation inside one write transaction.
    fn modify_operation(
        &self,
        instance_id: &str,
        operation_id: &str,
        change: impl FnOnce(&mut InstanceOperation),
    ) -> StateResult<()> {
        let key = (instance_id, operation_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
            let mut op: InstanceOperation = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => {
                    return Err(StateError::NotFound(describe_operation(
                        instance_id,
                        operation_id,
                    )));
                }
            };
            change(&mut op);
            let value = serde_json::to_vec(&op).map_err(map_err!(Serialize))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%instance_id, %operation_id, "operation updated");
        Ok(())
    }

    /// Delete an operation. Returns true if it existed.
    pub fn delete_operation(&self, instance_id: &str, operation_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(OPERATIONS).map_err(map_err!(Table))?;
            existed = table
                .remove((instance_id, operation_id))
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn describe_operation(instance_id: &str, operation_id: &str) -> String {
    format!("operation {operation_id} of instance {instance_id}")
}

impl InstanceStore for StateStore {
    fn insert(&self, instance: &Instance) -> StateResult<()> {
        self.insert_instance(instance)
    }

    fn get(&self, id: &str) -> StateResult<Instance> {
        self.get_instance(id)?
            .ok_or_else(|| StateError::NotFound(format!("instance {id}")))
    }

    fn remove(&self, id: &str) -> StateResult<()> {
        if self.delete_instance(id)? {
            Ok(())
        } else {
            Err(StateError::NotFound(format!("instance {id}")))
        }
    }

    fn find_one(&self, predicate: &dyn Fn(&Instance) -> bool) -> StateResult<Option<Instance>> {
        Ok(self.list_instances()?.into_iter().find(|i| predicate(i)))
    }

    fn find_all(&self, predicate: &dyn Fn(&Instance) -> bool) -> StateResult<Vec<Instance>> {
        Ok(self
            .list_instances()?
            .into_iter()
            .filter(|i| predicate(i))
            .collect())
    }

    fn update_state(&self, id: &str, state: InstanceState) -> StateResult<()> {
        self.set_instance_state(id, state)
    }
}

impl OperationStore for StateStore {
    fn insert(&self, op: &InstanceOperation) -> StateResult<()> {
        self.insert_operation(op).map(|_| ())
    }

    fn get(&self, instance_id: &str, operation_id: &str) -> StateResult<InstanceOperation> {
        self.get_operation(instance_id, operation_id)?.ok_or_else(|| {
            StateError::NotFound(describe_operation(instance_id, operation_id))
        })
    }

    fn get_all(&self, instance_id: &str) -> StateResult<Vec<InstanceOperation>> {
        let ops = self.list_operations_for_instance(instance_id)?;
        if ops.is_empty() {
            return Err(StateError::NotFound(format!(
                "operations for instance {instance_id}"
            )));
        }
        Ok(ops)
    }

    fn update_state(
        &self,
        instance_id: &str,
        operation_id: &str,
        state: OperationState,
    ) -> StateResult<()> {
        self.modify_operation(instance_id, operation_id, |op| op.state = state)
    }

    fn update_state_desc(
        &self,
        instance_id: &str,
        operation_id: &str,
        state: OperationState,
        description: Option<&str>,
    ) -> StateResult<()> {
        self.modify_operation(instance_id, operation_id, |op| {
            op.state = state;
            op.description = description.map(str::to_string);
        })
    }

    fn remove(&self, instance_id: &str, operation_id: &str) -> StateResult<()> {
        if self.delete_operation(instance_id, operation_id)? {
            Ok(())
        } else {
            Err(StateError::NotFound(describe_operation(
                instance_id,
                operation_id,
            )))
        }
    }
}
