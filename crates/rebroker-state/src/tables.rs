//! redb table definitions for the broker state store.
//!
//! Data tables store JSON-serialized domain types in `&[u8]` values.

use redb::TableDefinition;

/// Instances keyed by `{instance_id}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Operations keyed by `(instance_id, operation_id)`. Tuple keys order by
/// instance first, so one instance's operations form a contiguous range.
pub const OPERATIONS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("operations");

/// Store-wide counters.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Key in [`META`] holding the last assigned operation sequence number.
pub const OPERATION_SEQ_KEY: &str = "operation_seq";
