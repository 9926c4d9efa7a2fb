//! Per-instance leases.
//!
//! Provision and deprovision both read the operation history and then insert
//! a new pending operation. Holding the instance's lease across that sequence
//! keeps two concurrent requests for the same instance id from both passing
//! the checks. Requests for different instances never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{BrokerError, BrokerResult};

#[derive(Clone, Default)]
pub struct InstanceLocks {
    leases: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lease for `instance_id`.
    ///
    /// `f` must not block on anything slower than store I/O.
    pub fn with_lock<T>(
        &self,
        instance_id: &str,
        f: impl FnOnce() -> BrokerResult<T>,
    ) -> BrokerResult<T> {
        let lease = self.lease(instance_id)?;
        let result = {
            let _guard = lease.lock().map_err(poisoned)?;
            f()
        };
        drop(lease);
        self.release(instance_id);
        result
    }

    fn lease(&self, instance_id: &str) -> BrokerResult<Arc<Mutex<()>>> {
        let mut leases = self.leases.lock().map_err(poisoned)?;
        Ok(leases
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// Drop the entry once no other caller holds or waits for it.
    fn release(&self, instance_id: &str) {
        if let Ok(mut leases) = self.leases.lock() {
            if leases
                .get(instance_id)
                .is_some_and(|lease| Arc::strong_count(lease) == 1)
            {
                leases.remove(instance_id);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.leases.lock().map(|l| l.len()).unwrap_or_default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> BrokerError {
    BrokerError::Internal("instance lease poisoned".to_string())
}
