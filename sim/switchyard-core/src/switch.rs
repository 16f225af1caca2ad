//! Per-channel address registries modelling a physical switch.

use crate::{
    address::{Address, Channel},
    FxDashMap,
};
use dashmap::mapref::entry::Entry;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Weak},
};
use thiserror::Error as ThisError;

/// Maps the addresses of one channel to the endpoints bound at them.
///
/// The table holds weak references: an endpoint that has been dropped is no
/// longer reachable and its addresses may be bound again.
pub struct SwitchTable<T> {
    channel: Channel,
    entries: FxDashMap<Address, Weak<T>>,
}

impl<T> SwitchTable<T> {
    /// Creates an empty table for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            entries: Default::default(),
        }
    }

    /// The channel this table serves.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Binds `address` to `endpoint`.
    ///
    /// Binding an address the same endpoint already holds succeeds, so an
    /// endpoint may hold any number of alias addresses. The check and the
    /// insert happen under one entry lock, so two endpoints racing for the
    /// same address cannot both succeed.
    pub fn register(&self, address: Address, endpoint: &Arc<T>) -> Result<(), RegisterError> {
        match self.entries.entry(address) {
            Entry::Occupied(mut entry) => {
                let current = entry.get();
                if current.ptr_eq(&Arc::downgrade(endpoint)) {
                    Ok(())
                } else if current.strong_count() == 0 {
                    entry.insert(Arc::downgrade(endpoint));
                    Ok(())
                } else {
                    Err(RegisterError::AddressInUse {
                        channel: self.channel,
                        address: entry.key().clone(),
                    })
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::downgrade(endpoint));
                Ok(())
            }
        }
    }

    /// Finds the live endpoint bound at `address`.
    pub fn lookup(&self, address: &Address) -> Option<Arc<T>> {
        self.entries.get(address)?.upgrade()
    }

    /// Removes the binding of `address` if it belongs to `endpoint`. Returns
    /// whether a binding was removed.
    pub fn unregister(&self, address: &Address, endpoint: &Arc<T>) -> bool {
        let endpoint = Arc::downgrade(endpoint);
        self.entries
            .remove_if(address, |_, bound| bound.ptr_eq(&endpoint))
            .is_some()
    }

    /// The number of bindings, including ones whose endpoint is gone.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no bindings.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One [`SwitchTable`] per [`Channel`].
pub struct Switch<T> {
    tables: [SwitchTable<T>; Channel::COUNT],
}

impl<T> Switch<T> {
    /// Creates a switch with an empty table for every channel.
    pub fn new() -> Self {
        Self {
            tables: Channel::ALL.map(SwitchTable::new),
        }
    }

    /// The table for `channel`.
    pub fn table(&self, channel: Channel) -> &SwitchTable<T> {
        &self.tables[channel.index()]
    }
}

impl<T> Default for Switch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for Switch<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for table in self.tables.iter() {
            map.entry(&table.channel, &table.len());
        }
        map.finish()
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Address {address} is already in use on channel {channel}")]
    AddressInUse { channel: Channel, address: Address },
}
