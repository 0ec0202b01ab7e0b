//! Generation-tagged slot arena behind opaque session handles.
//!
//! A handle names a slot and the generation the slot had when the session
//! was stored. Removing a session bumps the generation, so a stale handle
//! fails the equality check even after the slot is reused.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// Opaque reference to an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

impl SessionHandle {
    /// Packs the handle into one integer for transport across a boundary.
    pub fn as_raw(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<AsyncMutex<T>>>,
}

struct Slots<T> {
    entries: Vec<Slot<T>>,
    free: Vec<u32>,
}

/// Owns every open session, keyed by [`SessionHandle`].
///
/// The slot table sits behind a short synchronous lock that is never held
/// across an await. Each session has its own async lock, so operations on
/// one session run one at a time while other sessions proceed.
pub struct SessionRegistry<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> SessionRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                free: Vec::new(),
            }),
        }
    }

    /// Stores `value` and returns its fresh handle.
    pub fn insert(&self, value: T) -> SessionHandle {
        let value = Some(Arc::new(AsyncMutex::new(value)));
        let mut slots = self.slots.lock();

        if let Some(index) = slots.free.pop() {
            let slot = &mut slots.entries[index as usize];
            slot.value = value;
            return SessionHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = slots.entries.len() as u32;
        slots.entries.push(Slot {
            generation: 0,
            value,
        });
        SessionHandle {
            index,
            generation: 0,
        }
    }

    /// Looks up a live session. Unknown and stale handles yield `None`.
    pub fn get(&self, handle: SessionHandle) -> Option<Arc<AsyncMutex<T>>> {
        let slots = self.slots.lock();
        let slot = slots.entries.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.clone()
    }

    /// Takes a session out of the registry and retires its handle.
    /// Unknown and stale handles yield `None` and change nothing.
    pub fn remove(&self, handle: SessionHandle) -> Option<Arc<AsyncMutex<T>>> {
        let mut slots = self.slots.lock();
        let slot = slots.entries.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slots.free.push(handle.index);
        Some(value)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock();
        slots.entries.len() - slots.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_handle_round_trip() {
        let handle = SessionHandle {
            index: 3,
            generation: 9,
        };
        assert_eq!(handle.as_raw(), (9 << 32) | 3);
        assert_eq!(SessionHandle::from_raw(handle.as_raw()), handle);
        assert_eq!(handle.to_string(), "3#9");
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry = SessionRegistry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(*registry.get(a).unwrap().lock().await, "a");
        assert_eq!(*registry.get(b).unwrap().lock().await, "b");
    }

    #[test]
    fn test_stale_handle_is_rejected_after_slot_reuse() {
        let registry = SessionRegistry::new();
        let first = registry.insert(1);
        assert!(registry.remove(first).is_some());

        let second = registry.insert(2);
        assert_eq!(second.index, first.index);
        assert_ne!(second, first);

        assert!(registry.get(first).is_none());
        assert!(registry.remove(first).is_none());
        assert!(registry.get(second).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let handle = registry.insert(());

        assert!(registry.remove(handle).is_some());
        assert!(registry.remove(handle).is_none());
        assert!(registry.remove(SessionHandle::from_raw(u64::MAX)).is_none());
        assert!(registry.is_empty());
    }
}
