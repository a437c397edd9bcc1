//! Published snapshots of server-authoritative state.
//!
//! The network thread builds a new value and swaps it in whole; readers clone
//! the current `Arc` and keep a consistent view for as long as they hold it.
//! The lock guards only the pointer swap, never a field-level mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::records::{Item, PlayerProfile, Spawn, SpawnPosition};

/// Shared cell holding the latest version of a value.
#[derive(Debug)]
pub struct Published<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Published<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(value))),
        }
    }

    /// Current version.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the value wholesale.
    pub fn replace(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }

    /// Build the next version from the current one and publish it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.get());
        self.replace(next);
    }
}

/// Spawns known in the current zone, keyed by spawn id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnTable {
    spawns: HashMap<u32, Spawn>,
}

impl SpawnTable {
    pub fn from_spawns(spawns: impl IntoIterator<Item = Spawn>) -> Self {
        Self {
            spawns: spawns.into_iter().map(|s| (s.spawn_id, s)).collect(),
        }
    }

    pub fn get(&self, spawn_id: u32) -> Option<&Spawn> {
        self.spawns.get(&spawn_id)
    }

    pub fn len(&self) -> usize {
        self.spawns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spawn> {
        self.spawns.values()
    }

    pub fn with_spawn(&self, spawn: Spawn) -> Self {
        let mut next = self.clone();
        next.spawns.insert(spawn.spawn_id, spawn);
        next
    }

    pub fn without(&self, spawn_id: u32) -> Self {
        let mut next = self.clone();
        next.spawns.remove(&spawn_id);
        next
    }

    /// Apply a batch of position updates; unknown spawns are skipped.
    pub fn with_positions(&self, positions: &[SpawnPosition]) -> Self {
        let mut next = self.clone();
        for p in positions {
            if let Some(s) = next.spawns.get_mut(&p.spawn_id) {
                s.x = p.x;
                s.y = p.y;
                s.z = p.z;
                s.heading = p.heading;
            }
        }
        next
    }

    pub fn with_hp_percent(&self, spawn_id: u32, hp_percent: u8) -> Self {
        let mut next = self.clone();
        if let Some(s) = next.spawns.get_mut(&spawn_id) {
            s.hp_percent = hp_percent;
        }
        next
    }
}

/// Inventory keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    items: BTreeMap<i16, Item>,
}

impl Inventory {
    pub fn get(&self, slot: i16) -> Option<&Item> {
        self.items.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn with_item(&self, item: Item) -> Self {
        let mut next = self.clone();
        next.items.insert(item.slot, item);
        next
    }

    pub fn without(&self, slot: i16) -> Self {
        let mut next = self.clone();
        next.items.remove(&slot);
        next
    }

    /// Move (or swap) the contents of two slots.
    pub fn with_move(&self, from: i16, to: i16) -> Self {
        let mut next = self.clone();
        let moving = next.items.remove(&from);
        let displaced = next.items.remove(&to);
        if let Some(mut item) = moving {
            item.slot = to;
            next.items.insert(to, item);
        }
        if let Some(mut item) = displaced {
            item.slot = from;
            next.items.insert(from, item);
        }
        next
    }
}

/// Consumer-side handles onto everything the zone machine publishes.
#[derive(Debug, Clone)]
pub struct ZoneView {
    pub profile: Published<Option<PlayerProfile>>,
    pub spawns: Published<SpawnTable>,
    pub inventory: Published<Inventory>,
    pub own_spawn_id: Published<Option<u32>>,
}

impl Default for ZoneView {
    fn default() -> Self {
        Self {
            profile: Published::new(None),
            spawns: Published::default(),
            inventory: Published::default(),
            own_spawn_id: Published::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(id: u32, name: &str) -> Spawn {
        Spawn {
            spawn_id: id,
            name: name.into(),
            level: 1,
            race: 1,
            class: 1,
            gender: 0,
            is_npc: true,
            hp_percent: 100,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            heading: 0.0,
        }
    }

    #[test]
    fn readers_keep_their_version() {
        let published = Published::new(SpawnTable::default());
        let before = published.get();
        published.update(|t| t.with_spawn(spawn(1, "a rat")));
        assert!(before.is_empty());
        assert_eq!(published.get().len(), 1);
    }

    #[test]
    fn positions_update_known_spawns_only() {
        let table = SpawnTable::from_spawns([spawn(1, "a rat")]);
        let moved = table.with_positions(&[
            SpawnPosition {
                spawn_id: 1,
                x: 5.0,
                ..SpawnPosition::default()
            },
            SpawnPosition {
                spawn_id: 99,
                ..SpawnPosition::default()
            },
        ]);
        assert_eq!(moved.get(1).map(|s| s.x), Some(5.0));
        assert_eq!(moved.len(), 1);
        assert_eq!(table.get(1).map(|s| s.x), Some(0.0));
    }

    #[test]
    fn inventory_swap() {
        let inv = Inventory::default()
            .with_item(Item {
                slot: 1,
                item_id: 10,
                charges: 0,
                name: "Rusty Dagger".into(),
            })
            .with_item(Item {
                slot: 2,
                item_id: 20,
                charges: 5,
                name: "Bread".into(),
            });
        let swapped = inv.with_move(1, 2);
        assert_eq!(swapped.get(2).map(|i| i.item_id), Some(10));
        assert_eq!(swapped.get(1).map(|i| i.item_id), Some(20));
        assert_eq!(swapped.get(1).map(|i| i.slot), Some(1));
    }
}
