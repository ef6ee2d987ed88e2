use smallvec::SmallVec;

/// Identifies one entry of a [`Registry`]. A key stays invalid after its
/// entry is removed, even when the slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
  index: u32,
  generation: u32,
}

struct Slot<V> {
  generation: u32,
  value: Option<V>,
}

/// Slot arena with generational keys, holding the subscribers of a hot
/// publisher.
pub(crate) struct Registry<V> {
  slots: Vec<Slot<V>>,
  free: Vec<u32>,
  len: usize,
}

impl<V> Default for Registry<V> {
  fn default() -> Self { Self { slots: Vec::new(), free: Vec::new(), len: 0 } }
}

impl<V> Registry<V> {
  pub(crate) fn insert(&mut self, value: V) -> Key {
    self.len += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.value = Some(value);
      return Key { index, generation: slot.generation };
    }
    let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
    self.slots.push(Slot { generation: 0, value: Some(value) });
    Key { index, generation: 0 }
  }

  pub(crate) fn remove(&mut self, key: Key) -> Option<V> {
    let slot = self.slots.get_mut(key.index as usize)?;
    if slot.generation != key.generation {
      return None;
    }
    let value = slot.value.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(key.index);
    self.len -= 1;
    Some(value)
  }

  #[cfg(test)]
  pub(crate) fn contains(&self, key: Key) -> bool {
    self
      .slots
      .get(key.index as usize)
      .is_some_and(|slot| slot.generation == key.generation && slot.value.is_some())
  }

  pub(crate) fn len(&self) -> usize { self.len }

  /// Copies the current entries, in slot order.
  pub(crate) fn snapshot(&self) -> SmallVec<[V; 4]>
  where
    V: Clone,
  {
    self.slots.iter().filter_map(|slot| slot.value.clone()).collect()
  }

  /// Removes every entry.
  pub(crate) fn take_all(&mut self) -> SmallVec<[V; 4]> {
    let mut taken = SmallVec::new();
    for (index, slot) in self.slots.iter_mut().enumerate() {
      if let Some(value) = slot.value.take() {
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index as u32);
        taken.push(value);
      }
    }
    self.len = 0;
    taken
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[rxflux_macro::test]
  fn stale_keys_miss_reused_slots() {
    let mut registry = Registry::default();
    let a = registry.insert("a");
    assert_eq!(registry.remove(a), Some("a"));
    let b = registry.insert("b");
    assert!(!registry.contains(a));
    assert_eq!(registry.remove(a), None);
    assert!(registry.contains(b));
    assert_eq!(registry.len(), 1);
  }

  #[rxflux_macro::test]
  fn snapshot_is_detached_from_later_changes() {
    let mut registry = Registry::default();
    let a = registry.insert(1);
    registry.insert(2);
    let snapshot = registry.snapshot();
    registry.remove(a);
    registry.insert(3);
    assert_eq!(snapshot.as_slice(), &[1, 2]);
    assert_eq!(registry.snapshot().as_slice(), &[3, 2]);
  }

  #[rxflux_macro::test]
  fn take_all_empties_the_registry() {
    let mut registry = Registry::default();
    let a = registry.insert('x');
    registry.insert('y');
    assert_eq!(registry.take_all().as_slice(), &['x', 'y']);
    assert_eq!(registry.len(), 0);
    assert!(!registry.contains(a));
  }
}
