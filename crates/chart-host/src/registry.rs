// File: crates/chart-host/src/registry.rs
// Summary: Two-level instance registry: logical id -> ordered slots plus an optional container widget.
// Notes:
// - The registry only indexes members. Disposal is always routed through the
//   member itself; mutating calls hand evicted members back so the caller can
//   dispose them after the registry borrow is released.

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::identity::{contains_token, matches_identity, parse_composite_id, IdInfo, IdentityTuple};

/// Anything the registry can index.
pub trait RegistryMember {
    fn id_info(&self) -> IdInfo;
    /// Release every resource the member holds. Must not panic on repeat calls.
    fn dispose(&self);
}

/// Container that owns a whole chart set (e.g. a carousel of chart variants).
pub trait Widget {
    /// Slot currently shown to the user.
    fn current_slot(&self) -> usize;
    fn dispose(&self) {}
}

pub struct ChartSet<T: ?Sized> {
    members: BTreeMap<usize, Rc<T>>,
    widget: Option<Rc<dyn Widget>>,
}

impl<T: ?Sized> Clone for ChartSet<T> {
    fn clone(&self) -> Self {
        Self { members: self.members.clone(), widget: self.widget.clone() }
    }
}

impl<T: ?Sized> ChartSet<T> {
    fn new() -> Self {
        Self { members: BTreeMap::new(), widget: None }
    }

    pub fn get(&self, slot: usize) -> Option<&Rc<T>> {
        self.members.get(&slot)
    }

    pub fn members(&self) -> impl Iterator<Item = (usize, &Rc<T>)> {
        self.members.iter().map(|(slot, m)| (*slot, m))
    }

    pub fn slots(&self) -> Vec<usize> {
        self.members.keys().copied().collect()
    }

    pub fn widget(&self) -> Option<&Rc<dyn Widget>> {
        self.widget.as_ref()
    }

    /// Member currently on screen: the widget's slot when a widget exists, else slot 0.
    /// Falls back to the lowest populated slot when that slot is empty.
    pub fn displayed(&self) -> Option<&Rc<T>> {
        let slot = self.widget.as_ref().map(|w| w.current_slot()).unwrap_or(0);
        self.members.get(&slot).or_else(|| self.members.values().next())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// A set with neither members nor a widget must not stay registered.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.widget.is_none()
    }
}

/// Members and widgets removed by a registry mutation, awaiting disposal.
pub struct Evicted<T: ?Sized> {
    pub members: Vec<Rc<T>>,
    pub widgets: Vec<Rc<dyn Widget>>,
}

impl<T: ?Sized> Default for Evicted<T> {
    fn default() -> Self {
        Self { members: Vec::new(), widgets: Vec::new() }
    }
}

impl<T: ?Sized> Evicted<T> {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.widgets.is_empty()
    }
}

pub struct Registry<T: ?Sized> {
    sets: IndexMap<String, ChartSet<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self { sets: IndexMap::new() }
    }
}

impl<T: ?Sized + RegistryMember> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Members across all sets.
    pub fn member_count(&self) -> usize {
        self.sets.values().map(ChartSet::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    /// Exact logical-id access, no token matching.
    pub fn get(&self, logical_id: &str) -> Option<&ChartSet<T>> {
        self.sets.get(logical_id)
    }

    /// Put `member` at its slot. Re-registering an occupied slot evicts the
    /// whole previous member set (rebind on reload); the widget is kept.
    pub fn store(&mut self, member: Rc<T>, composite_id: &str) -> Evicted<T> {
        let id = parse_composite_id(composite_id);
        let slot = id.slot_or_default();
        let set = self.sets.entry(id.logical_id).or_insert_with(ChartSet::new);
        let mut evicted = Evicted::default();
        if set.members.contains_key(&slot) {
            evicted.members = std::mem::take(&mut set.members)
                .into_values()
                .filter(|old| !Rc::ptr_eq(old, &member))
                .collect();
        }
        set.members.insert(slot, member);
        evicted
    }

    /// Drop whatever is registered under the logical id and start over with only `widget`.
    pub fn store_widget(&mut self, widget: Rc<dyn Widget>, composite_id: &str) -> Evicted<T> {
        let id = parse_composite_id(composite_id);
        let mut fresh = ChartSet::new();
        fresh.widget = Some(widget.clone());
        let mut evicted = Evicted::default();
        if let Some(old) = self.sets.insert(id.logical_id, fresh) {
            evicted.members = old.members.into_values().collect();
            evicted.widgets = old.widget.into_iter().filter(|w| !Rc::ptr_eq(w, &widget)).collect();
        }
        evicted
    }

    /// Two-phase search: keys holding `logical_id` as a token, filtered by
    /// `identity` against each set's displayed member; when the filter rejects
    /// everything, the unfiltered match is returned instead.
    pub fn lookup(&self, logical_id: &str, identity: Option<&IdentityTuple>) -> Option<ChartSet<T>> {
        let logical = parse_composite_id(logical_id).logical_id;
        let mut candidates: Vec<(&String, &ChartSet<T>)> =
            self.sets.iter().filter(|(key, _)| contains_token(key, &logical)).collect();
        // exact key first, otherwise registration order
        candidates.sort_by_key(|(key, _)| **key != logical);

        if let Some(query) = identity.filter(|q| !q.is_wildcard()) {
            let filtered = candidates.iter().find(|(_, set)| {
                set.displayed()
                    .map(|m| matches_identity(&m.id_info(), query))
                    .unwrap_or(false)
            });
            if let Some((_, set)) = filtered {
                return Some((*set).clone());
            }
        }
        candidates.first().map(|(_, set)| (*set).clone())
    }

    /// Remove `member` from its slot if it is still the registered occupant.
    /// Returns the widget when the set became empty and was dropped.
    pub fn remove_member(&mut self, member: &Rc<T>) -> Option<Rc<dyn Widget>> {
        let info = member.id_info();
        let set = self.sets.get_mut(&info.logical_id)?;
        let is_occupant = set.members.get(&info.slot).is_some_and(|current| Rc::ptr_eq(current, member));
        if !is_occupant {
            return None;
        }
        set.members.remove(&info.slot);
        if set.members.is_empty() {
            return self.sets.shift_remove(&info.logical_id).and_then(|s| s.widget);
        }
        None
    }

    /// Remove every member whose identity satisfies `predicate`; sets left
    /// without members are dropped together with their widget.
    pub fn evict_where<P>(&mut self, mut predicate: P) -> Evicted<T>
    where
        P: FnMut(&IdInfo) -> bool,
    {
        let mut evicted = Evicted::default();
        self.sets.retain(|_, set| {
            let slots: Vec<usize> = set
                .members
                .iter()
                .filter(|(_, m)| predicate(&m.id_info()))
                .map(|(slot, _)| *slot)
                .collect();
            if slots.is_empty() {
                return true;
            }
            for slot in slots {
                if let Some(m) = set.members.remove(&slot) {
                    evicted.members.push(m);
                }
            }
            if set.members.is_empty() {
                evicted.widgets.extend(set.widget.take());
                return false;
            }
            true
        });
        evicted
    }

    /// Empty the registry completely.
    pub fn drain(&mut self) -> Evicted<T> {
        let mut evicted = Evicted::default();
        for (_, set) in self.sets.drain(..) {
            evicted.members.extend(set.members.into_values());
            evicted.widgets.extend(set.widget);
        }
        evicted
    }
}

/// Dispose everything in `evicted`. Members guard their own failures.
pub fn dispose_evicted<T: ?Sized + RegistryMember>(evicted: Evicted<T>) {
    for member in evicted.members {
        member.dispose();
    }
    for widget in evicted.widgets {
        widget.dispose();
    }
}
