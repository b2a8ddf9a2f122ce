//! Pair registry: the single authority on which connection occupies which
//! (pair, role) slot.

use std::collections::{BTreeMap, HashMap};

use missingdrop_common::{ConnectionId, PairId, PairStatus, Role, Slot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid pair {pair}: expected 1..={max}")]
    InvalidPair { pair: PairId, max: u8 },
}

/// Outcome of a successful [`PairRegistry::assign`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assignment {
    /// Previous occupant of the target slot. The caller must send it
    /// `kicked` and then close its transport.
    pub evicted: Option<ConnectionId>,
    /// Slot the caller held before moving, now empty.
    pub released: Option<Slot>,
}

#[derive(Debug, Default)]
struct PairSlots {
    producer: Option<ConnectionId>,
    display: Option<ConnectionId>,
}

impl PairSlots {
    fn get(&self, role: Role) -> Option<ConnectionId> {
        match role {
            Role::Producer => self.producer,
            Role::Display => self.display,
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Option<ConnectionId> {
        match role {
            Role::Producer => &mut self.producer,
            Role::Display => &mut self.display,
        }
    }

    fn status(&self) -> PairStatus {
        PairStatus {
            producer_present: self.producer.is_some(),
            display_present: self.display.is_some(),
        }
    }
}

/// Fixed table of pairs `1..=N`, each with a producer and a display slot.
///
/// Both directions of the mapping (slot → connection, connection → slot)
/// are updated together so a connection never holds two slots.
#[derive(Debug)]
pub struct PairRegistry {
    pairs: BTreeMap<PairId, PairSlots>,
    assignments: HashMap<ConnectionId, Slot>,
}

impl PairRegistry {
    pub fn new(pair_count: u8) -> Self {
        let pairs = (1..=pair_count)
            .map(|id| (PairId(id), PairSlots::default()))
            .collect();
        Self {
            pairs,
            assignments: HashMap::new(),
        }
    }

    pub fn pair_count(&self) -> u8 {
        self.pairs.len() as u8
    }

    pub fn contains(&self, pair: PairId) -> bool {
        self.pairs.contains_key(&pair)
    }

    /// Place `conn` into `(pair, role)`.
    pub fn assign(
        &mut self,
        conn: ConnectionId,
        pair: PairId,
        role: Role,
    ) -> Result<Assignment, RegistryError> {
        if !self.contains(pair) {
            return Err(RegistryError::InvalidPair {
                pair,
                max: self.pair_count(),
            });
        }

        let target = Slot { pair, role };
        let mut outcome = Assignment::default();

        match self.assignments.get(&conn).copied() {
            Some(current) if current == target => return Ok(outcome),
            Some(current) => {
                self.clear_slot(current, conn);
                outcome.released = Some(current);
            }
            None => {}
        }

        let slots = self.pairs.entry(pair).or_default();
        if let Some(previous) = slots.get_mut(role).replace(conn) {
            self.assignments.remove(&previous);
            outcome.evicted = Some(previous);
        }
        self.assignments.insert(conn, target);

        Ok(outcome)
    }

    /// Drop whatever slot `conn` holds. Returns the released slot.
    pub fn release(&mut self, conn: ConnectionId) -> Option<Slot> {
        let slot = self.assignments.remove(&conn)?;
        self.clear_slot(slot, conn);
        Some(slot)
    }

    pub fn occupant(&self, pair: PairId, role: Role) -> Option<ConnectionId> {
        self.pairs.get(&pair)?.get(role)
    }

    pub fn slot_of(&self, conn: ConnectionId) -> Option<Slot> {
        self.assignments.get(&conn).copied()
    }

    pub fn status_of(&self, pair: PairId) -> Option<PairStatus> {
        self.pairs.get(&pair).map(PairSlots::status)
    }

    /// Current occupants of both slots of `pair`.
    pub fn members(&self, pair: PairId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.pairs
            .get(&pair)
            .into_iter()
            .flat_map(|slots| [slots.producer, slots.display])
            .flatten()
    }

    /// Status of every pair, in pair order.
    pub fn snapshot(&self) -> BTreeMap<PairId, PairStatus> {
        self.pairs
            .iter()
            .map(|(id, slots)| (*id, slots.status()))
            .collect()
    }

    fn clear_slot(&mut self, slot: Slot, conn: ConnectionId) {
        if let Some(slots) = self.pairs.get_mut(&slot.pair) {
            let entry = slots.get_mut(slot.role);
            if *entry == Some(conn) {
                *entry = None;
            }
        }
    }
}
