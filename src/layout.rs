use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Logical index of an item within the active item set (0..3).
pub type ItemIndex = usize;

/// Number of distinct items in a playthrough.
pub const ITEM_COUNT: usize = 3;

/// One of the four fixed display positions, in pool order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum Slot {
    TopLeft,
    BottomRight,
    TopRight,
    BottomLeft,
}

impl Slot {
    pub const POOL: [Slot; 4] = [
        Slot::TopLeft,
        Slot::BottomRight,
        Slot::TopRight,
        Slot::BottomLeft,
    ];

    /// Centre in normalized device coordinates (x right, y up, both -1..1).
    pub fn center(self) -> (f64, f64) {
        match self {
            Slot::TopLeft => (-0.5, 0.5),
            Slot::BottomRight => (0.5, -0.5),
            Slot::TopRight => (0.5, 0.5),
            Slot::BottomLeft => (-0.5, -0.5),
        }
    }

    /// Quadrant containing a normalized point, if it lies off both axes.
    pub fn at(x: f64, y: f64) -> Option<Slot> {
        if !x.is_finite() || !y.is_finite() || x == 0.0 || y == 0.0 {
            return None;
        }
        Some(match (x < 0.0, y > 0.0) {
            (true, true) => Slot::TopLeft,
            (false, true) => Slot::TopRight,
            (true, false) => Slot::BottomLeft,
            (false, false) => Slot::BottomRight,
        })
    }

    /// Position in the 2x2 grid as (row, column).
    pub fn grid(self) -> (usize, usize) {
        match self {
            Slot::TopLeft => (0, 0),
            Slot::TopRight => (0, 1),
            Slot::BottomLeft => (1, 0),
            Slot::BottomRight => (1, 1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub item: ItemIndex,
    pub slot: Slot,
}

/// Items shown in one round; the first placement is always the target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundLayout {
    placements: Vec<Placement>,
}

impl RoundLayout {
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn target(&self) -> Option<ItemIndex> {
        self.placements.first().map(|p| p.item)
    }

    /// Where the pulse cue is anchored: the target's slot.
    pub fn cue_slot(&self) -> Option<Slot> {
        self.placements.first().map(|p| p.slot)
    }

    pub fn item_at(&self, slot: Slot) -> Option<ItemIndex> {
        self.placements
            .iter()
            .find(|p| p.slot == slot)
            .map(|p| p.item)
    }

    pub fn slot_of(&self, item: ItemIndex) -> Option<Slot> {
        self.placements
            .iter()
            .find(|p| p.item == item)
            .map(|p| p.slot)
    }

    pub fn contains(&self, item: ItemIndex) -> bool {
        self.slot_of(item).is_some()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Items displayed for a level and sub-level, target first.
pub fn items_for(level: u8, sub_level: u8) -> Vec<ItemIndex> {
    let target = (sub_level as usize + ITEM_COUNT - 1) % ITEM_COUNT;
    (0..level.clamp(1, ITEM_COUNT as u8) as usize)
        .map(|offset| (target + offset) % ITEM_COUNT)
        .collect()
}

#[derive(Debug)]
pub struct LayoutGenerator {
    rng: StdRng,
}

impl LayoutGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    /// Unbiased draw of `count` distinct slots from the pool.
    pub fn draw_slots(&mut self, count: usize) -> Vec<Slot> {
        let mut pool = Slot::POOL;
        pool.shuffle(&mut self.rng);
        pool.into_iter().take(count.min(Slot::POOL.len())).collect()
    }

    /// Places `items` (target first) on freshly drawn slots.
    pub fn generate(&mut self, items: &[ItemIndex]) -> RoundLayout {
        let slots = self.draw_slots(items.len());
        let placements = items
            .iter()
            .zip(slots)
            .map(|(&item, slot)| Placement { item, slot })
            .collect();
        RoundLayout { placements }
    }
}

impl Default for LayoutGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::HashMap;

    #[test]
    fn items_for_each_level() {
        assert_eq!(items_for(1, 1), vec![0]);
        assert_eq!(items_for(1, 3), vec![2]);
        assert_eq!(items_for(2, 1), vec![0, 1]);
        assert_eq!(items_for(2, 3), vec![2, 0]);
        assert_eq!(items_for(3, 2), vec![1, 2, 0]);
        assert_eq!(items_for(3, 3), vec![2, 0, 1]);
    }

    #[test]
    fn target_is_first_and_slots_are_distinct() {
        let mut gen = LayoutGenerator::new(Some(7));
        for _ in 0..200 {
            let layout = gen.generate(&[2, 0, 1]);
            assert_eq!(layout.target(), Some(2));
            assert_eq!(layout.cue_slot(), layout.slot_of(2));
            let slots: Vec<Slot> = layout.placements().iter().map(|p| p.slot).collect();
            assert_eq!(slots.iter().unique().count(), 3);
        }
    }

    #[test]
    fn every_pool_permutation_is_equally_likely() {
        let mut gen = LayoutGenerator::new(Some(42));
        let draws = 24_000;
        let mut counts: HashMap<Vec<Slot>, u32> = HashMap::new();
        for _ in 0..draws {
            *counts.entry(gen.draw_slots(4)).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 24, "all 4! orderings should appear");
        for (perm, n) in &counts {
            assert!(
                (800..=1200).contains(n),
                "permutation {perm:?} drawn {n} times, expected about 1000"
            );
        }
    }

    #[test]
    fn same_seed_same_layouts() {
        let mut a = LayoutGenerator::new(Some(9));
        let mut b = LayoutGenerator::new(Some(9));
        for _ in 0..10 {
            assert_eq!(a.generate(&[0, 1]), b.generate(&[0, 1]));
        }
    }

    #[test]
    fn slot_lookup_from_coordinates() {
        for slot in Slot::POOL {
            let (x, y) = slot.center();
            assert_eq!(Slot::at(x, y), Some(slot));
        }
        assert_eq!(Slot::at(0.0, 0.3), None);
        assert_eq!(Slot::at(f64::NAN, 0.3), None);
    }

    #[test]
    fn layout_lookups() {
        let mut gen = LayoutGenerator::new(Some(1));
        let layout = gen.generate(&[1, 2]);
        let slot = layout.slot_of(2).unwrap();
        assert_eq!(layout.item_at(slot), Some(2));
        assert!(!layout.contains(0));
        assert_eq!(layout.len(), 2);
    }
}
