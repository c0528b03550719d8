/// Small seeded generator used by every board generator.
///
/// The same seed always yields the same boards, which keeps games and tests
/// reproducible.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u32>())
    }

    pub fn next_u32(&mut self) -> u32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    pub fn next_f32(&mut self) -> f32 {
        let out = self.next_u32();
        ((out as f64 / 4_294_967_296.0) as f32).min(f32::from_bits(0x3f7f_ffff))
    }

    /// Uniform integer in `min..=max`.
    pub fn int(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = (max as i64 - min as i64 + 1) as u64;
        let offset = (self.next_u32() as u64 * span) >> 32;
        (min as i64 + offset as i64) as i32
    }

    pub fn bool(&mut self, probability: f32) -> bool {
        self.next_f32() < probability
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        ((self.next_u32() as u64 * len as u64) >> 32) as usize
    }

    /// Fisher–Yates, walking from the last slot down.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.pick_index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_sequence() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn int_stays_inside_inclusive_range() {
        let mut rng = Rng::new(11);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..5_000 {
            let value = rng.int(1, 100);
            assert!((1..=100).contains(&value));
            seen_min |= value == 1;
            seen_max |= value == 100;
        }
        assert!(seen_min && seen_max);
        assert_eq!(rng.int(5, 5), 5);
        assert_eq!(rng.int(9, 3), 9);
    }

    #[test]
    fn next_f32_is_below_one() {
        let mut rng = Rng::new(3);
        for _ in 0..10_000 {
            let value = rng.next_f32();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn shuffle_keeps_every_element() {
        let mut rng = Rng::new(99);
        let mut items: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_reaches_every_position() {
        let mut first_slots = [false; 4];
        for seed in 0..200u32 {
            let mut rng = Rng::new(seed);
            let mut items = [0usize, 1, 2, 3];
            rng.shuffle(&mut items);
            first_slots[items[0]] = true;
        }
        assert!(first_slots.iter().all(|seen| *seen));
    }
}
