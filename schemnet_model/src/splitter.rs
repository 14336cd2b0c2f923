//! Splitter bit maps.

/// The fixed per-bit routing table of a splitter.
///
/// Pin 0 of a splitter component is always the combined (bus) end; pins
/// `1..=fan_count` are the fan ends. `bit_map[b]` names the fan end that
/// bus bit `b` is routed to, or `None` when the bit is left unrouted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitterSpec {
    bit_map: Vec<Option<u8>>,
    fan_count: u8,
}

impl SplitterSpec {
    /// Build a spec from an explicit bit map. Fan indices are 0-based.
    pub fn new(bit_map: Vec<Option<u8>>, fan_count: u8) -> Self {
        debug_assert!(
            bit_map
                .iter()
                .flatten()
                .all(|&fan| (fan as usize) < fan_count as usize),
            "bit map routes to a fan end that does not exist"
        );
        SplitterSpec { bit_map, fan_count }
    }

    /// An even split of `width` bus bits over `fan_count` fans, low bits
    /// first. `width` must be divisible by `fan_count`.
    pub fn even(width: u8, fan_count: u8) -> Self {
        let per_fan = width / fan_count;
        let bit_map = (0..width).map(|b| Some(b / per_fan)).collect();
        SplitterSpec { bit_map, fan_count }
    }

    /// Width of the combined end.
    pub fn bus_width(&self) -> u32 {
        self.bit_map.len() as u32
    }

    /// Number of fan ends.
    pub fn fan_count(&self) -> u8 {
        self.fan_count
    }

    /// Fan end carrying bus bit `bit`, if routed.
    pub fn fan_of_bit(&self, bit: u16) -> Option<u8> {
        self.bit_map.get(bit as usize).copied().flatten()
    }

    /// Bus bits routed to fan end `fan`, in ascending bus-bit order.
    ///
    /// The position of a bus bit within this list is the fan-local bit
    /// index of that bit.
    pub fn fan_bits(&self, fan: u8) -> Vec<u16> {
        self.bit_map
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == Some(fan))
            .map(|(b, _)| b as u16)
            .collect()
    }

    /// Width of fan end `fan`.
    pub fn fan_width(&self, fan: u8) -> u32 {
        self.bit_map.iter().flatten().filter(|f| **f == fan).count() as u32
    }

    /// Fan-local bit index of bus bit `bit` on its own fan end.
    pub fn fan_local_index(&self, bit: u16) -> Option<u16> {
        let fan = self.fan_of_bit(bit)?;
        let local = self.bit_map[..bit as usize]
            .iter()
            .flatten()
            .filter(|f| **f == fan)
            .count();
        Some(local as u16)
    }

    /// True when fan end `fan` carries no bus bits at all.
    pub fn fan_is_unrouted(&self, fan: u8) -> bool {
        self.fan_width(fan) == 0
    }
}
