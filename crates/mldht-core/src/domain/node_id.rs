//! 160-bit node identifiers and the XOR distance metric.
//!
//! Reference: spec.md Section 3 (Data Model)

/// A 160-bit identifier shared by DHT nodes and infohashes.
///
/// Matches the BitTorrent Mainline DHT (BEP-5) sizing: 20 raw bytes,
/// big-endian, compared byte-wise for the XOR metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn zero() -> Self {
        Self([0u8; 20])
    }

    /// The all-ones id; the farthest possible id from `zero()`.
    pub fn max() -> Self {
        Self([0xffu8; 20])
    }

    /// A uniformly random id, for a node with no persisted identity yet.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// XOR this id with another, producing the raw distance bytes.
    pub fn xor(&self, other: &NodeId) -> [u8; 20] {
        let mut out = [0u8; 20];
        for i in 0..20 {
            out[i] = self.0[i] ^ other.0[i];
        }
        out
    }

    /// Index (0-159) of the highest bit at which `self` and `other` differ,
    /// counting from the most significant bit of byte 0. Returns `None` if
    /// the ids are equal.
    pub fn highest_differing_bit(&self, other: &NodeId) -> Option<u32> {
        let xor = self.xor(other);
        for (i, byte) in xor.iter().enumerate() {
            if *byte != 0 {
                let leading = byte.leading_zeros();
                return Some((i as u32) * 8 + leading);
            }
        }
        None
    }

    /// True if the bit at `index` (0 = most significant bit of byte 0) is set.
    pub fn bit(&self, index: u32) -> bool {
        let byte = (index / 8) as usize;
        let shift = 7 - (index % 8);
        (self.0[byte] >> shift) & 1 == 1
    }
}

impl AsRef<[u8]> for NodeId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// XOR distance between two node ids, ordered so that smaller means closer.
///
/// Compares as a 160-bit unsigned integer: lexicographic byte comparison
/// of the raw XOR is equivalent to numeric comparison since both operands
/// are the same fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(pub [u8; 20]);

impl Distance {
    pub fn between(a: &NodeId, b: &NodeId) -> Self {
        Self(a.xor(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_distance_is_symmetric() {
        let a = NodeId::new([0x12; 20]);
        let b = NodeId::new([0x34; 20]);
        assert_eq!(Distance::between(&a, &b), Distance::between(&b, &a));
    }

    #[test]
    fn xor_distance_to_self_is_zero() {
        let a = NodeId::new([0x77; 20]);
        assert_eq!(Distance::between(&a, &a), Distance([0u8; 20]));
    }

    #[test]
    fn highest_differing_bit_finds_msb_difference() {
        let a = NodeId::new([0u8; 20]);
        let mut b_bytes = [0u8; 20];
        b_bytes[0] = 0b0100_0000;
        let b = NodeId::new(b_bytes);
        assert_eq!(a.highest_differing_bit(&b), Some(1));
    }

    #[test]
    fn highest_differing_bit_none_for_equal_ids() {
        let a = NodeId::new([9u8; 20]);
        assert_eq!(a.highest_differing_bit(&a), None);
    }

    #[test]
    fn bit_reads_msb_first() {
        let id = NodeId::new({
            let mut b = [0u8; 20];
            b[0] = 0b1000_0000;
            b
        });
        assert!(id.bit(0));
        assert!(!id.bit(1));
    }

    #[test]
    fn closer_distance_orders_smaller() {
        let target = NodeId::new([0u8; 20]);
        let near = NodeId::new({
            let mut b = [0u8; 20];
            b[19] = 1;
            b
        });
        let far = NodeId::new({
            let mut b = [0u8; 20];
            b[0] = 0x80;
            b
        });
        assert!(Distance::between(&target, &near) < Distance::between(&target, &far));
    }
}
