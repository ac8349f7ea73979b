use std::fmt;

/// 定长位图, 与 `EVIOCGBIT` / `EVIOCGPROP` 返回的字节数组布局一致:
/// 第 `i` 位在第 `i / 8` 个字节, 掩码 `1 << (i % 8)`
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    bytes: Vec<u8>,
}

impl BitSet {
    /// 能容纳 `bits` 位的空位图
    pub fn new(bits: usize) -> Self {
        Self {
            bytes: vec![0; bits.div_ceil(8)],
        }
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn with_bits(bits: usize, set: impl IntoIterator<Item = usize>) -> Self {
        let mut bitset = Self::new(bits);
        for index in set {
            bitset.set(index);
        }
        bitset
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len() * 8
    }

    /// 越界时返回 `false`
    pub fn test(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    /// 越界的位会被忽略
    pub fn set(&mut self, index: usize) {
        if let Some(byte) = self.bytes.get_mut(index / 8) {
            *byte |= 1 << (index % 8);
        }
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(byte) = self.bytes.get_mut(index / 8) {
            *byte &= !(1 << (index % 8));
        }
    }

    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(|&index| self.test(index))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&byte| byte == 0)
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for index in self.iter_ones() {
            set.entry(&format_args!("{index:#x}"));
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_byte_layout() {
        let bits = BitSet::from_bytes(vec![0b0000_0010, 0b1000_0000]);
        assert!(bits.test(1));
        assert!(bits.test(15));
        assert!(!bits.test(0));
        assert!(!bits.test(8));
    }

    #[test]
    fn out_of_range_is_unset() {
        let mut bits = BitSet::new(16);
        bits.set(200);
        assert!(!bits.test(200));
        assert!(bits.is_empty());
    }

    #[test]
    fn set_clear_and_iterate() {
        let mut bits = BitSet::with_bits(0x40, [0x2f, 0x35, 0x36, 0x39]);
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), vec![0x2f, 0x35, 0x36, 0x39]);

        bits.clear(0x35);
        assert!(!bits.test(0x35));
        assert_eq!(bits.capacity(), 0x40);
        assert_eq!(format!("{bits:?}"), "{0x2f, 0x36, 0x39}");
    }
}
