/// 单个触点的状态, `(-1, -1, false)` 表示没有触点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactRecord {
    pub pos_x: i32,
    pub pos_y: i32,
    pub enabled: bool,
}

impl ContactRecord {
    pub const SENTINEL: Self = Self {
        pos_x: -1,
        pos_y: -1,
        enabled: false,
    };

    pub const fn at(pos_x: i32, pos_y: i32) -> Self {
        Self {
            pos_x,
            pos_y,
            enabled: true,
        }
    }

    /// 只有启用且坐标为正的触点才会被写进虚拟设备
    pub fn is_reportable(&self) -> bool {
        self.enabled && self.pos_x > 0 && self.pos_y > 0
    }

    pub fn clear(&mut self) {
        *self = Self::SENTINEL;
    }
}

impl Default for ContactRecord {
    fn default() -> Self {
        Self::SENTINEL
    }
}

/// 触点表
///
/// 前 `slot_count` 项对应物理设备的 slot, 最后一项是注入用的合成触点,
/// 它的下标等于 `slot_count`, 永远不会和物理 slot 冲突
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactTable {
    contacts: Vec<ContactRecord>,
}

impl ContactTable {
    pub fn new(slot_count: usize) -> Self {
        Self {
            contacts: vec![ContactRecord::SENTINEL; slot_count + 1],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.contacts.len() - 1
    }

    pub fn synthetic_index(&self) -> usize {
        self.slot_count()
    }

    pub fn get(&self, index: usize) -> Option<&ContactRecord> {
        self.contacts.get(index)
    }

    /// 物理 slot 的可变引用, 合成触点不能通过它拿到
    pub fn slot_mut(&mut self, slot: usize) -> Option<&mut ContactRecord> {
        if slot < self.slot_count() {
            self.contacts.get_mut(slot)
        } else {
            None
        }
    }

    pub fn synthetic(&self) -> &ContactRecord {
        &self.contacts[self.synthetic_index()]
    }

    pub fn set_synthetic(&mut self, record: ContactRecord) {
        let index = self.synthetic_index();
        self.contacts[index] = record;
    }

    pub fn clear_all(&mut self) {
        self.contacts.iter_mut().for_each(ContactRecord::clear);
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ContactRecord)> {
        self.contacts.iter().enumerate()
    }

    pub fn active_count(&self) -> usize {
        self.contacts.iter().filter(|c| c.is_reportable()).count()
    }

    pub fn records(&self) -> &[ContactRecord] {
        &self.contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_table_is_all_sentinel() {
        let table = ContactTable::new(10);
        assert_eq!(table.records().len(), 11);
        assert!(table.records().iter().all(|c| *c == ContactRecord::SENTINEL));
        assert_eq!(table.synthetic_index(), 10);
    }

    #[test]
    fn synthetic_slot_is_out_of_band() {
        let mut table = ContactTable::new(10);
        assert!(table.slot_mut(9).is_some());
        assert!(table.slot_mut(10).is_none());

        table.set_synthetic(ContactRecord::at(5, 5));
        assert_eq!(table.get(10), Some(&ContactRecord::at(5, 5)));
        assert_eq!(table.get(9), Some(&ContactRecord::SENTINEL));
    }

    #[test]
    fn reportable_requires_positive_position() {
        assert!(ContactRecord::at(1, 1).is_reportable());
        assert!(!ContactRecord::at(0, 10).is_reportable());
        assert!(!ContactRecord::at(10, 0).is_reportable());
        assert!(
            !ContactRecord {
                pos_x: 10,
                pos_y: 10,
                enabled: false
            }
            .is_reportable()
        );
    }

    #[test]
    fn clear_all_resets_every_record() {
        let mut table = ContactTable::new(2);
        *table.slot_mut(0).unwrap() = ContactRecord::at(3, 4);
        table.set_synthetic(ContactRecord::at(7, 8));
        assert_eq!(table.active_count(), 2);

        table.clear_all();
        assert_eq!(table.active_count(), 0);
        assert_eq!(*table.synthetic(), ContactRecord::SENTINEL);
    }
}
