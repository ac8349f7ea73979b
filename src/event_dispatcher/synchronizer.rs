use tracing::warn;

use crate::event_model::event::{
    ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_TRACKING_ID, BTN_TOUCH, SYN_MT_REPORT,
    SYN_REPORT,
};
use crate::event_model::{ContactTable, RawEvent};
use crate::input_devices::VirtualDevice;

/// 把整张触点表序列化成虚拟设备的一帧
///
/// 每个可上报的触点依次写出 X, Y, tracking id (即触点下标) 和 `SYN_MT_REPORT`,
/// 再根据活动触点数切换 `BTN_TOUCH`, 最后以 `SYN_REPORT` 结束
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    button_down: bool,
}

impl FrameSynchronizer {
    pub fn button_down(&self) -> bool {
        self.button_down
    }

    pub fn frame(&mut self, contacts: &ContactTable) -> Vec<RawEvent> {
        let mut events = Vec::new();
        let mut active = 0;

        for (index, contact) in contacts.iter() {
            if !contact.is_reportable() {
                continue;
            }
            events.extend([
                RawEvent::abs(ABS_MT_POSITION_X, contact.pos_x),
                RawEvent::abs(ABS_MT_POSITION_Y, contact.pos_y),
                RawEvent::abs(ABS_MT_TRACKING_ID, index as i32),
                RawEvent::syn(SYN_MT_REPORT),
            ]);
            active += 1;
        }

        if active == 0 && self.button_down {
            self.button_down = false;
            events.push(RawEvent::syn(SYN_MT_REPORT));
            events.push(RawEvent::key(BTN_TOUCH, 0));
        } else if active == 1 && !self.button_down {
            self.button_down = true;
            events.push(RawEvent::key(BTN_TOUCH, 1));
        }

        events.push(RawEvent::syn(SYN_REPORT));
        events
    }

    /// 生成一帧并写入 `sink`, 写入失败只记录日志
    pub fn sync(&mut self, contacts: &ContactTable, sink: &mut impl VirtualDevice) {
        let frame = self.frame(contacts);
        if let Err(e) = sink.emit(&frame) {
            warn!("failed to write {} events to virtual device: {e}", frame.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_model::ContactRecord;

    const PRESS: RawEvent = RawEvent::key(BTN_TOUCH, 1);
    const RELEASE: RawEvent = RawEvent::key(BTN_TOUCH, 0);

    fn table_with(slots: usize, contacts: &[(usize, i32, i32)]) -> ContactTable {
        let mut table = ContactTable::new(slots);
        for &(slot, x, y) in contacts {
            *table.slot_mut(slot).unwrap() = ContactRecord::at(x, y);
        }
        table
    }

    #[test]
    fn empty_table_emits_only_report() {
        let mut sync = FrameSynchronizer::default();
        let frame = sync.frame(&ContactTable::new(10));
        assert_eq!(frame, vec![RawEvent::syn(SYN_REPORT)]);
    }

    #[test]
    fn first_contact_presses_button() {
        let mut sync = FrameSynchronizer::default();
        let frame = sync.frame(&table_with(10, &[(3, 100, 200)]));
        assert_eq!(
            frame,
            vec![
                RawEvent::abs(ABS_MT_POSITION_X, 100),
                RawEvent::abs(ABS_MT_POSITION_Y, 200),
                RawEvent::abs(ABS_MT_TRACKING_ID, 3),
                RawEvent::syn(SYN_MT_REPORT),
                PRESS,
                RawEvent::syn(SYN_REPORT),
            ]
        );
        assert!(sync.button_down());
    }

    #[test]
    fn contacts_are_emitted_in_slot_order() {
        let mut sync = FrameSynchronizer::default();
        let mut table = table_with(10, &[(7, 70, 70), (1, 10, 10)]);
        table.set_synthetic(ContactRecord::at(5, 5));
        let ids: Vec<i32> = sync
            .frame(&table)
            .into_iter()
            .filter(|e| e.code == ABS_MT_TRACKING_ID)
            .map(|e| e.value)
            .collect();
        assert_eq!(ids, [1, 7, 10]);
    }

    #[test]
    fn unreportable_contacts_are_skipped() {
        let mut sync = FrameSynchronizer::default();
        let frame = sync.frame(&table_with(10, &[(0, 0, 50), (1, 50, -1)]));
        assert_eq!(frame, vec![RawEvent::syn(SYN_REPORT)]);
        assert!(!sync.button_down());
    }

    #[test]
    fn last_contact_lifted_releases_button() {
        let mut sync = FrameSynchronizer::default();
        sync.frame(&table_with(10, &[(0, 100, 200)]));

        let frame = sync.frame(&ContactTable::new(10));
        assert_eq!(
            frame,
            vec![RawEvent::syn(SYN_MT_REPORT), RELEASE, RawEvent::syn(SYN_REPORT)]
        );
        assert!(!sync.button_down());
    }

    #[test]
    fn press_and_release_alternate() {
        let mut sync = FrameSynchronizer::default();
        let sequence: &[&[(usize, i32, i32)]] = &[
            &[(0, 1, 1)],
            &[(0, 2, 2)],
            &[(0, 2, 2), (1, 5, 5)],
            &[(1, 5, 5)],
            &[],
            &[],
            &[(2, 9, 9)],
            &[],
        ];

        let mut buttons = Vec::new();
        for contacts in sequence {
            let frame = sync.frame(&table_with(4, contacts));
            buttons.extend(frame.into_iter().filter(|e| e.code == BTN_TOUCH).map(|e| e.value));
        }
        assert_eq!(buttons, [1, 0, 1, 0]);
    }

    #[test]
    fn two_simultaneous_contacts_do_not_press() {
        let mut sync = FrameSynchronizer::default();
        let frame = sync.frame(&table_with(4, &[(0, 1, 1), (1, 2, 2)]));
        assert!(!frame.contains(&PRESS));
        assert!(!sync.button_down());
    }
}
