use tracing::{debug, trace};

use crate::event_model::{ContactTable, RawEvent, TouchEvent};
use crate::input_devices::{PhysicalDevice, VirtualDevice};
use crate::touch_driver::session::TouchSession;

/// 把物理设备的 type B 事件流还原成触点表
///
/// 一帧内的事件先暂存, 收到 `SYN_REPORT` 时才在一次持锁内写进触点表,
/// 其他来源的写出不会看到写了一半的触点
#[derive(Debug)]
pub struct EventReader {
    /// 当前 slot, 越界时为 `None`, 之后的更新被丢弃直到切到合法的 slot
    current_slot: Option<usize>,
    staged: Vec<TouchEvent>,
    frames: u64,
}

impl Default for EventReader {
    fn default() -> Self {
        Self {
            current_slot: Some(0),
            staged: Vec::new(),
            frames: 0,
        }
    }
}

fn apply(current_slot: &mut Option<usize>, contacts: &mut ContactTable, event: TouchEvent) {
    if let TouchEvent::Slot(slot) = event {
        *current_slot = usize::try_from(slot)
            .ok()
            .filter(|&slot| slot < contacts.slot_count());
        if current_slot.is_none() {
            trace!("slot {slot} out of range");
        }
        return;
    }

    let Some(contact) = current_slot.and_then(|slot| contacts.slot_mut(slot)) else {
        return;
    };
    match event {
        TouchEvent::TrackingId(id) => contact.enabled = id != -1,
        TouchEvent::PositionX(x) => contact.pos_x = x,
        TouchEvent::PositionY(y) => contact.pos_y = y,
        _ => {}
    }
}

impl EventReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// 暂存一个事件, 返回是否到了帧边界 (`SYN_REPORT`)
    pub fn stage(&mut self, event: &RawEvent) -> bool {
        match event.decode() {
            TouchEvent::Report => {
                self.frames += 1;
                true
            }
            TouchEvent::Unknown => false,
            event => {
                self.staged.push(event);
                false
            }
        }
    }

    /// 把暂存的事件按顺序写进触点表
    pub fn commit(&mut self, contacts: &mut ContactTable) {
        for event in self.staged.drain(..) {
            apply(&mut self.current_slot, contacts, event);
        }
    }

    /// 暂存事件, 到了帧边界就提交, 返回是否提交了
    pub fn apply(&mut self, contacts: &mut ContactTable, event: &RawEvent) -> bool {
        let boundary = self.stage(event);
        if boundary {
            self.commit(contacts);
        }
        boundary
    }

    /// 读取循环, 读失败, 被打断或收到停止请求时退出, 退出前解除独占
    pub fn run<P, V>(mut self, mut device: P, session: &TouchSession<V>)
    where
        P: PhysicalDevice,
        V: VirtualDevice,
    {
        debug!("event reader started on {}", session.device().path.display());
        while !session.stop_requested() {
            let event = match device.next_event() {
                Ok(event) => event,
                Err(e) => {
                    debug!("touch device read ended: {e}");
                    break;
                }
            };
            if session.stop_requested() {
                break;
            }
            if self.stage(&event) {
                session.update(|contacts| {
                    self.commit(contacts);
                    true
                });
            }
        }

        if let Err(e) = device.ungrab() {
            debug!("ungrab failed: {e}");
        }
        debug!("event reader exited after {} frames", self.frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_dispatcher::synthesizer::virtual_spec;
    use crate::event_model::ContactRecord;
    use crate::event_model::event::{
        ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, BTN_TOUCH,
        SYN_REPORT,
    };
    use crate::input_devices::mock::{MockBackend, MockDevice, MockOp, MockVirtual};
    use crate::input_devices::{DeviceBackend, discover};

    const REPORT: RawEvent = RawEvent::syn(SYN_REPORT);

    fn slot(value: i32) -> RawEvent {
        RawEvent::abs(ABS_MT_SLOT, value)
    }

    fn tracking(value: i32) -> RawEvent {
        RawEvent::abs(ABS_MT_TRACKING_ID, value)
    }

    fn x(value: i32) -> RawEvent {
        RawEvent::abs(ABS_MT_POSITION_X, value)
    }

    fn y(value: i32) -> RawEvent {
        RawEvent::abs(ABS_MT_POSITION_Y, value)
    }

    fn open_session() -> (MockBackend, TouchSession<MockVirtual>) {
        let backend = MockBackend::new(vec![MockDevice::touchscreen(
            "/dev/input/event2",
            "fts_ts",
            10,
            (0, 1079),
            (0, 2339),
        )]);
        let caps = discover(&backend, false).unwrap().remove(0);
        let sink = backend.create_virtual(&virtual_spec(&caps, "test")).unwrap();
        (backend, TouchSession::new(caps, sink))
    }

    /// 把 `events` 喂给读取循环, 直到读完
    fn replay(events: &[RawEvent]) -> (MockBackend, Vec<ContactRecord>) {
        let (backend, session) = open_session();
        let feed = backend.feed();
        let mut physical = backend.open_physical(&session.device().path).unwrap();
        physical.grab().unwrap();

        for event in events {
            feed.send(*event);
        }
        drop(feed);
        EventReader::new().run(physical, &session);
        (backend, session.contacts())
    }

    #[test]
    fn updates_current_slot_only() {
        let mut table = ContactTable::new(4);
        let mut reader = EventReader::new();
        for event in [slot(2), tracking(9), x(30), y(40)] {
            assert!(!reader.apply(&mut table, &event));
        }
        assert!(reader.apply(&mut table, &REPORT));

        assert_eq!(table.get(2), Some(&ContactRecord::at(30, 40)));
        assert_eq!(table.active_count(), 1);
        assert_eq!(reader.frames(), 1);
    }

    #[test]
    fn nothing_lands_before_the_boundary() {
        let mut table = ContactTable::new(4);
        let mut reader = EventReader::new();
        for event in [slot(1), tracking(3), x(30), y(40)] {
            reader.apply(&mut table, &event);
        }
        assert_eq!(table.active_count(), 0);

        reader.apply(&mut table, &REPORT);
        assert_eq!(table.get(1), Some(&ContactRecord::at(30, 40)));
    }

    #[test]
    fn injection_mid_frame_sees_previous_frame() {
        let (backend, session) = open_session();
        let mut reader = EventReader::new();
        for event in [slot(0), tracking(5), x(100), y(200), REPORT, x(300)] {
            if reader.stage(&event) {
                session.update(|contacts| {
                    reader.commit(contacts);
                    true
                });
            }
        }

        backend.clear_emitted();
        session.inject_move(540, 1170);
        let frames = backend.emitted();
        assert_eq!(&frames[0][..2], &[x(100), y(200)]);

        for event in [y(400), REPORT] {
            if reader.stage(&event) {
                session.update(|contacts| {
                    reader.commit(contacts);
                    true
                });
            }
        }
        assert_eq!(session.contacts()[0], ContactRecord::at(300, 400));
        assert_eq!(&backend.emitted()[1][..2], &[x(300), y(400)]);
    }

    #[test]
    fn out_of_range_slot_drops_updates() {
        let mut table = ContactTable::new(4);
        let mut reader = EventReader::new();
        // 下标 4 是合成触点, 物理事件不能写到那里
        for event in [slot(4), tracking(1), x(30), y(40), slot(-1), x(1), REPORT] {
            reader.apply(&mut table, &event);
        }
        assert_eq!(table.active_count(), 0);
        assert_eq!(*table.synthetic(), ContactRecord::SENTINEL);
    }

    #[test]
    fn lift_after_touch_releases_button() {
        let (backend, contacts) = replay(&[
            slot(0),
            tracking(5),
            x(100),
            y(200),
            REPORT,
            tracking(-1),
            REPORT,
        ]);

        assert!(!contacts[0].enabled);
        let frames = backend.emitted();
        assert_eq!(frames.len(), 2);
        assert_eq!(
            frames[0],
            vec![
                x(100),
                y(200),
                tracking(0),
                RawEvent::syn(0x02),
                RawEvent::key(BTN_TOUCH, 1),
                REPORT,
            ]
        );
        assert_eq!(
            frames[1],
            vec![RawEvent::syn(0x02), RawEvent::key(BTN_TOUCH, 0), REPORT]
        );
    }

    #[test]
    fn one_frame_per_report() {
        let (backend, _) = replay(&[
            slot(0),
            tracking(1),
            x(10),
            y(10),
            slot(1),
            tracking(2),
            x(20),
            y(20),
            REPORT,
            slot(0),
            x(11),
            REPORT,
        ]);
        let frames = backend.emitted();
        assert_eq!(frames.len(), 2);
        // 第二帧里两个触点都在, slot 0 已经是新坐标
        assert_eq!(&frames[1][..4], &[x(11), y(10), tracking(0), RawEvent::syn(0x02)]);
        assert_eq!(frames[1].iter().filter(|e| e.code == BTN_TOUCH).count(), 0);
    }

    #[test]
    fn ungrabs_on_exit() {
        let (backend, _) = replay(&[]);
        assert!(
            backend
                .ops()
                .contains(&MockOp::Ungrab("/dev/input/event2".into()))
        );
    }
}
