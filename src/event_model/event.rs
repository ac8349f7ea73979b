use num_enum::FromPrimitive;

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0x00;
pub const SYN_MT_REPORT: u16 = 0x02;

pub const BTN_TOUCH: u16 = 0x14a;

pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;

pub const INPUT_PROP_DIRECT: u16 = 0x01;

pub const EV_CNT: usize = 0x20;
pub const ABS_CNT: usize = 0x40;
pub const KEY_CNT: usize = 0x300;
pub const INPUT_PROP_CNT: usize = 0x20;

/// 事件类型, 只区分我们关心的几种
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum EventKind {
    Syn = 0x00,
    Abs = 0x03,
    #[default]
    Other = 0xffff,
}

/// 多点触控 (type B) 用到的绝对轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum MtAxis {
    Slot = 0x2f,
    PositionX = 0x35,
    PositionY = 0x36,
    TrackingId = 0x39,
    #[default]
    Other = 0xffff,
}

/// 原始输入事件, 与内核 `input_event` 的 `{type, code, value}` 一一对应 (不带时间戳)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub const fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    pub const fn abs(code: u16, value: i32) -> Self {
        Self::new(EV_ABS, code, value)
    }

    pub const fn key(code: u16, value: i32) -> Self {
        Self::new(EV_KEY, code, value)
    }

    pub const fn syn(code: u16) -> Self {
        Self::new(EV_SYN, code, 0)
    }

    /// 解码成读取线程关心的触控事件
    pub fn decode(&self) -> TouchEvent {
        match EventKind::from_primitive(self.kind) {
            EventKind::Syn if self.code == SYN_REPORT => TouchEvent::Report,
            EventKind::Abs => match MtAxis::from_primitive(self.code) {
                MtAxis::Slot => TouchEvent::Slot(self.value),
                MtAxis::TrackingId => TouchEvent::TrackingId(self.value),
                MtAxis::PositionX => TouchEvent::PositionX(self.value),
                MtAxis::PositionY => TouchEvent::PositionY(self.value),
                MtAxis::Other => TouchEvent::Unknown,
            },
            _ => TouchEvent::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEvent {
    /// `SYN_REPORT`, 一帧结束
    Report,
    Slot(i32),
    TrackingId(i32),
    PositionX(i32),
    PositionY(i32),
    Unknown,
}

impl Default for TouchEvent {
    fn default() -> Self {
        Self::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_multitouch_axes() {
        assert_eq!(RawEvent::abs(ABS_MT_SLOT, 3).decode(), TouchEvent::Slot(3));
        assert_eq!(
            RawEvent::abs(ABS_MT_TRACKING_ID, -1).decode(),
            TouchEvent::TrackingId(-1)
        );
        assert_eq!(
            RawEvent::abs(ABS_MT_POSITION_X, 100).decode(),
            TouchEvent::PositionX(100)
        );
        assert_eq!(
            RawEvent::abs(ABS_MT_POSITION_Y, 200).decode(),
            TouchEvent::PositionY(200)
        );
    }

    #[test]
    fn only_syn_report_ends_a_frame() {
        assert_eq!(RawEvent::syn(SYN_REPORT).decode(), TouchEvent::Report);
        assert_eq!(RawEvent::syn(SYN_MT_REPORT).decode(), TouchEvent::Unknown);
    }

    #[test]
    fn ignores_keys_and_unrelated_axes() {
        assert_eq!(RawEvent::key(BTN_TOUCH, 1).decode(), TouchEvent::Unknown);
        // ABS_MT_PRESSURE
        assert_eq!(RawEvent::abs(0x3a, 20).decode(), TouchEvent::Unknown);
        assert_eq!(RawEvent::new(0x11, 0, 1).decode(), TouchEvent::Unknown);
        // EV_REL
        assert_eq!(RawEvent::new(0x02, 0x35, 1).decode(), TouchEvent::Unknown);
    }
}
