use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;

use super::bitset::BitSet;
use crate::error::ProbeError;
use crate::event_model::event::{
    ABS_CNT, ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_SLOT, ABS_MT_TRACKING_ID, BTN_TOUCH,
    INPUT_PROP_DIRECT,
};

/// 必须支持的多点触控轴
pub const REQUIRED_ABS: &[(u16, &str)] = &[
    (ABS_MT_SLOT, "ABS_MT_SLOT"),
    (ABS_MT_TRACKING_ID, "ABS_MT_TRACKING_ID"),
    (ABS_MT_POSITION_X, "ABS_MT_POSITION_X"),
    (ABS_MT_POSITION_Y, "ABS_MT_POSITION_Y"),
];

/// tracking id 轴退化 (`min == max`) 时使用的范围
pub const TRACKING_ID_FALLBACK: (i32, i32) = (-1, 0xFFFF);

/// `input_absinfo`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AxisInfo {
    pub value: i32,
    pub minimum: i32,
    pub maximum: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

impl AxisInfo {
    pub const fn range(minimum: i32, maximum: i32) -> Self {
        Self {
            value: 0,
            minimum,
            maximum,
            fuzz: 0,
            flat: 0,
            resolution: 0,
        }
    }

    /// 轴上可取值的个数, 即 `max - min + 1`
    pub fn span(&self) -> i64 {
        i64::from(self.maximum) - i64::from(self.minimum) + 1
    }
}

/// `input_id`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// 设备能力查询接口, 每个方法对应一次 ioctl
pub trait CapabilitySource {
    fn event_type_bits(&self) -> io::Result<BitSet>;
    fn abs_bits(&self) -> io::Result<BitSet>;
    fn key_bits(&self) -> io::Result<BitSet>;
    fn property_bits(&self) -> io::Result<BitSet>;
    fn abs_info(&self, code: u16) -> io::Result<AxisInfo>;
    fn identity(&self) -> io::Result<DeviceIdentity>;
    fn name(&self) -> io::Result<String>;
    fn phys(&self) -> io::Result<String>;
    fn driver_version(&self) -> io::Result<i32>;
}

/// 探测得到的设备能力, 探测完成后不再变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub path: PathBuf,
    pub name: String,
    pub phys: String,
    pub identity: DeviceIdentity,
    pub driver_version: i32,
    pub event_types: BitSet,
    pub abs_axes: BitSet,
    pub keys: BitSet,
    pub properties: BitSet,
    pub axes: BTreeMap<u16, AxisInfo>,
    pub slot_count: usize,
}

impl DeviceCapabilities {
    pub fn axis(&self, code: u16) -> Option<&AxisInfo> {
        self.axes.get(&code)
    }

    pub fn supports_abs(&self, code: u16) -> bool {
        self.abs_axes.test(code as usize)
    }

    pub fn touch_range(&self) -> TouchRange {
        let x = self.axes.get(&ABS_MT_POSITION_X).copied().unwrap_or_default();
        let y = self.axes.get(&ABS_MT_POSITION_Y).copied().unwrap_or_default();
        TouchRange {
            x_min: x.minimum,
            x_span: x.span(),
            y_min: y.minimum,
            y_span: y.span(),
        }
    }
}

/// 触摸屏原始坐标范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchRange {
    pub x_min: i32,
    pub x_span: i64,
    pub y_min: i32,
    pub y_span: i64,
}

impl TouchRange {
    /// 把 `width x height` 显示坐标映射到原始坐标: `v * span / size + min`,
    /// 结果限制在轴的 `[min, max]` 内
    pub fn scale(&self, x: i32, y: i32, width: i32, height: i32) -> (i32, i32) {
        let map = |v: i32, span: i64, size: i32, min: i32| {
            let min = i64::from(min);
            let max = min + span.max(1) - 1;
            let raw = i64::from(v) * span / i64::from(size.max(1)) + min;
            // max 来自 i32 轴范围, clamp 之后一定装得下
            raw.clamp(min, max) as i32
        };
        (
            map(x, self.x_span, width, self.x_min),
            map(y, self.y_span, height, self.y_min),
        )
    }
}

/// 检查四组位图是否满足 type B 多点触摸屏的要求
pub fn classify(abs: &BitSet, keys: &BitSet, props: &BitSet) -> Result<(), ProbeError> {
    // 支持 ABS_MT_SLOT - 1 的设备不是真正的 MT 设备, 见 libevdev
    if abs.test(ABS_MT_SLOT as usize - 1) {
        return Err(ProbeError::NotMultitouch("reports ABS_MT_SLOT - 1"));
    }
    for &(code, name) in REQUIRED_ABS {
        if !abs.test(code as usize) {
            return Err(ProbeError::NotMultitouch(name));
        }
    }
    if !props.test(INPUT_PROP_DIRECT as usize) {
        return Err(ProbeError::NotMultitouch("INPUT_PROP_DIRECT"));
    }
    if !keys.test(BTN_TOUCH as usize) {
        return Err(ProbeError::NotMultitouch("BTN_TOUCH"));
    }
    Ok(())
}

/// 读取并分类一个候选设备
pub fn probe(
    path: &Path,
    source: &impl CapabilitySource,
) -> Result<DeviceCapabilities, ProbeError> {
    let event_types = source
        .event_type_bits()
        .map_err(ProbeError::query("event types"))?;
    let abs_axes = source.abs_bits().map_err(ProbeError::query("abs bits"))?;
    let properties = source
        .property_bits()
        .map_err(ProbeError::query("properties"))?;
    let keys = source.key_bits().map_err(ProbeError::query("key bits"))?;

    classify(&abs_axes, &keys, &properties)?;

    let mut axes = BTreeMap::new();
    for code in abs_axes.iter_ones().filter(|&code| code < ABS_CNT) {
        let code = code as u16;
        let mut info = source.abs_info(code).map_err(ProbeError::query("abs info"))?;
        if code == ABS_MT_TRACKING_ID && info.minimum == info.maximum {
            (info.minimum, info.maximum) = TRACKING_ID_FALLBACK;
        }
        axes.insert(code, info);
    }

    let slot_max = axes.get(&ABS_MT_SLOT).map_or(-1, |slot| slot.maximum);
    if slot_max < 0 {
        return Err(ProbeError::NotMultitouch("empty ABS_MT_SLOT range"));
    }

    Ok(DeviceCapabilities {
        path: path.to_path_buf(),
        identity: source.identity().map_err(ProbeError::query("input id"))?,
        driver_version: source
            .driver_version()
            .map_err(ProbeError::query("driver version"))?,
        phys: source.phys().map_err(ProbeError::query("phys"))?,
        name: source.name().map_err(ProbeError::query("name"))?,
        event_types,
        abs_axes,
        keys,
        properties,
        axes,
        slot_count: slot_max as usize + 1,
    })
}
