use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::TouchError;
use crate::event_model::event::{ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_TRACKING_ID};
use crate::input_devices::{DeviceBackend, DeviceCapabilities, PhysicalDevice, VirtualDeviceSpec};

/// `UINPUT_MAX_NAME_SIZE`, 含结尾的 `\0`
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

/// 虚拟设备只声明这三个轴, 其余的轴不转发
pub const MIRRORED_AXES: [u16; 3] = [ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_TRACKING_ID];

const SUFFIX_LEN: usize = 4;

/// 4 个随机小写字母
pub fn random_suffix() -> String {
    Uuid::new_v4().as_bytes()[..SUFFIX_LEN]
        .iter()
        .map(|byte| char::from(b'a' + byte % 26))
        .collect()
}

/// `{name}_{suffix}`, 超出 uinput 名字长度时截断原名
pub fn virtual_name(source: &str, suffix: &str) -> String {
    let budget = UINPUT_MAX_NAME_SIZE - 1 - suffix.len() - 1;
    let mut end = source.len().min(budget);
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}_{suffix}", &source[..end])
}

/// 根据物理设备的能力生成虚拟设备的描述
pub fn virtual_spec(caps: &DeviceCapabilities, suffix: &str) -> VirtualDeviceSpec {
    VirtualDeviceSpec {
        name: virtual_name(&caps.name, suffix),
        phys: caps.phys.clone(),
        identity: caps.identity,
        keys: caps.keys.clone(),
        axes: MIRRORED_AXES
            .iter()
            .filter_map(|code| caps.axis(*code).map(|info| (*code, *info)))
            .collect(),
        properties: caps.properties.clone(),
    }
}

/// 一对已经就绪的设备: 已独占的物理设备和已注册的虚拟设备
pub struct Synthesized<B: DeviceBackend> {
    pub physical: B::Physical,
    pub sink: B::Virtual,
    pub name: String,
}

/// 打开物理设备, 注册虚拟设备, 等待 `settle` 后再独占物理设备
///
/// 独占一定发生在虚拟设备注册之后, 否则中间这段时间的触摸会丢失
pub async fn synthesize<B: DeviceBackend>(
    backend: &B,
    caps: &DeviceCapabilities,
    settle: Duration,
) -> Result<Synthesized<B>, TouchError> {
    let spec = virtual_spec(caps, &random_suffix());

    let mut physical =
        backend
            .open_physical(&caps.path)
            .map_err(|source| TouchError::DeviceOpenFailed {
                path: caps.path.clone(),
                source,
            })?;

    let sink = backend
        .create_virtual(&spec)
        .map_err(|source| TouchError::VirtualDeviceRegistrationFailed {
            name: spec.name.clone(),
            source,
        })?;
    debug!("registered {:?}, waiting {settle:?} before grab", spec.name);

    tokio::time::sleep(settle).await;

    physical.grab().map_err(|source| TouchError::GrabFailed {
        path: caps.path.clone(),
        source,
    })?;
    info!(
        "virtual touchscreen {:?} mirrors {} ({:?})",
        spec.name,
        caps.path.display(),
        caps.name
    );

    Ok(Synthesized {
        physical,
        sink,
        name: spec.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_devices::mock::{MockBackend, MockDevice, MockOp};
    use crate::input_devices::{discover, AxisInfo};

    fn caps() -> (MockBackend, DeviceCapabilities) {
        let mut device =
            MockDevice::touchscreen("/dev/input/event2", "fts_ts", 10, (0, 1079), (0, 2339));
        // ABS_MT_PRESSURE 不会被转发
        device.abs_bits.set(0x3a);
        device.axes.insert(0x3a, AxisInfo::range(0, 255));
        device.key_bits.set(0x145); // BTN_TOOL_FINGER
        let backend = MockBackend::new(vec![device]);
        let caps = discover(&backend, false).unwrap().remove(0);
        (backend, caps)
    }

    #[test]
    fn suffix_is_four_lowercase_letters() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.bytes().all(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn long_names_are_truncated() {
        let name = virtual_name(&"x".repeat(200), "abcd");
        assert_eq!(name.len(), UINPUT_MAX_NAME_SIZE - 1);
        assert!(name.ends_with("_abcd"));
        assert_eq!(virtual_name("fts_ts", "abcd"), "fts_ts_abcd");
    }

    #[test]
    fn spec_mirrors_keys_props_and_mt_axes_only() {
        let (_, caps) = caps();
        let spec = virtual_spec(&caps, "wxyz");

        assert_eq!(spec.name, "fts_ts_wxyz");
        assert_eq!(spec.phys, caps.phys);
        assert_eq!(spec.identity, caps.identity);
        assert_eq!(spec.keys, caps.keys);
        assert_eq!(spec.properties, caps.properties);
        let axes: Vec<u16> = spec.axes.iter().map(|(code, _)| *code).collect();
        assert_eq!(axes, MIRRORED_AXES);
        assert_eq!(spec.axes[0].1, AxisInfo::range(0, 1079));
    }

    #[tokio::test]
    async fn grabs_only_after_registration() {
        let (backend, caps) = caps();
        let synthesized = synthesize(&backend, &caps, Duration::ZERO).await.unwrap();

        let ops = backend.ops();
        assert_eq!(
            ops,
            vec![
                MockOp::OpenPhysical(caps.path.clone()),
                MockOp::CreateVirtual(synthesized.name.clone()),
                MockOp::Grab(caps.path.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn registration_failure_is_reported() {
        let (mut backend, caps) = caps();
        backend.fail_create_virtual = true;
        let result = synthesize(&backend, &caps, Duration::ZERO).await;
        assert!(matches!(
            result,
            Err(TouchError::VirtualDeviceRegistrationFailed { .. })
        ));
        assert!(!backend.ops().iter().any(|op| matches!(op, MockOp::Grab(_))));
    }

    #[tokio::test]
    async fn grab_failure_is_reported() {
        let (mut backend, caps) = caps();
        backend.fail_grab = true;
        let result = synthesize(&backend, &caps, Duration::ZERO).await;
        assert!(matches!(result, Err(TouchError::GrabFailed { .. })));
    }
}
