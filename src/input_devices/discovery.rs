use std::{
    fs, io,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::capability::{DeviceCapabilities, probe};
use super::device::DeviceBackend;

/// 列出 `dir` 下文件名包含 `prefix` 的字符设备, 按路径排序
pub fn scan_input_dir(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut nodes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else { continue };
        if !entry.file_name().to_string_lossy().contains(prefix) {
            continue;
        }
        // 跟随符号链接, /dev/input/by-id 之类的目录也能用
        let Ok(metadata) = fs::metadata(entry.path()) else {
            continue;
        };
        if !metadata.file_type().is_char_device() {
            trace!("skip {}: not a character device", entry.path().display());
            continue;
        }
        nodes.push(entry.path());
    }
    nodes.sort();
    Ok(nodes)
}

/// 找出所有符合条件的多点触摸屏
///
/// 单个设备打开或探测失败不算错误, 大部分节点本来就不是触摸屏.
/// `report_failures` 为真时会以 `warn` 级别记录这些失败
pub fn discover<B: DeviceBackend>(
    backend: &B,
    report_failures: bool,
) -> io::Result<Vec<DeviceCapabilities>> {
    let mut found = Vec::new();
    for path in backend.candidates()? {
        let probed = backend
            .open_probe(&path)
            .map_err(|e| e.to_string())
            .and_then(|source| probe(&path, &source).map_err(|e| e.to_string()));
        match probed {
            Ok(caps) => {
                debug!(
                    "found touchscreen {} ({:?}, {} slots)",
                    path.display(),
                    caps.name,
                    caps.slot_count
                );
                found.push(caps);
            }
            Err(reason) if report_failures => warn!("skip {}: {reason}", path.display()),
            Err(reason) => trace!("skip {}: {reason}", path.display()),
        }
    }
    Ok(found)
}

/// 多个设备都符合条件时选哪一个
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// 有两个及以上时选第二个, 否则选第一个.
    /// 有些平台会在真实设备前面多出一个影子节点
    #[default]
    PreferSecond,
    First,
    Index(usize),
    /// 设备名包含给定字符串的第一个
    NameContains(String),
}

impl SelectionPolicy {
    pub fn select<'a>(&self, devices: &'a [DeviceCapabilities]) -> Option<&'a DeviceCapabilities> {
        match self {
            Self::PreferSecond => devices.get(1).or_else(|| devices.first()),
            Self::First => devices.first(),
            Self::Index(index) => devices.get(*index),
            Self::NameContains(needle) => devices.iter().find(|d| d.name.contains(needle.as_str())),
        }
    }
}
