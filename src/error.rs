use std::{io, path::PathBuf};

use thiserror::Error;

/// 启动、注入过程中会返回给调用者的错误
#[derive(Debug, Error)]
pub enum TouchError {
    #[error("no multitouch touchscreen found")]
    DiscoveryEmpty,

    #[error("unable to enumerate input devices: {0}")]
    Enumerate(#[source] io::Error),

    #[error("unable to open touch device {path}: {source}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to create virtual touch device {name:?}: {source}")]
    VirtualDeviceRegistrationFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("unable to grab touch device {path}: {source}")]
    GrabFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to spawn event reader: {0}")]
    ReaderSpawnFailed(#[source] io::Error),

    #[error("invalid display resolution {width}x{height}")]
    InvalidResolution { width: i32, height: i32 },
}

/// 探测单个候选设备时的错误, 发现流程里会被吞掉
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("capability query failed ({what}): {source}")]
    CapabilityQueryFailed {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("not a multitouch touchscreen: {0}")]
    NotMultitouch(&'static str),
}

impl ProbeError {
    pub(crate) fn query(what: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::CapabilityQueryFailed { what, source }
    }
}
