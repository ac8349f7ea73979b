/// 触点表
pub mod contact;

/// 原始事件与解码后的触控事件
pub mod event;

pub use contact::{ContactRecord, ContactTable};
pub use event::{RawEvent, TouchEvent};
