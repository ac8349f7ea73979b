use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TouchEngine;
use crate::input_devices::DeviceBackend;

/// 滑动回放的插值和节奏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeTiming {
    /// 相邻插值点之间的大致距离 (逻辑像素)
    pub step_distance: u32,
    pub min_points: u32,
    pub interval_ms: u64,
    /// 抬起之后再等一帧
    pub frame_ms: u64,
}

impl Default for SwipeTiming {
    fn default() -> Self {
        Self {
            step_distance: 10,
            min_points: 2,
            interval_ms: 10,
            frame_ms: 15,
        }
    }
}

impl SwipeTiming {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

/// 起点 (含) 到终点 (不含) 之间的插值点
pub fn swipe_points(
    start: (i32, i32),
    end: (i32, i32),
    step_distance: u32,
    min_points: u32,
) -> Vec<(i32, i32)> {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let step = step_distance.max(1);
    let count = (dx.unsigned_abs() / step)
        .max(dy.unsigned_abs() / step)
        .max(min_points)
        .max(1);

    let sx = f64::from(dx) / f64::from(count);
    let sy = f64::from(dy) / f64::from(count);
    (0..count)
        .map(|i| {
            let i = f64::from(i);
            (
                start.0 + (sx * i) as i32,
                start.1 + (sy * i) as i32,
            )
        })
        .collect()
}

/// 用合成触点从 `start` 滑到 `end` 后抬起
pub async fn swipe<B: DeviceBackend>(
    engine: &TouchEngine<B>,
    start: (i32, i32),
    end: (i32, i32),
    timing: &SwipeTiming,
) {
    let points = swipe_points(start, end, timing.step_distance, timing.min_points);
    debug!("swipe {start:?} -> {end:?} over {} points", points.len());

    engine.inject_move(start.0, start.1);
    for (x, y) in points {
        tokio::time::sleep(timing.interval()).await;
        engine.inject_move(x, y);
    }
    tokio::time::sleep(timing.interval()).await;
    engine.inject_move(end.0, end.1);
    engine.inject_up();
    tokio::time::sleep(timing.frame()).await;
}
