//! Metrics 模块
//!
//! 记录启动步骤耗时与失败次数，未安装 recorder 时为空操作

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::state::BootstrapStep;

/// 记录启动步骤耗时
pub fn record_step(step: BootstrapStep, elapsed: Duration, success: bool) {
    let labels = [
        ("step", step.as_str().to_string()),
        ("success", success.to_string()),
    ];

    histogram!("bootstrap_step_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// 记录启动失败
pub fn record_failure(step: BootstrapStep) {
    let labels = [("step", step.as_str().to_string())];
    counter!("bootstrap_failures_total", &labels).increment(1);
}

/// 设置就绪状态
pub fn set_ready(ready: bool) {
    gauge!("bootstrap_ready").set(if ready { 1.0 } else { 0.0 });
}
