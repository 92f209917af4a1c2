use std::time::Duration;
use tracing::debug;

pub fn emit_diff(path: &str, change_count: usize, ax_changed: bool, duration: Duration) {
    debug!(
        target: "perceiver.events",
        path,
        change_count,
        ax_changed,
        elapsed_ms = duration.as_millis() as u64,
        "structural.diff.generated"
    );
}

pub fn emit_diff_suppressed(previous: &str, current: &str) {
    debug!(
        target: "perceiver.events",
        previous,
        current,
        "structural.diff.suppressed"
    );
}
