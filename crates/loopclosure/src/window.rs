/// Is `time` (seconds since session start) inside one of `period`'s
/// half-open `[t0, t1]` windows?
///
/// An empty period means "always on". An odd-length period is malformed;
/// rather than reject it, it's treated as always-on with a logged
/// warning.
pub fn is_period_active(period: &[f64], time: f64) -> bool {
    if period.is_empty() {
        return true;
    }
    if period.len() % 2 != 0 {
        tracing::warn!(len = period.len(), "malformed loop_vaild_period, treating as always-on");
        return true;
    }
    period.chunks_exact(2).any(|w| time >= w[0] && time <= w[1])
}
