use tracing::debug;

/// Result of comparing a shrinking quantity against its last published value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    /// Nothing was published before; no increment this cycle
    NoBaseline,
    /// Amount the quantity shrank by, zero when it grew
    Increment(u64),
}

/// Monotonic decrease between `previous` and `current`.
///
/// Counters may only go up, so growth of the tracked quantity is clamped to 0
/// instead of producing a negative increment.
pub fn monotonic_delta(previous: Option<f64>, current: f64) -> Delta {
    let Some(previous) = previous else {
        return Delta::NoBaseline;
    };
    // The backend reports `+Inf` and `NaN` as ordinary samples
    if !previous.is_finite() {
        debug!(previous, "previous value is not finite, treating as no baseline");
        return Delta::NoBaseline;
    }

    let change = previous - current;
    if change < 0.0 {
        debug!(previous, current, "tracked quantity grew, clamping decrease to 0");
        return Delta::Increment(0);
    }
    Delta::Increment(change.round() as u64)
}
