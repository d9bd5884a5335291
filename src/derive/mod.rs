//! Numeric derivations shared by the jobs

pub mod decomposition;
pub mod delta;
pub mod fanout;
pub mod throttle;

pub use decomposition::ErrorDecomposition;
pub use delta::{monotonic_delta, Delta};
pub use fanout::{fan_out, FanOut};
pub use throttle::{Throttle, ThrottleDecision, ThrottleState};
