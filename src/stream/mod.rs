//! Stream combinators for record delivery

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
