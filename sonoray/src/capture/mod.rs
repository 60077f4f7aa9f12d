//! Listener capture: converting traced rays into timed, panned impulse taps.

mod listener;
mod subsystem;
mod tap;

pub use listener::{Ear, Listener};
pub use subsystem::{CaptureContext, CaptureSubsystem};
pub use tap::RayImpulseCapture;
