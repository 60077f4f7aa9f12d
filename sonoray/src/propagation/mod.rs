//! Ray emission and specular propagation.

mod manager;
mod ray;
mod tracer;

pub use manager::{EnqueueOutcome, RayManager, StepReport};
pub use ray::{AcousticRay, BounceStatus, PathPoint, SoundId, Termination};
pub use tracer::{GRAZING_COSINE, PathTracer};
