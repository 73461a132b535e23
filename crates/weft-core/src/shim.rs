//! Device launch shim
//!
//! Thin pass-through between the dispatcher and the device's `launch` entry.
//! It does no coherence work and no fallback: the dispatcher has already
//! routed the assignment, so a routine missing from the capability registry
//! here means the routing logic is broken, and that fails loudly rather than
//! degrading to a silent host run.

use std::time::Instant;

use weft_accel::{CallArgs, RoutineId};

use crate::engine::Engine;
use crate::error::Result;

/// Launch one device routine on behalf of the dispatcher.
///
/// # Panics
///
/// Panics when `routine` is not in the engine's capability registry. Callers
/// must check the registry before routing here.
pub(crate) fn launch(engine: &Engine, routine: RoutineId, args: &CallArgs) -> Result<()> {
    if !engine.registry().supports(routine.kind, routine.dtype) {
        panic!(
            "routine {routine} is not exported by device '{}': assignment was misrouted",
            engine.device_name()
        );
    }

    engine.metrics().record_accel_call();
    let started = Instant::now();
    engine.device().write().launch(routine, args)?;
    tracing::debug!(
        routine = %routine,
        n = args.n,
        duration_us = started.elapsed().as_micros() as u64,
        "routine_launched"
    );
    Ok(())
}
