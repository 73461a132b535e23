//! Engine handle
//!
//! An [`Engine`] owns one accelerator device, the capability registry probed
//! from it, and a metrics sink. The registry is filled exactly once, at
//! construction; routing decisions later read the map without touching the
//! device. Tensors hold no engine reference, so one tensor can move between
//! engines only through its host copy.
//!
//! ```rust
//! use weft_core::{assign, Engine, Tensor};
//!
//! # fn main() -> weft_core::Result<()> {
//! let engine = Engine::new();
//! let a = Tensor::from_slice(&[4], &[1.0f32, 2.0, 3.0, 4.0])?;
//! let out = Tensor::<f32>::new(&[4]);
//! assign(&engine, &out, a.as_expr().scale(10.0))?;
//! assert_eq!(out.to_vec(&engine)?, vec![10.0, 20.0, 30.0, 40.0]);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use weft_accel::{AccelDevice, Registry, SimDevice};

use crate::metrics::MetricsSink;

/// One device, its probed capability registry, and this engine's metrics.
pub struct Engine {
    device: Arc<RwLock<Box<dyn AccelDevice>>>,
    registry: Registry,
    metrics: Arc<MetricsSink>,
}

impl Engine {
    /// Engine over the in-process reference device.
    #[tracing::instrument]
    pub fn new() -> Self {
        Self::with_device(Box::new(SimDevice::new()))
    }

    /// Engine over a caller-provided device.
    ///
    /// The capability registry is probed here, once. Devices must not change
    /// their export list afterwards; routing trusts this snapshot.
    pub fn with_device(device: Box<dyn AccelDevice>) -> Self {
        let registry = Registry::probe(device.as_ref());
        tracing::info!(
            device = device.name(),
            routines = registry.len(),
            "engine_initialized"
        );
        Self {
            device: Arc::new(RwLock::new(device)),
            registry,
            metrics: Arc::new(MetricsSink::new()),
        }
    }

    /// Capability registry probed at construction.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// This engine's metrics sink.
    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// Name of the underlying device.
    pub fn device_name(&self) -> &'static str {
        self.device.read().name()
    }

    pub(crate) fn device(&self) -> &Arc<RwLock<Box<dyn AccelDevice>>> {
        &self.device
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.metrics.snapshot().log();
        tracing::debug!("engine dropped");
    }
}
