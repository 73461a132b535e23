//! Host/accelerator memory coherence
//!
//! Each tensor store carries a mirror record: an optional device buffer plus
//! two validity flags. The flags move through four states:
//!
//! ```text
//!                   host write            accel write
//!   Invalid ─────────────────► HostOnly ◄───────────── AccelOnly
//!                                 │                        │
//!                     ensure_accel│            ensure_host │
//!                                 ▼                        ▼
//!                              BothValid ◄────────────────┘
//! ```
//!
//! `ensure_*` transfers at most once: a request for a side that is already
//! valid is a no-op, and a transfer marks the destination valid without
//! invalidating the source. Writes are what invalidate the opposite side.
//! The device buffer is allocated on first accelerator use and released when
//! the last handle to the store drops, or earlier via [`Tensor::accel_evict`].
//!
//! Lock order is always store before device.

use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::RwLock;
use weft_accel::{AccelDevice, DeviceBuffer};
use weft_num::Element;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::metrics::TransferDirection;
use crate::tensor::Tensor;

/// Which copies of a tensor's value are current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoherenceStatus {
    /// Nothing written yet. Only freshly constructed tensors are here.
    Invalid,
    /// The host buffer holds the value; no current device copy.
    HostOnly,
    /// The device buffer holds the value; the host copy is stale.
    AccelOnly,
    /// Both buffers hold the value.
    BothValid,
}

/// Device-side mirror state of one store.
#[derive(Debug)]
pub(crate) struct Mirror {
    /// Device buffer, allocated on first accelerator use.
    pub(crate) buffer: Option<DeviceBuffer>,
    /// Device that owns `buffer`; consulted when the store drops.
    pub(crate) device: Weak<RwLock<Box<dyn AccelDevice>>>,
    pub(crate) host_valid: bool,
    pub(crate) accel_valid: bool,
}

impl Mirror {
    fn new() -> Self {
        Self {
            buffer: None,
            device: Weak::new(),
            host_valid: false,
            accel_valid: false,
        }
    }

    pub(crate) fn status(&self) -> CoherenceStatus {
        match (self.host_valid, self.accel_valid) {
            (false, false) => CoherenceStatus::Invalid,
            (true, false) => CoherenceStatus::HostOnly,
            (false, true) => CoherenceStatus::AccelOnly,
            (true, true) => CoherenceStatus::BothValid,
        }
    }

    /// The host buffer was just written: it becomes the only valid copy.
    pub(crate) fn host_written(&mut self) {
        self.host_valid = true;
        self.accel_valid = false;
    }

    /// The device buffer was just written: it becomes the only valid copy.
    pub(crate) fn accel_written(&mut self) {
        self.accel_valid = true;
        self.host_valid = false;
    }
}

/// Shared storage behind tensor handles: host buffer plus device mirror.
pub(crate) struct Store<T: Element> {
    pub(crate) host: Vec<T>,
    pub(crate) mirror: Mirror,
}

impl<T: Element> Store<T> {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            host: vec![T::ZERO; size],
            mirror: Mirror::new(),
        }
    }
}

impl<T: Element> Drop for Store<T> {
    fn drop(&mut self) {
        // Last handle gone: release the mirror if the device still exists.
        if let Some(buffer) = self.mirror.buffer.take() {
            if let Some(device) = self.mirror.device.upgrade() {
                if device.write().free(buffer).is_ok() {
                    tracing::debug!(buffer = %buffer, "device_mirror_released");
                }
            }
        }
    }
}

impl<T: Element> Tensor<T> {
    /// True when the host buffer holds the current value.
    pub fn is_host_up_to_date(&self) -> bool {
        self.store.read().mirror.host_valid
    }

    /// True when the device buffer holds the current value.
    pub fn is_accel_up_to_date(&self) -> bool {
        self.store.read().mirror.accel_valid
    }

    /// Current coherence state.
    pub fn coherence_status(&self) -> CoherenceStatus {
        self.store.read().mirror.status()
    }

    /// Handle of the device mirror, if one has been allocated.
    pub fn accel_handle(&self) -> Option<DeviceBuffer> {
        self.store.read().mirror.buffer
    }

    /// Mark the device copy stale after an out-of-band host write.
    pub fn invalidate_accel(&self) {
        self.store.write().mirror.host_written();
    }

    /// Mark the host copy stale after an out-of-band device write.
    pub fn invalidate_host(&self) {
        self.store.write().mirror.accel_written();
    }

    /// Make the host copy current, transferring from the device if it alone
    /// holds the value. No-op in every other state.
    pub fn ensure_host_up_to_date(&self, engine: &Engine) -> Result<()> {
        let mut store = self.store.write();
        if store.mirror.host_valid || !store.mirror.accel_valid {
            return Ok(());
        }
        let buffer = store
            .mirror
            .buffer
            .ok_or_else(|| Error::invalid_operation("device copy marked valid without a buffer"))?;

        let started = Instant::now();
        let Store { host, mirror } = &mut *store;
        engine
            .device()
            .read()
            .read(buffer, 0, bytemuck::cast_slice_mut(host.as_mut_slice()))?;
        mirror.host_valid = true;

        let bytes = host.len() * std::mem::size_of::<T>();
        engine
            .metrics()
            .record_transfer(TransferDirection::DeviceToHost, bytes);
        tracing::debug!(
            direction = TransferDirection::DeviceToHost.name(),
            bytes,
            duration_us = started.elapsed().as_micros() as u64,
            "tensor_transfer"
        );
        Ok(())
    }

    /// Make the device copy current, allocating the mirror on first use and
    /// uploading the host value if the host alone holds it.
    pub fn ensure_accel_up_to_date(&self, engine: &Engine) -> Result<()> {
        let mut store = self.store.write();
        if store.mirror.accel_valid {
            return Ok(());
        }
        let buffer = allocate_mirror(&mut store, engine, self.size())?;
        if store.mirror.host_valid {
            let started = Instant::now();
            engine
                .device()
                .write()
                .write(buffer, 0, bytemuck::cast_slice(store.host.as_slice()))?;
            store.mirror.accel_valid = true;

            let bytes = store.host.len() * std::mem::size_of::<T>();
            engine
                .metrics()
                .record_transfer(TransferDirection::HostToDevice, bytes);
            tracing::debug!(
                direction = TransferDirection::HostToDevice.name(),
                bytes,
                duration_us = started.elapsed().as_micros() as u64,
                "tensor_transfer"
            );
        }
        Ok(())
    }

    /// Allocate the device mirror without transferring. Used when the device
    /// copy is about to be overwritten in full.
    pub fn ensure_accel_allocated(&self, engine: &Engine) -> Result<()> {
        let mut store = self.store.write();
        allocate_mirror(&mut store, engine, self.size())?;
        Ok(())
    }

    /// Overwrite the device mirror from host data without touching the host
    /// buffer. The device becomes the only valid copy.
    pub fn write_accel_from_slice(&self, engine: &Engine, data: &[T]) -> Result<()> {
        if data.len() != self.size() {
            return Err(Error::size_mismatch("device write", self.size(), data.len()));
        }
        let mut store = self.store.write();
        let buffer = allocate_mirror(&mut store, engine, self.size())?;
        engine
            .device()
            .write()
            .write(buffer, 0, bytemuck::cast_slice(data))?;
        store.mirror.accel_written();

        let bytes = std::mem::size_of_val(data);
        engine
            .metrics()
            .record_transfer(TransferDirection::HostToDevice, bytes);
        Ok(())
    }

    /// Release the device mirror.
    ///
    /// # Panics
    ///
    /// Panics when the device buffer is the only valid copy: evicting it would
    /// silently lose data, and a caller doing so has a sequencing bug.
    pub fn accel_evict(&self, engine: &Engine) -> Result<()> {
        let mut store = self.store.write();
        if store.mirror.accel_valid && !store.mirror.host_valid {
            panic!(
                "accel_evict would discard the only valid copy of a {}-element tensor",
                self.size()
            );
        }
        if let Some(buffer) = store.mirror.buffer.take() {
            store.mirror.accel_valid = false;
            store.mirror.device = Weak::new();
            engine.device().write().free(buffer)?;
            tracing::debug!(buffer = %buffer, "device_mirror_evicted");
        }
        Ok(())
    }
}

fn allocate_mirror<T: Element>(
    store: &mut Store<T>,
    engine: &Engine,
    size: usize,
) -> Result<DeviceBuffer> {
    if let Some(buffer) = store.mirror.buffer {
        return Ok(buffer);
    }
    let bytes = size * std::mem::size_of::<T>();
    let buffer = engine.device().write().allocate(bytes)?;
    store.mirror.buffer = Some(buffer);
    store.mirror.device = Arc::downgrade(engine.device());
    tracing::debug!(buffer = %buffer, bytes, "device_mirror_allocated");
    Ok(buffer)
}
