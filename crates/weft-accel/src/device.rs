//! The pluggable accelerator device interface
//!
//! A device owns a set of byte-addressed buffers behind opaque handles and an
//! optional catalog of compute routines. The engine never touches device
//! memory directly: every access goes through [`AccelDevice`] methods, and
//! every compute launch names a routine the device advertised in
//! [`AccelDevice::exports`].

use std::any::Any;

use crate::error::Result;
use crate::routine::{CallArgs, RoutineId};

/// Handle to a device-resident buffer
///
/// Buffers are opaque handles managed by the device.
/// Use [`AccelDevice`] methods to interact with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceBuffer(pub u64);

impl DeviceBuffer {
    /// Create a new device buffer handle
    pub const fn new(id: u64) -> Self {
        DeviceBuffer(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

/// An accelerator device: buffer storage plus optionally-exported routines.
///
/// # Contract
///
/// - `exports` is stable for the lifetime of the device; the capability
///   registry is built from it exactly once.
/// - `launch` must only be called with a routine contained in `exports`;
///   devices return [`DeviceError::UnsupportedRoutine`] otherwise.
/// - Transfers are synchronous: when `write`/`read`/`launch` return, the
///   effect is observable through subsequent calls. A queued hardware backend
///   must flush before returning.
///
/// [`DeviceError::UnsupportedRoutine`]: crate::error::DeviceError::UnsupportedRoutine
///
/// # Example
///
/// ```text
/// let mut device = SimDevice::new();
/// let buf = device.allocate(1024)?;
/// device.write(buf, 0, &bytes)?;
/// device.launch(routine, &args)?;
/// device.read(buf, 0, &mut out)?;
/// device.free(buf)?;
/// ```
pub trait AccelDevice: Send + Sync {
    /// Human-readable device name (used in logs).
    fn name(&self) -> &'static str;

    /// The routines this device exports. Probed once at engine construction.
    fn exports(&self) -> Vec<RoutineId>;

    /// Allocate a zero-initialized buffer of `bytes` bytes.
    fn allocate(&mut self, bytes: usize) -> Result<DeviceBuffer>;

    /// Release a buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or already freed.
    fn free(&mut self, buffer: DeviceBuffer) -> Result<()>;

    /// Copy host bytes into the buffer at a byte offset.
    fn write(&mut self, buffer: DeviceBuffer, offset: usize, data: &[u8]) -> Result<()>;

    /// Copy bytes out of the buffer at a byte offset.
    fn read(&self, buffer: DeviceBuffer, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Size of an allocated buffer in bytes.
    fn buffer_size(&self, buffer: DeviceBuffer) -> Result<usize>;

    /// Run one routine over device-resident operands.
    fn launch(&mut self, routine: RoutineId, args: &CallArgs) -> Result<()>;

    /// Downcasting support for device-specific access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting support for device-specific access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
