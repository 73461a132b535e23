//! Accelerator device layer for the weft tensor engine
//!
//! This crate provides:
//! - **Device Trait**: [`AccelDevice`], the pluggable accelerator interface
//!   (buffer management plus optionally-exported compute routines)
//! - **Routine ABI**: [`RoutineKind`] / [`RoutineId`] / [`CallArgs`], the
//!   per-(operation, element-type) entry points and their argument marshalling
//! - **Capability Registry**: [`Registry`], built once per device by probing
//!   its export list
//! - **Sim Device**: [`SimDevice`], a host-memory reference device used for
//!   development and tests
//!
//! # Architecture
//!
//! ```text
//! weft-core dispatcher
//!       │  registry lookup → RoutineId or host fallback
//!       ▼
//! ┌────────────────────────────────────────────┐
//! │               AccelDevice                  │
//! │  allocate / free / read / write / launch   │
//! └──────┬──────────────────┬──────────────────┘
//!        ▼                  ▼
//!   ┌─────────┐       ┌───────────┐
//!   │   Sim   │       │  (native) │
//!   │ Device  │       │  devices  │
//!   └─────────┘       └───────────┘
//! ```
//!
//! Devices advertise which routines they export; a routine that is not
//! exported must never be launched. The engine enforces that rule through its
//! dispatch shim, and [`SimDevice::launch`] re-validates it.
//!
//! # Usage
//!
//! ```rust
//! use weft_accel::{AccelDevice, CallArgs, BufferArg, Registry, RoutineKind, SimDevice};
//! use weft_num::{DType, ScalarValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut device = SimDevice::new();
//! let registry = Registry::probe(&device);
//! assert!(registry.supports(RoutineKind::Axpby, DType::F32));
//!
//! // Upload two operands and run alpha*x + beta*y on the device.
//! let x = device.allocate(4 * 4)?;
//! let y = device.allocate(4 * 4)?;
//! let out = device.allocate(4 * 4)?;
//! device.write(x, 0, bytemuck::cast_slice(&[1.0f32, 2.0, 3.0, 4.0]))?;
//! device.write(y, 0, bytemuck::cast_slice(&[10.0f32, 20.0, 30.0, 40.0]))?;
//!
//! let routine = registry.lookup(RoutineKind::Axpby, DType::F32).unwrap();
//! let args = CallArgs::binary(
//!     4,
//!     ScalarValue::F32(2.0),
//!     ScalarValue::F32(1.0),
//!     BufferArg::contiguous(x),
//!     BufferArg::contiguous(y),
//!     BufferArg::contiguous(out),
//! );
//! device.launch(routine, &args)?;
//!
//! let mut result = [0.0f32; 4];
//! device.read(out, 0, bytemuck::cast_slice_mut(&mut result))?;
//! assert_eq!(result, [12.0, 24.0, 36.0, 48.0]);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod registry;
pub mod routine;
pub mod sim;

pub use device::{AccelDevice, DeviceBuffer};
pub use error::{DeviceError, Result};
pub use registry::Registry;
pub use routine::{BufferArg, CallArgs, RoutineId, RoutineKind};
pub use sim::SimDevice;
