//! Host-memory reference device
//!
//! `SimDevice` keeps every "device" buffer in a `HashMap<u64, Vec<u8>>` and
//! computes routines on the host, so the full transfer/launch protocol can be
//! exercised without hardware. It exports the real-typed routines only; the
//! complex entries are deliberately absent so dispatch fallback paths stay
//! covered in tests.
//!
//! The launch implementation gathers strided inputs into owned vectors before
//! writing the output, so calls where the output aliases an input are safe.

use std::collections::HashMap;

use weft_num::{DType, Element};

use crate::device::{AccelDevice, DeviceBuffer};
use crate::error::{DeviceError, Result};
use crate::routine::{BufferArg, CallArgs, RoutineId, RoutineKind};

/// In-process device backed by host memory.
#[derive(Debug)]
pub struct SimDevice {
    buffers: HashMap<u64, Vec<u8>>,
    next_id: u64,
    exports: Vec<RoutineId>,
}

impl SimDevice {
    /// Create a device exporting every routine kind over `f32` and `f64`.
    pub fn new() -> Self {
        let mut exports = Vec::with_capacity(RoutineKind::ALL.len() * 2);
        for kind in RoutineKind::ALL {
            exports.push(RoutineId::new(kind, DType::F32));
            exports.push(RoutineId::new(kind, DType::F64));
        }
        Self::with_exports(exports)
    }

    /// Create a device exporting exactly the given routines.
    ///
    /// Used in tests to force specific operations down the host fallback.
    pub fn with_exports(exports: Vec<RoutineId>) -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 1,
            exports,
        }
    }

    /// Number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Total bytes held by live buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.buffers.values().map(|b| b.len()).sum()
    }

    fn bytes(&self, buffer: DeviceBuffer) -> Result<&Vec<u8>> {
        self.buffers
            .get(&buffer.id())
            .ok_or(DeviceError::InvalidHandle(buffer.id()))
    }

    fn bytes_mut(&mut self, buffer: DeviceBuffer) -> Result<&mut Vec<u8>> {
        self.buffers
            .get_mut(&buffer.id())
            .ok_or(DeviceError::InvalidHandle(buffer.id()))
    }

    /// Byte length a strided operand spans, from the start of the buffer.
    fn span_bytes<T>(n: usize, arg: &BufferArg) -> usize {
        if n == 0 {
            0
        } else {
            (arg.offset + (n - 1) * arg.stride + 1) * std::mem::size_of::<T>()
        }
    }

    /// Gather a strided operand into an owned vector.
    fn gather<T: Element>(&self, n: usize, arg: &BufferArg) -> Result<Vec<T>> {
        let bytes = self.bytes(arg.buffer)?;
        let span = Self::span_bytes::<T>(n, arg);
        if span > bytes.len() {
            return Err(DeviceError::OutOfBounds {
                offset: arg.offset * std::mem::size_of::<T>(),
                size: span,
                buffer_size: bytes.len(),
            });
        }
        let elem = std::mem::size_of::<T>();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let start = (arg.offset + i * arg.stride) * elem;
            out.push(bytemuck::pod_read_unaligned(&bytes[start..start + elem]));
        }
        Ok(out)
    }

    /// Scatter computed values into a strided output operand.
    fn scatter<T: Element>(&mut self, values: &[T], arg: &BufferArg) -> Result<()> {
        let span = Self::span_bytes::<T>(values.len(), arg);
        let bytes = self.bytes_mut(arg.buffer)?;
        if span > bytes.len() {
            return Err(DeviceError::OutOfBounds {
                offset: arg.offset * std::mem::size_of::<T>(),
                size: span,
                buffer_size: bytes.len(),
            });
        }
        let elem = std::mem::size_of::<T>();
        for (i, v) in values.iter().enumerate() {
            let start = (arg.offset + i * arg.stride) * elem;
            bytes[start..start + elem].copy_from_slice(bytemuck::bytes_of(v));
        }
        Ok(())
    }

    fn launch_typed<T: Element>(&mut self, routine: RoutineId, args: &CallArgs) -> Result<()> {
        let alpha = T::from_scalar_value(args.alpha)
            .ok_or_else(|| DeviceError::scalar_type_mismatch(T::DTYPE, args.alpha.dtype()))?;
        let beta = T::from_scalar_value(args.beta)
            .ok_or_else(|| DeviceError::scalar_type_mismatch(T::DTYPE, args.beta.dtype()))?;

        let expected = routine.kind.operand_count();
        if args.inputs.len() != expected {
            return Err(DeviceError::malformed(format!(
                "routine {} takes {} operands, got {}",
                routine,
                expected,
                args.inputs.len()
            )));
        }

        // Inputs are materialized before the output is touched, so aliasing
        // the output buffer with an input is well-defined.
        let result: Vec<T> = match routine.kind {
            RoutineKind::Add | RoutineKind::Sub | RoutineKind::Mul | RoutineKind::Div | RoutineKind::Axpby => {
                let a = self.gather::<T>(args.n, &args.inputs[0])?;
                let b = self.gather::<T>(args.n, &args.inputs[1])?;
                match routine.kind {
                    RoutineKind::Add => a.iter().zip(&b).map(|(&x, &y)| x + y).collect(),
                    RoutineKind::Sub => a.iter().zip(&b).map(|(&x, &y)| x - y).collect(),
                    RoutineKind::Mul => a.iter().zip(&b).map(|(&x, &y)| x * y).collect(),
                    RoutineKind::Div => a.iter().zip(&b).map(|(&x, &y)| x / y).collect(),
                    _ => a
                        .iter()
                        .zip(&b)
                        .map(|(&x, &y)| alpha * x + beta * y)
                        .collect(),
                }
            }
            RoutineKind::Scale => {
                let a = self.gather::<T>(args.n, &args.inputs[0])?;
                a.iter().map(|&x| alpha * x).collect()
            }
            RoutineKind::Softplus => {
                let a = self.gather::<T>(args.n, &args.inputs[0])?;
                a.iter().map(|&x| (alpha * x).softplus()).collect()
            }
        };

        self.scatter(&result, &args.output)
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelDevice for SimDevice {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn exports(&self) -> Vec<RoutineId> {
        self.exports.clone()
    }

    fn allocate(&mut self, bytes: usize) -> Result<DeviceBuffer> {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(id, vec![0u8; bytes]);
        tracing::debug!(buffer_id = id, size = bytes, "sim_allocate");
        Ok(DeviceBuffer::new(id))
    }

    fn free(&mut self, buffer: DeviceBuffer) -> Result<()> {
        match self.buffers.remove(&buffer.id()) {
            Some(bytes) => {
                tracing::debug!(buffer_id = buffer.id(), size = bytes.len(), "sim_free");
                Ok(())
            }
            None => Err(DeviceError::InvalidHandle(buffer.id())),
        }
    }

    fn write(&mut self, buffer: DeviceBuffer, offset: usize, data: &[u8]) -> Result<()> {
        let bytes = self.bytes_mut(buffer)?;
        let end = offset + data.len();
        if end > bytes.len() {
            return Err(DeviceError::OutOfBounds {
                offset,
                size: data.len(),
                buffer_size: bytes.len(),
            });
        }
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, buffer: DeviceBuffer, offset: usize, out: &mut [u8]) -> Result<()> {
        let bytes = self.bytes(buffer)?;
        let end = offset + out.len();
        if end > bytes.len() {
            return Err(DeviceError::OutOfBounds {
                offset,
                size: out.len(),
                buffer_size: bytes.len(),
            });
        }
        out.copy_from_slice(&bytes[offset..end]);
        Ok(())
    }

    fn buffer_size(&self, buffer: DeviceBuffer) -> Result<usize> {
        Ok(self.bytes(buffer)?.len())
    }

    #[tracing::instrument(skip(self, args), fields(routine = %routine, n = args.n))]
    fn launch(&mut self, routine: RoutineId, args: &CallArgs) -> Result<()> {
        if !self.exports.contains(&routine) {
            return Err(DeviceError::UnsupportedRoutine(routine));
        }
        match routine.dtype {
            DType::F32 => self.launch_typed::<f32>(routine, args),
            DType::F64 => self.launch_typed::<f64>(routine, args),
            DType::Complex32 => self.launch_typed::<weft_num::Complex<f32>>(routine, args),
            DType::Complex64 => self.launch_typed::<weft_num::Complex<f64>>(routine, args),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
