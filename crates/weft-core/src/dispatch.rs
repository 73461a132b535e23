//! Assignment dispatch
//!
//! The five `assign*` entry points are the only way expression values reach
//! tensor storage. Each runs the same sequence:
//!
//! ```text
//!   validate tree ──► interpose aliases ──► pre-assignment passes
//!        ──► device route? ──yes──► launch routines, invalidate host copy
//!               │no
//!               ▼
//!        pick host strategy (parallel / grouped / scalar) ──► run kernel
//! ```
//!
//! The device route is taken only when the tree's root operator maps to one
//! registered routine, every operand is direct, and (for compound kinds) the
//! combining operator is registered too. Anything else runs on the host; a
//! probe miss is a routing decision, never an error.
//!
//! Alias interposition keeps the kernels honest: any leaf sharing the
//! target's store is wrapped in a temporary first, so kernels never read a
//! buffer they are writing.

use std::time::Instant;

use weft_accel::{BufferArg, CallArgs, RoutineKind};
use weft_num::{Element, GROUP_WIDTH};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::expr::{Expr, TempNode};
use crate::kernel::{self, SliceTable};
use crate::metrics::AssignMetrics;
use crate::pipeline::{self, EvalContext};
use crate::shim;
use crate::tensor::Tensor;

/// Elements per parallel partition.
pub const PARALLEL_CHUNK_SIZE: usize = 3072;

/// Element count above which assignments are partitioned across the worker
/// pool.
pub const PARALLEL_THRESHOLD: usize = 10_000;

/// The combining operator of one assignment statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignKind {
    /// `target = expr`
    Replace,
    /// `target += expr`
    Add,
    /// `target -= expr`
    Sub,
    /// `target *= expr`
    Mul,
    /// `target /= expr`
    Div,
}

impl AssignKind {
    pub(crate) fn combine<T: Element>(self, old: T, new: T) -> T {
        match self {
            AssignKind::Replace => new,
            AssignKind::Add => old + new,
            AssignKind::Sub => old - new,
            AssignKind::Mul => old * new,
            AssignKind::Div => old / new,
        }
    }

    /// Device routine implementing the compound combine, if the statement
    /// needs one.
    pub(crate) fn combine_routine(self) -> Option<RoutineKind> {
        match self {
            AssignKind::Replace => None,
            AssignKind::Add => Some(RoutineKind::Add),
            AssignKind::Sub => Some(RoutineKind::Sub),
            AssignKind::Mul => Some(RoutineKind::Mul),
            AssignKind::Div => Some(RoutineKind::Div),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssignKind::Replace => "replace",
            AssignKind::Add => "add",
            AssignKind::Sub => "sub",
            AssignKind::Mul => "mul",
            AssignKind::Div => "div",
        }
    }
}

impl std::fmt::Display for AssignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Execution strategy the dispatcher selected for one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Routines launched on the accelerator.
    Accel,
    /// Host kernel partitioned across the worker pool.
    Parallel,
    /// Host kernel over fixed-width element groups.
    Vectorized,
    /// Host kernel one element at a time.
    Scalar,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Accel => "accel",
            Strategy::Parallel => "parallel",
            Strategy::Vectorized => "vectorized",
            Strategy::Scalar => "scalar",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host strategy for `n` elements.
pub(crate) fn select_strategy(n: usize, grouped: bool, thread_safe: bool) -> Strategy {
    if thread_safe && n > PARALLEL_THRESHOLD {
        Strategy::Parallel
    } else if grouped && n >= GROUP_WIDTH {
        Strategy::Vectorized
    } else {
        Strategy::Scalar
    }
}

/// `target = expr`
#[tracing::instrument(skip_all, fields(n = target.size(), element = std::any::type_name::<T>()))]
pub fn assign<'a, T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: impl Into<Expr<'a, T>>,
) -> Result<()> {
    dispatch(engine, target, expr.into(), AssignKind::Replace)
}

/// `target += expr`
#[tracing::instrument(skip_all, fields(n = target.size(), element = std::any::type_name::<T>()))]
pub fn assign_add<'a, T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: impl Into<Expr<'a, T>>,
) -> Result<()> {
    dispatch(engine, target, expr.into(), AssignKind::Add)
}

/// `target -= expr`
#[tracing::instrument(skip_all, fields(n = target.size(), element = std::any::type_name::<T>()))]
pub fn assign_sub<'a, T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: impl Into<Expr<'a, T>>,
) -> Result<()> {
    dispatch(engine, target, expr.into(), AssignKind::Sub)
}

/// `target *= expr`
#[tracing::instrument(skip_all, fields(n = target.size(), element = std::any::type_name::<T>()))]
pub fn assign_mul<'a, T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: impl Into<Expr<'a, T>>,
) -> Result<()> {
    dispatch(engine, target, expr.into(), AssignKind::Mul)
}

/// `target /= expr`
#[tracing::instrument(skip_all, fields(n = target.size(), element = std::any::type_name::<T>()))]
pub fn assign_div<'a, T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: impl Into<Expr<'a, T>>,
) -> Result<()> {
    dispatch(engine, target, expr.into(), AssignKind::Div)
}

fn dispatch<T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: Expr<'_, T>,
    kind: AssignKind,
) -> Result<()> {
    let started = Instant::now();

    expr.validate()?;
    if expr.size() != target.size() {
        return Err(Error::size_mismatch("assignment", target.size(), expr.size()));
    }

    let mut ctx = EvalContext::new();
    let expr = interpose_aliases(expr, target, &mut ctx);
    let expr = pipeline::prepare(engine, expr, &mut ctx)?;

    let strategy = match try_accel(engine, target, &expr, kind)? {
        Some(strategy) => strategy,
        None => host_assign(engine, target, &expr, kind)?,
    };

    engine.metrics().record_assignment(strategy, ctx.temporaries);
    AssignMetrics::new(kind, strategy, target.size(), ctx.temporaries, started).log();
    Ok(())
}

/// Wrap every source leaf sharing the target's store in a temporary, so no
/// kernel reads through the buffer it writes.
fn interpose_aliases<'a, T: Element>(
    expr: Expr<'a, T>,
    target: &Tensor<T>,
    ctx: &mut EvalContext,
) -> Expr<'a, T> {
    match expr {
        Expr::Leaf(t) if t.aliases(target) => {
            ctx.temporaries += 1;
            Expr::Temp(TempNode::covering(Expr::Leaf(t)))
        }
        Expr::Leaf(t) => Expr::Leaf(t),
        Expr::Temp(mut node) => {
            node.source = Box::new(interpose_aliases(*node.source, target, ctx));
            Expr::Temp(node)
        }
        Expr::View(mut view) => {
            view.sub = Box::new(interpose_aliases(*view.sub, target, ctx));
            Expr::View(view)
        }
        Expr::Composite(mut node) => {
            node.operands = node
                .operands
                .into_iter()
                .map(|operand| interpose_aliases(operand, target, ctx))
                .collect();
            Expr::Composite(node)
        }
    }
}

/// Try to route the assignment to the accelerator. `Ok(None)` means the tree
/// or the routine table disqualified it; nothing has been transferred or
/// written in that case.
fn try_accel<T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: &Expr<'_, T>,
    kind: AssignKind,
) -> Result<Option<Strategy>> {
    let Expr::Composite(node) = expr else {
        return Ok(None);
    };
    let Some((routine_kind, alpha, beta)) = node.func.accel_routine() else {
        return Ok(None);
    };
    let Some(routine) = engine.registry().lookup(routine_kind, T::DTYPE) else {
        return Ok(None);
    };
    let combine = match kind.combine_routine() {
        None => None,
        Some(combine_kind) => match engine.registry().lookup(combine_kind, T::DTYPE) {
            Some(found) => Some(found),
            None => return Ok(None),
        },
    };

    let mut parts = Vec::with_capacity(node.operands.len());
    for operand in &node.operands {
        match operand.direct_parts() {
            Some(p) => parts.push(p),
            None => return Ok(None),
        }
    }

    for (base, _, _) in &parts {
        base.ensure_accel_up_to_date(engine)?;
    }
    let mut inputs = Vec::with_capacity(parts.len());
    for (base, offset, _) in &parts {
        let handle = base.accel_handle().ok_or_else(missing_mirror)?;
        inputs.push(BufferArg::new(handle, *offset, 1));
    }
    let n = target.size();

    match combine {
        None => {
            target.ensure_accel_allocated(engine)?;
            let output = BufferArg::contiguous(target.accel_handle().ok_or_else(missing_mirror)?);
            shim::launch(
                engine,
                routine,
                &CallArgs {
                    n,
                    alpha,
                    beta,
                    inputs,
                    output,
                },
            )?;
        }
        Some(combine_routine) => {
            // The expression lands in device scratch first, then combines
            // with the target's current device value.
            let scratch = Tensor::<T>::with_order(target.dims(), target.order());
            scratch.ensure_accel_allocated(engine)?;
            let scratch_arg =
                BufferArg::contiguous(scratch.accel_handle().ok_or_else(missing_mirror)?);
            shim::launch(
                engine,
                routine,
                &CallArgs {
                    n,
                    alpha,
                    beta,
                    inputs,
                    output: scratch_arg,
                },
            )?;
            scratch.invalidate_host();

            target.ensure_accel_up_to_date(engine)?;
            let target_arg =
                BufferArg::contiguous(target.accel_handle().ok_or_else(missing_mirror)?);
            let one = T::ONE.scalar_value();
            shim::launch(
                engine,
                combine_routine,
                &CallArgs {
                    n,
                    alpha: one,
                    beta: one,
                    inputs: vec![target_arg, scratch_arg],
                    output: target_arg,
                },
            )?;
            // scratch's device buffer is released when it drops here
        }
    }

    target.invalidate_host();
    Ok(Some(Strategy::Accel))
}

fn missing_mirror() -> Error {
    Error::invalid_operation("device mirror missing after ensure")
}

/// Run the assignment through the host kernels, returning the strategy used.
fn host_assign<T: Element>(
    engine: &Engine,
    target: &Tensor<T>,
    expr: &Expr<'_, T>,
    kind: AssignKind,
) -> Result<Strategy> {
    let mut sources = Vec::new();
    kernel::direct_tensors(expr, &mut sources);
    debug_assert!(sources.iter().all(|t| !t.aliases(target)));

    for source in &sources {
        source.ensure_host_up_to_date(engine)?;
    }
    if kind != AssignKind::Replace {
        target.ensure_host_up_to_date(engine)?;
    }

    let grouped = T::VECTORIZABLE && kernel::uniform_order(&sources, target.order());
    let strategy = select_strategy(target.size(), grouped, expr.thread_safe());

    let guards: Vec<_> = sources.iter().map(|t| t.store.read()).collect();
    let mut table = SliceTable::new();
    for (source, guard) in sources.iter().zip(&guards) {
        table.insert(source.store_key(), guard.host.as_slice());
    }
    let node = kernel::build(expr, &table);

    let mut target_store = target.store.write();
    kernel::execute(
        target_store.host.as_mut_slice(),
        &node,
        kind,
        strategy,
        grouped,
    );
    target_store.mirror.host_written();

    Ok(strategy)
}
