//! Aliased assignment targets
//!
//! `Tensor` is a shared handle, so the target of an assignment can also
//! appear on the right-hand side. The dispatcher materializes each aliased
//! leaf into scratch storage before any element of the target is written,
//! which keeps `a = f(a, ...)` equivalent to evaluating `f` over a snapshot
//! of `a`.

use weft_core::{assign, assign_add, assign_mul, Engine, Result, SimDevice, Tensor};

fn host_only_engine() -> Engine {
    Engine::with_device(Box::new(SimDevice::with_exports(Vec::new())))
}

#[test]
fn test_self_add_reads_original_values() -> Result<()> {
    let engine = host_only_engine();
    let a = Tensor::from_slice(&[4], &[1.0f64, 2.0, 3.0, 4.0])?;
    let alias = a.clone();

    // a += a * a, evaluated against the pre-assignment contents of a.
    assign_add(&engine, &a, &alias * &alias)?;

    assert_eq!(a.to_vec(&engine)?, vec![2.0, 6.0, 12.0, 20.0]);
    assert_eq!(engine.metrics().snapshot().temporaries, 2);
    Ok(())
}

#[test]
fn test_replace_with_alias_in_source() -> Result<()> {
    let engine = host_only_engine();
    let a = Tensor::from_slice(&[2], &[1.0f64, 2.0])?;
    let alias = a.clone();
    let c = Tensor::from_slice(&[2], &[10.0f64, 20.0])?;

    assign(&engine, &a, &alias + &c)?;

    assert_eq!(a.to_vec(&engine)?, vec![11.0, 22.0]);
    assert_eq!(engine.metrics().snapshot().temporaries, 1);
    Ok(())
}

#[test]
fn test_aliased_source_on_device_path() -> Result<()> {
    let engine = Engine::new();
    let a = Tensor::from_slice(&[2], &[2.0f32, 3.0])?;
    let alias = a.clone();
    let c = Tensor::from_slice(&[2], &[10.0f32, 10.0])?;

    // a *= a + c. The scratch copy keeps the routine's inputs stable while
    // the combine step rewrites a in place.
    assign_mul(&engine, &a, &alias + &c)?;

    assert_eq!(a.to_vec(&engine)?, vec![24.0, 39.0]);
    let snapshot = engine.metrics().snapshot();
    assert_eq!(snapshot.accel_assignments, 1);
    assert_eq!(snapshot.temporaries, 1);
    Ok(())
}

#[test]
fn test_alias_matches_explicit_copy() -> Result<()> {
    let engine = host_only_engine();
    let data = [0.5f64, -1.25, 3.0, 8.0];

    let a = Tensor::from_slice(&[4], &data)?;
    let alias = a.clone();
    assign(&engine, &a, (&alias - &alias).offset_by(1.0) * &alias)?;

    let b = Tensor::from_slice(&[4], &data)?;
    let b_copy = Tensor::from_slice(&[4], &data)?;
    assign(&engine, &b, (&b_copy - &b_copy).offset_by(1.0) * &b_copy)?;

    assert_eq!(a.to_vec(&engine)?, b.to_vec(&engine)?);
    Ok(())
}

#[test]
fn test_unaliased_sources_skip_scratch() -> Result<()> {
    let engine = host_only_engine();
    let a = Tensor::from_slice(&[4], &[1.0f64, 2.0, 3.0, 4.0])?;
    let b = Tensor::from_slice(&[4], &[5.0f64, 6.0, 7.0, 8.0])?;
    let out = Tensor::<f64>::new(&[4]);

    assign(&engine, &out, &a + &b)?;

    assert_eq!(engine.metrics().snapshot().temporaries, 0);
    Ok(())
}
