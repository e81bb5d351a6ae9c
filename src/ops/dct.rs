// ============================================================================
// TRANSFORMS: 2-D orthonormal DCT-II / DCT-III and the identity
// ============================================================================
//
// Each 1-D pass is a direct basis-matrix product, O(n²) per line, so a whole
// `w × h` transform costs O(w·h·(w + h)) multiply-adds.  Sync runs one per
// stroke: about 2.7e8 for 512×512.
// TODO: switch the line pass to an FFT-based DCT for large canvases.

use rayon::prelude::*;
use std::f64::consts::PI;

use crate::error::{EngineError, EngineResult};

/// A whole-grid transform used to keep two canvases in sync.
pub trait GridTransform {
    fn name(&self) -> &'static str;

    /// Transform a row-major `width × height` grid into a new grid of the
    /// same dimensions.
    fn transform(&self, input: &[f32], width: usize, height: usize) -> EngineResult<Vec<f32>>;
}

/// Spatial → frequency.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dct2;

/// Frequency → spatial.
#[derive(Clone, Copy, Debug, Default)]
pub struct InverseDct2;

/// Copies the grid unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl GridTransform for Dct2 {
    fn name(&self) -> &'static str {
        "dct"
    }

    fn transform(&self, input: &[f32], width: usize, height: usize) -> EngineResult<Vec<f32>> {
        separable(input, width, height, Direction::Forward)
    }
}

impl GridTransform for InverseDct2 {
    fn name(&self) -> &'static str {
        "idct"
    }

    fn transform(&self, input: &[f32], width: usize, height: usize) -> EngineResult<Vec<f32>> {
        separable(input, width, height, Direction::Inverse)
    }
}

impl GridTransform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn transform(&self, input: &[f32], width: usize, height: usize) -> EngineResult<Vec<f32>> {
        check_len(input, width, height)?;
        Ok(input.to_vec())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Inverse,
}

fn check_len(input: &[f32], width: usize, height: usize) -> EngineResult<()> {
    let expected = width * height;
    if input.len() != expected {
        return Err(EngineError::Shape { expected, actual: input.len() });
    }
    Ok(())
}

/// Orthonormal DCT-II basis, `basis[k * n + i] = c(k) · cos(π(2i+1)k / 2n)`
/// with `c(0) = √(1/n)` and `c(k) = √(2/n)`.
fn basis(n: usize) -> Vec<f64> {
    let dc = (1.0 / n as f64).sqrt();
    let ac = (2.0 / n as f64).sqrt();
    let mut table = vec![0.0; n * n];
    for k in 0..n {
        let scale = if k == 0 { dc } else { ac };
        for i in 0..n {
            table[k * n + i] = scale * (PI * (2 * i + 1) as f64 * k as f64 / (2 * n) as f64).cos();
        }
    }
    table
}

/// One 1-D pass over `line` in place.
fn transform_line(line: &mut [f64], table: &[f64], scratch: &mut Vec<f64>, dir: Direction) {
    let n = line.len();
    scratch.clear();
    scratch.extend_from_slice(line);
    match dir {
        Direction::Forward => {
            for (k, out) in line.iter_mut().enumerate() {
                let row = &table[k * n..(k + 1) * n];
                *out = row.iter().zip(scratch.iter()).map(|(b, x)| b * x).sum();
            }
        }
        Direction::Inverse => {
            for (i, out) in line.iter_mut().enumerate() {
                *out = (0..n).map(|k| table[k * n + i] * scratch[k]).sum();
            }
        }
    }
}

/// Apply the 1-D pass to every row, in parallel.
fn transform_rows(data: &mut [f64], width: usize, dir: Direction) {
    let table = basis(width);
    data.par_chunks_mut(width).for_each_init(
        || Vec::with_capacity(width),
        |scratch, row| transform_line(row, &table, scratch, dir),
    );
}

fn transpose(data: &[f64], width: usize, height: usize) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = data[y * width + x];
        }
    }
    out
}

/// Rows, then columns (as rows of the transposed grid).  Accumulates in f64.
fn separable(input: &[f32], width: usize, height: usize, dir: Direction) -> EngineResult<Vec<f32>> {
    check_len(input, width, height)?;
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let mut data: Vec<f64> = input.iter().map(|&v| f64::from(v)).collect();
    transform_rows(&mut data, width, dir);
    let mut columns = transpose(&data, width, height);
    transform_rows(&mut columns, height, dir);
    let data = transpose(&columns, height, width);

    Ok(data.into_iter().map(|v| v as f32).collect())
}
