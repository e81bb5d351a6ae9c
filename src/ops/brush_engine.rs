// ============================================================================
// BRUSH ENGINE: clip, pad and blend a kernel onto a canvas
// ============================================================================

use crate::canvas::{Canvas, Rect};
use crate::components::brush::{BrushKernel, BrushMode, MULTIPLY_PERCENT};
use crate::error::{EngineError, EngineResult};

/// Kernel-sized window over some backing buffer.
///
/// Kernel cell `(kx, ky)` lives at `data[origin + ky * stride + kx]`.  When
/// the kernel fits on the canvas the window aliases the canvas samples
/// directly; at edges it covers a zero-padded scratch buffer instead.
/// `live` is the part of the kernel (in kernel coordinates) backed by real
/// canvas cells; only those are read from and written back to the canvas.
struct KernelWindow<'a> {
    data: &'a mut [f32],
    origin: usize,
    stride: usize,
    live: Rect,
    /// Canvas position of the live area's top-left cell.
    canvas_at: (usize, usize),
}

impl KernelWindow<'_> {
    #[inline]
    fn index(&self, kx: usize, ky: usize) -> usize {
        self.origin + ky * self.stride + kx
    }
}

/// Top-left corner of the kernel footprint centered on `(x, y)`.
///
/// The footprint spans `[x - (size-1)/2, x + size/2]`; for even sizes the
/// extra cell falls on the high side.  Saturates at the `isize` limits.
#[inline]
pub fn footprint_origin(size: usize, x: isize, y: isize) -> (isize, isize) {
    let back = ((size - 1) / 2) as isize;
    (x.saturating_sub(back), y.saturating_sub(back))
}

/// Apply `kernel` to `canvas` centered on `(x, y)`.
///
/// Returns the clipped rectangle that may have changed, or `None` when the
/// footprint misses the canvas.  Arithmetic failures are logged and also
/// reported as `None`; the canvas is left untouched in that case.
pub fn apply_brush(canvas: &mut Canvas, kernel: &BrushKernel, x: isize, y: isize, inverse: bool) -> Option<Rect> {
    match try_apply_brush(canvas, kernel, x, y, inverse) {
        Ok(region) => region,
        Err(e) => {
            log::warn!(
                "brush {:?}{} at ({}, {}) on \"{}\" aborted: {}",
                kernel.mode(),
                if inverse { " (inverse)" } else { "" },
                x,
                y,
                canvas.name(),
                e
            );
            None
        }
    }
}

/// Fallible form of [`apply_brush`].
pub fn try_apply_brush(
    canvas: &mut Canvas,
    kernel: &BrushKernel,
    x: isize,
    y: isize,
    inverse: bool,
) -> EngineResult<Option<Rect>> {
    let size = kernel.size();
    let (col_start, row_start) = footprint_origin(size, x, y);
    let col_end = col_start.saturating_add(size as isize);
    let row_end = row_start.saturating_add(size as isize);
    let (width, height) = (canvas.width() as isize, canvas.height() as isize);

    log::trace!(
        "apply mode={:?} inverse={} size={} at ({}, {})",
        kernel.mode(),
        inverse,
        size,
        x,
        y
    );

    let (x0, y0) = (col_start.max(0), row_start.max(0));
    let (x1, y1) = (col_end.min(width), row_end.min(height));
    if x1 <= x0 || y1 <= y0 {
        return Ok(None);
    }

    // Part of the canvas under the footprint; this is what gets reported.
    let changed = Rect::from_min_max(x0 as usize, y0 as usize, x1 as usize, y1 as usize);
    // The same cells in kernel coordinates.
    let live = Rect::new(
        (changed.x as isize - col_start) as usize,
        (changed.y as isize - row_start) as usize,
        changed.width,
        changed.height,
    );

    let fits = changed.width == size && changed.height == size;
    log::trace!("changed={:?} fits={}", changed, fits);

    if fits {
        let stride = canvas.width();
        let mut window = KernelWindow {
            origin: changed.y * stride + changed.x,
            stride,
            data: canvas.samples_mut(),
            live,
            canvas_at: (changed.x, changed.y),
        };
        blend(&mut window, kernel, inverse)?;
    } else {
        let mut scratch = vec![0.0f32; size * size];
        copy_into_scratch(canvas, changed, &mut scratch, size, live);
        let mut window = KernelWindow {
            data: &mut scratch,
            origin: 0,
            stride: size,
            live,
            canvas_at: (changed.x, changed.y),
        };
        blend(&mut window, kernel, inverse)?;
        copy_from_scratch(&scratch, size, live, canvas, changed);
    }

    Ok(Some(changed))
}

fn copy_into_scratch(canvas: &Canvas, changed: Rect, scratch: &mut [f32], size: usize, live: Rect) {
    let stride = canvas.width();
    let src = canvas.samples();
    for row in 0..changed.height {
        let s = (changed.y + row) * stride + changed.x;
        let d = (live.y + row) * size + live.x;
        scratch[d..d + changed.width].copy_from_slice(&src[s..s + changed.width]);
    }
}

fn copy_from_scratch(scratch: &[f32], size: usize, live: Rect, canvas: &mut Canvas, changed: Rect) {
    let stride = canvas.width();
    let dst = canvas.samples_mut();
    for row in 0..changed.height {
        let s = (live.y + row) * size + live.x;
        let d = (changed.y + row) * stride + changed.x;
        dst[d..d + changed.width].copy_from_slice(&scratch[s..s + changed.width]);
    }
}

// ============================================================================
// BLEND STEP
// ============================================================================

/// Per-cell blend for a mode/direction: `(b, one_minus_alpha, product) -> b'`.
type CellOp = fn(f32, f32, f32) -> f32;

fn set_forward(b: f32, ia: f32, p: f32) -> f32 {
    b * ia + p
}

fn set_inverse(b: f32, ia: f32, _p: f32) -> f32 {
    b * ia
}

fn add_forward(b: f32, _ia: f32, p: f32) -> f32 {
    b + p
}

fn add_inverse(b: f32, _ia: f32, p: f32) -> f32 {
    b - p
}

fn multiply_forward(b: f32, ia: f32, p: f32) -> f32 {
    b * ia + b * p * MULTIPLY_PERCENT
}

/// Divide by the brush percentage: apply the forward blend to `1/b`, then
/// take the reciprocal of the result.
fn multiply_inverse(b: f32, ia: f32, p: f32) -> f32 {
    1.0 / multiply_forward(1.0 / b, ia, p)
}

fn cell_op(mode: BrushMode, inverse: bool) -> CellOp {
    match (mode, inverse) {
        (BrushMode::Set, false) => set_forward,
        (BrushMode::Set, true) => set_inverse,
        (BrushMode::Add, false) => add_forward,
        (BrushMode::Add, true) => add_inverse,
        (BrushMode::Multiply, false) => multiply_forward,
        (BrushMode::Multiply, true) => multiply_inverse,
    }
}

/// Run the blend over every kernel cell of `window`.
///
/// Validation happens before the first write, so an error leaves the window
/// untouched.
fn blend(window: &mut KernelWindow<'_>, kernel: &BrushKernel, inverse: bool) -> EngineResult<()> {
    let size = kernel.size();
    let ia = kernel.one_minus_alpha();
    let p = kernel.product();
    if ia.len() != size * size || p.len() != size * size {
        return Err(EngineError::Shape {
            expected: size * size,
            actual: ia.len().min(p.len()),
        });
    }

    if kernel.mode() == BrushMode::Multiply && inverse {
        check_divisible(window, kernel)?;
    }

    let op = cell_op(kernel.mode(), inverse);
    for ky in 0..size {
        for kx in 0..size {
            let k = ky * size + kx;
            let i = window.index(kx, ky);
            window.data[i] = op(window.data[i], ia[k], p[k]);
        }
    }
    Ok(())
}

/// Inverse Multiply divides twice; reject any live cell where either
/// division would hit zero.  Padding cells are discarded and not checked.
fn check_divisible(window: &KernelWindow<'_>, kernel: &BrushKernel) -> EngineResult<()> {
    let size = kernel.size();
    let ia = kernel.one_minus_alpha();
    let p = kernel.product();
    let live = window.live;
    for ky in live.y..live.max_y() {
        for kx in live.x..live.max_x() {
            let b = window.data[window.index(kx, ky)];
            let k = ky * size + kx;
            if b == 0.0 || multiply_forward(1.0 / b, ia[k], p[k]) == 0.0 {
                return Err(EngineError::DivisionByZero {
                    x: window.canvas_at.0 + kx - live.x,
                    y: window.canvas_at.1 + ky - live.y,
                });
            }
        }
    }
    Ok(())
}
