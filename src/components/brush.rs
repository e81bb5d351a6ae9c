use serde::{Deserialize, Serialize};

use crate::error::BrushError;

/// Percent scale applied by the Multiply mode: intensity 100 keeps a value.
pub const MULTIPLY_PERCENT: f32 = 0.01;

// ============================================================================
// SHAPE / MODE
// ============================================================================

/// Coverage profile of the brush kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushShape {
    #[default]
    Square,
    HardCircle,
    SoftCircle,
}

impl BrushShape {
    pub fn all() -> &'static [BrushShape] {
        &[BrushShape::Square, BrushShape::HardCircle, BrushShape::SoftCircle]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrushShape::Square => "Square",
            BrushShape::HardCircle => "Hard Circle",
            BrushShape::SoftCircle => "Soft Circle",
        }
    }

    /// Stable config key (matches the serde name).
    pub fn key(&self) -> &'static str {
        match self {
            BrushShape::Square => "square",
            BrushShape::HardCircle => "hard_circle",
            BrushShape::SoftCircle => "soft_circle",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, BrushError> {
        Self::all()
            .iter()
            .copied()
            .find(|s| s.key() == key)
            .ok_or_else(|| BrushError::UnknownShape(key.to_string()))
    }

    /// Convert to a stable u8 for compact storage
    pub fn to_u8(&self) -> u8 {
        match self {
            BrushShape::Square => 0,
            BrushShape::HardCircle => 1,
            BrushShape::SoftCircle => 2,
        }
    }

    /// Unknown codes are an error rather than a silent fallback.
    pub fn from_u8(v: u8) -> Result<Self, BrushError> {
        match v {
            0 => Ok(BrushShape::Square),
            1 => Ok(BrushShape::HardCircle),
            2 => Ok(BrushShape::SoftCircle),
            other => Err(BrushError::UnknownShape(other.to_string())),
        }
    }
}

/// How the kernel combines with the samples underneath.
///
/// Each mode has a forward effect (primary button) and an inverse one
/// (secondary button).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushMode {
    Set,
    #[default]
    Add,
    Multiply,
}

impl BrushMode {
    pub fn all() -> &'static [BrushMode] {
        &[BrushMode::Set, BrushMode::Add, BrushMode::Multiply]
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrushMode::Set => "Set / Zero",
            BrushMode::Add => "Add / Subtract",
            BrushMode::Multiply => "Multiply / Divide",
        }
    }

    pub fn forward_label(&self) -> &'static str {
        match self {
            BrushMode::Set => "Set pixel to value",
            BrushMode::Add => "Add value to pixel",
            BrushMode::Multiply => "Multiply by value %",
        }
    }

    pub fn inverse_label(&self) -> &'static str {
        match self {
            BrushMode::Set => "Set pixel to 0",
            BrushMode::Add => "Subtract value",
            BrushMode::Multiply => "Divide by value %",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            BrushMode::Set => "set",
            BrushMode::Add => "add",
            BrushMode::Multiply => "multiply",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, BrushError> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.key() == key)
            .ok_or_else(|| BrushError::UnknownMode(key.to_string()))
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// User-facing brush parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    /// Edge length of the square kernel in cells, at least 1.
    pub size: usize,
    pub shape: BrushShape,
    /// Value painted by Set, added by Add, percentage for Multiply.
    pub intensity: f32,
    pub mode: BrushMode,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            size: 1,
            shape: BrushShape::Square,
            intensity: 128.0,
            mode: BrushMode::Add,
        }
    }
}

impl BrushSettings {
    pub fn validate(&self) -> Result<(), BrushError> {
        if self.size < 1 {
            return Err(BrushError::InvalidSize(self.size));
        }
        Ok(())
    }
}

// ============================================================================
// KERNEL: the four derived size×size matrices
// ============================================================================

/// Weighted footprint derived from [`BrushSettings`].
///
/// All matrices are row-major `size × size`:
/// * `value`: intensity everywhere
/// * `alpha`: coverage in `[0, 1]`
/// * `one_minus_alpha`: `1 - alpha`
/// * `product`: `value * alpha`
#[derive(Clone, Debug, PartialEq)]
pub struct BrushKernel {
    size: usize,
    mode: BrushMode,
    value: Vec<f32>,
    alpha: Vec<f32>,
    one_minus_alpha: Vec<f32>,
    product: Vec<f32>,
}

impl BrushKernel {
    pub fn build(settings: &BrushSettings) -> Result<Self, BrushError> {
        settings.validate()?;
        Ok(Self::from_valid(settings))
    }

    /// `settings.size` must already be at least 1.
    fn from_valid(settings: &BrushSettings) -> Self {
        let size = settings.size;

        let value = vec![settings.intensity; size * size];
        let alpha = alpha_for_shape(settings.shape, size);
        let one_minus_alpha: Vec<f32> = alpha.iter().map(|a| 1.0 - a).collect();
        let product: Vec<f32> = value.iter().zip(&alpha).map(|(v, a)| v * a).collect();

        log::trace!(
            "kernel rebuilt: size={} shape={:?} intensity={} mode={:?}",
            size,
            settings.shape,
            settings.intensity,
            settings.mode
        );

        Self {
            size,
            mode: settings.mode,
            value,
            alpha,
            one_minus_alpha,
            product,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    pub fn value(&self) -> &[f32] {
        &self.value
    }

    pub fn alpha(&self) -> &[f32] {
        &self.alpha
    }

    pub fn one_minus_alpha(&self) -> &[f32] {
        &self.one_minus_alpha
    }

    pub fn product(&self) -> &[f32] {
        &self.product
    }

    #[inline]
    pub fn alpha_at(&self, x: usize, y: usize) -> f32 {
        self.alpha[y * self.size + x]
    }
}

fn alpha_for_shape(shape: BrushShape, size: usize) -> Vec<f32> {
    match shape {
        BrushShape::Square => vec![1.0; size * size],
        BrushShape::HardCircle => filled_disk(size, (size - 1) / 2),
        BrushShape::SoftCircle => {
            let core = filled_disk(size, (size - 1) / 4);
            box_blur(&core, size, (size / 2).max(1))
        }
    }
}

/// Rasterize a filled disk of integer `radius` around the kernel's center
/// cell `((size-1)/2, (size-1)/2)`.
fn filled_disk(size: usize, radius: usize) -> Vec<f32> {
    let center = ((size - 1) / 2) as isize;
    let r_sq = (radius * radius) as isize;
    let mut out = vec![0.0; size * size];
    for y in 0..size {
        let dy = y as isize - center;
        for x in 0..size {
            let dx = x as isize - center;
            if dx * dx + dy * dy <= r_sq {
                out[y * size + x] = 1.0;
            }
        }
    }
    out
}

/// Normalized `k × k` box average, anchor at `k/2`, reflect-101 borders.
/// Separable: one horizontal pass, one vertical pass.
fn box_blur(src: &[f32], size: usize, k: usize) -> Vec<f32> {
    let anchor = (k / 2) as isize;
    let norm = 1.0 / k as f32;

    let mut tmp = vec![0.0; size * size];
    for y in 0..size {
        for x in 0..size {
            let mut acc = 0.0;
            for i in 0..k as isize {
                let sx = reflect_101(x as isize - anchor + i, size);
                acc += src[y * size + sx];
            }
            tmp[y * size + x] = acc * norm;
        }
    }

    let mut out = vec![0.0; size * size];
    for y in 0..size {
        for x in 0..size {
            let mut acc = 0.0;
            for i in 0..k as isize {
                let sy = reflect_101(y as isize - anchor + i, size);
                acc += tmp[sy * size + x];
            }
            out[y * size + x] = acc * norm;
        }
    }
    out
}

/// Mirror an out-of-range index without repeating the edge cell
/// (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let mut i = i.rem_euclid(period);
    if i >= n as isize {
        i = period - i;
    }
    i as usize
}

// ============================================================================
// BRUSH: settings plus an always-current kernel
// ============================================================================

/// Brush configuration owning its kernel.  Every setter rebuilds the whole
/// kernel; there is no partial invalidation.
#[derive(Clone, Debug)]
pub struct Brush {
    settings: BrushSettings,
    kernel: BrushKernel,
}

impl Default for Brush {
    fn default() -> Self {
        let settings = BrushSettings::default();
        let kernel = BrushKernel::from_valid(&settings);
        Self { settings, kernel }
    }
}

impl Brush {
    pub fn new(settings: BrushSettings) -> Result<Self, BrushError> {
        let kernel = BrushKernel::build(&settings)?;
        Ok(Self { settings, kernel })
    }

    pub fn settings(&self) -> &BrushSettings {
        &self.settings
    }

    pub fn kernel(&self) -> &BrushKernel {
        &self.kernel
    }

    /// Replace all settings at once.  On error nothing changes.
    pub fn apply_settings(&mut self, settings: BrushSettings) -> Result<(), BrushError> {
        self.kernel = BrushKernel::build(&settings)?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_size(&mut self, size: usize) -> Result<(), BrushError> {
        if size < 1 {
            return Err(BrushError::InvalidSize(size));
        }
        self.apply_settings(BrushSettings { size, ..self.settings })
    }

    pub fn set_shape(&mut self, shape: BrushShape) -> Result<(), BrushError> {
        self.apply_settings(BrushSettings { shape, ..self.settings })
    }

    pub fn set_intensity(&mut self, intensity: f32) -> Result<(), BrushError> {
        self.apply_settings(BrushSettings { intensity, ..self.settings })
    }

    pub fn set_mode(&mut self, mode: BrushMode) -> Result<(), BrushError> {
        self.apply_settings(BrushSettings { mode, ..self.settings })
    }
}
