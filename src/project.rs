use std::path::{Path, PathBuf};

use image::GrayImage;
use uuid::Uuid;

use crate::canvas::{Canvas, CanvasHandle, Rect};
use crate::components::brush::{Brush, BrushSettings};
use crate::config::EngineConfig;
use crate::error::{BrushError, CanvasError, CanvasResult, ProjectError};
use crate::ops::brush_engine::apply_brush;
use crate::sync::TransformSync;

/// Which half of the pair a paint call targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Spatial,
    Frequency,
}

impl Domain {
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Spatial => "Spatial",
            Domain::Frequency => "Frequency",
        }
    }
}

/// Single open document: a spatial canvas, its DCT, and the brush painting
/// either of them.
pub struct Project {
    id: Uuid,
    name: String,
    spatial: CanvasHandle,
    frequency: CanvasHandle,
    brush: Brush,
    sync: TransformSync,
}

impl Project {
    /// Two zero-filled `width × height` canvases kept in sync by the DCT.
    pub fn new(width: usize, height: usize) -> CanvasResult<Self> {
        Self::with_brush(width, height, Brush::default())
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ProjectError> {
        let brush = Brush::new(config.brush)?;
        Ok(Self::with_brush(config.canvas_width, config.canvas_height, brush)?)
    }

    fn with_brush(width: usize, height: usize, brush: Brush) -> CanvasResult<Self> {
        let spatial = CanvasHandle::new(Canvas::with_size(Domain::Spatial.name(), width, height)?);
        let frequency = CanvasHandle::new(Canvas::with_size(Domain::Frequency.name(), width, height)?);
        let sync = TransformSync::dct(&spatial, &frequency);
        let id = Uuid::new_v4();
        log::info!("project {} created with {}x{} canvases", id, width, height);

        Ok(Self {
            id,
            name: "Untitled".to_string(),
            spatial,
            frequency,
            brush,
            sync,
        })
    }

    // ---- accessors ------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// File name of the last loaded image, or "Untitled".
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spatial(&self) -> &CanvasHandle {
        &self.spatial
    }

    pub fn frequency(&self) -> &CanvasHandle {
        &self.frequency
    }

    pub fn canvas(&self, domain: Domain) -> &CanvasHandle {
        match domain {
            Domain::Spatial => &self.spatial,
            Domain::Frequency => &self.frequency,
        }
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut Brush {
        &mut self.brush
    }

    pub fn set_brush_settings(&mut self, settings: BrushSettings) -> Result<(), BrushError> {
        self.brush.apply_settings(settings)
    }

    pub fn is_propagating(&self) -> bool {
        self.sync.is_propagating()
    }

    /// Path of the last image loaded into the spatial canvas.
    pub fn last_source(&self) -> Option<PathBuf> {
        self.spatial.borrow().last_source().map(Path::to_path_buf)
    }

    // ---- painting -------------------------------------------------------------

    /// Stamp the brush centred on `(x, y)` and fire "modified" for the touched
    /// region.  Returns that region, `None` when nothing was painted.
    pub fn paint(&self, domain: Domain, x: isize, y: isize, inverse: bool) -> Option<Rect> {
        let canvas = self.canvas(domain);
        let region = apply_brush(&mut canvas.borrow_mut(), self.brush.kernel(), x, y, inverse)?;
        canvas.notify_modified(Some(region));
        Some(region)
    }

    pub fn paint_spatial(&self, x: isize, y: isize, inverse: bool) -> Option<Rect> {
        self.paint(Domain::Spatial, x, y, inverse)
    }

    pub fn paint_frequency(&self, x: isize, y: isize, inverse: bool) -> Option<Rect> {
        self.paint(Domain::Frequency, x, y, inverse)
    }

    // ---- whole-canvas operations ------------------------------------------------

    /// Blank both canvases at a new size.
    pub fn clear(&mut self, width: usize, height: usize) -> CanvasResult<()> {
        {
            let mut spatial = self.spatial.borrow_mut();
            spatial.resize(width, height)?;
            spatial.set_last_source(None);
        }
        self.name = "Untitled".to_string();
        self.spatial.notify_loaded();
        Ok(())
    }

    /// Load a decoded greyscale image into the spatial canvas.
    pub fn load_luma_image(&mut self, image: &GrayImage, source: Option<PathBuf>) -> CanvasResult<()> {
        self.spatial.borrow_mut().load_luma(image, source.clone())?;
        if let Some(name) = source.as_deref().and_then(display_name) {
            self.name = name;
        }
        log::info!(
            "loaded {}x{} image from {:?}",
            image.width(),
            image.height(),
            source.as_deref().unwrap_or(Path::new("<memory>"))
        );
        self.spatial.notify_loaded();
        Ok(())
    }

    /// Decode the last loaded source again with `loader` and load it.
    ///
    /// Returns `Ok(false)` without touching anything when no source was
    /// recorded.
    pub fn reload_with<F, E>(&mut self, loader: F) -> Result<bool, E>
    where
        F: FnOnce(&Path) -> Result<GrayImage, E>,
        E: From<CanvasError>,
    {
        let Some(path) = self.last_source() else {
            log::debug!("reload skipped: no image loaded yet");
            return Ok(false);
        };
        let image = loader(&path)?;
        self.load_luma_image(&image, Some(path))?;
        Ok(true)
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        log::debug!("project {} closed", self.id);
    }
}

fn display_name(path: &Path) -> Option<String> {
    path.file_name().map(|s| s.to_string_lossy().to_string())
}
