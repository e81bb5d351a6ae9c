use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use image::GrayImage;

use crate::error::{CanvasError, CanvasResult};

// ============================================================================
// RECT: half-open cell rectangle in canvas coordinates
// ============================================================================

/// Axis-aligned rectangle of canvas cells, `[x, x + width) × [y, y + height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    #[inline]
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Build from inclusive-min / exclusive-max corners.
    #[inline]
    pub fn from_min_max(min_x: usize, min_y: usize, max_x: usize, max_y: usize) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x.saturating_sub(min_x),
            height: max_y.saturating_sub(min_y),
        }
    }

    #[inline]
    pub fn max_x(&self) -> usize {
        self.x + self.width
    }

    #[inline]
    pub fn max_y(&self) -> usize {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && y >= self.y && x < self.max_x() && y < self.max_y()
    }

    /// Overlap of two rectangles, `None` when they only touch or are disjoint.
    pub fn intersect(&self, other: Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.max_x().min(other.max_x());
        let y1 = self.max_y().min(other.max_y());
        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Rect::from_min_max(x0, y0, x1, y1))
        }
    }
}

// ============================================================================
// CHANGE NOTIFICATION
// ============================================================================

/// Receives change notifications from a canvas.
///
/// Both callbacks run synchronously inside `notify_*`, with no borrow of the
/// emitting canvas held, so a listener may read or mutate any canvas,
/// including `source`.
pub trait CanvasListener {
    /// Samples were changed in place. `None` means the whole canvas is dirty.
    fn on_modified(&self, source: &CanvasHandle, region: Option<Rect>) {
        let _ = (source, region);
    }

    /// The buffer was replaced wholesale (new content and possibly new size).
    fn on_loaded(&self, source: &CanvasHandle) {
        let _ = source;
    }
}

/// Token returned by [`CanvasHandle::attach`], used to detach again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ============================================================================
// CANVAS: owned f32 sample grid with the even-size invariant
// ============================================================================

/// A row-major grid of `f32` samples.
///
/// Width and height are always even (0×0 is the empty canvas) so that the
/// grid can be fed to the DCT.  Mutating calls never notify by themselves;
/// the caller decides whether the change was a "modified" or a "loaded" one
/// and fires it through the [`CanvasHandle`].
pub struct Canvas {
    name: String,
    width: usize,
    height: usize,
    samples: Vec<f32>,
    /// Where the current content was last loaded from, if anywhere.
    last_source: Option<PathBuf>,
    listeners: Vec<(ListenerId, Rc<dyn CanvasListener>)>,
    next_listener_id: u64,
    /// Bumped on every notification.
    generation: u64,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("last_source", &self.last_source)
            .field("listeners", &self.listeners.len())
            .field("generation", &self.generation)
            .finish()
    }
}

fn check_even(width: usize, height: usize) -> CanvasResult<()> {
    if width % 2 == 1 || height % 2 == 1 {
        return Err(CanvasError::OddSize { width, height });
    }
    Ok(())
}

impl Canvas {
    // ---- construction -------------------------------------------------------

    /// Create an empty (0×0) canvas.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 0,
            height: 0,
            samples: Vec::new(),
            last_source: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            generation: 0,
        }
    }

    /// Create a zero-filled canvas of the given (even) size.
    pub fn with_size(name: impl Into<String>, width: usize, height: usize) -> CanvasResult<Self> {
        let mut canvas = Self::new(name);
        canvas.resize(width, height)?;
        Ok(canvas)
    }

    // ---- metadata -----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The whole canvas as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn last_source(&self) -> Option<&Path> {
        self.last_source.as_deref()
    }

    pub fn set_last_source(&mut self, source: Option<PathBuf>) {
        self.last_source = source;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ---- sample access ------------------------------------------------------

    /// Read one sample.  Only the slice bounds check guards this; callers
    /// (the brush engine) clip before touching cells.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.samples[y * self.width + x] = value;
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Smallest and largest sample, `None` for the empty canvas.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut iter = self.samples.iter().copied();
        let first = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    // ---- wholesale replacement ------------------------------------------------

    /// Reallocate as a zero-filled `width × height` grid.
    ///
    /// Odd sizes are rejected before anything is touched.
    pub fn resize(&mut self, width: usize, height: usize) -> CanvasResult<()> {
        check_even(width, height)?;
        self.samples = vec![0.0; width * height];
        self.width = width;
        self.height = height;
        log::debug!("canvas \"{}\" resized to {}x{}", self.name, width, height);
        Ok(())
    }

    /// Swap in a new buffer with new dimensions.
    pub fn load_buffer(&mut self, buffer: Vec<f32>, width: usize, height: usize) -> CanvasResult<()> {
        check_even(width, height)?;
        let expected = width * height;
        if buffer.len() != expected {
            return Err(CanvasError::BufferLength { expected, actual: buffer.len() });
        }
        self.samples = buffer;
        self.width = width;
        self.height = height;
        log::debug!("canvas \"{}\" loaded {}x{} buffer", self.name, width, height);
        Ok(())
    }

    /// Swap in a buffer of the current dimensions.
    pub fn replace_whole(&mut self, buffer: Vec<f32>) -> CanvasResult<()> {
        if buffer.len() != self.samples.len() {
            return Err(CanvasError::BufferLength {
                expected: self.samples.len(),
                actual: buffer.len(),
            });
        }
        self.samples = buffer;
        Ok(())
    }

    /// Import an 8-bit greyscale image, one sample per pixel.
    ///
    /// The image must be non-empty with even width and height.  On success
    /// `source` is remembered as the last loaded source.
    pub fn load_luma(&mut self, image: &GrayImage, source: Option<PathBuf>) -> CanvasResult<()> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return Err(CanvasError::EmptyImage);
        }
        let buffer: Vec<f32> = image.as_raw().iter().map(|&v| v as f32).collect();
        self.load_buffer(buffer, width, height)?;
        self.last_source = source;
        Ok(())
    }
}

// ============================================================================
// CANVAS HANDLE: shared, listener-aware reference
// ============================================================================

/// Shared handle to a [`Canvas`].
///
/// Painting borrows the canvas mutably for one call; notifications go through
/// the handle so that listeners run after that borrow has ended.
#[derive(Clone)]
pub struct CanvasHandle(Rc<RefCell<Canvas>>);

/// Non-owning counterpart of [`CanvasHandle`].
#[derive(Clone)]
pub struct WeakCanvas(Weak<RefCell<Canvas>>);

impl WeakCanvas {
    pub fn upgrade(&self) -> Option<CanvasHandle> {
        self.0.upgrade().map(CanvasHandle)
    }
}

impl fmt::Debug for CanvasHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(canvas) => canvas.fmt(f),
            Err(_) => f.write_str("Canvas(<borrowed>)"),
        }
    }
}

impl CanvasHandle {
    pub fn new(canvas: Canvas) -> Self {
        Self(Rc::new(RefCell::new(canvas)))
    }

    /// Panics if the canvas is currently borrowed mutably.
    pub fn borrow(&self) -> Ref<'_, Canvas> {
        self.0.borrow()
    }

    /// Panics if the canvas is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Canvas> {
        self.0.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakCanvas {
        WeakCanvas(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &CanvasHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // ---- listeners ------------------------------------------------------------

    pub fn attach(&self, listener: Rc<dyn CanvasListener>) -> ListenerId {
        let mut canvas = self.0.borrow_mut();
        let id = ListenerId(canvas.next_listener_id);
        canvas.next_listener_id += 1;
        canvas.listeners.push((id, listener));
        id
    }

    /// Returns `false` if `id` was not attached.
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut canvas = self.0.borrow_mut();
        let before = canvas.listeners.len();
        canvas.listeners.retain(|(lid, _)| *lid != id);
        canvas.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.0.borrow().listeners.len()
    }

    // ---- notification -----------------------------------------------------------

    /// Bump the generation and snapshot the listener list, releasing the
    /// borrow before any listener runs.
    fn listeners_for_dispatch(&self) -> Vec<Rc<dyn CanvasListener>> {
        let mut canvas = self.0.borrow_mut();
        canvas.generation += 1;
        canvas.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
    }

    /// Fire "modified".  Must not be called while the canvas is borrowed.
    pub fn notify_modified(&self, region: Option<Rect>) {
        let listeners = self.listeners_for_dispatch();
        log::trace!("modified {:?} -> {} listener(s)", region, listeners.len());
        for listener in listeners {
            listener.on_modified(self, region);
        }
    }

    /// Fire "loaded".  Must not be called while the canvas is borrowed.
    pub fn notify_loaded(&self) {
        let listeners = self.listeners_for_dispatch();
        log::trace!("loaded -> {} listener(s)", listeners.len());
        for listener in listeners {
            listener.on_loaded(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counter {
        modified: Cell<usize>,
        loaded: Cell<usize>,
        last_region: Cell<Option<Rect>>,
    }

    impl CanvasListener for Counter {
        fn on_modified(&self, _source: &CanvasHandle, region: Option<Rect>) {
            self.modified.set(self.modified.get() + 1);
            self.last_region.set(region);
        }

        fn on_loaded(&self, _source: &CanvasHandle) {
            self.loaded.set(self.loaded.get() + 1);
        }
    }

    // ── Rect ──────────────────────────────────────────────────────────────

    #[test]
    fn rect_intersect_overlapping() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(b), Some(Rect::new(5, 5, 5, 5)));
    }

    #[test]
    fn rect_intersect_touching_edge_is_none() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(4, 0, 4, 4);
        assert!(a.intersect(b).is_none());
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(2, 2, 3, 3);
        assert!(r.contains(2, 2));
        assert!(r.contains(4, 4));
        assert!(!r.contains(5, 4));
        assert!(!r.contains(1, 3));
    }

    #[test]
    fn rect_area_and_canvas_bounds() {
        assert_eq!(Rect::new(1, 2, 3, 4).area(), 12);
        assert_eq!(Rect::new(5, 5, 0, 4).area(), 0);

        let canvas = Canvas::with_size("t", 6, 4).unwrap();
        let bounds = canvas.bounds();
        assert_eq!(bounds, Rect::new(0, 0, 6, 4));
        assert_eq!(bounds.area(), canvas.samples().len());
        assert!(Canvas::new("empty").bounds().is_empty());
    }

    // ── sizing ────────────────────────────────────────────────────────────

    #[test]
    fn resize_even_sizes_reads_zero_everywhere() {
        for (w, h) in [(0, 0), (2, 2), (4, 8), (16, 6)] {
            let mut canvas = Canvas::new("t");
            canvas.set_name("renamed");
            canvas.resize(w, h).unwrap();
            assert_eq!(canvas.dimensions(), (w, h));
            for y in 0..h {
                for x in 0..w {
                    assert_eq!(canvas.get(x, y), 0.0);
                }
            }
        }
    }

    #[test]
    fn resize_odd_fails_and_keeps_state() {
        let mut canvas = Canvas::with_size("t", 4, 4).unwrap();
        canvas.set(1, 2, 7.5);

        for (w, h) in [(3, 4), (4, 5), (1, 1)] {
            let err = canvas.resize(w, h).unwrap_err();
            assert_eq!(err, CanvasError::OddSize { width: w, height: h });
            assert_eq!(canvas.dimensions(), (4, 4));
            assert_eq!(canvas.get(1, 2), 7.5);
        }
    }

    #[test]
    fn load_buffer_validates_length() {
        let mut canvas = Canvas::new("t");
        let err = canvas.load_buffer(vec![0.0; 5], 2, 2).unwrap_err();
        assert_eq!(err, CanvasError::BufferLength { expected: 4, actual: 5 });
        assert!(canvas.is_empty());

        canvas.load_buffer(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        assert_eq!(canvas.get(1, 1), 4.0);
        assert_eq!(canvas.min_max(), Some((1.0, 4.0)));
    }

    #[test]
    fn replace_whole_requires_same_size() {
        let mut canvas = Canvas::with_size("t", 2, 2).unwrap();
        assert!(canvas.replace_whole(vec![0.0; 8]).is_err());
        canvas.replace_whole(vec![9.0; 4]).unwrap();
        assert_eq!(canvas.get(0, 1), 9.0);
    }

    #[test]
    fn load_luma_rejects_odd_images_and_records_source() {
        let mut canvas = Canvas::new("t");
        let odd = GrayImage::new(3, 2);
        assert!(matches!(canvas.load_luma(&odd, None), Err(CanvasError::OddSize { .. })));
        let empty = GrayImage::new(0, 0);
        assert_eq!(canvas.load_luma(&empty, None), Err(CanvasError::EmptyImage));

        let mut img = GrayImage::new(2, 2);
        img.put_pixel(1, 0, image::Luma([200]));
        canvas.load_luma(&img, Some(PathBuf::from("lena.png"))).unwrap();
        assert_eq!(canvas.get(1, 0), 200.0);
        assert_eq!(canvas.last_source(), Some(Path::new("lena.png")));
    }

    // ── listeners ─────────────────────────────────────────────────────────

    #[test]
    fn notifications_reach_attached_listeners_only() {
        let handle = CanvasHandle::new(Canvas::with_size("t", 2, 2).unwrap());
        let counter = Rc::new(Counter::default());
        let id = handle.attach(counter.clone());

        handle.notify_modified(Some(Rect::new(0, 0, 1, 1)));
        handle.notify_loaded();
        assert_eq!(counter.modified.get(), 1);
        assert_eq!(counter.loaded.get(), 1);
        assert_eq!(counter.last_region.get(), Some(Rect::new(0, 0, 1, 1)));
        assert_eq!(handle.borrow().generation(), 2);

        assert!(handle.detach(id));
        assert!(!handle.detach(id));
        handle.notify_modified(None);
        assert_eq!(counter.modified.get(), 1);
    }

    #[test]
    fn listener_may_mutate_source_during_notification() {
        struct Writer;
        impl CanvasListener for Writer {
            fn on_modified(&self, source: &CanvasHandle, _region: Option<Rect>) {
                source.borrow_mut().set(0, 0, 42.0);
            }
        }

        let handle = CanvasHandle::new(Canvas::with_size("t", 2, 2).unwrap());
        handle.attach(Rc::new(Writer));
        handle.notify_modified(None);
        assert_eq!(handle.borrow().get(0, 0), 42.0);
    }

    #[test]
    fn weak_handle_does_not_keep_canvas_alive() {
        let handle = CanvasHandle::new(Canvas::new("t"));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some_and(|h| h.ptr_eq(&handle)));
        drop(handle);
        assert!(weak.upgrade().is_none());
    }
}
