//! Dual-domain paint engine.
//!
//! A brush paints onto a real-valued canvas; a second canvas holds its 2-D
//! DCT.  Painting either one recomputes the other through a
//! [`sync::TransformSync`], so edits in the frequency domain show up
//! immediately in the image and vice versa.

pub mod canvas;
pub mod components;
pub mod config;
pub mod error;
pub mod logger;
pub mod ops;
pub mod project;
pub mod sync;

pub use canvas::{Canvas, CanvasHandle, CanvasListener, ListenerId, Rect, WeakCanvas};
pub use components::brush::{Brush, BrushKernel, BrushMode, BrushSettings, BrushShape};
pub use config::{EngineConfig, LogSettings};
pub use error::{BrushError, CanvasError, ConfigError, EngineError, ProjectError};
pub use ops::brush_engine::{apply_brush, try_apply_brush};
pub use ops::dct::{Dct2, GridTransform, Identity, InverseDct2};
pub use project::{Domain, Project};
pub use sync::{SyncGuard, SyncState, TransformLink, TransformSync};
