pub mod brush_engine;
pub mod dct;
