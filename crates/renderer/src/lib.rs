//! Map rendering for static map export.
//!
//! - `engine`: the contract between the orchestrator and a render engine
//! - `mosaic`: a stand-in engine painting background colour and raster tiles
//! - `postprocess`: premultiplied engine output to PNG
//! - `png`: in-house PNG encoder (RGBA and indexed)

pub mod decode;
pub mod engine;
pub mod mosaic;
pub mod png;
pub mod postprocess;
pub mod style;

pub use engine::{
    physical_size, EngineFactory, EngineOptions, EngineRenderOptions, RawImage, RenderEngine,
    ResourceSource, StyleImage,
};
pub use mosaic::{MosaicEngine, MosaicEngineFactory};
pub use postprocess::{encode, unpremultiply};
