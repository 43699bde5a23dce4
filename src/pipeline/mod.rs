//! Renderer process description and lifecycle.
//!
//! The renderer is an external process (ffmpeg) that owns the actual media
//! path. This module derives its command line from the active source and
//! supervises exactly one running instance at a time.

mod spec;
mod supervisor;

pub use spec::RenderSpec;
pub use supervisor::{Health, PipelineSupervisor, RendererHandle};
