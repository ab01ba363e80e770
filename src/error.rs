//! Error types for the viewer.
//!
//! Asset and audio failures are recoverable: the viewer logs them and keeps
//! rendering. GPU failures only happen during startup and end the program.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or decoding an asset file.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("glTF error in {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("STL parse error in {path}: {message}")]
    Stl { path: PathBuf, message: String },

    #[error("unsupported model format: '{0}'")]
    UnsupportedFormat(String),

    #[error("{0} uses Draco mesh compression, which this viewer cannot decode")]
    DracoCompressed(PathBuf),

    #[error("no triangle geometry found in {0}")]
    NoGeometry(PathBuf),

    #[error("audio file {path}: {source}")]
    Audio {
        path: PathBuf,
        #[source]
        source: AudioError,
    },

    #[error("loader thread for '{0}' stopped without a result")]
    WorkerLost(String),
}

/// Errors raised by the audio output.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    NoOutputDevice(String),

    #[error("could not decode audio track: {0}")]
    Decode(String),

    #[error("could not create audio sink: {0}")]
    Sink(String),
}

/// Errors raised while bringing up the GPU.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to create window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}
