use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a recording could not start. Shown to the member by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MicrophoneAccessError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no microphone found")]
    NoDevice,

    #[error("microphone failed to start: {0}")]
    Device(String),
}

/// Control side of an opened input device.
pub trait DeviceHandle: Send {
    fn pause(&mut self);
    fn resume(&mut self);
    /// Give the device back. Called exactly once per handle.
    fn release(&mut self);
}

/// An opened microphone: encoded audio chunks plus the device controls.
pub struct CaptureStream {
    pub chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    pub device: Box<dyn DeviceHandle>,
    /// Encoding of `chunks`, when the device fixes it. `None` falls back to
    /// the recorder's configured type.
    pub mime_type: Option<String>,
}

#[async_trait]
pub trait Microphone: Send + Sync {
    async fn open(&self) -> Result<CaptureStream, MicrophoneAccessError>;
}
