//! Voice notes for chat: microphone capture with pause/resume, finalized
//! into a single tagged blob for upload.

#[cfg(feature = "device-audio")]
mod device;
mod microphone;
mod recorder;
mod recording;
mod scripted;
mod state;

#[cfg(feature = "device-audio")]
pub use device::CpalMicrophone;
pub use microphone::{CaptureStream, DeviceHandle, Microphone, MicrophoneAccessError};
pub use recorder::VoiceRecorder;
pub use recording::VoiceRecording;
pub use scripted::ScriptedMicrophone;
pub use state::{format_elapsed, RecorderStatus};
