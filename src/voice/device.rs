//! Default input device capture through rodio's cpal backend.
//!
//! cpal streams are not `Send` on every platform, so the stream lives on a
//! dedicated thread and is driven by commands, the same way playback runs
//! on its own audio thread.

use std::{sync::mpsc as std_mpsc, thread};

use async_trait::async_trait;
use rodio::cpal::{
    self,
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BuildStreamError, SampleFormat,
};
use tokio::sync::{mpsc, oneshot};

use super::microphone::{CaptureStream, DeviceHandle, Microphone, MicrophoneAccessError};

const PCM_MIME_TYPE: &str = "audio/L16";

enum DeviceCommand {
    Pause,
    Resume,
    Release,
}

/// The host's default microphone. Chunks are 16-bit little-endian PCM at
/// the device's native rate and the stream reports itself as `audio/L16`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalMicrophone;

struct CpalDevice {
    commands: std_mpsc::Sender<DeviceCommand>,
    released: bool,
}

impl DeviceHandle for CpalDevice {
    fn pause(&mut self) {
        let _ = self.commands.send(DeviceCommand::Pause);
    }

    fn resume(&mut self) {
        let _ = self.commands.send(DeviceCommand::Resume);
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.commands.send(DeviceCommand::Release);
        }
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<CaptureStream, MicrophoneAccessError> {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || capture_thread(chunk_tx, command_rx, ready_tx))
            .map_err(|err| MicrophoneAccessError::Device(err.to_string()))?;

        ready_rx.await.map_err(|_| {
            MicrophoneAccessError::Device("capture thread exited before starting".into())
        })??;

        Ok(CaptureStream {
            chunks: chunk_rx,
            device: Box::new(CpalDevice {
                commands: command_tx,
                released: false,
            }),
            mime_type: Some(PCM_MIME_TYPE.to_string()),
        })
    }
}

fn capture_thread(
    chunk_tx: mpsc::UnboundedSender<Vec<u8>>,
    command_rx: std_mpsc::Receiver<DeviceCommand>,
    ready_tx: oneshot::Sender<Result<(), MicrophoneAccessError>>,
) {
    let stream = match build_stream(chunk_tx) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };
    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(MicrophoneAccessError::Device(err.to_string())));
        return;
    }
    if ready_tx.send(Ok(())).is_err() {
        return;
    }

    // A dropped sender means the recorder went away without releasing.
    while let Ok(command) = command_rx.recv() {
        match command {
            DeviceCommand::Pause => {
                if let Err(err) = stream.pause() {
                    log::warn!("[voice] failed to pause input stream: {}", err);
                }
            }
            DeviceCommand::Resume => {
                if let Err(err) = stream.play() {
                    log::warn!("[voice] failed to resume input stream: {}", err);
                }
            }
            DeviceCommand::Release => break,
        }
    }
    log::debug!("[voice] input device released");
}

fn build_stream(
    chunk_tx: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<cpal::Stream, MicrophoneAccessError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(MicrophoneAccessError::NoDevice)?;
    let supported = device
        .default_input_config()
        .map_err(|err| MicrophoneAccessError::Device(err.to_string()))?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let on_error = |err: cpal::StreamError| log::error!("[voice] input stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let _ = chunk_tx.send(encode_samples(data.iter().map(|s| f32_to_i16(*s))));
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = chunk_tx.send(encode_samples(data.iter().copied()));
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let _ = chunk_tx.send(encode_samples(
                    data.iter().map(|s| (i32::from(*s) - 32_768) as i16),
                ));
            },
            on_error,
            None,
        ),
        other => {
            return Err(MicrophoneAccessError::Device(format!(
                "unsupported sample format {other:?}"
            )))
        }
    };

    stream.map_err(|err| match err {
        BuildStreamError::DeviceNotAvailable => MicrophoneAccessError::NoDevice,
        other => MicrophoneAccessError::Device(other.to_string()),
    })
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn encode_samples(samples: impl Iterator<Item = i16>) -> Vec<u8> {
    samples.flat_map(i16::to_le_bytes).collect()
}
