use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc::UnboundedReceiver, Mutex},
    time::Duration,
};

use super::{
    microphone::{CaptureStream, DeviceHandle, Microphone, MicrophoneAccessError},
    recording::VoiceRecording,
    state::{format_elapsed, RecorderStatus},
};
use crate::{clock::Clock, settings::RecorderSettings, timer::RepeatingTask};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const ELAPSED_TICK: Duration = Duration::from_secs(1);

/// The microphone and everything captured from it for one recording.
///
/// Dropping it releases the device, so every exit path gives the
/// microphone back.
struct ActiveCapture {
    chunks_rx: UnboundedReceiver<Vec<u8>>,
    device: Option<Box<dyn DeviceHandle>>,
    chunks: Vec<Vec<u8>>,
    ticker: Option<RepeatingTask>,
    started_at: DateTime<Utc>,
    mime_type: Option<String>,
}

impl ActiveCapture {
    fn new(stream: CaptureStream, started_at: DateTime<Utc>) -> Self {
        Self {
            chunks_rx: stream.chunks,
            device: Some(stream.device),
            chunks: Vec::new(),
            ticker: None,
            started_at,
            mime_type: stream.mime_type,
        }
    }

    /// Move everything the device produced so far into the recording.
    fn collect_pending(&mut self) {
        while let Ok(chunk) = self.chunks_rx.try_recv() {
            self.chunks.push(chunk);
        }
    }

    /// Throw away what the device produced while paused.
    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.chunks_rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn pause_device(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.pause();
        }
    }

    fn resume_device(&mut self) {
        if let Some(device) = self.device.as_mut() {
            device.resume();
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn release(&mut self) {
        self.stop_ticker();
        if let Some(mut device) = self.device.take() {
            device.release();
        }
        self.chunks_rx.close();
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Default)]
struct RecorderInner {
    status: RecorderStatus,
    capture: Option<ActiveCapture>,
}

/// Voice-note recorder: `Idle → Recording ⇄ Paused → Stopped`, with
/// `cancel()` back to `Idle` from anywhere.
///
/// Invalid transitions are ignored. Only one recording can hold the
/// microphone at a time; clones share the same recorder.
#[derive(Clone)]
pub struct VoiceRecorder {
    microphone: Arc<dyn Microphone>,
    clock: Arc<dyn Clock>,
    mime_type: String,
    inner: Arc<Mutex<RecorderInner>>,
    elapsed_secs: Arc<AtomicU64>,
}

impl VoiceRecorder {
    pub fn new(
        microphone: Arc<dyn Microphone>,
        clock: Arc<dyn Clock>,
        settings: &RecorderSettings,
    ) -> Self {
        Self {
            microphone,
            clock,
            mime_type: settings.mime_type.clone(),
            inner: Arc::new(Mutex::new(RecorderInner::default())),
            elapsed_secs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn status(&self) -> RecorderStatus {
        self.inner.lock().await.status
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs())
    }

    /// Open the microphone and start recording. On failure nothing changes
    /// and the error is for the caller to show. Ignored while a recording
    /// is already in progress.
    pub async fn start(&self) -> Result<(), MicrophoneAccessError> {
        // Held across `open()` so two starts cannot both grab the device.
        let mut inner = self.inner.lock().await;
        if inner.status.is_active() {
            log_debug!("[voice] start ignored while {:?}", inner.status);
            return Ok(());
        }

        let stream = self.microphone.open().await?;

        self.elapsed_secs.store(0, Ordering::SeqCst);
        let mut capture = ActiveCapture::new(stream, self.clock.now());
        capture.ticker = Some(self.spawn_ticker());
        inner.capture = Some(capture);
        inner.status = RecorderStatus::Recording;
        log_info!("[voice] recording started");
        Ok(())
    }

    pub async fn pause(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status != RecorderStatus::Recording {
            log_debug!("[voice] pause ignored while {:?}", inner.status);
            return;
        }
        if let Some(capture) = inner.capture.as_mut() {
            capture.pause_device();
            capture.collect_pending();
            capture.stop_ticker();
        }
        inner.status = RecorderStatus::Paused;
    }

    pub async fn resume(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status != RecorderStatus::Paused {
            log_debug!("[voice] resume ignored while {:?}", inner.status);
            return;
        }
        let ticker = self.spawn_ticker();
        if let Some(capture) = inner.capture.as_mut() {
            let dropped = capture.discard_pending();
            if dropped > 0 {
                log_debug!("[voice] dropped {} chunks captured while paused", dropped);
            }
            capture.resume_device();
            capture.ticker = Some(ticker);
        }
        inner.status = RecorderStatus::Recording;
    }

    /// Finish the recording and hand it back. `None` if nothing was being
    /// recorded.
    pub async fn stop(&self) -> Option<VoiceRecording> {
        let mut inner = self.inner.lock().await;
        if !inner.status.is_active() {
            log_debug!("[voice] stop ignored while {:?}", inner.status);
            return None;
        }

        let mut capture = inner.capture.take()?;
        match inner.status {
            RecorderStatus::Recording => capture.collect_pending(),
            _ => {
                capture.discard_pending();
            }
        }
        capture.release();
        inner.status = RecorderStatus::Stopped;

        let chunks = std::mem::take(&mut capture.chunks);
        let mime_type = capture
            .mime_type
            .take()
            .unwrap_or_else(|| self.mime_type.clone());
        let recording = VoiceRecording::from_chunks(
            chunks,
            mime_type,
            self.elapsed_secs(),
            capture.started_at,
        );
        log_info!(
            "[voice] recording stopped: {} bytes, {}s",
            recording.len(),
            recording.duration_secs()
        );
        Some(recording)
    }

    /// Drop the recording in progress and give the microphone back.
    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status == RecorderStatus::Idle {
            return;
        }
        if let Some(mut capture) = inner.capture.take() {
            capture.release();
        }
        self.elapsed_secs.store(0, Ordering::SeqCst);
        inner.status = RecorderStatus::Idle;
        log_info!("[voice] recording cancelled");
    }

    fn spawn_ticker(&self) -> RepeatingTask {
        let elapsed = self.elapsed_secs.clone();
        RepeatingTask::spawn("voice-elapsed", ELAPSED_TICK, move || {
            elapsed.fetch_add(1, Ordering::SeqCst);
            async {}
        })
    }
}
