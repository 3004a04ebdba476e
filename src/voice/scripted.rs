use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::microphone::{CaptureStream, DeviceHandle, Microphone, MicrophoneAccessError};

#[derive(Default)]
struct ScriptState {
    failure: Option<MicrophoneAccessError>,
    feed: Option<mpsc::UnboundedSender<Vec<u8>>>,
    mime_type: Option<String>,
}

/// A microphone whose audio is pushed by hand.
///
/// Chunks pushed with [`ScriptedMicrophone::push`] reach the open stream
/// whether or not the device is paused, so the recorder's own gating is
/// what keeps paused audio out. Tracks how many device handles are open.
#[derive(Clone, Default)]
pub struct ScriptedMicrophone {
    state: Arc<Mutex<ScriptState>>,
    open_handles: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    paused: Arc<AtomicBool>,
}

impl ScriptedMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// A microphone that refuses every `open()` with `error`.
    pub fn failing(error: MicrophoneAccessError) -> Self {
        let microphone = Self::default();
        microphone.lock().failure = Some(error);
        microphone
    }

    /// Report `mime_type` as the encoding of every opened stream.
    pub fn with_mime_type(self, mime_type: impl Into<String>) -> Self {
        self.lock().mime_type = Some(mime_type.into());
        self
    }

    /// Deliver a chunk to the currently open stream. `false` if none is open.
    pub fn push(&self, chunk: impl Into<Vec<u8>>) -> bool {
        match self.lock().feed.as_ref() {
            Some(feed) => feed.send(chunk.into()).is_ok(),
            None => false,
        }
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

struct ScriptedDevice {
    microphone: ScriptedMicrophone,
    released: bool,
}

impl DeviceHandle for ScriptedDevice {
    fn pause(&mut self) {
        self.microphone.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.microphone.paused.store(false, Ordering::SeqCst);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.microphone.lock().feed = None;
        self.microphone.paused.store(false, Ordering::SeqCst);
        self.microphone.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Microphone for ScriptedMicrophone {
    async fn open(&self) -> Result<CaptureStream, MicrophoneAccessError> {
        let mut state = self.lock();
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.feed = Some(tx);
        let mime_type = state.mime_type.clone();
        drop(state);

        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureStream {
            chunks: rx,
            device: Box::new(ScriptedDevice {
                microphone: self.clone(),
                released: false,
            }),
            mime_type,
        })
    }
}
