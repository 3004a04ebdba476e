use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A finished voice note. Immutable once produced by the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRecording {
    id: Uuid,
    data: Vec<u8>,
    mime_type: String,
    duration_secs: u64,
    chunk_count: usize,
    recorded_at: DateTime<Utc>,
}

impl VoiceRecording {
    pub(crate) fn from_chunks(
        chunks: Vec<Vec<u8>>,
        mime_type: String,
        duration_secs: u64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        let chunk_count = chunks.len();
        Self {
            id: Uuid::new_v4(),
            data: chunks.concat(),
            mime_type,
            duration_secs,
            chunk_count,
            recorded_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Object name for the storage upload, e.g. `voice-1700000000000.webm`.
    pub fn file_name(&self) -> String {
        format!(
            "voice-{}.{}",
            self.recorded_at.timestamp_millis(),
            extension_for(&self.mime_type)
        )
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

fn extension_for(mime_type: &str) -> &str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence.split_once('/') {
        Some(("audio", subtype)) if !subtype.is_empty() => {
            let subtype = subtype.strip_prefix("x-").unwrap_or(subtype);
            match subtype {
                "mpeg" => "mp3",
                "L16" | "pcm" => "pcm",
                other => other,
            }
        }
        _ => "bin",
    }
}
