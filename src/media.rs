//! Output media formats
//!
//! Artifacts are stored either as the synthesized audio (`.mp3`) or as video
//! (`.mp4`). Audio to video conversion is not implemented yet: in video mode
//! the synthesized payload is stored as-is under the `.mp4` name.

use serde::{Deserialize, Serialize};

/// Format of every artifact produced by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// MP3 audio straight from the synthesizer
    #[default]
    Audio,
    /// MP4 video
    Video,
}

impl MediaFormat {
    pub fn from_video_flag(generate_video: bool) -> Self {
        if generate_video {
            Self::Video
        } else {
            Self::Audio
        }
    }

    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Turn a synthesized audio payload into the bytes stored on disk.
    pub fn encode(&self, audio: Vec<u8>) -> Vec<u8> {
        match self {
            Self::Audio => audio,
            Self::Video => {
                // TODO: mux the audio into an mp4 container (ffmpeg) once a
                // background image/visual track is defined.
                tracing::debug!(
                    bytes = audio.len(),
                    "Video transcoding not available, storing audio payload"
                );
                audio
            }
        }
    }
}

/// Content type served for a request path, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("mp3") => "audio/mp3",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Whether a file name looks like a stored artifact (`*.mp3` / `*.mp4`).
pub fn is_artifact_file(name: &str) -> bool {
    name.ends_with(".mp3") || name.ends_with(".mp4")
}
