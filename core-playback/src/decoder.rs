//! # Symphonia Loader
//!
//! [`MediaLoader`] that probes a materialized slot file with Symphonia and
//! reports its codec, sample rate, channel count and duration. Decoding and
//! output stay with the host's playback controller.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::playback::{AudioCodec, AudioFormat, MediaHandle, MediaLoader};
use symphonia::core::codecs::{self, CodecType, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

/// Probes slot files on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaLoader;

impl SymphoniaLoader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaLoader for SymphoniaLoader {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn load(&self, path: &Path) -> Result<MediaHandle> {
        let path = path.to_path_buf();
        core_async::task::spawn_blocking(move || probe_file(&path))
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("probe task failed: {}", e)))?
    }
}

fn probe_file(path: &Path) -> Result<MediaHandle> {
    let file = std::fs::File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    // Slot files carry no extension unless configured with one.
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| BridgeError::OperationFailed(format!("unrecognized audio format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BridgeError::OperationFailed("no playable audio track".to_string()))?;

    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| BridgeError::OperationFailed("missing sample rate".to_string()))?;
    // AAC in MP4 may only report channels after the first packet.
    let channels = params.channels.map(|ch| ch.count() as u16).unwrap_or(2);

    let format = AudioFormat::new(codec_of(params.codec), sample_rate, channels)
        .with_bits_per_sample(params.bits_per_sample.map(|bits| bits as u16));
    let duration = params
        .n_frames
        .map(|frames| Duration::from_secs_f64(frames as f64 / sample_rate as f64));

    debug!(codec = ?format.codec, sample_rate, channels, ?duration, "Probed slot file");
    Ok(MediaHandle::new(path).with_format(format).with_duration(duration))
}

fn codec_of(codec: CodecType) -> AudioCodec {
    let pcm = [
        codecs::CODEC_TYPE_PCM_S16LE,
        codecs::CODEC_TYPE_PCM_S16BE,
        codecs::CODEC_TYPE_PCM_S24LE,
        codecs::CODEC_TYPE_PCM_S24BE,
        codecs::CODEC_TYPE_PCM_S32LE,
        codecs::CODEC_TYPE_PCM_S32BE,
        codecs::CODEC_TYPE_PCM_F32LE,
        codecs::CODEC_TYPE_PCM_F32BE,
        codecs::CODEC_TYPE_PCM_F64LE,
        codecs::CODEC_TYPE_PCM_F64BE,
        codecs::CODEC_TYPE_PCM_U8,
    ];

    if codec == codecs::CODEC_TYPE_MP3 {
        AudioCodec::Mp3
    } else if codec == codecs::CODEC_TYPE_AAC {
        AudioCodec::Aac
    } else if codec == codecs::CODEC_TYPE_FLAC {
        AudioCodec::Flac
    } else if codec == codecs::CODEC_TYPE_VORBIS {
        AudioCodec::Vorbis
    } else if codec == codecs::CODEC_TYPE_OPUS {
        AudioCodec::Opus
    } else if codec == codecs::CODEC_TYPE_ALAC {
        AudioCodec::Alac
    } else if pcm.contains(&codec) {
        AudioCodec::Wav
    } else {
        warn!(?codec, "Unmapped codec type");
        AudioCodec::Unknown
    }
}
