//! Background music.
//!
//! [`BackgroundMusic`] plays one track on the default output device through
//! `rodio`. Without an output device it still tracks play/stop state, so the
//! debug panel behaves the same on a silent machine.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::{AssetError, AudioError};

/// An encoded audio file that is known to decode.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    pub name: String,
    bytes: Arc<[u8]>,
}

impl AudioTrack {
    /// Wrap encoded bytes, checking that a decoder accepts them.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AudioError> {
        let bytes: Arc<[u8]> = bytes.into();
        Decoder::new(Cursor::new(bytes.clone())).map_err(|e| AudioError::Decode(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            bytes,
        })
    }

    /// Read and validate an audio file. Runs on a loader thread.
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_bytes(name, bytes).map_err(|source| AssetError::Audio {
            path: path.to_path_buf(),
            source,
        })
    }

    fn decoder(&self) -> Result<Decoder<Cursor<Arc<[u8]>>>, AudioError> {
        Decoder::new(Cursor::new(self.bytes.clone())).map_err(|e| AudioError::Decode(e.to_string()))
    }
}

struct AudioOutput {
    // Dropping the stream silences every sink
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

/// One looping music track with play and stop actions.
pub struct BackgroundMusic {
    output: Option<AudioOutput>,
    track: Option<AudioTrack>,
    sink: Option<Sink>,
    playing: bool,
    volume: f32,
    looping: bool,
}

impl BackgroundMusic {
    /// Open the default output device, falling back to silent playback.
    pub fn new(volume: f32, looping: bool) -> Self {
        let output = match OutputStream::try_default() {
            Ok((stream, handle)) => Some(AudioOutput {
                _stream: stream,
                handle,
            }),
            Err(e) => {
                log::warn!("{}", AudioError::NoOutputDevice(e.to_string()));
                None
            }
        };
        Self {
            output,
            ..Self::detached(volume, looping)
        }
    }

    /// Music state without any output device.
    pub fn detached(volume: f32, looping: bool) -> Self {
        Self {
            output: None,
            track: None,
            sink: None,
            playing: false,
            volume,
            looping,
        }
    }

    pub fn set_track(&mut self, track: AudioTrack) {
        self.stop();
        log::info!("music track ready: {}", track.name);
        self.track = Some(track);
    }

    pub fn has_track(&self) -> bool {
        self.track.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.playing && self.sink.as_ref().is_none_or(|s| !s.empty())
    }

    /// Start the track from the beginning.
    ///
    /// Warns and does nothing if there is no track or it is already playing.
    pub fn play(&mut self) {
        let Some(track) = &self.track else {
            log::warn!("no music track loaded");
            return;
        };
        if self.is_playing() {
            log::warn!("music is already playing");
            return;
        }

        self.sink = None;
        if let Some(output) = &self.output {
            match start_sink(&output.handle, track, self.volume, self.looping) {
                Ok(sink) => self.sink = Some(sink),
                Err(e) => {
                    log::error!("{e}");
                    return;
                }
            }
        }
        self.playing = true;
        log::debug!("music playing");
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        if self.playing {
            log::debug!("music stopped");
        }
        self.playing = false;
    }
}

fn start_sink(
    handle: &OutputStreamHandle,
    track: &AudioTrack,
    volume: f32,
    looping: bool,
) -> Result<Sink, AudioError> {
    let sink = Sink::try_new(handle).map_err(|e| AudioError::Sink(e.to_string()))?;
    let source = track.decoder()?;
    if looping {
        sink.append(source.repeat_infinite());
    } else {
        sink.append(source);
    }
    sink.set_volume(volume);
    sink.play();
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 8 samples of 8 kHz mono 16-bit silence
    fn tiny_wav() -> Vec<u8> {
        let samples = 8u32;
        let data_len = samples * 2;
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8000u32.to_le_bytes());
        wav.extend_from_slice(&16000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend(std::iter::repeat_n(0u8, data_len as usize));
        wav
    }

    #[test]
    fn play_without_track_does_nothing() {
        let mut music = BackgroundMusic::detached(0.5, true);
        music.play();
        assert!(!music.is_playing());
    }

    #[test]
    fn play_and_stop_track_state() {
        let mut music = BackgroundMusic::detached(0.5, true);
        music.set_track(AudioTrack::from_bytes("silence.wav", tiny_wav()).expect("valid wav"));
        music.play();
        assert!(music.is_playing());
        // A second play is ignored
        music.play();
        assert!(music.is_playing());
        music.stop();
        assert!(!music.is_playing());
        music.play();
        assert!(music.is_playing());
    }

    #[test]
    fn garbage_does_not_decode() {
        let err = AudioTrack::from_bytes("noise", vec![1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AudioTrack::load(Path::new("no/such/song.mp3")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
