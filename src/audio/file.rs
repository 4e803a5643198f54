//! File-sourced audio: WAV decode plus a virtual playback sink.
//!
//! Decodes an encoded WAV buffer into mono f32 samples at the session
//! sample rate, then hands them out block by block so the same downstream
//! pipeline applies to file and microphone input alike. When pacing is
//! enabled each block is delayed to real time; either way the source
//! reports natural end-of-input once the last block has been read.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, StreamscribeError};
use std::io::Cursor;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Downmix interleaved multi-channel samples to mono by averaging.
fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear resampling from `from_rate` to `to_rate`.
///
/// Quality is adequate for speech input; the transcription service receives
/// 16kHz regardless of the file's native rate.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

/// Audio source backed by a decoded WAV file.
#[derive(Debug)]
pub struct FileAudioSource {
    samples: Vec<f32>,
    position: usize,
    block_size: usize,
    sample_rate: u32,
    paced: bool,
    started: bool,
}

impl FileAudioSource {
    /// Decodes a WAV file from disk.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Decode` if it is not a valid WAV.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_wav_bytes(&bytes)
    }

    /// Decodes an in-memory WAV buffer.
    ///
    /// Accepts 16-bit/32-bit integer and f32 sample formats, any channel
    /// count, any sample rate; everything is converted to mono f32 at the
    /// session rate.
    ///
    /// # Errors
    /// `Decode` on unsupported or corrupt input.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader =
            hound::WavReader::new(Cursor::new(bytes)).map_err(|e| StreamscribeError::Decode {
                message: format!("invalid WAV data: {}", e),
            })?;
        let spec = reader.spec();

        let raw: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| StreamscribeError::Decode {
                    message: format!("failed to read f32 samples: {}", e),
                })?,
            hound::SampleFormat::Int => {
                let scale = match spec.bits_per_sample {
                    16 => i16::MAX as f32,
                    32 => i32::MAX as f32,
                    bits => {
                        return Err(StreamscribeError::Decode {
                            message: format!("unsupported bit depth: {}", bits),
                        });
                    }
                };
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| StreamscribeError::Decode {
                        message: format!("failed to read integer samples: {}", e),
                    })?
            }
        };

        let mono = mix_to_mono(&raw, spec.channels);
        let samples = resample_linear(&mono, spec.sample_rate, defaults::SAMPLE_RATE);

        Ok(Self {
            samples,
            position: 0,
            block_size: defaults::BLOCK_SIZE,
            sample_rate: defaults::SAMPLE_RATE,
            paced: true,
            started: false,
        })
    }

    /// Overrides the playback block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Enables or disables real-time pacing of block delivery.
    ///
    /// Paced playback sleeps one block duration per read, emulating a live
    /// virtual sink; unpaced delivery streams as fast as the channel allows.
    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Total decoded duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Number of blocks this source will deliver before end-of-input.
    pub fn block_count(&self) -> usize {
        self.samples.len().div_ceil(self.block_size)
    }
}

impl AudioSource for FileAudioSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Option<Vec<f32>>> {
        if self.position >= self.samples.len() {
            return Ok(None);
        }
        let end = (self.position + self.block_size).min(self.samples.len());
        let block = self.samples[self.position..end].to_vec();
        self.position = end;

        if self.paced {
            let block_ms = block.len() as u64 * 1000 / self.sample_rate as u64;
            thread::sleep(Duration::from_millis(block_ms));
        }
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an in-memory 16-bit mono WAV with the given samples and rate.
    pub(crate) fn wav_bytes_i16(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_open_rejects_garbage() {
        let err = FileAudioSource::from_wav_bytes(b"definitely not a wav").unwrap_err();
        assert!(matches!(err, StreamscribeError::Decode { .. }));
    }

    #[test]
    fn test_decode_16bit_mono_16khz() {
        let bytes = wav_bytes_i16(&[0, i16::MAX, i16::MIN + 1, 0], 16000, 1);
        let source = FileAudioSource::from_wav_bytes(&bytes).unwrap();
        assert_eq!(source.samples.len(), 4);
        assert!((source.samples[1] - 1.0).abs() < 1e-4);
        assert!((source.samples[2] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_stereo_is_downmixed() {
        // L=1.0, R=0.0 interleaved → mono 0.5
        let bytes = wav_bytes_i16(&[i16::MAX, 0, i16::MAX, 0], 16000, 2);
        let source = FileAudioSource::from_wav_bytes(&bytes).unwrap();
        assert_eq!(source.samples.len(), 2);
        assert!((source.samples[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_higher_rate_is_resampled_down() {
        let samples: Vec<i16> = vec![1000; 48000]; // 1s at 48kHz
        let bytes = wav_bytes_i16(&samples, 48000, 1);
        let source = FileAudioSource::from_wav_bytes(&bytes).unwrap();
        // 1s of audio → 16000 samples at the session rate, within rounding.
        assert!((source.samples.len() as i64 - 16000).abs() <= 1);
    }

    #[test]
    fn test_one_second_at_128_block_yields_125_blocks() {
        let samples: Vec<i16> = vec![100; 16000];
        let bytes = wav_bytes_i16(&samples, 16000, 1);
        let source = FileAudioSource::from_wav_bytes(&bytes)
            .unwrap()
            .with_block_size(128);
        assert_eq!(source.block_count(), 125);
        assert_eq!(source.duration_ms(), 1000);
    }

    #[test]
    fn test_reads_blocks_then_end_of_input() {
        let samples: Vec<i16> = vec![100; 300];
        let bytes = wav_bytes_i16(&samples, 16000, 1);
        let mut source = FileAudioSource::from_wav_bytes(&bytes)
            .unwrap()
            .with_block_size(128)
            .with_pacing(false);
        source.start().unwrap();

        assert_eq!(source.read_samples().unwrap().unwrap().len(), 128);
        assert_eq!(source.read_samples().unwrap().unwrap().len(), 128);
        assert_eq!(source.read_samples().unwrap().unwrap().len(), 44);
        assert_eq!(source.read_samples().unwrap(), None);
        assert_eq!(source.read_samples().unwrap(), None);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_mix_to_mono_mono_passthrough() {
        let samples = vec![0.1, 0.2];
        assert_eq!(mix_to_mono(&samples, 1), samples);
    }
}
