use crate::error::{Result, SliceError};
use std::fs::File;
use std::path::Path;

/// A decoded audio signal: one `Vec<f32>` per channel, all the same length.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn duration_sec(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate as f64
    }

    /// Average all channels down to a single analysis signal.
    pub fn to_mono(&self) -> Vec<f32> {
        let n = self.num_samples();
        if self.channels.len() == 1 {
            return self.channels[0].clone();
        }
        let mut mono = vec![0f32; n];
        for channel in &self.channels {
            for (i, sample) in channel.iter().enumerate() {
                mono[i] += sample;
            }
        }
        let scale = 1.0 / self.channels.len() as f32;
        for v in &mut mono {
            *v *= scale;
        }
        mono
    }

    /// Slice `[begin, end)` samples out of every channel, clamped to length.
    pub fn slice_samples(&self, begin: usize, end: usize) -> Waveform {
        let n = self.num_samples();
        let begin = begin.min(n);
        let end = end.min(n).max(begin);
        Waveform {
            channels: self.channels.iter().map(|c| c[begin..end].to_vec()).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Decode a file from disk. WAV is handled directly via `hound`; every
    /// other supported container (mp3/flac/ogg/m4a/aac) goes through
    /// `symphonia`.
    pub fn decode_file(path: impl AsRef<Path>) -> Result<Waveform> {
        let path = path.as_ref();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);

        if is_wav {
            decode_wav(path)
        } else {
            decode_with_symphonia(path)
        }
    }

    /// Write as 16-bit PCM WAV, matching the container the original service
    /// produces slices in.
    pub fn write_wav(&self, path: impl AsRef<Path>) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.num_channels().max(1) as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path.as_ref(), spec)
            .map_err(|e| SliceError::Encode(e.to_string()))?;

        let n = self.num_samples();
        for i in 0..n {
            for channel in &self.channels {
                let sample = channel[i].clamp(-1.0, 1.0);
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .map_err(|e| SliceError::Encode(e.to_string()))?;
            }
        }
        writer.finalize().map_err(|e| SliceError::Encode(e.to_string()))?;
        Ok(())
    }

    /// Resample to `target_sr`, preserving channel count. Identity when the
    /// rate already matches.
    pub fn resampled(&self, target_sr: u32) -> Result<Waveform> {
        if self.sample_rate == target_sr || self.num_samples() == 0 {
            return Ok(Waveform {
                channels: self.channels.clone(),
                sample_rate: target_sr,
            });
        }

        use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = target_sr as f64 / self.sample_rate as f64;
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, self.num_samples(), self.num_channels())
            .map_err(|e| SliceError::Decode(format!("resampler init failed: {e}")))?;

        let output = resampler
            .process(&self.channels, None)
            .map_err(|e| SliceError::Decode(format!("resample failed: {e}")))?;

        Ok(Waveform {
            channels: output,
            sample_rate: target_sr,
        })
    }

    /// Up-mix mono to stereo by channel replication, no gain compensation.
    /// No-op for other channel counts.
    pub fn upmixed_to_stereo(&self) -> Waveform {
        if self.channels.len() == 1 {
            Waveform {
                channels: vec![self.channels[0].clone(), self.channels[0].clone()],
                sample_rate: self.sample_rate,
            }
        } else {
            self.clone()
        }
    }

    /// Concatenate `others` onto this waveform along the sample axis.
    /// Callers are responsible for first aligning sample rate and channel
    /// count (see `SliceCompactor`).
    pub fn concat(mut self, other: &Waveform) -> Waveform {
        for (ch, other_ch) in self.channels.iter_mut().zip(other.channels.iter()) {
            ch.extend_from_slice(other_ch);
        }
        self
    }
}

fn decode_wav(path: &Path) -> Result<Waveform> {
    let mut reader = hound::WavReader::open(path).map_err(|e| SliceError::Decode(e.to_string()))?;
    let spec = reader.spec();
    let num_channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| SliceError::Decode(e.to_string()))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SliceError::Decode(e.to_string()))?,
    };

    Ok(deinterleave(interleaved, num_channels, sample_rate))
}

fn decode_with_symphonia(path: &Path) -> Result<Waveform> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SliceError::Decode(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| SliceError::Decode("no default audio track".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SliceError::Decode("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SliceError::Decode(e.to_string()))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(e) => return Err(SliceError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(SliceError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        if channels.is_empty() {
            channels = vec![Vec::new(); spec.channels.count()];
        }
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let interleaved = sample_buf.samples();
        for (i, sample) in interleaved.iter().enumerate() {
            channels[i % spec.channels.count()].push(*sample);
        }
    }

    if channels.is_empty() {
        return Err(SliceError::Decode("no audio samples decoded".into()));
    }

    Ok(Waveform { channels, sample_rate })
}

fn deinterleave(interleaved: Vec<f32>, num_channels: usize, sample_rate: u32) -> Waveform {
    let mut channels = vec![Vec::with_capacity(interleaved.len() / num_channels.max(1)); num_channels.max(1)];
    for (i, sample) in interleaved.into_iter().enumerate() {
        channels[i % num_channels.max(1)].push(sample);
    }
    Waveform { channels, sample_rate }
}
