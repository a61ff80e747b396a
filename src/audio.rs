//! Native audio output using cpal.
//!
//! The engine is the audible collaborator of the core: it consumes a note
//! and a scheduled time and produces sound. One background thread drains
//! trigger messages into the voice list; the cpal callback mixes voices
//! into the output stream. The instrument itself is fixed: a sine pluck
//! with zero attack and a short exponential decay, one voice per trigger.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use log::warn;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::note::Note;
use crate::session::TriggerSink;

/// Seconds each pluck rings before its voice is dropped.
const PLUCK_SECONDS: f64 = 0.4;

/// Output gain per voice, headroom for a handful of patterns.
const VOICE_GAIN: f64 = 0.35;

/// Message to the voice thread.
enum AudioMessage {
    /// Start a pluck at an absolute sample position.
    Pluck { start_sample: u64, freq: f64 },
    Shutdown,
}

/// One sounding pluck.
struct Voice {
    freq: f64,
    phase: f64,
    start_sample: u64,
    end_sample: u64,
}

impl Voice {
    fn new(start_sample: u64, freq: f64, sample_rate: f64) -> Self {
        Voice {
            freq,
            phase: 0.0,
            start_sample,
            end_sample: start_sample + (PLUCK_SECONDS * sample_rate) as u64,
        }
    }

    fn is_finished(&self, current_sample: u64) -> bool {
        current_sample > self.end_sample
    }

    fn generate_sample(&mut self, current_sample: u64, sample_rate: f64) -> f64 {
        if current_sample < self.start_sample {
            return 0.0;
        }

        let phase_inc = self.freq / sample_rate;
        self.phase += phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        let raw = (self.phase * 2.0 * PI).sin();

        // Zero attack, exponential-ish decay over the pluck length.
        let elapsed = (current_sample - self.start_sample) as f64 / sample_rate;
        let envelope = (1.0 - elapsed / PLUCK_SECONDS).max(0.0).powi(2);

        raw * envelope * VOICE_GAIN
    }
}

/// Voice list shared between the message thread and the stream callback.
struct MixerState {
    voices: Vec<Voice>,
    current_sample: u64,
    sample_rate: f64,
}

impl MixerState {
    fn new(sample_rate: f64) -> Self {
        MixerState {
            voices: Vec::with_capacity(32),
            current_sample: 0,
            sample_rate,
        }
    }

    fn add_voice(&mut self, start_sample: u64, freq: f64) {
        // A stale trigger time would start in the past; clamp to "now".
        let start = start_sample.max(self.current_sample);
        self.voices.push(Voice::new(start, freq, self.sample_rate));
    }

    fn generate_frame(&mut self) -> f32 {
        self.voices.retain(|v| !v.is_finished(self.current_sample));

        let mut mixed = 0.0;
        for voice in &mut self.voices {
            mixed += voice.generate_sample(self.current_sample, self.sample_rate);
        }
        self.current_sample += 1;

        // Soft clip to keep stacked onsets civil.
        let mixed = mixed.clamp(-2.0, 2.0);
        (mixed / (1.0 + mixed.abs())) as f32
    }
}

/// Handle to the running audio engine.
pub struct AudioEngine {
    sender: Sender<AudioMessage>,
    running: Arc<AtomicBool>,
    stream: Stream,
    sample_rate: f64,
}

impl AudioEngine {
    /// Open the default output device and start the stream.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0 as f64;
        let config: StreamConfig = supported_config.clone().into();

        let (tx, rx) = bounded::<AudioMessage>(256);
        let running = Arc::new(AtomicBool::new(true));

        let state = Arc::new(Mutex::new(MixerState::new(sample_rate)));
        let state_clone = state.clone();
        let running_clone = running.clone();

        std::thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match rx.recv_timeout(std::time::Duration::from_millis(10)) {
                    Ok(AudioMessage::Pluck { start_sample, freq }) => {
                        state_clone.lock().unwrap().add_voice(start_sample, freq);
                    }
                    Ok(AudioMessage::Shutdown) => {
                        running_clone.store(false, Ordering::SeqCst);
                        break;
                    }
                    Err(_) => {}
                }
            }
        });

        let stream = match supported_config.sample_format() {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, state.clone())?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, state.clone())?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, state.clone())?,
            _ => return Err(AudioError::UnsupportedFormat),
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(AudioEngine {
            sender: tx,
            running,
            stream,
            sample_rate,
        })
    }

    fn build_stream<S: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &Device,
        config: &StreamConfig,
        state: Arc<Mutex<MixerState>>,
    ) -> Result<Stream, AudioError> {
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                    let mut state = state.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let sample = S::from_sample(state.generate_frame());
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| warn!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Schedule a pluck at `time` seconds past transport zero.
    pub fn pluck_at(&self, time: f64, freq: f64) {
        let start_sample = (time.max(0.0) * self.sample_rate) as u64;
        let _ = self.sender.send(AudioMessage::Pluck { start_sample, freq });
    }

    /// Shut down the engine and drop the stream.
    pub fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.sender.send(AudioMessage::Shutdown);
        drop(self.stream);
    }
}

impl TriggerSink for AudioEngine {
    fn trigger(&mut self, note: Note, time: f64) {
        self.pluck_at(time, note.frequency());
    }
}

/// Errors from opening or running the output stream.
#[derive(Debug)]
pub enum AudioError {
    NoOutputDevice,
    ConfigError(String),
    StreamError(String),
    UnsupportedFormat,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoOutputDevice => write!(f, "no audio output device found"),
            AudioError::ConfigError(e) => write!(f, "audio config error: {}", e),
            AudioError::StreamError(e) => write!(f, "audio stream error: {}", e),
            AudioError::UnsupportedFormat => write!(f, "unsupported audio format"),
        }
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_envelope_decays_to_silence() {
        let sample_rate = 48_000.0;
        let mut voice = Voice::new(0, 440.0, sample_rate);
        let end = (PLUCK_SECONDS * sample_rate) as u64;
        // Past the pluck length the envelope is fully closed.
        let tail = voice.generate_sample(end + 1, sample_rate);
        assert_eq!(tail, 0.0);
        assert!(voice.is_finished(end + 1));
    }

    #[test]
    fn test_voice_silent_before_start() {
        let mut voice = Voice::new(1_000, 440.0, 48_000.0);
        assert_eq!(voice.generate_sample(0, 48_000.0), 0.0);
    }

    #[test]
    fn test_mixer_drops_finished_voices() {
        let mut state = MixerState::new(100.0);
        state.add_voice(0, 440.0);
        assert_eq!(state.voices.len(), 1);
        // Run well past the pluck length.
        for _ in 0..((PLUCK_SECONDS * 100.0) as usize + 10) {
            state.generate_frame();
        }
        assert!(state.voices.is_empty());
    }

    #[test]
    fn test_stale_trigger_clamped_to_now() {
        let mut state = MixerState::new(100.0);
        state.current_sample = 500;
        state.add_voice(100, 440.0);
        assert_eq!(state.voices[0].start_sample, 500);
    }
}
