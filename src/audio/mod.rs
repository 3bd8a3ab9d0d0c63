/// Audio monitor using cpal - each open gate sounds a short sine at its own pitch
use crate::sequencer::row::{RowIndex, ROWS};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

/// Open gates and per-row oscillator phases, shared with the audio callback
#[derive(Debug, Default)]
struct Voices {
    open: [bool; ROWS],
    phase: [f32; ROWS],
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    voices: Arc<Mutex<Voices>>,
}

impl AudioOutput {
    pub fn new() -> Option<Self> {
        let voices = Arc::new(Mutex::new(Voices::default()));
        let stream = Self::setup_audio_stream(Arc::clone(&voices))?;

        Some(Self {
            _stream: Some(stream),
            voices,
        })
    }

    /// An output that never opens a device
    pub fn silent() -> Self {
        Self {
            _stream: None,
            voices: Arc::new(Mutex::new(Voices::default())),
        }
    }

    fn setup_audio_stream(voices: Arc<Mutex<Voices>>) -> Option<cpal::Stream> {
        let host = cpal::default_host();
        let device = host.default_output_device()?;
        let config = device.default_output_config().ok()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voices) = voices.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels.max(1)) {
                        let sample = voices.next_sample(sample_rate);
                        frame.fill(sample);
                    }
                },
                |err| log::warn!("Audio stream error: {}", err),
                None,
            ),
            format => {
                log::warn!("Audio: unsupported sample format {:?}", format);
                return None;
            }
        };

        match stream {
            Ok(stream) => {
                if let Err(e) = stream.play() {
                    log::warn!("Audio: failed to start stream: {}", e);
                }
                Some(stream)
            }
            Err(e) => {
                log::warn!("Audio: failed to build stream: {}", e);
                None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self._stream.is_some()
    }

    pub fn set_gate(&mut self, row: RowIndex, high: bool) {
        if let Ok(mut voices) = self.voices.lock() {
            voices.open[row.get()] = high;
            if !high {
                voices.phase[row.get()] = 0.0;
            }
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(Self::silent)
    }
}

impl Voices {
    fn next_sample(&mut self, sample_rate: f32) -> f32 {
        let mut sum = 0.0;
        for (i, phase) in self.phase.iter_mut().enumerate() {
            if !self.open[i] {
                continue;
            }
            sum += (*phase * 2.0 * std::f32::consts::PI).sin();
            *phase += row_frequency(i) / sample_rate;
            if *phase >= 1.0 {
                *phase -= 1.0;
            }
        }
        sum * 0.05
    }
}

/// Row 0 is the highest voice; each row below sits a fifth lower
fn row_frequency(row: usize) -> f32 {
    1760.0 * 2.0_f32.powf(-(row as f32) * 7.0 / 12.0)
}
