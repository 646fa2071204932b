//! # Audio Capture Module
//!
//! This module delivers fixed-size blocks of signed 16-bit mono samples from
//! the microphone using CPAL (Cross-Platform Audio Library).
//!
//! ## Features
//! - [`FrameSource`] abstraction so the session can run on any sample source
//! - Default input device with 16-bit, float or unsigned formats, converted to `i16`
//! - Multi-channel devices reduced to their first channel
//! - Explicit open → first read → reopen retry loop ([`open_with_retry`])

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use crate::error::{Result, TunerError};

/// Audio buffer size for processing frames.
///
/// This constant defines the number of samples per audio frame.
/// Larger buffers provide more frequency resolution but increase latency.
pub const BUFFER_SIZE: usize = 2048;

/// Capture rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Frames buffered between the capture callback and the reader.
const FRAME_QUEUE_DEPTH: usize = 4;

/// A blocking source of fixed-size audio frames.
#[cfg_attr(test, automock)]
pub trait FrameSource {
    /// Fills `frame` with the next block of samples, blocking until it is
    /// available.
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
        (**self).read_frame(frame)
    }
}

/// How hard to try when the device fails to open or to deliver its first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts before giving up, `None` to retry forever
    pub max_attempts: Option<u32>,
    /// Pause between attempts in milliseconds
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            backoff_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// A source whose first frame has already been read while opening.
///
/// The first read yields that frame, later reads go to the inner source.
#[derive(Debug)]
pub struct PrimedSource<S> {
    inner: S,
    pending: Option<Vec<i16>>,
}

impl<S: FrameSource> FrameSource for PrimedSource<S> {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
        match self.pending.take() {
            Some(first) if first.len() == frame.len() => {
                frame.copy_from_slice(&first);
                Ok(())
            }
            Some(first) => Err(TunerError::FrameLength {
                expected: frame.len(),
                actual: first.len(),
            }),
            None => self.inner.read_frame(frame),
        }
    }
}

/// Opens a source and proves it works by reading one frame.
///
/// Some platforms hand out an input stream whose first read fails. When
/// opening or the first read fails, the source is dropped (closing the
/// device) and `open` is called again, until it succeeds or `policy` runs
/// out of attempts.
///
/// # Arguments
/// * `open` - Opens a fresh source
/// * `chunk_size` - Samples per frame
/// * `policy` - Attempt limit and backoff
///
/// # Returns
/// * `Ok(source)` - A source that replays the successful first frame
/// * `Err(TunerError::RetriesExhausted)` - Bounded policy ran out
pub fn open_with_retry<S, F>(mut open: F, chunk_size: usize, policy: &RetryPolicy) -> Result<PrimedSource<S>>
where
    S: FrameSource,
    F: FnMut() -> Result<S>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let opened = open().and_then(|mut inner| {
            let mut first = vec![0; chunk_size];
            inner.read_frame(&mut first)?;
            Ok(PrimedSource {
                inner,
                pending: Some(first),
            })
        });

        match opened {
            Ok(source) => {
                if attempts > 1 {
                    info!("[AUDIO] Input opened after {} attempts", attempts);
                }
                return Ok(source);
            }
            Err(e) if policy.exhausted(attempts) => {
                return Err(TunerError::RetriesExhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!("[AUDIO] Opening input failed (attempt {}): {}; reopening", attempts, e);
                thread::sleep(policy.backoff());
            }
        }
    }
}

/// Microphone input through the default CPAL host.
pub struct CpalFrameSource {
    stream: cpal::Stream,
    frames: Receiver<Vec<i16>>,
    read_timeout: Duration,
}

impl CpalFrameSource {
    /// Starts capturing from the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks a configuration that supports `sample_rate`, preferring mono 16-bit
    /// 3. Starts a stream whose callback slices the input into `chunk_size` frames
    ///
    /// # Arguments
    /// * `chunk_size` - Samples per frame
    /// * `sample_rate` - Capture rate in Hz
    /// * `read_timeout` - Longest wait for a frame before [`TunerError::ReadTimeout`]
    pub fn open(chunk_size: usize, sample_rate: u32, read_timeout: Duration) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(TunerError::NoInputDevice)?;

        let device_name = device.name().map_err(|e| TunerError::Device(e.to_string()))?;
        info!("[AUDIO] Using audio input device: {}", device_name);

        let configs = device
            .supported_input_configs()
            .map_err(|e| TunerError::Device(e.to_string()))?
            .collect::<Vec<_>>();
        let supported_config =
            find_supported_config(configs, sample_rate).ok_or(TunerError::NoSupportedConfig { sample_rate })?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();
        info!(
            "[AUDIO] Capturing {} Hz, {} channel(s), {:?}",
            sample_rate, config.channels, sample_format
        );

        let (tx, frames) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &config, chunk_size, tx),
            SampleFormat::F32 => build_stream::<f32>(&device, &config, chunk_size, tx),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, chunk_size, tx),
            _ => return Err(TunerError::NoSupportedConfig { sample_rate }),
        }?;

        stream.play().map_err(|e| TunerError::StreamPlay(e.to_string()))?;

        Ok(Self {
            stream,
            frames,
            read_timeout,
        })
    }
}

impl FrameSource for CpalFrameSource {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
        let next = match self.frames.recv_timeout(self.read_timeout) {
            Ok(next) => next,
            Err(RecvTimeoutError::Timeout) => return Err(TunerError::ReadTimeout),
            Err(RecvTimeoutError::Disconnected) => return Err(TunerError::StreamClosed),
        };
        if next.len() != frame.len() {
            return Err(TunerError::FrameLength {
                expected: frame.len(),
                actual: next.len(),
            });
        }
        frame.copy_from_slice(&next);
        Ok(())
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("[AUDIO] Error pausing stream: {}", e);
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    chunk_size: usize,
    sender: Sender<Vec<i16>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let err_fn = |err| warn!("[AUDIO] An error occurred on the audio stream: {}", err);

    // This buffer will accumulate audio data from the callback.
    let mut pending: Vec<i16> = Vec::with_capacity(chunk_size * 2);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                pending.extend(data.iter().step_by(channels).map(|&s| s.to_sample::<i16>()));

                while pending.len() >= chunk_size {
                    let frame: Vec<i16> = pending.drain(..chunk_size).collect();
                    // A full queue means the reader is behind; dropping keeps latency bounded.
                    let _ = sender.try_send(frame);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| TunerError::StreamBuild(e.to_string()))
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only ranges that include `target_rate` and use a format we can convert
/// are considered. Among those, fewer channels win, then 16-bit over float
/// over unsigned.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .filter_map(|c| format_rank(c.sample_format()).map(|rank| (c.channels(), rank, c)))
        .min_by_key(|&(channels, rank, _)| (channels, rank))
        .map(|(_, _, c)| c)
}

fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleRate, SupportedBufferSize};
    use mockall::Sequence;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    fn no_backoff(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_ms: 0,
        }
    }

    #[test]
    fn prefers_mono_sixteen_bit() {
        let configs = vec![
            range(2, 8000, 96000, SampleFormat::I16),
            range(1, 8000, 96000, SampleFormat::F32),
            range(1, 8000, 96000, SampleFormat::I16),
        ];
        let picked = find_supported_config(configs, 44100).unwrap();
        assert_eq!(picked.channels(), 1);
        assert_eq!(picked.sample_format(), SampleFormat::I16);
    }

    #[test]
    fn skips_ranges_without_target_rate() {
        let configs = vec![
            range(1, 48000, 48000, SampleFormat::I16),
            range(2, 44100, 44100, SampleFormat::F32),
        ];
        let picked = find_supported_config(configs, 44100).unwrap();
        assert_eq!(picked.channels(), 2);
        assert!(find_supported_config(vec![range(1, 48000, 48000, SampleFormat::I16)], 44100).is_none());
    }

    #[test]
    fn first_read_failure_reopens_and_keeps_first_frame() {
        let mut opens = 0;
        let source = open_with_retry(
            || {
                opens += 1;
                let mut mock = MockFrameSource::new();
                if opens == 1 {
                    mock.expect_read_frame().times(1).returning(|_| Err(TunerError::ReadTimeout));
                } else {
                    let mut seq = Sequence::new();
                    mock.expect_read_frame()
                        .times(1)
                        .in_sequence(&mut seq)
                        .returning(|frame| {
                            frame.fill(7);
                            Ok(())
                        });
                    mock.expect_read_frame()
                        .times(1)
                        .in_sequence(&mut seq)
                        .returning(|frame| {
                            frame.fill(9);
                            Ok(())
                        });
                }
                Ok(mock)
            },
            4,
            &no_backoff(None),
        );
        let mut source = source.unwrap();
        assert_eq!(opens, 2);

        let mut frame = [0; 4];
        source.read_frame(&mut frame).unwrap();
        assert_eq!(frame, [7; 4]);
        source.read_frame(&mut frame).unwrap();
        assert_eq!(frame, [9; 4]);
    }

    #[test]
    fn open_failures_are_retried() {
        let mut opens = 0;
        let source = open_with_retry(
            || {
                opens += 1;
                if opens < 3 {
                    return Err(TunerError::NoInputDevice);
                }
                let mut mock = MockFrameSource::new();
                mock.expect_read_frame().returning(|_| Ok(()));
                Ok(mock)
            },
            8,
            &no_backoff(None),
        );
        assert!(source.is_ok());
        assert_eq!(opens, 3);
    }

    #[test]
    fn bounded_policy_gives_up() {
        let mut opens = 0;
        let result = open_with_retry(
            || {
                opens += 1;
                let mut mock = MockFrameSource::new();
                mock.expect_read_frame().returning(|_| Err(TunerError::StreamClosed));
                Ok(mock)
            },
            8,
            &no_backoff(Some(3)),
        );
        assert_eq!(opens, 3);
        match result {
            Err(TunerError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, TunerError::StreamClosed));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn primed_frame_length_is_checked() {
        let mut source = PrimedSource {
            inner: MockFrameSource::new(),
            pending: Some(vec![1, 2, 3]),
        };
        let mut frame = [0; 4];
        assert!(matches!(
            source.read_frame(&mut frame),
            Err(TunerError::FrameLength { expected: 4, actual: 3 })
        ));
    }
}
