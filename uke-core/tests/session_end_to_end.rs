//! Drives a full tuning pass over synthetic audio.

use std::f64::consts::PI;

use uke_core::audio::{FrameSource, RetryPolicy, open_with_retry};
use uke_core::input::AdvanceSignal;
use uke_core::{DeviationSink, Reading, Result, Target, TunerConfig, TunerError, Tuning, TuningSession};

/// A player who tunes each string slightly flat, plucking it once.
struct Player {
    notes: Vec<f64>,
    string: usize,
    frame_in_string: usize,
    frames_per_string: usize,
    rate: f64,
}

impl FrameSource for Player {
    fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
        let freq = self.notes[self.string];
        // The pluck: one frame of an octave-up attack before the note settles.
        let sounding = if self.frame_in_string == 12 { freq * 2.0 } else { freq };
        for (t, sample) in frame.iter_mut().enumerate() {
            *sample = (12_000.0 * (2.0 * PI * sounding * t as f64 / self.rate).sin()).round() as i16;
        }

        self.frame_in_string += 1;
        if self.frame_in_string == self.frames_per_string {
            self.frame_in_string = 0;
            self.string = (self.string + 1).min(self.notes.len() - 1);
        }
        Ok(())
    }
}

struct AfterFrames {
    every: usize,
    seen: usize,
}

impl AdvanceSignal for AfterFrames {
    fn poll(&mut self) -> bool {
        self.seen += 1;
        self.seen % self.every == 0
    }
}

#[derive(Default)]
struct Display {
    strings: Vec<String>,
    readings: Vec<Vec<Reading>>,
    finished: bool,
}

impl DeviationSink for Display {
    fn begin_target(&mut self, _index: usize, target: &Target) {
        self.strings.push(target.name.clone());
        self.readings.push(Vec::new());
    }

    fn show(&mut self, reading: &Reading) {
        self.readings.last_mut().unwrap().push(*reading);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

#[test]
fn standard_tuning_reads_each_string_within_a_hertz() {
    let config = TunerConfig::default();
    let tuning = Tuning::default();
    let frames_per_string = 30;
    let player = Player {
        notes: tuning.targets.iter().map(|t| t.frequency - 2.0).collect(),
        string: 0,
        frame_in_string: 0,
        frames_per_string,
        rate: config.sample_rate as f64,
    };
    let advance = AfterFrames {
        every: frames_per_string,
        seen: 0,
    };
    let mut display = Display::default();

    let summary = TuningSession::new(&config, tuning.clone(), player, advance, &mut display)
        .unwrap()
        .run()
        .unwrap();

    assert!(display.finished);
    assert_eq!(display.strings, ["G", "C", "E", "A"]);
    assert_eq!(summary.frames, 4 * frames_per_string as u64);
    assert_eq!(summary.accepted + summary.held, summary.frames);

    for (readings, target) in display.readings.iter().zip(&tuning.targets) {
        // The window refill plus the octave pluck is all that gets held.
        assert!(readings.len() >= frames_per_string - config.sample_size - 2);
        let last = readings.last().unwrap();
        assert!((last.deviation - 2.0).abs() < 1.0, "{}: {:?}", target.name, last);
        assert!(readings.iter().all(|r| r.average > 0.0 && r.average.is_finite()));
    }
}

#[test]
fn session_survives_a_flaky_first_read() {
    let config = TunerConfig::default();
    let mut opens = 0;

    struct Flaky {
        fail_first: bool,
        inner: Player,
    }

    impl FrameSource for Flaky {
        fn read_frame(&mut self, frame: &mut [i16]) -> Result<()> {
            if std::mem::take(&mut self.fail_first) {
                return Err(TunerError::ReadTimeout);
            }
            self.inner.read_frame(frame)
        }
    }

    let source = open_with_retry(
        || {
            opens += 1;
            Ok(Flaky {
                fail_first: opens == 1,
                inner: Player {
                    notes: vec![392.0],
                    string: 0,
                    frame_in_string: 0,
                    frames_per_string: usize::MAX,
                    rate: config.sample_rate as f64,
                },
            })
        },
        config.chunk_size,
        &RetryPolicy {
            max_attempts: Some(5),
            backoff_ms: 0,
        },
    )
    .unwrap();
    assert_eq!(opens, 2);

    let single = Tuning {
        name: "G only".into(),
        targets: vec![Tuning::default().targets[0].clone()],
    };
    let mut display = Display::default();
    let summary = TuningSession::new(&config, single, source, AfterFrames { every: 20, seen: 0 }, &mut display)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(summary.frames, 20);
    let last = summary.strings[0].last_average.unwrap();
    assert!((last - 392.0).abs() < 1.0, "{last}");
}
