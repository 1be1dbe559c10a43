//! Run driver: plans brackets and processes them one after another.
//!
//! Brackets are strictly sequential. A bracket's frames are loaded, ranked,
//! corrected in parallel, trimmed to the frames it owns and emitted; its
//! buffers are released before the next bracket is loaded, which keeps peak
//! memory at one bracket.

use std::time::{Duration, Instant};

use common::Buffer3;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::{FrameSink, FrameSource};
use crate::planner::{Bracket, plan_brackets, slices_that_fit};
use crate::progress::{Stage, report_progress};
use crate::sample::Sample;
use crate::scheduler::subtract_bracket;

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub brackets: usize,
    pub frames: usize,
    pub pixels_per_frame: usize,
    pub elapsed: Duration,
}

/// Subtracts the temporal median from every frame `source` provides (or the
/// configured frame range) and hands the corrected frames to `sink`.
///
/// Bracket size follows the memory budget in `config.memory`.
pub fn run<S, Src, Snk>(config: &Config, source: &mut Src, sink: &mut Snk) -> Result<RunSummary>
where
    S: Sample,
    Src: FrameSource<S>,
    Snk: FrameSink<S>,
{
    let range = config.validate(source.frame_count())?;
    let pixels = source.width() * source.height();
    if pixels == 0 {
        return Err(Error::EmptyVolume);
    }

    let frame_bytes = (pixels * S::BIT_DEPTH.bytes_per_sample()) as u64;
    let available_memory = config.memory.available_memory();
    let safety_ratio = config.memory.safety_ratio(S::BIT_DEPTH);
    let budget = slices_that_fit(frame_bytes, available_memory, safety_ratio, config.window);
    let brackets = plan_brackets(range.clone(), config.window, budget)?;

    tracing::info!(
        width = source.width(),
        height = source.height(),
        bit_depth = %S::BIT_DEPTH,
        frames = ?range,
        window = config.window,
        strategy = %config.strategy,
        available_memory_mb = available_memory / (1024 * 1024),
        safety_ratio,
        slices_per_bracket = budget,
        brackets = brackets.len(),
        "Temporal median run planned"
    );

    run_brackets(config, &brackets, source, sink)
}

/// Processes an explicit bracket plan, e.g. one made with [`plan_brackets`].
pub fn run_brackets<S, Src, Snk>(
    config: &Config,
    brackets: &[Bracket],
    source: &mut Src,
    sink: &mut Snk,
) -> Result<RunSummary>
where
    S: Sample,
    Src: FrameSource<S>,
    Snk: FrameSink<S>,
{
    let started = Instant::now();
    let pool = config.build_thread_pool()?;
    let expected_dims = (source.width(), source.height());
    let progress = config.progress.as_ref();
    let total = brackets.len();
    let mut frames = 0;

    for (i, bracket) in brackets.iter().enumerate() {
        let bracket_started = Instant::now();

        report_progress(progress, i, total, Stage::Loading);
        let load_range = bracket.load_range();
        let mut volume = source.load(load_range.clone()).map_err(|source| Error::Source {
            range: load_range.clone(),
            source,
        })?;
        check_loaded(&volume, bracket, expected_dims)?;

        report_progress(progress, i, total, Stage::Processing);
        let stats = subtract_bracket(&mut volume, config.window, config.strategy, &pool)?;

        report_progress(progress, i, total, Stage::Emitting);
        let owned = volume.frame_range(bracket.trimmed_range());
        sink.emit(bracket.frame_start, owned)
            .map_err(|source| Error::Sink {
                first_frame: bracket.frame_start,
                source,
            })?;
        frames += bracket.frame_end - bracket.frame_start;

        tracing::debug!(
            bracket = i,
            load = ?load_range,
            output = ?bracket.output_range(),
            distinct_values = stats.distinct_values,
            elapsed_ms = bracket_started.elapsed().as_millis() as u64,
            "Bracket processed"
        );
    }

    let summary = RunSummary {
        brackets: total,
        frames,
        pixels_per_frame: expected_dims.0 * expected_dims.1,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        brackets = summary.brackets,
        frames = summary.frames,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Temporal median run finished"
    );
    Ok(summary)
}

fn check_loaded<S>(volume: &Buffer3<S>, bracket: &Bracket, expected: (usize, usize)) -> Result<()> {
    let actual = (volume.width(), volume.height());
    if actual != expected {
        return Err(Error::DimensionMismatch { expected, actual });
    }
    if volume.frames() != bracket.load_len() {
        return Err(Error::FrameCountMismatch {
            range: bracket.load_range(),
            actual: volume.frames(),
        });
    }
    Ok(())
}

/// Subtracts the temporal median from a volume that is already in memory.
///
/// Frames outside `config.frame_range` are left untouched. The memory budget
/// is not consulted: the data is processed as one bracket.
pub fn subtract_in_place<S: Sample>(volume: &mut Buffer3<S>, config: &Config) -> Result<()> {
    let range = config.validate(volume.frames())?;
    if volume.plane_len() == 0 {
        return Err(Error::EmptyVolume);
    }
    let pool = config.build_thread_pool()?;

    if range.len() == volume.frames() {
        subtract_bracket(volume, config.window, config.strategy, &pool)?;
    } else {
        let mut sub = volume.slice_frames(range.clone());
        subtract_bracket(&mut sub, config.window, config.strategy, &pool)?;
        volume.frame_range_mut(range).copy_from_slice(sub.as_slice());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::sync::{Arc, Mutex};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::error::BoxedError;
    use crate::io::{VolumeSink, VolumeSource};
    use crate::progress::Progress;
    use crate::testing::init_tracing;
    use crate::tracker::Strategy;

    fn random_volume(seed: u64, w: usize, h: usize, frames: usize) -> Buffer3<u16> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..w * h * frames)
            .map(|_| rng.random_range(0..4096))
            .collect();
        Buffer3::new(w, h, frames, data)
    }

    fn run_plan(volume: &Buffer3<u16>, config: &Config, brackets: &[Bracket]) -> Buffer3<u16> {
        let mut source = VolumeSource::new(volume);
        let mut sink = VolumeSink::new(volume.width(), volume.height(), volume.frames());
        run_brackets(config, brackets, &mut source, &mut sink).unwrap();
        sink.into_inner()
    }

    #[test]
    fn test_chunking_is_transparent() {
        init_tracing();
        let volume = random_volume(42, 3, 2, 2000);
        let config = Config::with_window(51).threads(4);

        let mut whole = volume.clone();
        subtract_in_place(&mut whole, &config).unwrap();

        for k in [1usize, 2, 3, 7] {
            let budget = 2000usize.div_ceil(k);
            let brackets = plan_brackets(0..2000, 51, budget).unwrap();
            assert_eq!(brackets.len(), k);

            let chunked = run_plan(&volume, &config, &brackets);
            assert_eq!(chunked, whole, "{k} brackets");
        }
    }

    #[test]
    fn test_chunking_is_transparent_for_hung() {
        let volume = random_volume(7, 4, 4, 500);
        let config = Config::with_window(31).strategy(Strategy::Hung);

        let mut whole = volume.clone();
        subtract_in_place(&mut whole, &config).unwrap();

        let brackets = plan_brackets(0..500, 31, 90).unwrap();
        assert!(brackets.len() > 4);
        assert_eq!(run_plan(&volume, &config, &brackets), whole);
    }

    #[test]
    fn test_run_splits_by_memory_budget() {
        let volume = random_volume(3, 3, 2, 2000);
        let frame_bytes = 3 * 2 * 2;
        let progress: Arc<Mutex<Vec<Progress>>> = Arc::default();
        let seen = progress.clone();
        let config = Config::with_window(51)
            .available_memory((300 + 51) * frame_bytes)
            .safety_ratio(1.0)
            .progress(Arc::new(move |p: Progress| seen.lock().unwrap().push(p)));

        let mut source = VolumeSource::new(&volume);
        let mut sink = VolumeSink::new(3, 2, 2000);
        let summary = run(&config, &mut source, &mut sink).unwrap();

        assert_eq!(summary.brackets, 7);
        assert_eq!(summary.frames, 2000);
        assert_eq!(summary.pixels_per_frame, 6);

        let mut whole = volume.clone();
        subtract_in_place(&mut whole, &config).unwrap();
        assert_eq!(sink.into_inner(), whole);

        let progress = progress.lock().unwrap();
        assert_eq!(progress.len(), 3 * 7);
        assert_eq!(progress[0].stage, Stage::Loading);
        assert_eq!(progress[20].stage, Stage::Emitting);
        assert!(progress.iter().all(|p| p.total == 7));
    }

    #[test]
    fn test_run_frame_range() {
        let volume = random_volume(9, 2, 2, 300);
        let config = Config::with_window(11).frame_range(50..250);

        let mut source = VolumeSource::new(&volume);
        let mut sink = VolumeSink::new(2, 2, 300);
        let summary = run(&config, &mut source, &mut sink).unwrap();
        assert_eq!(summary.frames, 200);

        let output = sink.into_inner();
        let mut expected = volume.slice_frames(50..250);
        subtract_in_place(&mut expected, &Config::with_window(11)).unwrap();
        assert_eq!(output.frame_range(50..250), expected.as_slice());
        assert!(output.frame_range(0..50).iter().all(|&v| v == 0));

        let mut in_place = volume.clone();
        subtract_in_place(&mut in_place, &config).unwrap();
        assert_eq!(in_place.frame_range(50..250), expected.as_slice());
        assert_eq!(in_place.frame_range(0..50), volume.frame_range(0..50));
    }

    #[test]
    fn test_no_negative_and_bounded_output() {
        let volume = random_volume(11, 5, 5, 200);
        let mut output = volume.clone();
        subtract_in_place(&mut output, &Config::with_window(15)).unwrap();
        for (out, orig) in output.iter().zip(volume.iter()) {
            assert!(out <= orig);
        }
    }

    #[test]
    fn test_memory_budget_too_small() {
        let volume = random_volume(1, 4, 4, 400);
        let config = Config::with_window(51)
            .available_memory(60 * 4 * 4 * 2)
            .safety_ratio(1.0);

        let mut source = VolumeSource::new(&volume);
        let mut sink = VolumeSink::new(4, 4, 400);
        let err = run(&config, &mut source, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            Error::BracketTooSmall {
                slices: 9,
                window: 51
            }
        ));
    }

    #[test]
    fn test_configuration_error_before_loading() {
        struct PanickingSource;
        impl FrameSource<u16> for PanickingSource {
            fn width(&self) -> usize {
                4
            }
            fn height(&self) -> usize {
                4
            }
            fn frame_count(&self) -> usize {
                100
            }
            fn load(&mut self, _: Range<usize>) -> std::result::Result<Buffer3<u16>, BoxedError> {
                panic!("must not load with an invalid configuration");
            }
        }

        let mut sink = VolumeSink::new(4, 4, 100);
        let err = run(&Config::with_window(50), &mut PanickingSource, &mut sink).unwrap_err();
        assert!(matches!(err, Error::EvenWindow(50)));

        // A zero ratio would otherwise size one bracket for the whole series.
        let config = Config::with_window(11).available_memory(1 << 20).safety_ratio(0.0);
        let err = run(&config, &mut PanickingSource, &mut sink).unwrap_err();
        assert!(matches!(err, Error::InvalidSafetyRatio(r) if r == 0.0));
    }

    #[test]
    fn test_source_failure_is_fatal() {
        struct FailingSource {
            volume: Buffer3<u16>,
            loads: usize,
        }
        impl FrameSource<u16> for FailingSource {
            fn width(&self) -> usize {
                self.volume.width()
            }
            fn height(&self) -> usize {
                self.volume.height()
            }
            fn frame_count(&self) -> usize {
                self.volume.frames()
            }
            fn load(&mut self, frames: Range<usize>) -> std::result::Result<Buffer3<u16>, BoxedError> {
                self.loads += 1;
                if self.loads == 2 {
                    return Err(Box::new(std::io::Error::other("disk unplugged")));
                }
                Ok(self.volume.slice_frames(frames))
            }
        }

        let volume = random_volume(5, 2, 2, 400);
        let mut source = FailingSource { volume, loads: 0 };
        let mut sink = VolumeSink::new(2, 2, 400);
        let brackets = plan_brackets(0..400, 11, 100).unwrap();

        let err = run_brackets(&Config::with_window(11), &brackets, &mut source, &mut sink)
            .unwrap_err();
        match err {
            Error::Source { range, source } => {
                assert_eq!(range, 95..205);
                assert!(source.to_string().contains("disk unplugged"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_sink_failure_is_fatal() {
        struct FailingSink {
            emits: usize,
        }
        impl FrameSink<u16> for FailingSink {
            fn emit(&mut self, _: usize, _: &[u16]) -> std::result::Result<(), BoxedError> {
                self.emits += 1;
                if self.emits == 2 {
                    return Err("disk full".into());
                }
                Ok(())
            }
        }

        let volume = random_volume(6, 2, 2, 400);
        let mut source = VolumeSource::new(&volume);
        let mut sink = FailingSink { emits: 0 };
        let brackets = plan_brackets(0..400, 11, 100).unwrap();

        let err = run_brackets(&Config::with_window(11), &brackets, &mut source, &mut sink)
            .unwrap_err();
        match err {
            Error::Sink { first_frame, source } => {
                assert_eq!(first_frame, 100);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.emits, 2);
    }

    #[test]
    fn test_wrong_frame_dimensions_are_rejected() {
        struct TransposedSource(Buffer3<u16>);
        impl FrameSource<u16> for TransposedSource {
            fn width(&self) -> usize {
                self.0.height()
            }
            fn height(&self) -> usize {
                self.0.width()
            }
            fn frame_count(&self) -> usize {
                self.0.frames()
            }
            fn load(&mut self, frames: Range<usize>) -> std::result::Result<Buffer3<u16>, BoxedError> {
                Ok(self.0.slice_frames(frames))
            }
        }

        let mut source = TransposedSource(random_volume(4, 3, 2, 60));
        let mut sink = VolumeSink::new(2, 3, 60);
        let err = run(&Config::with_window(5), &mut source, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: (2, 3),
                actual: (3, 2)
            }
        ));
    }

    #[test]
    fn test_short_load_is_rejected() {
        struct ShortSource(Buffer3<u16>);
        impl FrameSource<u16> for ShortSource {
            fn width(&self) -> usize {
                self.0.width()
            }
            fn height(&self) -> usize {
                self.0.height()
            }
            fn frame_count(&self) -> usize {
                self.0.frames()
            }
            fn load(&mut self, frames: Range<usize>) -> std::result::Result<Buffer3<u16>, BoxedError> {
                Ok(self.0.slice_frames(frames.start..frames.end - 1))
            }
        }

        let mut source = ShortSource(random_volume(2, 2, 2, 100));
        let mut sink = VolumeSink::new(2, 2, 100);
        let err = run(&Config::with_window(5), &mut source, &mut sink).unwrap_err();
        assert!(matches!(err, Error::FrameCountMismatch { actual: 99, .. }));
    }
}
