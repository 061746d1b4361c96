use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ftir_pipeline::config::{ProcessingConfig, load_config, save_config};
use ftir_pipeline::data::loader::{export_processed, load_csv};
use ftir_pipeline::processing::{BaselineEngine, PeakBoundaryAnalyzer, SmoothingEngine};
use ftir_pipeline::{
    BaselineMethod, Peak, PeakParameters, PipelineCoordinator, PipelineError, ProcessingParameters,
    ProcessingSession, RangeSet, SmoothingMethod, Spectrum, ValidationError,
};

/// Two absorbance bands on a sloped background with a deterministic ripple.
fn spectrum() -> Spectrum {
    let x: Vec<f64> = (0..400).map(|i| 900.0 + i as f64 * 2.0).collect();
    let y = x
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let bands = (-(v - 1200.0).powi(2) / 200.0).exp() + 0.7 * (-(v - 1500.0).powi(2) / 300.0).exp();
            let ripple = if i % 2 == 0 { 0.01 } else { -0.01 };
            bands + 0.0005 * (v - 900.0) + ripple
        })
        .collect();
    Spectrum::new(x, y).unwrap()
}

fn smoothing() -> ProcessingParameters {
    ProcessingParameters {
        smoothing: Some(SmoothingMethod::SavitzkyGolay {
            window_length: 11,
            polyorder: 3,
        }),
        ..ProcessingParameters::default()
    }
}

fn peak(wavenumber: f64) -> Peak {
    Peak {
        wavenumber,
        intensity: 1.0,
        index: 0,
    }
}

#[test]
fn empty_rangeset_is_identity_for_every_stage() {
    let sp = spectrum();
    let empty = RangeSet::default();
    let smoothed = SmoothingEngine
        .apply(&sp, &empty, &SmoothingMethod::Gaussian { sigma: 2.0 })
        .unwrap();
    let corrected = BaselineEngine.apply(&sp, &empty, &BaselineMethod::Rubberband).unwrap();
    assert_eq!(smoothed, sp);
    assert_eq!(corrected, sp);
}

#[test]
fn samples_outside_ranges_are_untouched_by_the_pipeline() {
    let sp = spectrum();
    let ranges = RangeSet::validate(&[(1400.0, 1600.0), (1100.0, 1300.0)]).unwrap();
    let params = ProcessingParameters {
        baseline: Some(BaselineMethod::Rubberband),
        ..smoothing()
    };
    let coordinator = PipelineCoordinator::new(sp.clone());
    let out = coordinator.run_preview(&sp, &ranges, &params).unwrap();

    for (i, &wn) in sp.wavenumbers().iter().enumerate() {
        let before = sp.intensities()[i].to_bits();
        let after = out.spectrum.intensities()[i].to_bits();
        if ranges.contains(wn) {
            continue;
        }
        assert_eq!(before, after, "sample at {wn} changed");
    }
}

#[test]
fn overlapping_ranges_fail_validation() {
    let err = RangeSet::validate(&[(1000.0, 1200.0), (1150.0, 1300.0)]).unwrap_err();
    assert!(matches!(err, ValidationError::OverlappingRange { .. }));
}

#[test]
fn touching_ranges_are_valid() {
    let set = RangeSet::validate(&[(1200.0, 1300.0), (1000.0, 1200.0)]).unwrap();
    assert_eq!(set.ranges()[0].low, 1000.0);
}

#[test]
fn boundaries_split_at_midpoints() {
    let peaks = [peak(1000.0), peak(1200.0), peak(1500.0)];
    let b = PeakBoundaryAnalyzer
        .compute_boundaries(&peaks, (900.0, 1600.0))
        .unwrap();
    let windows: Vec<(f64, f64)> = b.iter().map(|b| (b.lower_bound, b.upper_bound)).collect();
    assert_eq!(windows, vec![(900.0, 1100.0), (1100.0, 1350.0), (1350.0, 1600.0)]);
}

#[test]
fn boundaries_of_zero_peaks_is_empty_peak_set() {
    let coordinator = PipelineCoordinator::new(spectrum());
    assert_eq!(
        coordinator.compute_boundaries(&[], (900.0, 1600.0)).unwrap_err(),
        PipelineError::EmptyPeakSet
    );
}

#[test]
fn standalone_peak_detection_finds_both_bands() {
    let coordinator = PipelineCoordinator::new(spectrum());
    let base = coordinator.current();
    let smoothed = coordinator
        .run_preview(&base, &RangeSet::full(&base), &smoothing())
        .unwrap();
    let params = PeakParameters {
        min_prominence: Some(0.2),
        ..PeakParameters::default()
    };
    let peaks = coordinator.detect_peaks(&smoothed.spectrum, &params).unwrap();
    let found: Vec<f64> = peaks.iter().map(|p| p.wavenumber).collect();
    assert_eq!(found, vec![1200.0, 1500.0]);

    let range = smoothed.spectrum.range().unwrap();
    let b = coordinator.compute_boundaries(&peaks, range).unwrap();
    assert_eq!(b[0].upper_bound, 1350.0);
    assert_eq!(b[1].lower_bound, 1350.0);
}

#[test]
fn commit_undo_redo_round_trip() {
    let coordinator = PipelineCoordinator::new(spectrum());
    let r1 = RangeSet::validate(&[(1100.0, 1300.0)]).unwrap();
    let r2 = RangeSet::validate(&[(1400.0, 1600.0)]).unwrap();
    let p2 = ProcessingParameters {
        smoothing: Some(SmoothingMethod::MovingAverage { window_length: 5 }),
        ..ProcessingParameters::default()
    };

    let first = coordinator.commit(r1, smoothing()).unwrap();
    let second = coordinator.commit(r2, p2).unwrap();
    assert!(second.sequence > first.sequence);

    let undone = coordinator.undo().unwrap();
    assert_eq!(*undone, *first.result);
    assert_eq!(*coordinator.current(), *first.result);

    let redone = coordinator.redo().unwrap();
    assert_eq!(*redone, *second.result);
}

#[test]
fn limited_history_undoes_to_the_last_dropped_result() {
    let coordinator = PipelineCoordinator::with_history_limit(spectrum(), 2);
    let original = coordinator.original();
    let results: Vec<_> = (0..3)
        .map(|_| {
            let base = coordinator.current();
            coordinator.commit(RangeSet::full(&base), smoothing()).unwrap().result
        })
        .collect();

    coordinator.undo().unwrap();
    let deepest = coordinator.undo().unwrap();
    assert!(Arc::ptr_eq(&deepest, &results[0]));
    assert!(!Arc::ptr_eq(&deepest, &original));
    assert_eq!(coordinator.undo().unwrap_err(), PipelineError::NoHistory);
    assert!(Arc::ptr_eq(&coordinator.current_output().spectrum, &results[0]));
}

#[test]
fn undo_on_empty_history_keeps_current() {
    let coordinator = PipelineCoordinator::new(spectrum());
    let before = coordinator.current();
    assert_eq!(coordinator.undo().unwrap_err(), PipelineError::NoHistory);
    assert!(Arc::ptr_eq(&before, &coordinator.current()));
}

#[test]
fn concurrent_commits_are_serialised() {
    let coordinator = Arc::new(PipelineCoordinator::new(spectrum()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let c = Arc::clone(&coordinator);
            thread::spawn(move || {
                let base = c.current();
                c.commit(RangeSet::full(&base), smoothing())
            })
        })
        .collect();

    let mut sequences = Vec::new();
    for h in handles {
        match h.join().unwrap() {
            Ok(entry) => sequences.push(entry.sequence),
            Err(e) => panic!("commit failed: {e}"),
        }
    }
    sequences.sort_unstable();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert_eq!(coordinator.applied_count(), 4);
}

#[test]
fn session_preview_then_commit() {
    let mut session = ProcessingSession::new(spectrum(), Some(10)).unwrap();
    let params = ProcessingParameters {
        peaks: Some(PeakParameters {
            min_prominence: Some(0.2),
            ..PeakParameters::default()
        }),
        ..smoothing()
    };

    session.request_preview(&[], params.clone()).unwrap();
    assert!(session.wait_for_preview(Duration::from_secs(10)));
    assert_eq!(session.displayed.peaks.len(), 2);
    assert_eq!(session.coordinator().applied_count(), 0);

    let entry = session.commit(&[(900.0, 1698.0)], params).unwrap();
    assert_eq!(entry.boundaries.len(), 2);
    assert_eq!(session.displayed.boundaries, entry.boundaries);
    assert!(session.status_message.is_none());
}

#[test]
fn csv_and_config_round_trip_through_files() {
    let dir = std::env::temp_dir().join(format!("ftir-pipeline-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let raw = spectrum();
    let csv_path = dir.join("spectrum.csv");
    export_processed(&csv_path, &raw, &raw).unwrap();
    let loaded = load_csv(&csv_path).unwrap();
    assert_eq!(loaded.len(), raw.len());
    assert_eq!(loaded.wavenumbers(), raw.wavenumbers());

    let config_path = dir.join("config.json");
    save_config(&config_path, &ProcessingConfig::default()).unwrap();
    assert_eq!(load_config(&config_path).unwrap(), ProcessingConfig::default());
}
