use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use track_core::{Observation, TrackId};
use track_sampler::{FixedDrawsSampler, Fit, MetropolisSampler, SamplerOptions};
use track_smoother::{
    fit_file_name, FailurePolicy, ModelVariant, SmootherConfig, SmootherError, TrackSmoother,
};
use track_summary::IntervalMethod;
use track_telemetry::MetricsCollector;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 15, 20, 0, 0).unwrap()
}

fn observations(id: &str, n: usize, lon0: f64) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            Observation::new(
                id,
                t0() + Duration::minutes(15 * i as i64),
                lon0 + 0.01 * i as f64,
                44.5 + 0.004 * i as f64,
                0.002,
                0.002,
            )
        })
        .collect()
}

/// Track whose latitude standard errors are all zero
fn zero_sd_observations(id: &str, n: usize, lon0: f64) -> Vec<Observation> {
    observations(id, n, lon0)
        .into_iter()
        .map(|obs| Observation { lat_sd: 0.0, ..obs })
        .collect()
}

/// Interleave observations from several tracks the way a merged feed would
fn interleave(tracks: Vec<Vec<Observation>>) -> Vec<Observation> {
    let longest = tracks.iter().map(Vec::len).max().unwrap_or(0);
    let mut merged = Vec::new();
    for i in 0..longest {
        for track in &tracks {
            if let Some(obs) = track.get(i) {
                merged.push(obs.clone());
            }
        }
    }
    merged
}

fn config() -> SmootherConfig {
    SmootherConfig::default()
        .with_interval(IntervalMethod::HighestDensity)
        .with_probability(0.9)
        .with_output_dir(None)
}

fn fixed() -> Arc<FixedDrawsSampler> {
    Arc::new(FixedDrawsSampler::new(21, 0.001))
}

#[test]
fn test_short_track_excluded_and_long_track_smoothed() {
    let input = interleave(vec![observations("A", 5, -63.6), observations("B", 2, -63.1)]);
    let smoother = TrackSmoother::new(config(), fixed());

    let output = smoother.run(input).unwrap();

    assert_eq!(output.rows.len(), 5);
    assert!(output.rows.iter().all(|r| r.id == TrackId::new("A")));
    assert_eq!(output.excluded, vec![TrackId::new("B")]);
    assert_eq!(
        output.warnings,
        vec!["Track B has fewer than 3 observations and was excluded".to_string()]
    );

    let first = &output.rows[0];
    assert_eq!(first.timestamp, t0());
    assert_eq!(first.distance_m, None);
    assert_eq!(first.speed_m_per_min, None);
    for row in &output.rows[1..] {
        assert!(row.distance_m.unwrap() >= 0.0);
        assert!(row.speed_m_per_min.unwrap() >= 0.0);
    }
    assert!(output.rows.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_rows_follow_first_appearance_order() {
    let input = interleave(vec![observations("B", 3, -63.0), observations("A", 4, -64.0)]);
    let output = TrackSmoother::new(config(), fixed()).run(input).unwrap();

    let ids: Vec<&str> = output.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "B", "B", "A", "A", "A", "A"]);
}

#[test]
fn test_summary_centers_on_observations() {
    let input = observations("A", 4, -63.6);
    let output = TrackSmoother::new(config(), fixed()).run(input.clone()).unwrap();

    for (row, obs) in output.rows.iter().zip(&input) {
        assert!((row.lon_mean - obs.lon).abs() < 1e-9);
        assert!((row.lat_median - obs.lat).abs() < 1e-9);
        assert!(row.lon_lower < obs.lon && obs.lon < row.lon_upper);
    }
}

#[test]
fn test_all_tracks_excluded_yields_empty_rows() {
    let input = interleave(vec![observations("A", 2, -63.0), observations("B", 1, -62.0)]);
    let sampler = fixed();
    let output = TrackSmoother::new(config(), sampler.clone()).run(input).unwrap();

    assert!(output.rows.is_empty());
    assert_eq!(
        output.warnings,
        vec!["Tracks A, B have fewer than 3 observations and were excluded".to_string()]
    );
    assert_eq!(sampler.calls(), 0);
}

#[test]
fn test_invalid_input_fails_before_sampling() {
    let sampler = fixed();

    let empty = TrackSmoother::new(config(), sampler.clone()).run(Vec::new());
    assert!(matches!(empty, Err(SmootherError::InvalidInput(ref msg)) if msg == "no data provided"));

    let bad_prob = TrackSmoother::new(config().with_probability(1.5), sampler.clone())
        .run(observations("A", 4, -63.0));
    assert!(matches!(bad_prob, Err(SmootherError::InvalidInput(_))));
    assert_eq!(sampler.calls(), 0);
}

#[test]
fn test_sampler_failure_aborts_run_by_default() {
    let input = interleave(vec![observations("A", 3, -63.0), observations("B", 3, -62.0)]);
    let sampler = Arc::new(FixedDrawsSampler::new(11, 0.001).failing_on_call(0));

    let err = TrackSmoother::new(config(), sampler.clone()).run(input).unwrap_err();

    assert!(matches!(err, SmootherError::Sampler { ref id, .. } if id == "A"));
    assert_eq!(sampler.calls(), 1);
}

#[test]
fn test_isolate_policy_keeps_remaining_tracks() {
    let input = interleave(vec![
        observations("A", 3, -63.0),
        observations("B", 4, -62.0),
        observations("C", 3, -61.0),
    ]);
    let sampler = Arc::new(FixedDrawsSampler::new(11, 0.001).failing_on_longitude(-62.0));
    let smoother = TrackSmoother::new(config().with_failure_policy(FailurePolicy::Isolate), sampler);

    let output = smoother.run(input).unwrap();

    assert_eq!(output.rows.len(), 6);
    assert!(output.rows.iter().all(|r| r.id.as_str() != "B"));
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].id, TrackId::new("B"));
    assert!(output.failures[0].message.contains("scripted failure"));
}

#[test]
fn test_fits_persisted_per_track() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fits");
    let input = interleave(vec![observations("A", 3, -63.0), observations("B", 4, -62.0)]);
    let smoother = TrackSmoother::new(config().with_output_dir(Some(out.clone())), fixed());

    smoother.run(input).unwrap();

    let fit = Fit::load(&out.join("A.json")).unwrap();
    assert_eq!(fit.sampler, "fixed");
    assert_eq!(fit.model, "crw");
    assert_eq!(fit.locations.n_timesteps(), 3);
    assert_eq!(Fit::load(&out.join("B.json")).unwrap().locations.n_timesteps(), 4);
}

#[test]
fn test_track_id_cannot_leave_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fits");
    let escaping = dir.path().join("escaped").display().to_string();
    let input = interleave(vec![
        observations(&escaping, 3, -63.0),
        observations("../up", 3, -62.0),
    ]);
    let smoother = TrackSmoother::new(config().with_output_dir(Some(out.clone())), fixed());

    let output = smoother.run(input).unwrap();

    assert_eq!(output.rows.len(), 6);
    assert!(!dir.path().join("escaped.json").exists());
    assert!(!dir.path().join("up.json").exists());
    let mut written: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|entry| entry.unwrap())
        .inspect(|entry| assert!(entry.file_type().unwrap().is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    let mut expected = vec![fit_file_name(&escaping), fit_file_name("../up")];
    expected.sort();
    assert_eq!(written, expected);
    assert_eq!(Fit::load(&out.join(fit_file_name(&escaping))).unwrap().locations.n_timesteps(), 3);
}

#[test]
fn test_unusable_output_dir_aborts_with_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("fits");
    std::fs::write(&not_a_dir, "occupied").unwrap();
    let smoother = TrackSmoother::new(config().with_output_dir(Some(not_a_dir.clone())), fixed());

    let err = smoother.run(observations("A", 3, -63.0)).unwrap_err();

    match err {
        SmootherError::Persistence { path, .. } => assert_eq!(path, not_a_dir.join("A.json")),
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[test]
fn test_invalid_standard_errors_abort_run_by_default() {
    let input = interleave(vec![observations("A", 3, -63.0), zero_sd_observations("B", 3, -62.0)]);
    let sampler = fixed();

    let err = TrackSmoother::new(config(), sampler.clone()).run(input).unwrap_err();

    assert!(matches!(err, SmootherError::Model { ref id, .. } if id == "B"));
    assert!(err.to_string().contains("standard errors must be positive"));
    assert_eq!(sampler.calls(), 1);
}

#[test]
fn test_invalid_standard_errors_isolated() {
    let input = interleave(vec![
        observations("A", 3, -63.0),
        zero_sd_observations("B", 4, -62.0),
        observations("C", 3, -61.0),
    ]);
    let sampler = fixed();
    let smoother = TrackSmoother::new(config().with_failure_policy(FailurePolicy::Isolate), sampler.clone());

    let output = smoother.run(input).unwrap();

    let ids: Vec<&str> = output.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "A", "A", "C", "C", "C"]);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].id, TrackId::new("B"));
    assert!(output.failures[0].message.contains("standard errors must be positive"));
    assert_eq!(sampler.calls(), 2);
}

#[test]
fn test_multistate_failure_isolates_every_track() {
    let input = interleave(vec![observations("A", 4, -63.0), observations("B", 3, -62.0)]);
    let sampler = Arc::new(FixedDrawsSampler::new(11, 0.001).failing_on_call(0));
    let smoother = TrackSmoother::new(
        config()
            .with_model(ModelVariant::MultiState { states: 2 })
            .with_failure_policy(FailurePolicy::Isolate),
        sampler.clone(),
    );

    let output = smoother.run(input).unwrap();

    assert!(output.rows.is_empty());
    let failed: Vec<&str> = output.failures.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(failed, vec!["A", "B"]);
    assert!(output.failures.iter().all(|f| f.message.contains("multistate")));
    assert_eq!(sampler.calls(), 1);
}

#[test]
fn test_multistate_invalid_data_isolates_every_track() {
    let input = interleave(vec![observations("A", 4, -63.0), zero_sd_observations("B", 3, -62.0)]);
    let sampler = fixed();
    let smoother = TrackSmoother::new(
        config()
            .with_model(ModelVariant::MultiState { states: 2 })
            .with_failure_policy(FailurePolicy::Isolate),
        sampler.clone(),
    );

    let output = smoother.run(input).unwrap();

    assert!(output.rows.is_empty());
    assert_eq!(output.failures.len(), 2);
    assert_eq!(sampler.calls(), 0);
}

#[test]
fn test_multistate_fits_all_tracks_jointly() {
    let dir = tempfile::tempdir().unwrap();
    let input = interleave(vec![observations("A", 4, -63.0), observations("B", 3, -62.0)]);
    let sampler = fixed();
    let smoother = TrackSmoother::new(
        config()
            .with_model(ModelVariant::MultiState { states: 2 })
            .with_output_dir(Some(dir.path().to_path_buf())),
        sampler.clone(),
    );

    let output = smoother.run(input).unwrap();

    assert_eq!(sampler.calls(), 1);
    assert_eq!(output.rows.len(), 7);
    assert_eq!(output.rows[4].id, TrackId::new("B"));
    assert_eq!(output.rows[4].distance_m, None);
    assert!((output.rows[4].lon_mean - -62.0).abs() < 1e-9);

    let fit = Fit::load(&dir.path().join("multistate.json")).unwrap();
    assert_eq!(fit.model, "multistate_crw");
    assert_eq!(fit.locations.n_timesteps(), 7);
}

#[test]
fn test_repeated_runs_are_identical() {
    let input = observations("A", 6, -63.0);
    let smoother = TrackSmoother::new(config(), fixed());

    let first = smoother.run(input.clone()).unwrap();
    let second = smoother.run(input).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_metrics_recorded() {
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let input = interleave(vec![observations("A", 5, -63.0), observations("B", 2, -62.0)]);
    let smoother = TrackSmoother::new(config(), fixed()).with_metrics(metrics.clone());

    smoother.run(input).unwrap();

    assert_eq!(metrics.tracks_fitted(), 1);
    assert_eq!(metrics.tracks_excluded(), 1);
    assert_eq!(metrics.summary_rows(), 5);
}

#[test]
fn test_short_metropolis_run() {
    let options = SamplerOptions::new()
        .with("chains", 2)
        .with("iter", 400)
        .with("warmup", 200)
        .with("seed", 11);
    let smoother = TrackSmoother::new(
        config()
            .with_interval(IntervalMethod::EqualTailed)
            .with_sampler_options(options),
        Arc::new(MetropolisSampler::new()),
    );
    let input = observations("A", 5, -63.6);

    let output = smoother.run(input.clone()).unwrap();

    assert_eq!(output.rows.len(), 5);
    for (row, obs) in output.rows.iter().zip(&input) {
        assert!((row.lon_mean - obs.lon).abs() < 0.01);
        assert!((row.lat_mean - obs.lat).abs() < 0.01);
        assert!(row.lon_lower <= row.lon_median && row.lon_median <= row.lon_upper);
        assert!(row.lat_lower <= row.lat_median && row.lat_median <= row.lat_upper);
    }
}
