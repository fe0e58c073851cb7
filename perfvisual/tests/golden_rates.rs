//! Fixed input series with known throughput values, checked through the public API.
use chrono::{Duration, Local, TimeZone};
use perfvisual::{NegativeRates, ProcessCounters, RateEstimator, RawSnapshot};

// (offset ms, read_bytes, write_bytes, expected read MiB/s, expected write MiB/s)
const SERIES: &[(i64, u64, u64, f64, f64)] = &[
    (0, 1_000, 0, 0.0, 0.0),
    (1_000, 2_048_576, 524_288, 1.953, 0.5),
    (1_100, 2_048_576, 1_048_576, 0.0, 5.0),
    (1_100, 9_999_999, 9_999_999, 0.0, 0.0), // clock did not advance
    (4_100, 10_000_000, 10_000_000, 0.0, 0.0),
    (4_400, 10_157_286, 10_000_001, 0.5, 0.0),
    (5_400, 0, 10_000_001, -9.687, 0.0), // counter reset
];

fn series() -> Vec<RawSnapshot> {
    let base = Local
        .with_ymd_and_hms(2024, 9, 24, 8, 0, 0)
        .single()
        .expect("valid time");
    SERIES
        .iter()
        .map(|&(ms, read, write, _, _)| {
            RawSnapshot::from_counters(
                base + Duration::milliseconds(ms),
                ProcessCounters {
                    io_read_bytes: read,
                    io_write_bytes: write,
                    ..Default::default()
                },
            )
        })
        .collect()
}

#[test]
fn preserved_series_matches_golden_values() {
    let est = RateEstimator::new(NegativeRates::Preserve);
    let snaps = series();
    let mut prev: Option<RawSnapshot> = None;
    for (snap, &(ms, _, _, want_r, want_w)) in snaps.into_iter().zip(SERIES) {
        let got = est.derive(prev.as_ref(), snap);
        assert_eq!(
            (got.read_rate_mbps, got.write_rate_mbps),
            (want_r, want_w),
            "at +{ms}ms"
        );
        prev = Some(snap);
    }
}

#[test]
fn clamped_series_never_goes_negative() {
    let est = RateEstimator::new(NegativeRates::Clamp);
    let snaps = series();
    let rates: Vec<f64> = snaps
        .windows(2)
        .map(|w| est.derive(Some(&w[0]), w[1]).read_rate_mbps)
        .collect();
    assert!(rates.iter().all(|r| *r >= 0.0));
    assert_eq!(rates.last(), Some(&0.0));
}
