//! The sample configuration under config/ must stay loadable

use chrono::NaiveDate;
use skywarden::SupervisionConfig;
use skywarden_core_ephemeris::{AstronomicalOracle, ScheduleEvaluator};
use skywarden_core_guard::ThermalChannel;
use std::path::PathBuf;

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join(name)
}

#[test]
fn test_sample_config_validates() {
    let config = SupervisionConfig::from_file(&sample("skywarden.toml")).unwrap();
    config.validate().unwrap();

    assert_eq!(config.position_count(), 8);
    assert_eq!(config.phase_lights_on, -15);
    assert_eq!(config.monitored_channels, ThermalChannel::ALL.to_vec());
    assert_eq!(config.tables_path(&sample("skywarden.toml")), sample("ephemeris.json"));
}

#[test]
fn test_sample_tables_cover_the_horizon() {
    let config = SupervisionConfig::from_file(&sample("skywarden.toml")).unwrap();
    let oracle = AstronomicalOracle::load(&config.tables_path(&sample("skywarden.toml"))).unwrap();
    assert_eq!(oracle.sun_days(), 366);

    let noon = NaiveDate::from_ymd_opt(2026, 11, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    oracle.validate_horizon(noon, config.horizon_days).unwrap();

    let evaluator = ScheduleEvaluator::new(&oracle);
    assert!(!evaluator.is_dark(noon, config.lights_on, None).unwrap());
    assert!((1..=8).contains(&oracle.phase_at(noon).unwrap().index()));
}
