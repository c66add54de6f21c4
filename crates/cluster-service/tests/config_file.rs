//! Loading `clusterd` configuration from disk.

use clap::Parser;
use cluster_service::{Cli, ClusterConfig, ConfigError, ProducerKind};
use cluster_telemetry::LayoutKind;
use cluster_test_helpers::prelude::TestResult;
use std::fs;

#[test]
fn test_missing_file_yields_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let config = ClusterConfig::load(&dir.path().join("absent.yaml"))?;
    assert_eq!(config, ClusterConfig::default());
    Ok(())
}

#[test]
fn test_malformed_file_is_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("clusterd.yaml");
    fs::write(&path, "link: [not, a, mapping")?;
    assert!(matches!(
        ClusterConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
    Ok(())
}

#[test]
fn test_unknown_producer_is_an_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("clusterd.yaml");
    fs::write(&path, "producer: carrier-pigeon\n")?;
    assert!(ClusterConfig::load(&path).is_err());
    Ok(())
}

#[test]
fn test_file_then_environment_then_flags() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("clusterd.yaml");
    fs::write(
        &path,
        "producer: demo-pull\n\
         protocol:\n  flag_layout: compact\n\
         link:\n  device: /dev/from-file\n  baud_rate: 921600\n\
         odometer:\n  period_ms: 250\n\
         settings_path: /var/lib/cluster/data.json\n",
    )?;
    let path_arg = path.to_string_lossy().into_owned();

    let cli = Cli::try_parse_from(["clusterd", "--config", path_arg.as_str()])?;
    let config = cli.resolve(None)?;
    assert_eq!(config.producer, ProducerKind::DemoPull);
    assert_eq!(config.protocol.flag_layout, LayoutKind::Compact);
    assert_eq!(config.link.device, "/dev/from-file");
    assert_eq!(config.link.baud_rate, 921_600);
    assert_eq!(config.odometer.period_ms, 250);
    assert_eq!(config.odometer.max_gap_ms, 5000);

    let config = cli.resolve(Some("/dev/from-env".to_string()))?;
    assert_eq!(config.link.device, "/dev/from-env");

    let cli = Cli::try_parse_from([
        "clusterd",
        "--config",
        path_arg.as_str(),
        "--device",
        "/dev/from-flag",
        "--demo",
        "push",
    ])?;
    let config = cli.resolve(Some("/dev/from-env".to_string()))?;
    assert_eq!(config.link.device, "/dev/from-flag");
    assert_eq!(config.producer, ProducerKind::DemoPush);
    Ok(())
}

#[test]
fn test_effective_config_round_trips_through_yaml() -> TestResult {
    let mut config = ClusterConfig::default();
    config.producer = ProducerKind::DemoPush;
    config.link.device = "/dev/ttyUSB2".to_string();
    let rendered = serde_yaml::to_string(&config)?;
    assert_eq!(ClusterConfig::from_yaml(&rendered)?, config);
    Ok(())
}
