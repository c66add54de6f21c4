//! Command-line surface of `clusterd`.

use crate::config::{ClusterConfig, ConfigResult, ProducerKind};
use clap::{Parser, ValueEnum};
use cluster_telemetry::LayoutKind;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clusterd")]
#[command(about = "Instrument cluster telemetry daemon")]
#[command(version)]
#[command(long_about = "
Reads telemetry frames from the cluster's serial link (or generates synthetic
data in demo mode), keeps the gauge state current and integrates trip and
odometer distance into the settings file.

The device path can also be set with the TEENSY_DEV environment variable.
")]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "CLUSTERD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial device path
    #[arg(short, long)]
    pub device: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Run on synthetic data instead of the serial link
    #[arg(long, value_enum)]
    pub demo: Option<DemoMode>,

    /// Bit assignment of the frame flags word
    #[arg(long)]
    pub flag_layout: Option<LayoutKind>,

    /// Persisted settings file
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Disable trip and odometer integration
    #[arg(long)]
    pub no_odometer: bool,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoMode {
    /// Ticked by the daemon's main loop
    Pull,
    /// Ticked by a dedicated thread
    Push,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Effective configuration: file, then the device environment variable,
    /// then flags.
    pub fn resolve(&self, env_device: Option<String>) -> ConfigResult<ClusterConfig> {
        let mut config = match &self.config {
            Some(path) => ClusterConfig::load(path)?,
            None => ClusterConfig::default(),
        };
        config.link.apply_device_override(env_device);
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut ClusterConfig) {
        config.link.apply_device_override(self.device.clone());
        if let Some(baud) = self.baud {
            config.link.baud_rate = baud;
        }
        if let Some(mode) = self.demo {
            config.producer = match mode {
                DemoMode::Pull => ProducerKind::DemoPull,
                DemoMode::Push => ProducerKind::DemoPush,
            };
        }
        if let Some(layout) = self.flag_layout {
            config.protocol.flag_layout = layout;
        }
        if let Some(path) = &self.settings {
            config.settings_path = path.clone();
        }
        if self.no_odometer {
            config.odometer.enabled = false;
        }
    }
}
