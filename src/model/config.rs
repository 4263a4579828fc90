use crate::engine::judge::HitWindows;
use crate::error::ConfigError;
use crate::util::parse_speed;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "fretline",
    about = "Load a MIDI chart and play it back with a perfect autoplayer!"
)]
pub struct Args {
    /// Path to the chart's MIDI file.
    pub chart: PathBuf,

    /// Tempo of the song in beats per minute.
    #[arg(short, long, default_value_t = 120.0)]
    pub bpm: f64,

    /// Difficulty to load: easy|medium|hard|expert.
    #[arg(short, long, default_value = "expert")]
    pub difficulty: String,

    /// Scroll speed. Supports presets Slow|Normal|Fast|Blazing, or a custom multiplier.
    #[arg(short, long)]
    pub speed: Option<String>,

    /// Optional JSON file with play settings. Command line flags win over it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Milliseconds added to every press and release.
    #[arg(long = "input-offset", allow_negative_numbers = true)]
    pub input_offset_ms: Option<f64>,

    /// Milliseconds added to the audio position.
    #[arg(long = "audio-offset", allow_negative_numbers = true)]
    pub audio_offset_ms: Option<f64>,

    /// Simulation ticks per second.
    #[arg(long = "tick-rate", default_value_t = 240)]
    pub tick_rate: u32,

    /// Run the simulation as fast as possible instead of in real time.
    #[arg(short, long, default_value_t = false)]
    pub fast: bool,

    /// Dry run (print the chart summary and exit).
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Print the final score as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Settings for one play attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlayConfig {
    /// Scroll speed multiplier; higher means notes are visible for less time.
    pub speed: f64,
    /// How long a note is visible before its target at speed 1.0.
    pub base_travel_ms: f64,
    pub input_offset_ms: f64,
    pub audio_offset_ms: f64,
    /// Pre-roll before the backing track starts.
    pub grace_period_ms: f64,
    pub hit_windows: HitWindows,
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            base_travel_ms: 2000.0,
            input_offset_ms: 0.0,
            audio_offset_ms: 0.0,
            grace_period_ms: 2000.0,
            hit_windows: HitWindows::default(),
        }
    }
}

impl PlayConfig {
    pub fn travel_ms(&self) -> f64 {
        self.base_travel_ms / self.speed
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(ConfigError::Speed(self.speed));
        }

        if !self.base_travel_ms.is_finite() || self.base_travel_ms <= 0.0 {
            return Err(ConfigError::TravelTime(self.base_travel_ms));
        }

        self.hit_windows.validate()
    }

    /// Apply command line overrides; flags left unset keep the loaded values.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(speed) = &args.speed {
            self.speed = parse_speed(speed);
        }
        if let Some(offset) = args.input_offset_ms {
            self.input_offset_ms = offset;
        }
        if let Some(offset) = args.audio_offset_ms {
            self.audio_offset_ms = offset;
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config {}", path.as_ref().display()))?;

        let config: PlayConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.as_ref().display()))?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn travel_time_scales_with_speed() {
        let config = PlayConfig {
            speed: 2.0,
            ..PlayConfig::default()
        };

        assert_eq!(config.travel_ms(), 1000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let slow = PlayConfig {
            speed: 0.0,
            ..PlayConfig::default()
        };
        assert_eq!(slow.validate(), Err(ConfigError::Speed(0.0)));

        let travel = PlayConfig {
            base_travel_ms: -1.0,
            ..PlayConfig::default()
        };
        assert_eq!(travel.validate(), Err(ConfigError::TravelTime(-1.0)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: PlayConfig =
            serde_json::from_str(r#"{ "speed": 1.5, "hit_windows": { "bad_ms": 80.0 } }"#).unwrap();

        assert_eq!(config.speed, 1.5);
        assert_eq!(config.grace_period_ms, 2000.0);
        assert_eq!(config.hit_windows.perfect_ms, 40.0);
        assert_eq!(config.hit_windows.bad_ms, 80.0);
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["fretline", "song.mid", "--bpm", "150", "-d", "hard", "--json"]);

        assert_eq!(args.chart, PathBuf::from("song.mid"));
        assert_eq!(args.bpm, 150.0);
        assert_eq!(args.difficulty, "hard");
        assert!(args.json);
        assert!(!args.dry_run);
        assert_eq!(args.tick_rate, 240);
        assert_eq!(args.speed, None);
    }

    #[test]
    fn unset_flags_keep_config_file_values() {
        let mut config: PlayConfig =
            serde_json::from_str(r#"{ "speed": 2.0, "input_offset_ms": 15.0 }"#).unwrap();

        config.apply_args(&Args::parse_from(["fretline", "song.mid"]));
        assert_eq!(config.speed, 2.0);
        assert_eq!(config.input_offset_ms, 15.0);

        config.apply_args(&Args::parse_from([
            "fretline",
            "song.mid",
            "--speed",
            "fast",
            "--audio-offset=-12.5",
        ]));
        assert_eq!(config.speed, 1.5);
        assert_eq!(config.input_offset_ms, 15.0);
        assert_eq!(config.audio_offset_ms, -12.5);
    }
}
