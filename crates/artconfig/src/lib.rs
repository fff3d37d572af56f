use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8000/api/";

/// Reference preview cadence: 15 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(1_000_000 / 15);

pub const DEFAULT_PHASE_RATE: f64 = 0.01;

pub const DEFAULT_GALLERY_SIZE: usize = 9;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub version: u32,
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub still: StillSettings,
    #[serde(default)]
    pub animation: AnimationSettings,
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub joystick: JoystickSettings,
    #[serde(default)]
    pub gallery: GallerySettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(
        default,
        deserialize_with = "deserialize_duration_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

/// Parameters shared by every still in a gallery batch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StillSettings {
    pub size: u32,
    pub line_amount: u32,
    pub line_width: u32,
    pub line_width_variation: f32,
    pub padding: u32,
    pub border_width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub speed: f32,
    pub zoom: f32,
    pub zoom_speed: f32,
    pub target: TargetShapeSettings,
}

/// Shape the animation interpolates toward.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetShapeSettings {
    pub end_line_amount: u32,
    pub end_line_width: u32,
    pub end_line_width_variation: f32,
    pub end_padding: u32,
    pub end_border_width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PreviewSettings {
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub frame_interval: Duration,
    #[serde(default = "default_phase_rate")]
    pub phase_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JoystickSettings {
    pub control_size: f32,
    pub handle_size: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GallerySettings {
    #[serde(default = "default_gallery_size")]
    pub size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSettings::default(),
            still: StillSettings::default(),
            animation: AnimationSettings::default(),
            preview: PreviewSettings::default(),
            joystick: JoystickSettings::default(),
            gallery: GallerySettings::default(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: None,
        }
    }
}

impl Default for StillSettings {
    fn default() -> Self {
        Self {
            size: 512,
            line_amount: 200,
            line_width: 2,
            line_width_variation: 1.0,
            padding: 20,
            border_width: 4,
        }
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            speed: 20.0,
            zoom: 1.1,
            zoom_speed: 0.0,
            target: TargetShapeSettings::default(),
        }
    }
}

impl Default for TargetShapeSettings {
    fn default() -> Self {
        Self {
            end_line_amount: 300,
            end_line_width: 3,
            end_line_width_variation: 2.0,
            end_padding: 10,
            end_border_width: 2,
        }
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL,
            phase_rate: DEFAULT_PHASE_RATE,
        }
    }
}

impl Default for JoystickSettings {
    fn default() -> Self {
        Self {
            control_size: 150.0,
            handle_size: 50.0,
        }
    }
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_GALLERY_SIZE,
            seed: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_frame_interval() -> Duration {
    DEFAULT_FRAME_INTERVAL
}

fn default_phase_rate() -> f64 {
    DEFAULT_PHASE_RATE
}

fn default_gallery_size() -> usize {
    DEFAULT_GALLERY_SIZE
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer).map(|d| d.unwrap_or(DEFAULT_FRAME_INTERVAL))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl SessionConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: SessionConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Replaces the service endpoint, e.g. from a command-line override.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        self.service.base_url = base_url.into();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.service.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "service.base_url must not be empty".into(),
            ));
        }

        if let Some(timeout) = self.service.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "service.timeout must be greater than zero".into(),
                ));
            }
        }

        if self.still.size == 0 {
            return Err(ConfigError::Invalid(
                "still.size must be greater than zero".into(),
            ));
        }

        if self.preview.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.frame_interval must be greater than zero".into(),
            ));
        }

        let rate = self.preview.phase_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "preview.phase_rate must be a positive number (got {rate})"
            )));
        }

        let joystick = &self.joystick;
        if !(joystick.control_size.is_finite() && joystick.handle_size.is_finite()) {
            return Err(ConfigError::Invalid(
                "joystick sizes must be finite".into(),
            ));
        }
        if joystick.handle_size < 0.0 || joystick.control_size <= joystick.handle_size {
            return Err(ConfigError::Invalid(format!(
                "joystick.control_size ({}) must exceed joystick.handle_size ({})",
                joystick.control_size, joystick.handle_size
            )));
        }

        if self.gallery.size == 0 {
            return Err(ConfigError::Invalid(
                "gallery.size must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
