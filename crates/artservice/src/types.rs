use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque artifact identifier issued by the rendering service.
///
/// The service may hand back either a string or a number; whichever it sends
/// is echoed back verbatim in later frame and video requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateId {
    Number(i64),
    Text(String),
}

impl StateId {
    pub fn text(id: impl Into<String>) -> Self {
        Self::Text(id.into())
    }
}

impl From<i64> for StateId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Resource locator (usually a data URL) consumed only by display surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 48;
        if self.0.len() <= PREVIEW {
            f.write_str(&self.0)
        } else {
            let head: String = self.0.chars().take(PREVIEW).collect();
            write!(f, "{head}... ({} bytes)", self.0.len())
        }
    }
}

/// One generated still. Only artifacts carrying an id can be animated.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: Option<StateId>,
    pub image: ResourceRef,
}

impl Artifact {
    pub fn is_selectable(&self) -> bool {
        self.id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StillParameters {
    pub size: u32,
    pub line_amount: u32,
    pub line_width: u32,
    pub line_width_variation: f32,
    pub padding: u32,
    pub border_width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetShape {
    pub end_line_amount: u32,
    pub end_line_width: u32,
    pub end_line_width_variation: f32,
    pub end_padding: u32,
    pub end_border_width: u32,
}

/// Operator-adjustable animation knobs sent with every frame and video request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationParameters {
    pub speed: f32,
    pub zoom: f32,
    pub zoom_speed: f32,
    pub target: TargetShape,
}

/// Body of `generate_still`: a display-only image with no state id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StillRequest {
    pub size: u32,
    pub line_amount: u32,
    pub line_width: u32,
    pub padding: u32,
    pub border_width: u32,
}

impl From<&StillParameters> for StillRequest {
    fn from(params: &StillParameters) -> Self {
        Self {
            size: params.size,
            line_amount: params.line_amount,
            line_width: params.line_width,
            padding: params.padding,
            border_width: params.border_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactRequest {
    #[serde(flatten)]
    pub params: StillParameters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRequest {
    pub state_id: StateId,
    pub phase: f64,
    pub speed: f32,
    pub zoom: f32,
    pub zoom_speed: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    #[serde(flatten)]
    pub target: TargetShape,
}

impl FrameRequest {
    pub fn new(
        state_id: StateId,
        phase: f64,
        params: &AnimationParameters,
        gyro: (f32, f32),
    ) -> Self {
        Self {
            state_id,
            phase,
            speed: params.speed,
            zoom: params.zoom,
            zoom_speed: params.zoom_speed,
            gyro_x: gyro.0,
            gyro_y: gyro.1,
            target: params.target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRequest {
    pub state_id: StateId,
    pub speed: f32,
    pub zoom: f32,
    pub zoom_speed: f32,
    #[serde(flatten)]
    pub target: TargetShape,
}

impl VideoRequest {
    pub fn new(state_id: StateId, params: &AnimationParameters) -> Self {
        Self {
            state_id,
            speed: params.speed,
            zoom: params.zoom,
            zoom_speed: params.zoom_speed,
            target: params.target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animation() -> AnimationParameters {
        AnimationParameters {
            speed: 20.0,
            zoom: 1.1,
            zoom_speed: 0.5,
            target: TargetShape {
                end_line_amount: 300,
                end_line_width: 3,
                end_line_width_variation: 2.0,
                end_padding: 10,
                end_border_width: 2,
            },
        }
    }

    #[test]
    fn state_id_keeps_its_json_shape() {
        let numeric: StateId = serde_json::from_str("42").unwrap();
        assert_eq!(numeric, StateId::Number(42));
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "42");

        let text: StateId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(text, StateId::text("abc"));
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"abc\"");
    }

    #[test]
    fn frame_request_flattens_target_shape() {
        let request = FrameRequest::new(StateId::from(42), 0.25, &animation(), (1.0, -0.5));
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["state_id"], 42);
        assert_eq!(value["phase"], 0.25);
        assert_eq!(value["gyro_x"], 1.0);
        assert_eq!(value["gyro_y"], -0.5);
        assert_eq!(value["end_line_amount"], 300);
        assert_eq!(value["end_border_width"], 2);
        assert!(value.get("target").is_none());
    }

    #[test]
    fn video_request_carries_no_phase_or_gyro() {
        let request = VideoRequest::new(StateId::text("s1"), &animation());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["state_id"], "s1");
        assert_eq!(value["zoom_speed"], 0.5);
        assert_eq!(value["end_padding"], 10);
        assert!(value.get("phase").is_none());
        assert!(value.get("gyro_x").is_none());
    }

    #[test]
    fn still_request_drops_width_variation() {
        let params = StillParameters {
            size: 64,
            line_amount: 10,
            line_width: 1,
            line_width_variation: 3.0,
            padding: 2,
            border_width: 1,
        };
        let value = serde_json::to_value(StillRequest::from(&params)).unwrap();
        assert_eq!(value["size"], 64);
        assert!(value.get("line_width_variation").is_none());

        let artifact = ArtifactRequest { params, seed: None };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["line_width_variation"], 3.0);
        assert!(value.get("seed").is_none());
    }

    #[test]
    fn long_resource_refs_are_abbreviated_in_display() {
        let long = ResourceRef::new(format!("data:image/png;base64,{}", "A".repeat(200)));
        let shown = long.to_string();
        assert!(shown.len() < 100);
        assert!(shown.contains("bytes"));
        assert_eq!(ResourceRef::new("short").to_string(), "short");
    }
}
