//! Composition request and result types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::run::ClipRole;

/// Input to one orchestration run.
///
/// The API layer resolves clip locations before handing the request over;
/// the pipeline only checks that they are well-formed URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    /// Location of the reaction clip
    #[validate(url)]
    pub reaction_clip_url: String,

    /// Location of the optional demo clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub demo_clip_url: Option<String>,

    /// Opaque identifier of the requesting user
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

impl CompositionRequest {
    /// Create a request with only a reaction clip.
    pub fn new(reaction_clip_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            reaction_clip_url: reaction_clip_url.into(),
            demo_clip_url: None,
            user_id: user_id.into(),
        }
    }

    /// Attach a demo clip.
    pub fn with_demo(mut self, demo_clip_url: impl Into<String>) -> Self {
        self.demo_clip_url = Some(demo_clip_url.into());
        self
    }

    /// Clips to process, in concatenation order.
    pub fn clips(&self) -> Vec<(ClipRole, &str)> {
        let mut clips = vec![(ClipRole::Reaction, self.reaction_clip_url.as_str())];
        if let Some(demo) = self.demo_clip_url.as_deref() {
            clips.push((ClipRole::Demo, demo));
        }
        clips
    }
}

/// Final result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComposedArtifact {
    /// Public URL of the composed video
    pub video_url: String,

    /// Public URL of the thumbnail, absent when thumbnail extraction was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Sum of the normalized clip durations (not re-measured after the join)
    pub total_duration_milliseconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_order() {
        let req = CompositionRequest::new("https://cdn.example.com/r.mp4", "user-1")
            .with_demo("https://cdn.example.com/d.mp4");
        let clips = req.clips();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].0, ClipRole::Reaction);
        assert_eq!(clips[1], (ClipRole::Demo, "https://cdn.example.com/d.mp4"));
    }

    #[test]
    fn test_single_clip_request() {
        let req = CompositionRequest::new("https://cdn.example.com/r.mp4", "user-1");
        assert_eq!(req.clips().len(), 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let bad_url = CompositionRequest::new("not a url", "user-1");
        assert!(bad_url.validate().is_err());

        let bad_demo = CompositionRequest::new("https://cdn.example.com/r.mp4", "user-1")
            .with_demo("::nope::");
        assert!(bad_demo.validate().is_err());

        let no_user = CompositionRequest::new("https://cdn.example.com/r.mp4", "");
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "reactionClipUrl": "https://cdn.example.com/r.mp4",
            "userId": "u_42"
        }"#;
        let req: CompositionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.demo_clip_url, None);
        assert_eq!(req.user_id, "u_42");

        let artifact = ComposedArtifact {
            video_url: "https://media.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            total_duration_milliseconds: 12_500,
        };
        let out = serde_json::to_value(&artifact).unwrap();
        assert_eq!(out["totalDurationMilliseconds"], 12_500);
        assert!(out.get("thumbnailUrl").is_none());
    }
}
