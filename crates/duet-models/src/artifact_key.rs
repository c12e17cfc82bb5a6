//! Storage key naming for published assets.
//!
//! Keys are grouped by a fixed prefix, then the owning user, then the run
//! timestamp: `{prefix}/{user}/{YYYYMMDDTHHMMSSmmmZ}-{run}.{ext}`. The run
//! suffix keeps two runs in the same millisecond apart.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::run::RunId;

/// Default top-level prefix for composed assets.
pub const DEFAULT_STORAGE_PREFIX: &str = "compositions";

/// Key stem shared by every asset published from one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKey {
    stem: String,
}

impl ArtifactKey {
    /// Build the key stem for a run.
    pub fn new(prefix: &str, user_id: &str, created_at: DateTime<Utc>, run_id: &RunId) -> Self {
        let prefix = prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            DEFAULT_STORAGE_PREFIX
        } else {
            prefix
        };

        Self {
            stem: format!(
                "{}/{}/{}-{}",
                prefix,
                sanitize_user_id(user_id),
                created_at.format("%Y%m%dT%H%M%S%3fZ"),
                run_id.short()
            ),
        }
    }

    /// Build the key stem for a run starting now.
    pub fn now(prefix: &str, user_id: &str, run_id: &RunId) -> Self {
        Self::new(prefix, user_id, Utc::now(), run_id)
    }

    /// Key for the composed video.
    pub fn video(&self) -> String {
        format!("{}.mp4", self.stem)
    }

    /// Key for the thumbnail.
    pub fn thumbnail(&self) -> String {
        format!("{}-thumb.jpg", self.stem)
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// Replace anything that could form a path segment or break a URL.
///
/// When characters had to be replaced, a short digest of the original ID is
/// appended so distinct users never share a folder.
pub fn sanitize_user_id(user_id: &str) -> String {
    let cleaned: String = user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "anonymous".to_string()
    } else if cleaned == user_id {
        cleaned
    } else {
        let digest = format!("{:x}", Sha256::digest(user_id.as_bytes()));
        format!("{}-{}", cleaned, &digest[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let run = RunId::from_string("abcdef0123456789");
        let key = ArtifactKey::new("compositions", "user-7", at, &run);

        assert_eq!(key.video(), "compositions/user-7/20240309T140507000Z-abcdef01.mp4");
        assert_eq!(
            key.thumbnail(),
            "compositions/user-7/20240309T140507000Z-abcdef01-thumb.jpg"
        );
    }

    #[test]
    fn test_same_instant_different_runs_do_not_collide() {
        let at = Utc::now();
        let a = ArtifactKey::new("compositions", "u", at, &RunId::new());
        let b = ArtifactKey::new("compositions", "u", at, &RunId::new());
        assert_ne!(a.video(), b.video());
    }

    #[test]
    fn test_user_id_cannot_escape_prefix() {
        assert!(sanitize_user_id("../../etc").starts_with("______etc-"));
        assert!(sanitize_user_id("a/b c").starts_with("a_b_c-"));
        assert_eq!(sanitize_user_id(""), "anonymous");
        assert_eq!(sanitize_user_id("user-7_ok"), "user-7_ok");

        let key = ArtifactKey::now("/media/", "x/y", &RunId::new());
        assert!(key.stem().starts_with("media/x_y-"));
        assert_eq!(key.stem().matches('/').count(), 2);
    }

    #[test]
    fn test_distinct_user_ids_never_share_a_folder() {
        let slash = sanitize_user_id("a/b");
        let underscore = sanitize_user_id("a_b");
        let space = sanitize_user_id("a b");

        assert_eq!(underscore, "a_b");
        assert_ne!(slash, underscore);
        assert_ne!(slash, space);
        assert_ne!(space, underscore);
        assert_eq!(slash, sanitize_user_id("a/b"));
        assert_eq!(slash.len(), "a_b".len() + 9);
    }

    #[test]
    fn test_empty_prefix_falls_back() {
        let key = ArtifactKey::now("", "u", &RunId::new());
        assert!(key.stem().starts_with("compositions/u/"));
    }
}
