use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint;

/// Heading text captured from the page, levels 1 to 4.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Headings {
    pub h1: Option<String>,
    pub h2: Option<String>,
    pub h3: Option<String>,
    pub h4: Option<String>,
}

impl Headings {
    pub fn is_empty(&self) -> bool {
        self.h1.is_none() && self.h2.is_none() && self.h3.is_none() && self.h4.is_none()
    }
}

/// Paths of files written by the capture layer. Opaque to this crate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureArtifacts {
    pub screenshot: Option<String>,
    pub html_file: Option<String>,
    pub aria_file: Option<String>,
}

impl CaptureArtifacts {
    pub fn is_empty(&self) -> bool {
        self.screenshot.is_none() && self.html_file.is_none() && self.aria_file.is_none()
    }

    /// Overlay every reference present in `other`.
    pub fn merge(&mut self, other: &CaptureArtifacts) {
        if other.screenshot.is_some() {
            self.screenshot = other.screenshot.clone();
        }
        if other.html_file.is_some() {
            self.html_file = other.html_file.clone();
        }
        if other.aria_file.is_some() {
            self.aria_file = other.aria_file.clone();
        }
    }
}

/// Point-in-time snapshot of the explored surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub full_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub headings: Headings,
    /// Serialized DOM.
    #[serde(default)]
    pub html: Option<String>,
    /// Line-oriented summary of the interactive element tree.
    #[serde(default)]
    pub aria_snapshot: Option<String>,
    #[serde(default)]
    pub artifacts: Option<CaptureArtifacts>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            url: None,
            full_url: None,
            title: None,
            headings: Headings::default(),
            html: None,
            aria_snapshot: None,
            artifacts: None,
            error: None,
            captured_at: Utc::now(),
        }
    }
}

impl Observation {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            full_url: Some(url.clone()),
            url: Some(url),
            ..Self::default()
        }
    }

    /// Minimal observation built from a navigation signal.
    pub fn basic(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(url).with_title(title)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_full_url(mut self, full_url: impl Into<String>) -> Self {
        self.full_url = Some(full_url.into());
        self
    }

    pub fn with_h1(mut self, text: impl Into<String>) -> Self {
        self.headings.h1 = Some(text.into());
        self
    }

    pub fn with_h2(mut self, text: impl Into<String>) -> Self {
        self.headings.h2 = Some(text.into());
        self
    }

    pub fn with_headings(mut self, headings: Headings) -> Self {
        self.headings = headings;
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_aria_snapshot(mut self, aria: impl Into<String>) -> Self {
        self.aria_snapshot = Some(aria.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: CaptureArtifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    /// URL path plus fragment, without trailing slashes. `/` when unknown.
    pub fn relative_path(&self) -> String {
        fingerprint::relative_path(self.url.as_deref().or(self.full_url.as_deref()))
    }

    pub fn fingerprint(&self) -> String {
        fingerprint::fingerprint(
            &self.relative_path(),
            self.headings.h1.as_deref(),
            self.headings.h2.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_is_derived_from_url() {
        let obs = Observation::new("https://x.example/app/settings/?tab=1#profile");
        assert_eq!(obs.relative_path(), "/app/settings#profile");

        let obs = Observation::new("https://x.example/");
        assert_eq!(obs.relative_path(), "/");
    }

    #[test]
    fn missing_url_degrades_to_root() {
        let obs = Observation::default();
        assert_eq!(obs.relative_path(), "/");
        assert_eq!(obs.fingerprint(), "root");
    }

    #[test]
    fn full_url_used_when_url_absent() {
        let obs = Observation {
            full_url: Some("https://x.example/orders/".into()),
            ..Observation::default()
        };
        assert_eq!(obs.relative_path(), "/orders");
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let raw = r#"{
            "url": "https://x.example/login",
            "headings": { "h1": "Sign In" },
            "ariaSnapshot": "- button \"Submit\"",
            "artifacts": { "htmlFile": "captures/login.html" }
        }"#;
        let obs: Observation = serde_json::from_str(raw).unwrap();
        assert_eq!(obs.headings.h1.as_deref(), Some("Sign In"));
        assert_eq!(obs.aria_snapshot.as_deref(), Some("- button \"Submit\""));
        assert_eq!(
            obs.artifacts.unwrap().html_file.as_deref(),
            Some("captures/login.html")
        );
        assert!(obs.title.is_none());
    }

    #[test]
    fn artifacts_merge_overlays_present_fields() {
        let mut base = CaptureArtifacts {
            screenshot: Some("a.png".into()),
            html_file: Some("a.html".into()),
            aria_file: None,
        };
        base.merge(&CaptureArtifacts {
            screenshot: Some("b.png".into()),
            ..CaptureArtifacts::default()
        });
        assert_eq!(base.screenshot.as_deref(), Some("b.png"));
        assert_eq!(base.html_file.as_deref(), Some("a.html"));
        assert!(base.aria_file.is_none());
    }
}
