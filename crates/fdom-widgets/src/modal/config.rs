#![forbid(unsafe_code)]

//! Modal configuration and optional TOML policy loading.

use std::fmt;
use std::time::Duration;

/// Default length of the opening and closing animations.
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(400);

/// Root marker classes driven by a dialog binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalMarkers {
    /// Page lock: present while a dialog is open or closing.
    pub open: String,
    /// Entry animation in progress.
    pub opening: String,
    /// Exit animation in progress.
    pub closing: String,
}

impl Default for ModalMarkers {
    fn default() -> Self {
        Self {
            open: "modal-is-open".into(),
            opening: "modal-is-opening".into(),
            closing: "modal-is-closing".into(),
        }
    }
}

/// Error loading or validating a [`ModalConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The policy document could not be parsed.
    Parse(String),
    /// A field holds a value the controller cannot use.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "failed to parse modal policy: {msg}"),
            Self::Invalid(field) => write!(f, "invalid modal policy field: {field}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-binding modal configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModalConfig {
    /// Close when a click lands outside the content region.
    pub close_on_backdrop: bool,
    /// Delay before the opening marker is dropped and before a close
    /// completes.
    pub animation: Duration,
    pub markers: ModalMarkers,
    /// Tag of the content region inside the dialog.
    pub content_tag: String,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            close_on_backdrop: true,
            animation: DEFAULT_ANIMATION,
            markers: ModalMarkers::default(),
            content_tag: "article".into(),
        }
    }
}

impl ModalConfig {
    pub fn close_on_backdrop(mut self, close: bool) -> Self {
        self.close_on_backdrop = close;
        self
    }

    pub fn animation(mut self, animation: Duration) -> Self {
        self.animation = animation;
        self
    }

    pub fn markers(mut self, markers: ModalMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn content_tag(mut self, tag: impl Into<String>) -> Self {
        self.content_tag = tag.into();
        self
    }

    /// Reject empty tag and marker names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_tag.trim().is_empty() {
            return Err(ConfigError::Invalid("content_tag"));
        }
        let markers = [
            (&self.markers.open, "markers.open"),
            (&self.markers.opening, "markers.opening"),
            (&self.markers.closing, "markers.closing"),
        ];
        for (class, field) in markers {
            if class.trim().is_empty() || class.contains(char::is_whitespace) {
                return Err(ConfigError::Invalid(field));
            }
        }
        Ok(())
    }

    /// Load a policy such as:
    ///
    /// ```toml
    /// close_on_backdrop = false
    /// animation_ms = 250
    /// content_tag = "section"
    ///
    /// [markers]
    /// open = "dialog-open"
    /// ```
    ///
    /// Omitted fields keep their defaults.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let policy: policy::ModalPolicy =
            toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let config = Self::from(policy);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "policy-config")]
mod policy {
    use super::{ModalConfig, ModalMarkers};
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub(super) struct MarkerPolicy {
        open: String,
        opening: String,
        closing: String,
    }

    impl Default for MarkerPolicy {
        fn default() -> Self {
            let markers = ModalMarkers::default();
            Self {
                open: markers.open,
                opening: markers.opening,
                closing: markers.closing,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub(super) struct ModalPolicy {
        close_on_backdrop: bool,
        animation_ms: u64,
        content_tag: String,
        markers: MarkerPolicy,
    }

    impl ModalPolicy {
        /// Durations beyond `u64::MAX` milliseconds saturate.
        pub(super) fn from_config(config: ModalConfig) -> Self {
            Self {
                close_on_backdrop: config.close_on_backdrop,
                animation_ms: u64::try_from(config.animation.as_millis()).unwrap_or(u64::MAX),
                content_tag: config.content_tag,
                markers: MarkerPolicy {
                    open: config.markers.open,
                    opening: config.markers.opening,
                    closing: config.markers.closing,
                },
            }
        }

        #[cfg(test)]
        pub(super) fn animation_ms(&self) -> u64 {
            self.animation_ms
        }
    }

    impl Default for ModalPolicy {
        fn default() -> Self {
            Self::from_config(ModalConfig::default())
        }
    }

    impl From<ModalPolicy> for ModalConfig {
        fn from(policy: ModalPolicy) -> Self {
            Self {
                close_on_backdrop: policy.close_on_backdrop,
                animation: Duration::from_millis(policy.animation_ms),
                markers: ModalMarkers {
                    open: policy.markers.open,
                    opening: policy.markers.opening,
                    closing: policy.markers.closing,
                },
                content_tag: policy.content_tag,
            }
        }
    }
}
