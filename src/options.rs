//! Recorder configuration surface.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::RecorderError;

/// A named value transform applied through compound cassette keys.
pub type ModifierFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Registry of modifier name → transform.
pub type ModifierMap = BTreeMap<String, ModifierFn>;

/// A request-header overwrite computed from `(key, value, all_headers)`.
pub type OverwriteFn = Arc<dyn Fn(&str, &str, &BTreeMap<String, String>) -> String + Send + Sync>;

/// A request-header overwrite rule: a literal replacement or a function of
/// the captured header set.
#[derive(Clone)]
pub enum OverwriteRule {
    /// Replace the captured value with this literal (often a `^…$` pattern).
    Literal(String),
    /// Compute the replacement from the captured key, value, and headers.
    Transform(OverwriteFn),
}

impl OverwriteRule {
    /// Applies the rule to a captured header.
    #[must_use]
    pub fn apply(&self, key: &str, value: &str, all: &BTreeMap<String, String>) -> String {
        match self {
            Self::Literal(replacement) => replacement.clone(),
            Self::Transform(f) => f.as_ref()(key, value, all),
        }
    }
}

/// Map of header name → overwrite rule, applied when synthesizing
/// `reqheaders` during record, stub, and header healing.
pub type OverwriteMap = BTreeMap<String, OverwriteRule>;

/// The individual healing behaviors, computed once from the configured
/// flag string and tested via field membership afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealFlags {
    /// Adopt live request bodies into matched entries.
    pub body: bool,
    /// Adopt live request paths into matched entries.
    pub path: bool,
    /// Patch failing request-header patterns and recorded response headers.
    pub headers: bool,
    /// Rewrite recorded responses through the envelope healer.
    pub response: bool,
    /// Capture unmatched requests via a live round-trip at release.
    pub record: bool,
    /// Synthesize stub entries for unmatched requests without a live call.
    pub stub: bool,
    /// Drop still-unmatched original entries from the rewritten cassette.
    pub prune: bool,
}

impl HealFlags {
    /// Parses a comma-joined flag string. `magic` expands to
    /// body+path+headers+response; unknown names warn and are ignored.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if both `record` and `stub` are
    /// requested — they are mutually exclusive ways to handle an unmatched
    /// request.
    pub fn parse(input: &str) -> Result<Self, RecorderError> {
        let mut flags = Self::default();
        for name in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "body" => flags.body = true,
                "path" => flags.path = true,
                "headers" => flags.headers = true,
                "response" => flags.response = true,
                "record" => flags.record = true,
                "stub" => flags.stub = true,
                "prune" => flags.prune = true,
                "magic" => {
                    flags.body = true;
                    flags.path = true;
                    flags.headers = true;
                    flags.response = true;
                }
                other => warn!(flag = %other, "unknown heal flag ignored"),
            }
        }
        if flags.record && flags.stub {
            return Err(RecorderError::Config(
                "heal flags 'record' and 'stub' are mutually exclusive".to_string(),
            ));
        }
        Ok(flags)
    }
}

/// The parsed healing policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealSetting {
    /// Healing fully disabled; replayed cassettes are never rewritten.
    Disabled,
    /// Cassette write-back enabled, but no healing behavior active.
    #[default]
    Passive,
    /// Write-back enabled with the given healing behaviors.
    Flags(HealFlags),
}

impl HealSetting {
    /// Parses a flag string into an active policy.
    ///
    /// # Errors
    ///
    /// Propagates [`HealFlags::parse`] configuration errors.
    pub fn parse(input: &str) -> Result<Self, RecorderError> {
        Ok(Self::Flags(HealFlags::parse(input)?))
    }

    /// The active healing behaviors (none for `Disabled`/`Passive`).
    #[must_use]
    pub fn flags(&self) -> HealFlags {
        match self {
            Self::Flags(flags) => *flags,
            Self::Disabled | Self::Passive => HealFlags::default(),
        }
    }

    /// Whether the cassette is rewritten at release.
    #[must_use]
    pub fn writes_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Configuration for a [`crate::recorder::RequestRecorder`].
#[derive(Clone)]
pub struct RecorderOptions {
    /// Base directory for cassette files.
    pub cassette_folder: PathBuf,
    /// Omit captured response headers from newly written entries.
    pub strip_headers: bool,
    /// Raise on out-of-order or unmatched entries at release.
    pub strict: bool,
    /// Healing policy.
    pub heal: HealSetting,
    /// Named modifiers available to compound cassette keys.
    pub modifiers: ModifierMap,
    /// Request-header overwrite rules for synthesized `reqheaders`.
    pub req_header_overwrite: OverwriteMap,
}

impl RecorderOptions {
    /// Creates options with defaults: strict on, passive healing, no
    /// modifiers or overwrites.
    #[must_use]
    pub fn new(cassette_folder: impl Into<PathBuf>) -> Self {
        Self {
            cassette_folder: cassette_folder.into(),
            strip_headers: false,
            strict: true,
            heal: HealSetting::default(),
            modifiers: ModifierMap::new(),
            req_header_overwrite: OverwriteMap::new(),
        }
    }

    /// Sets whether captured response headers are stripped.
    #[must_use]
    pub fn strip_headers(mut self, strip: bool) -> Self {
        self.strip_headers = strip;
        self
    }

    /// Sets strict-mode release checks.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the healing policy.
    #[must_use]
    pub fn heal(mut self, heal: HealSetting) -> Self {
        self.heal = heal;
        self
    }

    /// Registers a named modifier.
    #[must_use]
    pub fn modifier(mut self, name: &str, f: ModifierFn) -> Self {
        self.modifiers.insert(name.to_string(), f);
        self
    }

    /// Registers a request-header overwrite rule.
    #[must_use]
    pub fn overwrite_header(mut self, name: &str, rule: OverwriteRule) -> Self {
        self.req_header_overwrite.insert(name.to_ascii_lowercase(), rule);
        self
    }
}
