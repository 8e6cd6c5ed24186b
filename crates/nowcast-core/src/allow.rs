/// Environment variable that carries the allow-list into both processes.
pub const ALLOW_ENV: &str = "YM_ALLOW";

/// Patterns used when no (or a blank) allow-list is configured.
pub const DEFAULT_PATTERNS: &[&str] = &["yandex", "music"];

/// Conjunctive allow-list over application identifiers.
///
/// An app id is allowed only if *every* pattern is a substring of its
/// lowercased form. Patterns are stored lowercased and in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    patterns: Vec<String>,
}

impl AllowList {
    /// Parse a comma/semicolon separated pattern list.
    ///
    /// Blank input, or input with no non-empty items, yields the defaults.
    pub fn parse(input: Option<&str>) -> Self {
        let patterns: Vec<String> = input
            .unwrap_or_default()
            .split([',', ';'])
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() {
            Self::default()
        } else {
            Self { patterns }
        }
    }

    /// Read the allow-list from [`ALLOW_ENV`].
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ALLOW_ENV).ok().as_deref())
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Render back into the `YM_ALLOW` syntax.
    pub fn to_env_value(&self) -> String {
        self.patterns.join(",")
    }

    pub fn is_allowed(&self, app_id: Option<&str>) -> bool {
        let Some(app_id) = app_id.filter(|id| !id.is_empty()) else {
            return false;
        };
        let lowered = app_id.to_lowercase();
        self.patterns.iter().all(|p| lowered.contains(p.as_str()))
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}
