//! Git-derived pattern taxonomy.

use std::fmt;

/// Kind of pattern mined from version-control history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternType {
    /// Files that repeatedly change together.
    Cochange,
    /// Files with unusually frequent changes.
    Hotspot,
    /// Fix-shaped commits capturing how a problem was resolved.
    Solution,
}

impl PatternType {
    /// All pattern types, in display order.
    pub const ALL: [Self; 3] = [Self::Cochange, Self::Hotspot, Self::Solution];

    /// Returns the type as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cochange => "cochange",
            Self::Hotspot => "hotspot",
            Self::Solution => "solution",
        }
    }

    /// Returns the human-readable description used in summaries.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Cochange => "Co-change patterns",
            Self::Hotspot => "Maintenance hotspots",
            Self::Solution => "Solution patterns",
        }
    }

    /// Parses a pattern type string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cochange" => Some(Self::Cochange),
            "hotspot" => Some(Self::Hotspot),
            "solution" => Some(Self::Solution),
            _ => None,
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
