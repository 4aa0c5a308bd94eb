use std::fmt::Display;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::errors::HubError;

/// Granularity at which the render state embedded in a resource URL may be reused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheLevel {
    /// Render state of the whole page is embedded
    #[default]
    #[serde(rename = "cacheLevelPage")]
    Page,
    /// Only the owning portlet's render state is embedded
    #[serde(rename = "cacheLevelPortlet")]
    Portlet,
    /// No render state, the resource is always fetched in full
    #[serde(rename = "cacheLevelFull")]
    Full,
}

impl CacheLevel {
    pub const PAGE: &'static str = "cacheLevelPage";
    pub const PORTLET: &'static str = "cacheLevelPortlet";
    pub const FULL: &'static str = "cacheLevelFull";

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLevel::Page => Self::PAGE,
            CacheLevel::Portlet => Self::PORTLET,
            CacheLevel::Full => Self::FULL,
        }
    }

    /// Whether a resource URL at this level carries any render state.
    pub fn embeds_state(&self) -> bool {
        !matches!(self, CacheLevel::Full)
    }
}

impl Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CacheLevel {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            Self::PAGE => Ok(CacheLevel::Page),
            Self::PORTLET => Ok(CacheLevel::Portlet),
            Self::FULL => Ok(CacheLevel::Full),
            other => Err(HubError::InvalidArgument(format!("Invalid cacheability argument: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_parse_and_display() {
        for level in [CacheLevel::Page, CacheLevel::Portlet, CacheLevel::Full] {
            let parsed: CacheLevel = level.to_string().parse().unwrap();
            assert_eq!(parsed, level);
        }
        assert_eq!(CacheLevel::default(), CacheLevel::Page);
    }

    #[test]
    fn unknown_token_is_invalid_argument() {
        let err = "Invalid".parse::<CacheLevel>().unwrap_err();
        assert!(matches!(err, HubError::InvalidArgument(_)));
        // tokens are case sensitive
        assert!("cachelevelpage".parse::<CacheLevel>().is_err());
    }

    #[test]
    fn full_level_embeds_no_state() {
        assert!(CacheLevel::Page.embeds_state());
        assert!(CacheLevel::Portlet.embeds_state());
        assert!(!CacheLevel::Full.embeds_state());
        assert_eq!(serde_json::to_string(&CacheLevel::Portlet).unwrap(), "\"cacheLevelPortlet\"");
    }
}
