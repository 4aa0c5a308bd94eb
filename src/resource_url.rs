//! Resource URL encoding.
//!
//! A resource URL carries everything the portal needs to serve a resource request:
//!
//! ```text
//! <base>/RESOURCE/<cacheLevel>?pid=<id>[&resid=<id>]{&rp.<name>=<value> | &rn.<name>= | &re.<name>=}[&state=<json>]
//! ```
//!
//! `rp.` pairs carry parameter values in order, `rn.` marks a null value and `re.` a parameter
//! without any value. The `state` pair holds the render states the cache level asks for: every
//! portlet of the page for `cacheLevelPage`, only the owner for `cacheLevelPortlet`, none for
//! `cacheLevelFull`.

use std::collections::BTreeMap;
use anyhow::{anyhow, bail, Context};
use url::Url;
use crate::hub::{CacheLevel, ParameterSet, PortletId, RenderState};

/// Path segment that marks a resource URL.
pub const RESOURCE_MARKER: &str = "RESOURCE";
/// Base used when a backend is not given one.
pub const DEFAULT_BASE_URL: &str = "http://localhost/portal/";

const PID: &str = "pid";
const RESID: &str = "resid";
const STATE: &str = "state";
const PARAM_PREFIX: &str = "rp.";
const NULL_PARAM_PREFIX: &str = "rn.";
const EMPTY_PARAM_PREFIX: &str = "re.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUrlBuilder {
    base: Url,
}

impl Default for ResourceUrlBuilder {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"))
    }
}

impl ResourceUrlBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base).with_context(|| format!("invalid base URL {base}"))?;
        if base.cannot_be_a_base() {
            bail!("{base} cannot carry a path");
        }
        Ok(Self::new(base))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Encodes a resource URL for `portlet`. `states` is the page snapshot; the cache level
    /// decides how much of it ends up in the URL.
    pub fn build(
        &self,
        portlet: &PortletId,
        params: Option<&ParameterSet>,
        cache_level: CacheLevel,
        resource_id: Option<&str>,
        states: &BTreeMap<PortletId, RenderState>,
    ) -> anyhow::Result<Url> {
        let snapshot: BTreeMap<&PortletId, &RenderState> = if !cache_level.embeds_state() {
            BTreeMap::new()
        } else if cache_level == CacheLevel::Portlet {
            states.get_key_value(portlet).into_iter().collect()
        } else {
            states.iter().collect()
        };
        let state = if snapshot.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&snapshot)?)
        };

        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot carry a path", self.base))?
            .pop_if_empty()
            .push(RESOURCE_MARKER)
            .push(cache_level.as_str());

        {
            let mut query = url.query_pairs_mut();
            query.clear().append_pair(PID, portlet.as_str());
            if let Some(resid) = resource_id {
                query.append_pair(RESID, resid);
            }
            for (name, values) in params.into_iter().flatten() {
                if values.is_empty() {
                    query.append_pair(&format!("{EMPTY_PARAM_PREFIX}{name}"), "");
                }
                for value in values {
                    match value {
                        Some(v) => query.append_pair(&format!("{PARAM_PREFIX}{name}"), v),
                        None => query.append_pair(&format!("{NULL_PARAM_PREFIX}{name}"), ""),
                    };
                }
            }
            if let Some(state) = &state {
                query.append_pair(STATE, state);
            }
        }

        Ok(url)
    }
}

/// A decoded resource URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResourceUrl {
    pub portlet: PortletId,
    pub cache_level: CacheLevel,
    pub resource_id: Option<String>,
    pub parameters: ParameterSet,
    pub states: BTreeMap<PortletId, RenderState>,
}

impl ParsedResourceUrl {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let url = Url::parse(input).with_context(|| format!("invalid URL {input}"))?;

        let segments: Vec<&str> = url.path_segments().map(Iterator::collect).unwrap_or_default();
        let [.., marker, level] = segments.as_slice() else {
            bail!("not a resource URL: {input}");
        };
        if *marker != RESOURCE_MARKER {
            bail!("not a resource URL: {input}");
        }
        let cache_level: CacheLevel = level.parse()?;

        let mut portlet = None;
        let mut resource_id = None;
        let mut parameters = ParameterSet::new();
        let mut states = BTreeMap::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                PID => portlet = Some(PortletId::new(value.into_owned())),
                RESID => resource_id = Some(value.into_owned()),
                STATE => {
                    states = serde_json::from_str(&value).context("malformed state in resource URL")?;
                }
                other => {
                    if let Some(name) = other.strip_prefix(PARAM_PREFIX) {
                        parameters.append(name, Some(value.into_owned()));
                    } else if let Some(name) = other.strip_prefix(NULL_PARAM_PREFIX) {
                        parameters.append(name, None);
                    } else if let Some(name) = other.strip_prefix(EMPTY_PARAM_PREFIX) {
                        parameters.insert(name, Vec::new());
                    }
                }
            }
        }

        let portlet = portlet.ok_or_else(|| anyhow!("resource URL without portlet id: {input}"))?;
        Ok(Self {
            portlet,
            cache_level,
            resource_id,
            parameters,
            states,
        })
    }
}

pub fn is_resource_url(input: &str) -> bool {
    ParsedResourceUrl::parse(input).is_ok()
}

/// The portlet that created the URL, if `input` is a resource URL.
pub fn initiating_portlet_id(input: &str) -> Option<PortletId> {
    ParsedResourceUrl::parse(input).ok().map(|parsed| parsed.portlet)
}

pub fn cacheability(input: &str) -> Option<CacheLevel> {
    ParsedResourceUrl::parse(input).ok().map(|parsed| parsed.cache_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &[Option<&str>])]) -> ParameterSet {
        pairs
            .iter()
            .map(|(k, vs)| (*k, vs.iter().map(|v| v.map(str::to_string)).collect::<Vec<_>>()))
            .collect()
    }

    fn page_states() -> BTreeMap<PortletId, RenderState> {
        let mut a = RenderState::default();
        a.set_value("x", Some("1".into()));
        let mut b = RenderState::default();
        b.set_portlet_mode("edit");
        BTreeMap::from([(PortletId::from("A"), a), (PortletId::from("B"), b)])
    }

    #[test]
    fn url_layout() {
        let builder = ResourceUrlBuilder::parse("http://example.com/portal").unwrap();
        let url = builder
            .build(&"A".into(), None, CacheLevel::Full, Some("img 1"), &BTreeMap::new())
            .unwrap();
        assert_eq!(url.as_str(), "http://example.com/portal/RESOURCE/cacheLevelFull?pid=A&resid=img+1");
    }

    #[test]
    fn parameters_and_resource_id_come_back() {
        let builder = ResourceUrlBuilder::default();
        let rp = params(&[("rp1", &[Some("a"), Some("b")]), ("empty", &[None]), ("odd", &[Some("a&b=c")])]);
        let url = builder
            .build(&"A".into(), Some(&rp), CacheLevel::Portlet, Some("res1"), &BTreeMap::new())
            .unwrap();

        let parsed = ParsedResourceUrl::parse(url.as_str()).unwrap();
        assert_eq!(parsed.portlet, PortletId::from("A"));
        assert_eq!(parsed.cache_level, CacheLevel::Portlet);
        assert_eq!(parsed.resource_id.as_deref(), Some("res1"));
        assert_eq!(parsed.parameters, rp);
        assert!(parsed.states.is_empty());
    }

    #[test]
    fn empty_parameter_arrays_are_kept() {
        let rp = params(&[("k", &[]), ("x", &[Some("1")])]);
        let url = ResourceUrlBuilder::default()
            .build(&"A".into(), Some(&rp), CacheLevel::Full, None, &BTreeMap::new())
            .unwrap();
        assert!(url.as_str().contains("re.k="));

        let parsed = ParsedResourceUrl::parse(url.as_str()).unwrap();
        assert_eq!(parsed.parameters.get("k"), Some(&[] as &[Option<String>]));
        assert_eq!(parsed.parameters, rp);
    }

    #[test]
    fn cache_level_decides_embedded_state() {
        let builder = ResourceUrlBuilder::default();
        let states = page_states();
        let owner = PortletId::from("A");

        let page = builder.build(&owner, None, CacheLevel::Page, None, &states).unwrap();
        assert_eq!(ParsedResourceUrl::parse(page.as_str()).unwrap().states, states);

        let portlet = builder.build(&owner, None, CacheLevel::Portlet, None, &states).unwrap();
        let embedded = ParsedResourceUrl::parse(portlet.as_str()).unwrap().states;
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[&owner].value("x"), Some("1"));

        let full = builder.build(&owner, None, CacheLevel::Full, None, &states).unwrap();
        assert!(!full.as_str().contains("state="));
    }

    #[test]
    fn helpers_recognise_resource_urls() {
        let url = ResourceUrlBuilder::default()
            .build(&"P1".into(), None, CacheLevel::Page, None, &BTreeMap::new())
            .unwrap();
        assert!(is_resource_url(url.as_str()));
        assert_eq!(initiating_portlet_id(url.as_str()), Some(PortletId::from("P1")));
        assert_eq!(cacheability(url.as_str()), Some(CacheLevel::Page));

        assert!(!is_resource_url("http://localhost/portal/page?pid=P1"));
        assert!(!is_resource_url("http://localhost/portal/RESOURCE/cacheLevelNone?pid=P1"));
        assert!(!is_resource_url("http://localhost/portal/RESOURCE/cacheLevelPage"));
        assert!(!is_resource_url("not a url"));
        assert_eq!(initiating_portlet_id("http://localhost/"), None);
    }

    #[test]
    fn rejects_opaque_base() {
        assert!(ResourceUrlBuilder::parse("mailto:someone@example.com").is_err());
    }
}
