use std::collections::BTreeMap;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use log::trace;
use url::Url;
use crate::backend::PortletBackend;
use crate::hub::{CacheLevel, ElementHandle, ParameterSet, PortletId};
use crate::resource_url::ResourceUrlBuilder;

/// Null backend. Actions complete at once without changing any state and resource URLs never
/// embed render state.
#[derive(Debug, Clone, Default)]
pub struct NullBackend {
    urls: ResourceUrlBuilder,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(base: Url) -> Self {
        Self {
            urls: ResourceUrlBuilder::new(base),
        }
    }
}

impl PortletBackend for NullBackend {
    fn name(&self) -> &str {
        "NullBackend"
    }

    fn is_valid_pid(&self, id: &PortletId) -> bool {
        !id.as_str().is_empty() && !id.as_str().chars().any(char::is_whitespace)
    }

    fn execute_action(
        &self,
        initiator: &PortletId,
        _params: ParameterSet,
        _element: ElementHandle,
    ) -> BoxFuture<'static, anyhow::Result<Vec<PortletId>>> {
        trace!("Portlet[{}]: NullBackend drops action", initiator);
        future::ready(Ok(Vec::new())).boxed()
    }

    fn build_resource_url(
        &self,
        params: Option<ParameterSet>,
        cache_level: CacheLevel,
        portlet: &PortletId,
        resource_id: Option<String>,
    ) -> BoxFuture<'static, anyhow::Result<String>> {
        let url = self
            .urls
            .build(portlet, params.as_ref(), cache_level, resource_id.as_deref(), &BTreeMap::new())
            .map(String::from);
        future::ready(url).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_url::ParsedResourceUrl;

    #[test]
    fn validates_ids() {
        let backend = NullBackend::new();
        assert!(backend.is_valid_pid(&"portletA".into()));
        assert!(backend.is_valid_pid(&"ns_1-x.y".into()));
        assert!(!backend.is_valid_pid(&"".into()));
        assert!(!backend.is_valid_pid(&"  ".into()));
        assert!(!backend.is_valid_pid(&"has space".into()));
    }

    #[tokio::test]
    async fn action_changes_nothing() {
        let updated = NullBackend::new()
            .execute_action(&"A".into(), ParameterSet::new(), ElementHandle::form())
            .await
            .unwrap();
        assert!(updated.is_empty());
    }

    #[tokio::test]
    async fn urls_use_the_configured_base() {
        let backend = NullBackend::with_base_url(Url::parse("https://portal.example/app/").unwrap());
        let url = backend
            .build_resource_url(None, CacheLevel::Page, &"A".into(), None)
            .await
            .unwrap();
        assert!(url.starts_with("https://portal.example/app/RESOURCE/cacheLevelPage?"));

        let parsed = ParsedResourceUrl::parse(&url).unwrap();
        assert_eq!(parsed.portlet, PortletId::from("A"));
        assert!(parsed.states.is_empty());
    }
}
