use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;
use anyhow::anyhow;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;
use crate::backend::PortletBackend;
use crate::hub::{CacheLevel, ElementHandle, HubRegistry, ParameterSet, PortletId, RenderData, RenderState, WeakHubRegistry};
use crate::resource_url::ResourceUrlBuilder;

/// New state (and optionally data) for one portlet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortletUpdate {
    pub state: RenderState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RenderData>,
}

/// Portlet states sent by the portal, either when the page loads or as the answer to an action.
///
/// The JSON form is an object keyed by portlet id:
///
/// ```json
/// { "portletA": { "state": { "portletMode": "view", "parameters": { "p": ["1"] } } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageUpdate(BTreeMap<PortletId, PortletUpdate>);

impl PageUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with(mut self, id: impl Into<PortletId>, state: RenderState, data: Option<RenderData>) -> Self {
        self.insert(id, state, data);
        self
    }

    pub fn insert(&mut self, id: impl Into<PortletId>, state: RenderState, data: Option<RenderData>) {
        self.0.insert(id.into(), PortletUpdate { state, data });
    }

    pub fn get(&self, id: &PortletId) -> Option<&PortletUpdate> {
        self.0.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PortletId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for PageUpdate {
    type Item = (PortletId, PortletUpdate);
    type IntoIter = btree_map::IntoIter<PortletId, PortletUpdate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Produces the portal's answer to an action.
pub trait ActionResponder: Send + Sync {
    fn respond(&self, initiator: &PortletId, params: &ParameterSet) -> BoxFuture<'static, anyhow::Result<PageUpdate>>;
}

impl<F> ActionResponder for F
where
    F: Fn(&PortletId, &ParameterSet) -> BoxFuture<'static, anyhow::Result<PageUpdate>> + Send + Sync,
{
    fn respond(&self, initiator: &PortletId, params: &ParameterSet) -> BoxFuture<'static, anyhow::Result<PageUpdate>> {
        self(initiator, params)
    }
}

/// Answers every action with the same update.
#[derive(Debug, Clone, Default)]
pub struct StaticResponder(PageUpdate);

impl StaticResponder {
    pub fn new(update: PageUpdate) -> Self {
        Self(update)
    }
}

impl ActionResponder for StaticResponder {
    fn respond(&self, _initiator: &PortletId, _params: &ParameterSet) -> BoxFuture<'static, anyhow::Result<PageUpdate>> {
        future::ready(Ok(self.0.clone())).boxed()
    }
}

/// Backend for one page of portlets.
///
/// The portlets of the page are fixed when the backend is created; only they pass
/// [`is_valid_pid`](PortletBackend::is_valid_pid). Action results are written to the registry
/// before the action future resolves, and resource URLs embed render state from it.
pub struct PageBackend {
    registry: WeakHubRegistry,
    portlets: Arc<BTreeSet<PortletId>>,
    urls: ResourceUrlBuilder,
    responder: Arc<dyn ActionResponder>,
}

impl Debug for PageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBackend")
            .field("portlets", &self.portlets)
            .field("base", &self.urls.base().as_str())
            .finish_non_exhaustive()
    }
}

impl PageBackend {
    /// Seeds `registry` with the initial page state.
    pub fn new(registry: &HubRegistry, initial: PageUpdate, responder: Arc<dyn ActionResponder>) -> Self {
        let portlets: BTreeSet<PortletId> = initial.ids().cloned().collect();
        for (id, update) in initial {
            registry.update_portlet(&id, update.state, update.data);
        }
        debug!("PageBackend: page with {} portlet(s)", portlets.len());

        Self {
            registry: registry.downgrade(),
            portlets: Arc::new(portlets),
            urls: ResourceUrlBuilder::default(),
            responder,
        }
    }

    pub fn with_base_url(mut self, base: Url) -> Self {
        self.urls = ResourceUrlBuilder::new(base);
        self
    }

    pub fn portlet_ids(&self) -> impl Iterator<Item = &PortletId> {
        self.portlets.iter()
    }
}

impl PortletBackend for PageBackend {
    fn name(&self) -> &str {
        "PageBackend"
    }

    fn is_valid_pid(&self, id: &PortletId) -> bool {
        self.portlets.contains(id)
    }

    fn execute_action(
        &self,
        initiator: &PortletId,
        params: ParameterSet,
        _element: ElementHandle,
    ) -> BoxFuture<'static, anyhow::Result<Vec<PortletId>>> {
        let pending = self.responder.respond(initiator, &params);
        let registry = self.registry.clone();
        let portlets = self.portlets.clone();

        async move {
            let update = pending.await?;
            let registry = registry.upgrade().ok_or_else(|| anyhow!("hub registry is gone"))?;

            let mut updated = Vec::with_capacity(update.len());
            for (id, u) in update {
                if !portlets.contains(&id) {
                    warn!("Portlet[{}]: not on this page, update ignored", id);
                    continue;
                }
                registry.update_portlet(&id, u.state, u.data);
                updated.push(id);
            }
            Ok(updated)
        }
        .boxed()
    }

    fn build_resource_url(
        &self,
        params: Option<ParameterSet>,
        cache_level: CacheLevel,
        portlet: &PortletId,
        resource_id: Option<String>,
    ) -> BoxFuture<'static, anyhow::Result<String>> {
        let states = self
            .registry
            .upgrade()
            .map(|registry| registry.render_states())
            .unwrap_or_default();
        let url = self
            .urls
            .build(portlet, params.as_ref(), cache_level, resource_id.as_deref(), &states)
            .map(String::from);
        future::ready(url).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::hub::{HubEvent, RegistrationService, ON_STATE_CHANGE};
    use crate::resource_url::ParsedResourceUrl;

    const PAGE: &str = r#"{
        "A": { "state": { "parameters": { "x": ["1"] } } },
        "B": { "state": { "portletMode": "edit" }, "data": { "content": "<p>B</p>", "mimeType": "text/html" } }
    }"#;

    fn state_with(name: &str, value: &str) -> RenderState {
        let mut state = RenderState::default();
        state.set_value(name, Some(value.to_string()));
        state
    }

    fn page(registry: &HubRegistry, responder: Arc<dyn ActionResponder>) -> Arc<PageBackend> {
        Arc::new(PageBackend::new(registry, PageUpdate::from_json(PAGE).unwrap(), responder))
    }

    #[test]
    fn decodes_page_json() {
        let update = PageUpdate::from_json(PAGE).unwrap();
        assert_eq!(update.len(), 2);
        assert_eq!(update.get(&"A".into()).unwrap().state.value("x"), Some("1"));
        assert!(update.get(&"A".into()).unwrap().data.is_none());

        let b = update.get(&"B".into()).unwrap();
        assert_eq!(b.state.portlet_mode(), "edit");
        assert_eq!(b.data.as_ref().unwrap().mime_type, "text/html");

        assert!(PageUpdate::from_json("[1, 2]").is_err());
    }

    #[test]
    fn seeds_registry_and_known_ids() {
        let registry = HubRegistry::default();
        let backend = page(&registry, Arc::new(StaticResponder::default()));

        assert_eq!(registry.render_state(&"A".into()).unwrap().value("x"), Some("1"));
        assert_eq!(registry.render_data(&"B".into()).unwrap().content, "<p>B</p>");
        assert!(backend.is_valid_pid(&"A".into()));
        assert!(!backend.is_valid_pid(&"C".into()));
        assert_eq!(backend.portlet_ids().count(), 2);
    }

    #[tokio::test]
    async fn action_updates_several_portlets() {
        let registry = HubRegistry::default();
        let answer = PageUpdate::new()
            .with("A", state_with("x", "2"), None)
            .with("B", state_with("y", "3"), Some(RenderData::new("<p>new</p>", "text/html")))
            .with("Z", RenderState::default(), None);
        let backend = page(&registry, Arc::new(StaticResponder::new(answer)));
        let service = RegistrationService::new(registry.clone(), backend);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hubs = Vec::new();
        for id in ["A", "B"] {
            let hub = service.register(id).await.unwrap();
            let seen = seen.clone();
            hub.add_event_listener(ON_STATE_CHANGE, move |ev: &HubEvent| {
                let state = ev.render_state().unwrap();
                seen.lock().unwrap().push((id, state.value("x").or(state.value("y")).map(str::to_string)));
            })
            .unwrap();
            hubs.push(hub);
        }
        seen.lock().unwrap().clear();

        let updated = hubs[0].action(ParameterSet::new(), ElementHandle::form()).unwrap().await.unwrap();
        assert_eq!(updated, vec![PortletId::from("A"), PortletId::from("B")]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("A", Some("2".to_string())), ("B", Some("3".to_string()))]
        );
        assert!(registry.render_data(&"A".into()).is_none());
        assert_eq!(hubs[1].get_render_data().unwrap().content, "<p>new</p>");
        assert!(!registry.is_registered(&"Z".into()));
    }

    #[tokio::test]
    async fn closure_responder_sees_the_initiator() {
        let registry = HubRegistry::default();
        let responder = |initiator: &PortletId, params: &ParameterSet| {
            let value = params.get("v").and_then(|v| v.first().cloned()).flatten().unwrap_or_default();
            let update = PageUpdate::new().with(initiator.clone(), state_with("echo", &value), None);
            future::ready(Ok::<_, anyhow::Error>(update)).boxed()
        };
        let backend = page(&registry, Arc::new(responder));

        let params: ParameterSet = [("v", vec![Some("hello".to_string())])].into_iter().collect();
        let updated = backend.execute_action(&"B".into(), params, ElementHandle::form()).await.unwrap();
        assert_eq!(updated, vec![PortletId::from("B")]);
        assert_eq!(registry.render_state(&"B".into()).unwrap().value("echo"), Some("hello"));
    }

    #[tokio::test]
    async fn failing_responder_fails_the_action() {
        let registry = HubRegistry::default();
        let responder = |_: &PortletId, _: &ParameterSet| future::ready(Err::<PageUpdate, _>(anyhow!("portal down"))).boxed();
        let backend = page(&registry, Arc::new(responder));

        let err = backend
            .execute_action(&"A".into(), ParameterSet::new(), ElementHandle::form())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "portal down");
        assert_eq!(registry.render_state(&"A".into()).unwrap().value("x"), Some("1"));
    }

    #[tokio::test]
    async fn resource_urls_embed_state_by_cache_level() {
        let registry = HubRegistry::default();
        let backend = page(&registry, Arc::new(StaticResponder::default()));
        let rp: ParameterSet = [("rp1", vec![Some("a".to_string()), Some("b".to_string())])].into_iter().collect();

        let url = backend
            .build_resource_url(Some(rp.clone()), CacheLevel::Portlet, &"A".into(), Some("res1".into()))
            .await
            .unwrap();
        let parsed = ParsedResourceUrl::parse(&url).unwrap();
        assert_eq!(parsed.parameters, rp);
        assert_eq!(parsed.resource_id.as_deref(), Some("res1"));
        assert_eq!(parsed.states.keys().collect::<Vec<_>>(), vec![&PortletId::from("A")]);

        let url = backend.build_resource_url(None, CacheLevel::Page, &"A".into(), None).await.unwrap();
        assert_eq!(ParsedResourceUrl::parse(&url).unwrap().states, registry.render_states());

        let url = backend.build_resource_url(None, CacheLevel::Full, &"A".into(), None).await.unwrap();
        assert!(ParsedResourceUrl::parse(&url).unwrap().states.is_empty());
    }

    #[tokio::test]
    async fn action_after_registry_is_gone_fails() {
        let registry = HubRegistry::default();
        let backend = page(&registry, Arc::new(StaticResponder::default()));
        drop(registry);

        let res = backend
            .execute_action(&"A".into(), ParameterSet::new(), ElementHandle::form())
            .await;
        assert!(res.is_err());
    }
}
