use std::fmt::{Debug, Display};
use std::sync::Arc;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use crate::backend::PortletBackend;
use crate::errors::HubError;
use crate::hub::cache::CacheLevel;
use crate::hub::data::{ErrorData, ParameterSet, RenderData, RenderState};
use crate::hub::element::ElementHandle;
use crate::hub::event::{HubEvent, HubNotice, Listener, ListenerHandle};
use crate::hub::registry::HubRegistry;
use crate::script::ScriptBinding;

/// Identifier of a portlet on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortletId(String);

impl PortletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PortletId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for PortletId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PortletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves to the ids of the portlets whose state the action may have changed.
pub type ActionFuture = BoxFuture<'static, Result<Vec<PortletId>, HubError>>;
/// Resolves to the resource URL.
pub type ResourceUrlFuture = BoxFuture<'static, Result<String, HubError>>;

/// The hub as seen by one portlet.
///
/// Obtained from [`RegistrationService::register`](crate::hub::RegistrationService::register).
/// Holds nothing but its portlet id, the backend and the shared registry; all state lives in
/// the registry.
pub struct PortletHub {
    id: PortletId,
    backend: Arc<dyn PortletBackend>,
    registry: HubRegistry,
}

impl Debug for PortletHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortletHub")
            .field("id", &self.id)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl PortletHub {
    pub(crate) fn new(id: PortletId, backend: Arc<dyn PortletBackend>, registry: HubRegistry) -> Self {
        Self { id, backend, registry }
    }

    pub fn id(&self) -> &PortletId {
        &self.id
    }

    pub fn registry(&self) -> &HubRegistry {
        &self.registry
    }

    /// Dynamic entry points for values coming from portlet scripts.
    pub fn script(&self) -> ScriptBinding<'_> {
        ScriptBinding::new(self)
    }

    /// Adds a listener for `event_type`.
    ///
    /// `portlet.onStateChange` listeners are called right away with the current render state, if
    /// there is one. Other `portlet.` types than `onStateChange` and `onError` are rejected.
    pub fn add_event_listener<F>(&self, event_type: &str, callback: F) -> Result<ListenerHandle, HubError>
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        self.add_listener(event_type, Arc::new(callback))
    }

    pub fn add_listener(&self, event_type: &str, listener: Listener) -> Result<ListenerHandle, HubError> {
        self.registry.add_listener(&self.id, event_type, listener)
    }

    pub fn remove_event_listener(&self, handle: &ListenerHandle) -> Result<(), HubError> {
        self.registry.remove_listener(handle)
    }

    /// Starts an action.
    ///
    /// Every check and the claim of the page-wide busy flag happen before this returns, so a
    /// second call made before the returned future completes fails with
    /// [`HubError::AccessDenied`], whichever portlet it comes from. The flag is released when
    /// the action completes, fails, or when the future is dropped.
    pub fn action(&self, params: ParameterSet, element: ElementHandle) -> Result<ActionFuture, HubError> {
        let guard = self.registry.begin_action(&self.id)?;
        debug!("Portlet[{}]: executing action from {}", self.id, element);
        let pending = self.backend.execute_action(&self.id, params, element);

        let registry = self.registry.clone();
        let id = self.id.clone();
        Ok(async move {
            let result = pending.await;
            drop(guard);

            match result {
                Ok(updated) => {
                    debug!("Portlet[{}]: action completed, {} portlet(s) updated", id, updated.len());
                    registry.publish(HubNotice::ActionFinished { portlet: id, updated: updated.clone(), ok: true });
                    Ok(updated)
                }
                Err(e) => {
                    warn!("Portlet[{}]: action failed: {:#}", id, e);
                    registry.notify_error(&id, ErrorData::new("ActionFailed", e.to_string()));
                    registry.publish(HubNotice::ActionFinished { portlet: id, updated: vec![], ok: false });
                    Err(HubError::action_failed(e))
                }
            }
        }
        .boxed())
    }

    /// Builds a resource URL through the backend. A missing cache level falls back to the
    /// registry's configured default.
    pub fn create_resource_url(
        &self,
        params: Option<ParameterSet>,
        cache_level: Option<CacheLevel>,
        resource_id: Option<String>,
    ) -> ResourceUrlFuture {
        let level = cache_level.unwrap_or(self.registry.config().default_cache_level);
        let pending = self.backend.build_resource_url(params, level, &self.id, resource_id);
        pending.map(|res| res.map_err(HubError::resource_url)).boxed()
    }

    pub fn dispatch_client_event(&self, event_type: &str, payload: serde_json::Value) -> Result<usize, HubError> {
        self.registry.dispatch_client_event(event_type, payload)
    }

    pub fn is_in_progress(&self) -> bool {
        self.registry.is_in_progress()
    }

    /// Copy of `template`, or an empty set.
    pub fn new_parameters(&self, template: Option<&ParameterSet>) -> ParameterSet {
        template.cloned().unwrap_or_default()
    }

    /// Copy of `template`, or a state with default mode and window state.
    pub fn new_state(&self, template: Option<&RenderState>) -> RenderState {
        template.cloned().unwrap_or_default()
    }

    pub fn set_render_state(&self, state: RenderState) -> usize {
        self.registry.set_render_state(&self.id, state)
    }

    pub fn set_render_data(&self, data: RenderData) -> usize {
        self.registry.set_render_data(&self.id, data)
    }

    pub fn get_render_state(&self) -> Option<RenderState> {
        self.registry.render_state(&self.id)
    }

    pub fn get_render_data(&self) -> Option<RenderData> {
        self.registry.render_data(&self.id)
    }
}
