//! Collaborators that talk to the portal on behalf of the hub.
//!
//! The hub never performs network traffic itself. Portlet id validation, action execution and
//! resource URL creation go through a [`PortletBackend`].

use futures::future::BoxFuture;
use crate::hub::{CacheLevel, ElementHandle, ParameterSet, PortletId};

/// Backend that does nothing and accepts every well formed id.
pub mod null;
/// Backend for a page whose portlet states come from the portal as JSON.
pub mod page;

pub use null::NullBackend;
pub use page::{ActionResponder, PageBackend, PageUpdate, PortletUpdate, StaticResponder};

/// Portal side of the hub. Implementations must be shareable between all hubs of a page.
pub trait PortletBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `id` names a portlet on the page.
    fn is_valid_pid(&self, id: &PortletId) -> bool;

    /// Submits an action for `initiator` and resolves to the portlets whose state may have
    /// changed. The backend updates the registry before resolving.
    fn execute_action(
        &self,
        initiator: &PortletId,
        params: ParameterSet,
        element: ElementHandle,
    ) -> BoxFuture<'static, anyhow::Result<Vec<PortletId>>>;

    fn build_resource_url(
        &self,
        params: Option<ParameterSet>,
        cache_level: CacheLevel,
        portlet: &PortletId,
        resource_id: Option<String>,
    ) -> BoxFuture<'static, anyhow::Result<String>>;
}
