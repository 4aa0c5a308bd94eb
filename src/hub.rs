//! The portlet hub.
//!
//! Portlets rendered independently on one page never talk to each other directly. Each one
//! registers with the hub through a [`RegistrationService`] and receives its own
//! [`PortletHub`]. Through it a portlet can:
//!
//! - subscribe to render state changes (`portlet.onStateChange`), errors (`portlet.onError`)
//!   and custom client events,
//! - start an action, executed by the [`PortletBackend`](crate::backend::PortletBackend),
//! - create resource URLs,
//! - read and replace its render state and render data.
//!
//! All hubs of a page share one [`HubRegistry`]. The registry owns the listener registries,
//! the render state/data slots and the page-wide busy flag that allows only one action in
//! flight at a time.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use portlet_hub::backend::NullBackend;
//! use portlet_hub::hub::{ElementHandle, HubRegistry, ParameterSet, RegistrationService, ON_STATE_CHANGE};
//!
//! # futures::executor::block_on(async {
//! let registry = HubRegistry::default();
//! let service = RegistrationService::new(registry.clone(), Arc::new(NullBackend::new()));
//! let hub = service.register("portletA").await.unwrap();
//!
//! hub.add_event_listener(ON_STATE_CHANGE, |ev| println!("new state: {:?}", ev.render_state()))
//!     .unwrap();
//!
//! let pending = hub.action(ParameterSet::new(), ElementHandle::form()).unwrap();
//! pending.await.unwrap();
//! assert!(!hub.is_in_progress());
//! # });
//! ```

/// Resource URL cache levels.
pub mod cache;
/// Parameters, render state, render data and error data.
pub mod data;
/// DOM element handles.
pub mod element;
/// Listener events, handles and registry notices.
pub mod event;
/// Per-portlet hub façade.
pub mod portlet;
/// Portlet registration.
pub mod registration;
/// Shared registry and event dispatch.
pub mod registry;

pub use cache::CacheLevel;
pub use data::{constants, ErrorData, ParameterSet, RenderData, RenderState};
pub use element::ElementHandle;
pub use event::{HubEvent, HubNotice, Listener, ListenerHandle, ListenerKind, ON_ERROR, ON_STATE_CHANGE};
pub use portlet::{ActionFuture, PortletHub, PortletId, ResourceUrlFuture};
pub use registration::RegistrationService;
pub use registry::{HubRegistry, NoticeSubscription, WeakHubRegistry};
