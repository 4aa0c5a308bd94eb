//! Hub event types.
//!
//! # Main Types
//!
//! - [`HubEvent`]: what a listener callback receives.
//! - [`ListenerKind`]: which of the three registries a listener lives in.
//! - [`ListenerHandle`]: opaque token returned by `add_event_listener`.
//! - [`HubNotice`]: observability events published on the registry bus.

use std::fmt::{Debug, Display};
use std::sync::Arc;
use uuid::Uuid;
use crate::errors::HubError;
use crate::hub::data::{ErrorData, RenderData, RenderState};
use crate::hub::portlet::PortletId;

/// Event type for render state change notifications.
pub const ON_STATE_CHANGE: &str = "portlet.onStateChange";
/// Event type for error notifications.
pub const ON_ERROR: &str = "portlet.onError";
/// Namespace reserved for system events.
pub const RESERVED_PREFIX: &str = "portlet.";

/// Listener callback. Invoked synchronously on the dispatching thread.
pub type Listener = Arc<dyn Fn(&HubEvent) + Send + Sync>;

/// Event delivered to a listener.
#[derive(Clone, Debug, PartialEq)]
pub enum HubEvent {
    /// Current render state, with render data when the page holds any
    StateChange {
        state: RenderState,
        data: Option<RenderData>,
    },
    /// Error reported for the listener's portlet
    Error(ErrorData),
    /// Custom event dispatched between portlets
    Client {
        event_type: String,
        payload: serde_json::Value,
    },
}

impl HubEvent {
    pub fn event_type(&self) -> &str {
        match self {
            HubEvent::StateChange { .. } => ON_STATE_CHANGE,
            HubEvent::Error(_) => ON_ERROR,
            HubEvent::Client { event_type, .. } => event_type,
        }
    }

    pub fn render_state(&self) -> Option<&RenderState> {
        match self {
            HubEvent::StateChange { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn render_data(&self) -> Option<&RenderData> {
        match self {
            HubEvent::StateChange { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

/// Registry a listener belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    StateChange,
    Error,
    Client(String),
}

impl ListenerKind {
    /// Maps an event type string onto a registry.
    ///
    /// Only `portlet.onStateChange` and `portlet.onError` are valid inside the reserved namespace.
    pub fn classify(event_type: &str) -> Result<Self, HubError> {
        match event_type {
            ON_STATE_CHANGE => Ok(ListenerKind::StateChange),
            ON_ERROR => Ok(ListenerKind::Error),
            t if t.starts_with(RESERVED_PREFIX) => Err(HubError::InvalidEventType(t.to_string())),
            t => Ok(ListenerKind::Client(t.to_string())),
        }
    }
}

/// Opaque listener registration token.
///
/// Uniqueness comes from the sequence number, which is drawn from a counter shared by all
/// three registries. The kind only selects the registry and makes the handle readable. A handle
/// is only valid for the [`HubRegistry`](crate::hub::HubRegistry) that issued it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    registry: Uuid,
    kind: ListenerKind,
    seq: u64,
}

impl ListenerHandle {
    pub(crate) fn new(registry: Uuid, kind: ListenerKind, seq: u64) -> Self {
        Self { registry, kind, seq }
    }

    /// Id of the issuing registry.
    pub fn registry_id(&self) -> Uuid {
        self.registry
    }

    pub fn kind(&self) -> &ListenerKind {
        &self.kind
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ListenerKind::StateChange => write!(f, "system:stateChange:{}", self.seq),
            ListenerKind::Error => write!(f, "system:error:{}", self.seq),
            ListenerKind::Client(t) => write!(f, "client:{}:{}", t, self.seq),
        }
    }
}

/// Things that happened inside a registry, for hosts that want to observe the hub.
#[derive(Clone, Debug, PartialEq)]
pub enum HubNotice {
    PortletRegistered { portlet: PortletId },
    ListenerAdded { portlet: PortletId, handle: ListenerHandle },
    ListenerRemoved { handle: ListenerHandle },
    /// A state change was dispatched to `listeners` callbacks
    StateChanged { portlet: PortletId, listeners: usize },
    ActionStarted { portlet: PortletId },
    ActionFinished { portlet: PortletId, updated: Vec<PortletId>, ok: bool },
}
