//! Shared hub state: the portlet table, the three listener registries, the per-portlet render
//! state/data slots and the page-wide action busy flag.
//!
//! A [`HubRegistry`] is created once per page context and handed to every [`PortletHub`]. All
//! hubs read and write the same registry, so listener handles never collide across portlets and
//! at most one action is in flight for the whole page.
//!
//! Listener callbacks always run without any registry lock held. A callback may therefore call
//! back into the hub: add or remove listeners, change other portlets' state, and so on.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use log::{debug, trace, warn};
use tokio::sync::broadcast;
use uuid::Uuid;
use crate::config::HubConfig;
use crate::errors::HubError;
use crate::hub::data::{ErrorData, RenderData, RenderState};
use crate::hub::event::{HubEvent, HubNotice, Listener, ListenerHandle, ListenerKind, RESERVED_PREFIX};
use crate::hub::portlet::{PortletHub, PortletId};

/// A handle for receiving registry notices.
pub type NoticeSubscription = broadcast::Receiver<HubNotice>;

struct ListenerRecord {
    owner: PortletId,
    kind: ListenerKind,
    listener: Listener,
}

/// Listener registries, keyed by sequence number so iteration follows registration order.
#[derive(Default)]
struct Listeners {
    state_change: BTreeMap<u64, ListenerRecord>,
    error: BTreeMap<u64, ListenerRecord>,
    client: BTreeMap<u64, ListenerRecord>,
}

impl Listeners {
    fn map(&self, kind: &ListenerKind) -> &BTreeMap<u64, ListenerRecord> {
        match kind {
            ListenerKind::StateChange => &self.state_change,
            ListenerKind::Error => &self.error,
            ListenerKind::Client(_) => &self.client,
        }
    }

    fn map_mut(&mut self, kind: &ListenerKind) -> &mut BTreeMap<u64, ListenerRecord> {
        match kind {
            ListenerKind::StateChange => &mut self.state_change,
            ListenerKind::Error => &mut self.error,
            ListenerKind::Client(_) => &mut self.client,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    listeners: Listeners,
    render_states: HashMap<PortletId, RenderState>,
    render_data: HashMap<PortletId, RenderData>,
    /// Registered portlets. Hubs are held weakly, the portlet stays registered after its hub is dropped.
    portlets: HashMap<PortletId, Weak<PortletHub>>,
    /// State change listeners sitting in a drain queue that has not reached them yet.
    pending: HashSet<u64>,
}

impl RegistryState {
    fn state_event(&self, portlet: &PortletId) -> Option<HubEvent> {
        let state = self.render_states.get(portlet)?;
        let data = self.render_data.get(portlet).filter(|d| !d.is_empty()).cloned();
        Some(HubEvent::StateChange { state: state.clone(), data })
    }
}

struct RegistryInner {
    id: Uuid,
    config: HubConfig,
    next_seq: AtomicU64,
    busy: AtomicBool,
    dispatch_depth: AtomicUsize,
    state: Mutex<RegistryState>,
    notices: broadcast::Sender<HubNotice>,
}

#[derive(Clone)]
pub struct HubRegistry {
    inner: Arc<RegistryInner>,
}

impl Debug for HubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubRegistry")
            .field("config", &self.inner.config)
            .field("busy", &self.is_in_progress())
            .finish_non_exhaustive()
    }
}

impl Default for HubRegistry {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Non-owning reference to a [`HubRegistry`], for collaborators that must not keep it alive.
#[derive(Clone, Default)]
pub struct WeakHubRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakHubRegistry {
    pub fn upgrade(&self) -> Option<HubRegistry> {
        self.inner.upgrade().map(|inner| HubRegistry { inner })
    }
}

impl Debug for WeakHubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakHubRegistry")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl HubRegistry {
    pub fn new(config: HubConfig) -> Self {
        let (notices, _rx) = broadcast::channel(config.notice_capacity);
        Self {
            inner: Arc::new(RegistryInner {
                id: Uuid::new_v4(),
                config,
                next_seq: AtomicU64::new(1),
                busy: AtomicBool::new(false),
                dispatch_depth: AtomicUsize::new(0),
                state: Mutex::new(RegistryState::default()),
                notices,
            }),
        }
    }

    /// Identity of this registry. Listener handles carry it.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakHubRegistry {
        WeakHubRegistry { inner: Arc::downgrade(&self.inner) }
    }

    pub fn subscribe(&self) -> NoticeSubscription {
        self.inner.notices.subscribe()
    }

    pub(crate) fn publish(&self, notice: HubNotice) {
        // send() only fails when nobody is subscribed, which is fine.
        let _ = self.inner.notices.send(notice);
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------- Portlet table ----------

    /// Returns the live hub for `id`, or records a new one built by `make`.
    pub(crate) fn hub_for(
        &self,
        id: &PortletId,
        make: impl FnOnce(HubRegistry) -> PortletHub,
    ) -> Result<Arc<PortletHub>, HubError> {
        let mut st = self.lock();
        if let Some(hub) = st.portlets.get(id).and_then(Weak::upgrade) {
            trace!("Portlet[{}]: returning existing hub", id);
            return Ok(hub);
        }

        let first_time = !st.portlets.contains_key(id);
        if first_time && st.portlets.len() >= self.inner.config.max_portlets {
            warn!("Portlet[{}]: registration refused, limit of {} reached", id, self.inner.config.max_portlets);
            return Err(HubError::PortletLimitExceeded);
        }

        let hub = Arc::new(make(self.clone()));
        st.portlets.insert(id.clone(), Arc::downgrade(&hub));
        drop(st);

        if first_time {
            debug!("Portlet[{}]: registered", id);
            self.publish(HubNotice::PortletRegistered { portlet: id.clone() });
        }
        Ok(hub)
    }

    pub fn is_registered(&self, id: &PortletId) -> bool {
        self.lock().portlets.contains_key(id)
    }

    pub fn registered_portlets(&self) -> Vec<PortletId> {
        let mut ids: Vec<PortletId> = self.lock().portlets.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ---------- Listeners ----------

    /// Registers `listener` for `event_type` on behalf of `owner`.
    ///
    /// A new `portlet.onStateChange` listener is called once, before this returns, with the
    /// owner's current render state (if the page holds one).
    pub fn add_listener(
        &self,
        owner: &PortletId,
        event_type: &str,
        listener: Listener,
    ) -> Result<ListenerHandle, HubError> {
        let kind = ListenerKind::classify(event_type)?;
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let handle = ListenerHandle::new(self.inner.id, kind.clone(), seq);

        let replay = {
            let mut st = self.lock();
            st.listeners.map_mut(&kind).insert(
                seq,
                ListenerRecord {
                    owner: owner.clone(),
                    kind: kind.clone(),
                    listener: listener.clone(),
                },
            );
            match kind {
                ListenerKind::StateChange => st.state_event(owner),
                _ => None,
            }
        };

        debug!("Portlet[{}]: added listener {}", owner, handle);
        self.publish(HubNotice::ListenerAdded { portlet: owner.clone(), handle: handle.clone() });

        if let Some(event) = replay {
            trace!("Portlet[{}]: replaying current state to {}", owner, handle);
            listener(&event);
        }
        Ok(handle)
    }

    pub fn remove_listener(&self, handle: &ListenerHandle) -> Result<(), HubError> {
        if handle.registry_id() != self.inner.id {
            return Err(HubError::UnknownHandle(handle.to_string()));
        }
        let removed = self.lock().listeners.map_mut(handle.kind()).remove(&handle.seq());
        match removed {
            Some(record) => {
                debug!("Portlet[{}]: removed listener {}", record.owner, handle);
                self.publish(HubNotice::ListenerRemoved { handle: handle.clone() });
                Ok(())
            }
            None => Err(HubError::UnknownHandle(handle.to_string())),
        }
    }

    pub fn has_state_change_listener(&self, owner: &PortletId) -> bool {
        self.lock().listeners.state_change.values().any(|r| &r.owner == owner)
    }

    pub fn listener_count(&self, owner: &PortletId) -> usize {
        let st = self.lock();
        [&st.listeners.state_change, &st.listeners.error, &st.listeners.client]
            .iter()
            .map(|m| m.values().filter(|r| &r.owner == owner).count())
            .sum()
    }

    fn queue_for(&self, kind: &ListenerKind, pred: impl Fn(&ListenerRecord) -> bool) -> VecDeque<(u64, Listener)> {
        self.lock()
            .listeners
            .map(kind)
            .iter()
            .filter(|(_, r)| pred(r))
            .map(|(seq, r)| (*seq, r.listener.clone()))
            .collect()
    }

    /// Calls every queued listener that is still registered, in order. `event_for` builds the
    /// event from the registry state at delivery time; `None` ends the drain.
    fn drain(
        &self,
        kind: &ListenerKind,
        mut queue: VecDeque<(u64, Listener)>,
        event_for: impl Fn(&RegistryState) -> Option<HubEvent>,
    ) -> usize {
        let mut delivered = 0;
        while let Some((seq, listener)) = queue.pop_front() {
            let event = {
                let mut st = self.lock();
                st.pending.remove(&seq);
                if !st.listeners.map(kind).contains_key(&seq) {
                    // removed by an earlier callback
                    continue;
                }
                match event_for(&st) {
                    Some(event) => event,
                    None => {
                        for (seq, _) in &queue {
                            st.pending.remove(seq);
                        }
                        break;
                    }
                }
            };
            listener(&event);
            delivered += 1;
        }
        delivered
    }

    fn enter_dispatch(&self, portlet: &PortletId) -> Option<DispatchDepth<'_>> {
        let depth = self.inner.dispatch_depth.fetch_add(1, Ordering::SeqCst);
        let guard = DispatchDepth { depth: &self.inner.dispatch_depth };
        if depth >= self.inner.config.max_dispatch_depth {
            warn!("Portlet[{}]: dispatch nested {} levels deep, notification dropped", portlet, depth);
            return None;
        }
        Some(guard)
    }

    /// Delivers the current render state of `portlet` to its state change listeners, in
    /// registration order. Listeners of other portlets are never called.
    ///
    /// Returns the number of callbacks invoked.
    pub fn notify_state_change(&self, portlet: &PortletId) -> usize {
        let Some(_depth) = self.enter_dispatch(portlet) else {
            return 0;
        };

        // Listeners still waiting in an outer drain for this portlet are not queued again; they
        // read the newest state when the outer drain reaches them.
        let queue: VecDeque<(u64, Listener)> = {
            let mut st = self.lock();
            let st = &mut *st;
            let queue: VecDeque<_> = st
                .listeners
                .state_change
                .iter()
                .filter(|(seq, r)| &r.owner == portlet && !st.pending.contains(*seq))
                .map(|(seq, r)| (*seq, r.listener.clone()))
                .collect();
            st.pending.extend(queue.iter().map(|(seq, _)| *seq));
            queue
        };
        trace!("Portlet[{}]: {} state change listener(s) queued", portlet, queue.len());
        let delivered = self.drain(&ListenerKind::StateChange, queue, |st| st.state_event(portlet));

        self.publish(HubNotice::StateChanged { portlet: portlet.clone(), listeners: delivered });
        delivered
    }

    /// Delivers `error` to the error listeners of `portlet`.
    pub fn notify_error(&self, portlet: &PortletId, error: ErrorData) -> usize {
        let queue = self.queue_for(&ListenerKind::Error, |r| &r.owner == portlet);
        debug!("Portlet[{}]: reporting {} to {} error listener(s)", portlet, error.name, queue.len());
        self.drain(&ListenerKind::Error, queue, |_| Some(HubEvent::Error(error.clone())))
    }

    /// Delivers a custom event to every client listener registered for exactly `event_type`,
    /// whichever portlet owns it.
    pub fn dispatch_client_event(&self, event_type: &str, payload: serde_json::Value) -> Result<usize, HubError> {
        if event_type.starts_with(RESERVED_PREFIX) {
            return Err(HubError::InvalidEventType(event_type.to_string()));
        }

        let kind = ListenerKind::Client(event_type.to_string());
        let queue = self.queue_for(&kind, |r| r.kind == kind);
        let event = HubEvent::Client { event_type: event_type.to_string(), payload };
        let delivered = self.drain(&kind, queue, |_| Some(event.clone()));
        debug!("Client event {} delivered to {} listener(s)", event_type, delivered);
        Ok(delivered)
    }

    // ---------- Render state / data ----------

    pub fn render_state(&self, portlet: &PortletId) -> Option<RenderState> {
        self.lock().render_states.get(portlet).cloned()
    }

    pub fn render_data(&self, portlet: &PortletId) -> Option<RenderData> {
        self.lock().render_data.get(portlet).cloned()
    }

    /// Snapshot of every portlet's render state.
    pub fn render_states(&self) -> BTreeMap<PortletId, RenderState> {
        self.lock()
            .render_states
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    /// Replaces the render state of `portlet` and notifies its listeners.
    pub fn set_render_state(&self, portlet: &PortletId, state: RenderState) -> usize {
        self.lock().render_states.insert(portlet.clone(), state);
        self.notify_state_change(portlet)
    }

    /// Replaces the render data of `portlet`. Listeners are only notified once a render state exists.
    pub fn set_render_data(&self, portlet: &PortletId, data: RenderData) -> usize {
        let has_state = {
            let mut st = self.lock();
            st.render_data.insert(portlet.clone(), data);
            st.render_states.contains_key(portlet)
        };
        if has_state {
            self.notify_state_change(portlet)
        } else {
            0
        }
    }

    /// Replaces state and data together, notifying once. `None` clears any previous data.
    pub fn update_portlet(&self, portlet: &PortletId, state: RenderState, data: Option<RenderData>) -> usize {
        {
            let mut st = self.lock();
            st.render_states.insert(portlet.clone(), state);
            match data {
                Some(data) => st.render_data.insert(portlet.clone(), data),
                None => st.render_data.remove(portlet),
            };
        }
        self.notify_state_change(portlet)
    }

    // ---------- Action busy flag ----------

    pub fn is_in_progress(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Claims the page-wide action slot for `portlet`. The slot is released when the guard drops.
    pub(crate) fn begin_action(&self, portlet: &PortletId) -> Result<ActionGuard, HubError> {
        if self.is_in_progress() {
            return Err(HubError::AccessDenied("an action is already in progress".into()));
        }
        if !self.has_state_change_listener(portlet) {
            return Err(HubError::NotInitialized(format!(
                "No onStateChange listener registered for portlet: {portlet}"
            )));
        }
        if self
            .inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HubError::AccessDenied("an action is already in progress".into()));
        }

        debug!("Portlet[{}]: action started", portlet);
        self.publish(HubNotice::ActionStarted { portlet: portlet.clone() });
        Ok(ActionGuard { registry: self.clone() })
    }
}

struct DispatchDepth<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for DispatchDepth<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds the action busy flag for as long as it lives.
pub(crate) struct ActionGuard {
    registry: HubRegistry,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.registry.inner.busy.store(false, Ordering::SeqCst);
    }
}
