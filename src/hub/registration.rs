use std::fmt::Debug;
use std::sync::Arc;
use log::warn;
use crate::backend::PortletBackend;
use crate::errors::HubError;
use crate::hub::portlet::{PortletHub, PortletId};
use crate::hub::registry::HubRegistry;

/// Entry point for portlets: validates an id and hands out the hub bound to it.
#[derive(Clone)]
pub struct RegistrationService {
    registry: HubRegistry,
    backend: Arc<dyn PortletBackend>,
}

impl Debug for RegistrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationService")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl RegistrationService {
    pub fn new(registry: HubRegistry, backend: Arc<dyn PortletBackend>) -> Self {
        Self { registry, backend }
    }

    pub fn registry(&self) -> &HubRegistry {
        &self.registry
    }

    /// Registers a portlet and returns its hub.
    ///
    /// Registering an id again returns the hub that is already bound to it, so a portlet never
    /// ends up with duplicate state.
    pub async fn register(&self, id: impl Into<PortletId>) -> Result<Arc<PortletHub>, HubError> {
        let id = id.into();
        if !self.backend.is_valid_pid(&id) {
            warn!("Portlet[{}]: rejected by {}", id, self.backend.name());
            return Err(HubError::InvalidPortletId(id.to_string()));
        }

        let backend = self.backend.clone();
        self.registry
            .hub_for(&id, |registry| PortletHub::new(id.clone(), backend, registry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;
    use crate::config::HubConfig;
    use crate::hub::event::{HubNotice, ON_STATE_CHANGE};

    fn service(registry: &HubRegistry) -> RegistrationService {
        RegistrationService::new(registry.clone(), Arc::new(NullBackend::new()))
    }

    #[tokio::test]
    async fn register_returns_hub_bound_to_id() {
        let registry = HubRegistry::default();
        let hub = service(&registry).register("portletA").await.unwrap();
        assert_eq!(hub.id().as_str(), "portletA");
        assert!(registry.is_registered(&PortletId::from("portletA")));
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = HubRegistry::default();
        let mut notices = registry.subscribe();
        let svc = service(&registry);

        let first = svc.register("A").await.unwrap();
        let again = svc.register("A").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.registered_portlets(), vec![PortletId::from("A")]);

        assert_eq!(notices.try_recv().unwrap(), HubNotice::PortletRegistered { portlet: "A".into() });
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn state_survives_a_dropped_hub() {
        let registry = HubRegistry::default();
        let svc = service(&registry);

        let hub = svc.register("A").await.unwrap();
        hub.add_event_listener(ON_STATE_CHANGE, |_| {}).unwrap();
        drop(hub);

        let hub = svc.register("A").await.unwrap();
        assert!(registry.has_state_change_listener(hub.id()));
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let registry = HubRegistry::default();
        let svc = service(&registry);
        for bad in ["", "  ", "has space"] {
            let err = svc.register(bad).await.unwrap_err();
            assert!(matches!(err, HubError::InvalidPortletId(_)), "{bad:?} accepted");
        }
        assert!(registry.registered_portlets().is_empty());
    }

    #[tokio::test]
    async fn portlet_limit_is_enforced() {
        let registry = HubRegistry::new(HubConfig::builder().max_portlets(1).build().unwrap());
        let svc = service(&registry);
        let _a = svc.register("A").await.unwrap();
        let err = svc.register("B").await.unwrap_err();
        assert!(matches!(err, HubError::PortletLimitExceeded));
        // an already registered id is still served
        assert!(svc.register("A").await.is_ok());
    }
}
