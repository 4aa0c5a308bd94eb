/// Boxed source error carried by collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    #[error("Unknown listener handle: {0}")]
    UnknownHandle(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Invalid portlet ID: {0}")]
    InvalidPortletId(String),

    #[error("Portlet limit exceeded")]
    PortletLimitExceeded,

    #[error("Action failed: {0}")]
    ActionFailed(#[source] BoxError),

    #[error("Resource URL creation failed: {0}")]
    ResourceUrl(#[source] BoxError),
}

impl HubError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        HubError::InvalidArgument(msg.into())
    }

    pub(crate) fn action_failed(err: anyhow::Error) -> Self {
        HubError::ActionFailed(err.into())
    }

    pub(crate) fn resource_url(err: anyhow::Error) -> Self {
        HubError::ResourceUrl(err.into())
    }
}
