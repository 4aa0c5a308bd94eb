use std::fmt::Display;
use uuid::Uuid;

/// Opaque reference to a DOM element living in the page (usually the form that triggered an action).
///
/// Identity is the generated id, so two handles to elements with the same tag are still distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: Uuid,
    tag_name: String,
}

impl ElementHandle {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag_name: tag_name.into().to_ascii_lowercase(),
        }
    }

    /// Handle for a `<form>` element.
    pub fn form() -> Self {
        Self::new("form")
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }
}

impl Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}#{}>", self.tag_name, self.id)
    }
}
