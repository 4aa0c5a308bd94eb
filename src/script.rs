//! Entry points for values coming from portlet scripts.
//!
//! Script code passes loosely typed positional arguments. Each call shape is resolved into a
//! typed call first ([`ActionCall`], [`ResourceUrlCall`], [`ListenerCall`]); any mismatch is an
//! [`HubError::InvalidArgument`] raised before the hub is touched.

use std::collections::BTreeMap;
use std::fmt::Debug;
use crate::errors::HubError;
use crate::hub::{
    ActionFuture, CacheLevel, ElementHandle, Listener, ListenerHandle, ParameterSet, PortletHub, ResourceUrlFuture,
};

/// A value as seen by portlet script code.
#[derive(Clone, Default)]
pub enum ScriptValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(BTreeMap<String, ScriptValue>),
    Element(ElementHandle),
    Function(Listener),
    Handle(ListenerHandle),
}

impl Debug for ScriptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "undefined"),
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{b}"),
            ScriptValue::Number(n) => write!(f, "{n}"),
            ScriptValue::String(s) => write!(f, "{s:?}"),
            ScriptValue::Array(items) => f.debug_list().entries(items).finish(),
            ScriptValue::Object(map) => f.debug_map().entries(map).finish(),
            ScriptValue::Element(el) => write!(f, "{el}"),
            ScriptValue::Function(_) => write!(f, "function"),
            ScriptValue::Handle(h) => write!(f, "handle({h})"),
        }
    }
}

impl ScriptValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null => "null",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Array(_) => "array",
            ScriptValue::Object(_) => "object",
            ScriptValue::Element(_) => "element",
            ScriptValue::Function(_) => "function",
            ScriptValue::Handle(_) => "handle",
        }
    }

    /// Null and undefined.
    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    pub fn is_element(&self) -> bool {
        matches!(self, ScriptValue::Element(_))
    }

    pub fn function<F>(callback: F) -> Self
    where
        F: Fn(&crate::hub::HubEvent) + Send + Sync + 'static,
    {
        ScriptValue::Function(std::sync::Arc::new(callback))
    }

    /// JSON form of a plain data value. Elements, functions and handles have none.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value;
        Some(match self {
            ScriptValue::Undefined | ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(*b),
            ScriptValue::Number(n) => number_to_json(*n),
            ScriptValue::String(s) => Value::String(s.clone()),
            ScriptValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect::<Option<_>>()?),
            ScriptValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<_>>()?,
            ),
            ScriptValue::Element(_) | ScriptValue::Function(_) | ScriptValue::Handle(_) => return None,
        })
    }
}

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Integral values come back as JSON integers, so `3` stays `3` and not `3.0`.
fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(b),
            Value::Number(n) => ScriptValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ScriptValue::String(s),
            Value::Array(items) => ScriptValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => ScriptValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<ElementHandle> for ScriptValue {
    fn from(el: ElementHandle) -> Self {
        ScriptValue::Element(el)
    }
}

impl From<ListenerHandle> for ScriptValue {
    fn from(handle: ListenerHandle) -> Self {
        ScriptValue::Handle(handle)
    }
}

/// Converts a parameters object. Every value must be an array of strings or nulls.
fn parameter_set(value: &ScriptValue) -> Result<ParameterSet, HubError> {
    let ScriptValue::Object(map) = value else {
        return Err(HubError::invalid_argument(format!(
            "params should be an object, got {}",
            value.type_name()
        )));
    };

    let mut params = ParameterSet::new();
    for (name, values) in map {
        let ScriptValue::Array(items) = values else {
            return Err(HubError::invalid_argument(format!("parameter values should be an array: {name}")));
        };
        let values = items
            .iter()
            .map(|item| match item {
                ScriptValue::String(s) => Ok(Some(s.clone())),
                v if v.is_nullish() => Ok(None),
                v => Err(HubError::invalid_argument(format!(
                    "parameter {name} holds a {}, expected string or null",
                    v.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        params.insert(name.clone(), values);
    }
    Ok(params)
}

/// The two accepted shapes of `action`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCall {
    ParamsFirst { params: ParameterSet, element: ElementHandle },
    ElementFirst { element: ElementHandle, params: ParameterSet },
}

impl ActionCall {
    pub fn resolve(args: &[ScriptValue]) -> Result<Self, HubError> {
        let [first, second] = args else {
            return Err(HubError::invalid_argument(format!(
                "action takes exactly 2 arguments, got {}",
                args.len()
            )));
        };

        match (first, second) {
            (ScriptValue::Element(_), ScriptValue::Element(_)) => {
                Err(HubError::invalid_argument("params and element should not both be elements"))
            }
            (ScriptValue::Element(element), params) => Ok(ActionCall::ElementFirst {
                element: element.clone(),
                params: Self::params(params)?,
            }),
            (params, ScriptValue::Element(element)) => Ok(ActionCall::ParamsFirst {
                params: Self::params(params)?,
                element: element.clone(),
            }),
            _ => Err(HubError::invalid_argument("element should be an HTML element")),
        }
    }

    fn params(value: &ScriptValue) -> Result<ParameterSet, HubError> {
        if value.is_nullish() {
            return Err(HubError::invalid_argument("params should not be null"));
        }
        parameter_set(value)
    }

    pub fn into_parts(self) -> (ParameterSet, ElementHandle) {
        match self {
            ActionCall::ParamsFirst { params, element } | ActionCall::ElementFirst { element, params } => {
                (params, element)
            }
        }
    }
}

/// Arguments of `createResourceUrl`, all optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceUrlCall {
    pub params: Option<ParameterSet>,
    pub cache_level: Option<CacheLevel>,
    pub resource_id: Option<String>,
}

impl ResourceUrlCall {
    pub fn resolve(args: &[ScriptValue]) -> Result<Self, HubError> {
        if args.len() > 3 {
            return Err(HubError::invalid_argument(format!(
                "createResourceUrl takes at most 3 arguments, got {}",
                args.len()
            )));
        }
        let arg = |i: usize| args.get(i).filter(|v| !v.is_nullish());

        if let Some(ScriptValue::String(s)) = args.first() {
            return Err(HubError::invalid_argument(format!(
                "Invalid argument type. Resource parameters must be a parameters object, got string {s:?}"
            )));
        }
        let params = arg(0).map(parameter_set).transpose()?;

        let cache_level = match arg(1) {
            None => None,
            Some(ScriptValue::String(s)) => Some(s.parse::<CacheLevel>()?),
            Some(v) => {
                return Err(HubError::invalid_argument(format!(
                    "Invalid argument type. Cacheability argument must be a string, got {}",
                    v.type_name()
                )))
            }
        };

        let resource_id = match arg(2) {
            None => None,
            Some(ScriptValue::String(s)) => Some(s.clone()),
            Some(v) => {
                return Err(HubError::invalid_argument(format!(
                    "Invalid argument type. Resource ID argument must be a string, got {}",
                    v.type_name()
                )))
            }
        };

        Ok(Self {
            params,
            cache_level,
            resource_id,
        })
    }
}

/// `addEventListener(type, callback)` or `removeEventListener(handle)`.
pub enum ListenerCall {
    Add { event_type: String, listener: Listener },
    Remove(ListenerHandle),
}

impl Debug for ListenerCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerCall::Add { event_type, .. } => f.debug_struct("Add").field("event_type", event_type).finish_non_exhaustive(),
            ListenerCall::Remove(handle) => f.debug_tuple("Remove").field(handle).finish(),
        }
    }
}

impl ListenerCall {
    pub fn resolve(args: &[ScriptValue]) -> Result<Self, HubError> {
        match args {
            [ScriptValue::String(event_type), ScriptValue::Function(listener)] => Ok(ListenerCall::Add {
                event_type: event_type.clone(),
                listener: listener.clone(),
            }),
            [event_type, callback] => Err(HubError::invalid_argument(format!(
                "expected (string, function), got ({}, {})",
                event_type.type_name(),
                callback.type_name()
            ))),
            [ScriptValue::Handle(handle)] => Ok(ListenerCall::Remove(handle.clone())),
            [other] => Err(HubError::invalid_argument(format!(
                "listener handle expected, got {}",
                other.type_name()
            ))),
            _ => Err(HubError::invalid_argument(format!(
                "listener calls take 1 or 2 arguments, got {}",
                args.len()
            ))),
        }
    }
}

/// A [`PortletHub`] driven with script values.
#[derive(Debug, Clone, Copy)]
pub struct ScriptBinding<'a> {
    hub: &'a PortletHub,
}

impl<'a> ScriptBinding<'a> {
    pub fn new(hub: &'a PortletHub) -> Self {
        Self { hub }
    }

    pub fn add_event_listener(&self, args: &[ScriptValue]) -> Result<ListenerHandle, HubError> {
        match ListenerCall::resolve(args)? {
            ListenerCall::Add { event_type, listener } => self.hub.add_listener(&event_type, listener),
            ListenerCall::Remove(_) => Err(HubError::invalid_argument("addEventListener takes exactly 2 arguments")),
        }
    }

    pub fn remove_event_listener(&self, args: &[ScriptValue]) -> Result<(), HubError> {
        match ListenerCall::resolve(args)? {
            ListenerCall::Remove(handle) => self.hub.remove_event_listener(&handle),
            ListenerCall::Add { .. } => Err(HubError::invalid_argument("removeEventListener takes exactly 1 argument")),
        }
    }

    pub fn action(&self, args: &[ScriptValue]) -> Result<ActionFuture, HubError> {
        let (params, element) = ActionCall::resolve(args)?.into_parts();
        self.hub.action(params, element)
    }

    pub fn create_resource_url(&self, args: &[ScriptValue]) -> Result<ResourceUrlFuture, HubError> {
        let call = ResourceUrlCall::resolve(args)?;
        Ok(self.hub.create_resource_url(call.params, call.cache_level, call.resource_id))
    }

    /// `(type)` or `(type, payload)`; the payload must be plain data.
    pub fn dispatch_client_event(&self, args: &[ScriptValue]) -> Result<usize, HubError> {
        let (event_type, payload) = match args {
            [ScriptValue::String(t)] => (t, serde_json::Value::Null),
            [ScriptValue::String(t), payload] => {
                let payload = payload.to_json().ok_or_else(|| {
                    HubError::invalid_argument(format!("a {} cannot be an event payload", payload.type_name()))
                })?;
                (t, payload)
            }
            _ => return Err(HubError::invalid_argument("expected (string[, payload])")),
        };
        self.hub.dispatch_client_event(event_type, payload)
    }
}
