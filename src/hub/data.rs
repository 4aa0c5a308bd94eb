//! Value objects shared between the hub and its portlets.
//!
//! - [`ParameterSet`]: string keys mapped to ordered, nullable string values
//! - [`RenderState`]: portlet mode, window state and render parameters
//! - [`RenderData`]: optional pre-rendered fragment for the current state
//! - [`ErrorData`]: payload of `portlet.onError` events
//!
//! All of them are plain owned values: cloning never aliases the source.

use std::collections::btree_map;
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

/// Well known portlet modes and window states.
pub mod constants {
    pub const VIEW: &str = "view";
    pub const EDIT: &str = "edit";
    pub const HELP: &str = "help";
    pub const NORMAL: &str = "normal";
    pub const MINIMIZED: &str = "minimized";
    pub const MAXIMIZED: &str = "maximized";
}

/// Multi-valued parameters. Every key maps to an array; a value inside the array may be null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, Vec<Option<String>>>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values for `name`, or `None` when the key is unknown.
    pub fn get(&self, name: &str) -> Option<&[Option<String>]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Option<String>>> {
        self.0.get_mut(name)
    }

    /// Sets all values of `name`, returning the previous values.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Option<String>>) -> Option<Vec<Option<String>>> {
        self.0.insert(name.into(), values)
    }

    /// Appends one value to `name`, creating the key when needed.
    pub fn append(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.entry(name.into()).or_default().push(value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Option<String>>> {
        self.0.remove(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<Option<String>>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ParameterSet
where
    K: Into<String>,
    V: IntoIterator,
    V::Item: Into<Option<String>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into_iter().map(Into::into).collect()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = (&'a String, &'a Vec<Option<String>>);
    type IntoIter = btree_map::Iter<'a, String, Vec<Option<String>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Current mode, window state and parameters of a portlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default = "default_mode")]
    pub portlet_mode: String,
    #[serde(default = "default_window_state")]
    pub window_state: String,
}

fn default_mode() -> String {
    constants::VIEW.to_string()
}

fn default_window_state() -> String {
    constants::NORMAL.to_string()
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            parameters: ParameterSet::new(),
            portlet_mode: default_mode(),
            window_state: default_window_state(),
        }
    }
}

impl RenderState {
    pub fn new(parameters: &ParameterSet, portlet_mode: &str, window_state: &str) -> Self {
        Self {
            parameters: parameters.clone(),
            portlet_mode: portlet_mode.to_string(),
            window_state: window_state.to_string(),
        }
    }

    /// Default mode and window state with a copy of `parameters`.
    pub fn with_parameters(parameters: &ParameterSet) -> Self {
        Self {
            parameters: parameters.clone(),
            ..Self::default()
        }
    }

    pub fn portlet_mode(&self) -> &str {
        &self.portlet_mode
    }

    pub fn set_portlet_mode(&mut self, mode: impl Into<String>) {
        self.portlet_mode = mode.into();
    }

    pub fn window_state(&self) -> &str {
        &self.window_state
    }

    pub fn set_window_state(&mut self, state: impl Into<String>) {
        self.window_state = state.into();
    }

    /// Stores a single value as a one-element array.
    pub fn set_value(&mut self, name: impl Into<String>, value: Option<String>) {
        self.parameters.insert(name, vec![value]);
    }

    pub fn set_values(&mut self, name: impl Into<String>, values: Vec<Option<String>>) {
        self.parameters.insert(name, values);
    }

    /// First value of `name`. Unknown keys and null values both read as `None`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|v| v.first())
            .and_then(|v| v.as_deref())
    }

    pub fn values(&self, name: &str) -> Option<&[Option<String>]> {
        self.parameters.get(name)
    }

    pub fn remove(&mut self, name: &str) {
        self.parameters.remove(name);
    }
}

/// Pre-rendered markup for a portlet's current state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderData {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mime_type: String,
}

impl RenderData {
    pub fn new(content: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Empty render data is never handed to listeners.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub name: String,
    pub message: String,
}

impl ErrorData {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn stores_values_and_unknown_keys_read_as_none() {
        let mut params = ParameterSet::new();
        params.insert("x", vec![s("y")]);

        assert_eq!(params.get("x"), Some(&[s("y")][..]));
        assert!(params.get("y").is_none());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn clone_does_not_share_arrays_with_source() {
        let mut src = ParameterSet::new();
        src.insert("x", vec![s("y"), s("z")]);
        src.insert("y", vec![s("z")]);
        let mut copy = src.clone();

        src.get_mut("x").unwrap().push(s("a"));
        src.insert("y", vec![s("a")]);
        src.insert("z", vec![s("a")]);

        assert_eq!(copy.get("x"), Some(&[s("y"), s("z")][..]));
        assert_eq!(copy.get("y"), Some(&[s("z")][..]));
        assert!(copy.get("z").is_none());

        // and the other way around
        copy.get_mut("x").unwrap().clear();
        assert_eq!(src.get("x").unwrap().len(), 3);
    }

    #[test]
    fn append_keeps_value_order() {
        let mut params = ParameterSet::new();
        params.append("a", s("1"));
        params.append("a", None);
        params.append("a", s("3"));
        assert_eq!(params.get("a"), Some(&[s("1"), None, s("3")][..]));
    }

    #[test]
    fn collects_from_pairs_with_null_values() {
        let params: ParameterSet = [("a", vec![Some("1".to_string()), None])].into_iter().collect();
        assert_eq!(params.get("a"), Some(&[s("1"), None][..]));
    }

    #[test]
    fn render_state_defaults() {
        let state = RenderState::default();
        assert_eq!(state.portlet_mode(), constants::VIEW);
        assert_eq!(state.window_state(), constants::NORMAL);
        assert!(state.parameters.is_empty());
    }

    #[test]
    fn render_state_owns_its_parameters() {
        let mut params = ParameterSet::new();
        params.insert("p", vec![s("1")]);
        let state = RenderState::with_parameters(&params);

        params.get_mut("p").unwrap().push(s("2"));
        assert_eq!(state.values("p"), Some(&[s("1")][..]));
    }

    #[test]
    fn render_state_value_accessors() {
        let mut state = RenderState::default();
        state.set_value("single", s("one"));
        state.set_values("multi", vec![s("a"), None, s("c")]);
        state.set_value("nothing", None);

        assert_eq!(state.value("single"), Some("one"));
        assert_eq!(state.values("single"), Some(&[s("one")][..]));
        assert_eq!(state.value("multi"), Some("a"));
        assert_eq!(state.values("multi").unwrap().len(), 3);
        assert_eq!(state.value("nothing"), None);
        assert!(state.values("nothing").is_some());
        assert_eq!(state.value("missing"), None);

        state.remove("multi");
        assert!(state.values("multi").is_none());

        state.set_portlet_mode(constants::EDIT);
        state.set_window_state(constants::MAXIMIZED);
        assert_eq!(state.portlet_mode(), "edit");
        assert_eq!(state.window_state(), "maximized");
    }

    #[test]
    fn render_state_json_shape() {
        let json = r#"{"parameters":{"p":["1",null]},"portletMode":"help"}"#;
        let state: RenderState = serde_json::from_str(json).unwrap();
        assert_eq!(state.portlet_mode(), constants::HELP);
        assert_eq!(state.window_state(), constants::NORMAL);
        assert_eq!(state.values("p"), Some(&[s("1"), None][..]));

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["windowState"], "normal");
    }

    #[test]
    fn render_data_emptiness() {
        assert!(RenderData::default().is_empty());
        assert!(!RenderData::new("<p>hi</p>", "text/html").is_empty());
        assert_eq!(ErrorData::default(), ErrorData::new("", ""));
    }
}
