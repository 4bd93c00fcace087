//! Tag profiles — the per-member map of tracked health conditions.
//!
//! A tag present in the profile is an active condition with a severity tier
//! (`level`) and a within-tier risk counter (`score`). A tag that is absent is
//! resolved or was never present.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tier assigned to a condition when it is first recorded ("diagnosed").
pub const INITIAL_LEVEL: u32 = 2;

/// Score at which every tier starts, including tiers entered by demotion.
pub const FULL_SCORE: i32 = 100;

// ─── TagState ────────────────────────────────────────────────────────────────

/// Severity and risk counter for a single condition tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagState {
  /// Severity tier; never below 1.
  pub level: u32,
  pub score: i32,
}

impl TagState {
  pub fn new(level: u32, score: i32) -> Self {
    Self { level: level.max(1), score }
  }

  /// A newly recorded condition: tier [`INITIAL_LEVEL`] at [`FULL_SCORE`].
  pub fn diagnosed() -> Self { Self::new(INITIAL_LEVEL, FULL_SCORE) }
}

// ─── TagProfile ──────────────────────────────────────────────────────────────

/// Mapping of condition tag → [`TagState`], owned by one family member.
///
/// Serialises as a JSON object keyed by tag name. Deserialisation also accepts
/// a bare list of names (`["高血压", "肥胖"]`), which is upgraded to
/// [`TagState::diagnosed`] for each name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TagProfileRepr")]
pub struct TagProfile(BTreeMap<String, TagState>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TagProfileRepr {
  States(BTreeMap<String, TagState>),
  Names(Vec<String>),
}

impl From<TagProfileRepr> for TagProfile {
  fn from(repr: TagProfileRepr) -> Self {
    match repr {
      TagProfileRepr::States(states) => states
        .into_iter()
        .map(|(tag, s)| (tag, TagState::new(s.level, s.score)))
        .collect(),
      TagProfileRepr::Names(names) => Self::from_names(names),
    }
  }
}

impl FromIterator<(String, TagState)> for TagProfile {
  fn from_iter<I: IntoIterator<Item = (String, TagState)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl TagProfile {
  pub fn new() -> Self { Self::default() }

  /// Build a profile where every name starts as a diagnosed condition.
  pub fn from_names<I, T>(names: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<String>,
  {
    names
      .into_iter()
      .map(|name| (name.into(), TagState::diagnosed()))
      .collect()
  }

  pub fn get(&self, tag: &str) -> Option<&TagState> { self.0.get(tag) }

  pub fn get_mut(&mut self, tag: &str) -> Option<&mut TagState> {
    self.0.get_mut(tag)
  }

  pub fn contains(&self, tag: &str) -> bool { self.0.contains_key(tag) }

  /// Insert or replace a tag's state. The level is clamped to at least 1.
  pub fn insert(&mut self, tag: impl Into<String>, state: TagState) {
    self.0.insert(tag.into(), TagState::new(state.level, state.score));
  }

  pub fn remove(&mut self, tag: &str) -> Option<TagState> { self.0.remove(tag) }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &TagState)> {
    self.0.iter().map(|(tag, state)| (tag.as_str(), state))
  }

  pub fn states_mut(&mut self) -> impl Iterator<Item = &mut TagState> {
    self.0.values_mut()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}
