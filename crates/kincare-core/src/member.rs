//! Users, family members, and the persona summary handed to the advisor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::TagProfile;

/// Relation marker of the member that represents the user themself.
pub const SELF_RELATION: &str = "本人";

// ─── User ────────────────────────────────────────────────────────────────────

/// An account holder. Created on first sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub user_id:     Uuid,
  /// Identity key issued by the external identity provider; unique.
  pub external_id: String,
  pub nickname:    Option<String>,
  pub avatar_url:  Option<String>,
  pub full_name:   Option<String>,
  pub gender:      Option<String>,
  pub age:         Option<u32>,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::CareStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub external_id: String,
  pub nickname:    Option<String>,
}

/// Partial update of the editable user fields; `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
  pub full_name: Option<String>,
  pub gender:    Option<String>,
  pub age:       Option<u32>,
}

impl User {
  pub fn apply(&mut self, patch: UserPatch) {
    if let Some(v) = patch.full_name {
      self.full_name = Some(v);
    }
    if let Some(v) = patch.gender {
      self.gender = Some(v);
    }
    if let Some(v) = patch.age {
      self.age = Some(v);
    }
  }
}

// ─── FamilyMember ────────────────────────────────────────────────────────────

/// A person whose health is tracked on behalf of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyMember {
  pub member_id:      Uuid,
  pub user_id:        Uuid,
  pub name:           String,
  /// Relation to the owning user, e.g. "本人", "母亲".
  pub relation:       String,
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  /// Height in centimetres.
  pub height:         Option<f64>,
  /// Weight in kilograms.
  pub weight:         Option<f64>,
  pub allergies:      Option<String>,
  /// Current medications.
  pub meds:           Option<String>,
  /// Special physiological status (pregnancy, lactation, …) as free text.
  pub special_status: Option<String>,
  pub tags:           TagProfile,
  pub created_at:     DateTime<Utc>,
}

impl FamilyMember {
  /// Whether this member is the user themself; such members cannot be deleted.
  pub fn is_self(&self) -> bool { self.relation == SELF_RELATION }
}

/// Input to [`crate::store::CareStore::add_member`].
#[derive(Debug, Clone)]
pub struct NewMember {
  pub user_id:        Uuid,
  pub name:           String,
  pub relation:       String,
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  pub height:         Option<f64>,
  pub weight:         Option<f64>,
  pub allergies:      Option<String>,
  pub meds:           Option<String>,
  pub special_status: Option<String>,
  pub tags:           TagProfile,
}

impl NewMember {
  /// Convenience constructor with all optional fields empty.
  pub fn new(
    user_id: Uuid,
    name: impl Into<String>,
    relation: impl Into<String>,
  ) -> Self {
    Self {
      user_id,
      name: name.into(),
      relation: relation.into(),
      gender: None,
      age: None,
      height: None,
      weight: None,
      allergies: None,
      meds: None,
      special_status: None,
      tags: TagProfile::new(),
    }
  }
}

/// Partial update of a member. `tags`, when present, replaces the whole
/// profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
  pub name:           Option<String>,
  pub relation:       Option<String>,
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  pub height:         Option<f64>,
  pub weight:         Option<f64>,
  pub allergies:      Option<String>,
  pub meds:           Option<String>,
  pub special_status: Option<String>,
  pub tags:           Option<TagProfile>,
}

impl FamilyMember {
  pub fn apply(&mut self, patch: MemberPatch) {
    let MemberPatch {
      name,
      relation,
      gender,
      age,
      height,
      weight,
      allergies,
      meds,
      special_status,
      tags,
    } = patch;

    if let Some(v) = name {
      self.name = v;
    }
    if let Some(v) = relation {
      self.relation = v;
    }
    if let Some(v) = tags {
      self.tags = v;
    }
    self.gender = gender.or(self.gender.take());
    self.age = age.or(self.age);
    self.height = height.or(self.height);
    self.weight = weight.or(self.weight);
    self.allergies = allergies.or(self.allergies.take());
    self.meds = meds.or(self.meds.take());
    self.special_status = special_status.or(self.special_status.take());
  }
}

// ─── Persona ─────────────────────────────────────────────────────────────────

/// The demographic and safety-critical summary of a member that accompanies
/// every advisory request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
  pub gender:         Option<String>,
  pub age:            Option<u32>,
  pub height:         Option<f64>,
  pub weight:         Option<f64>,
  pub tags:           TagProfile,
  pub allergies:      Option<String>,
  pub meds:           Option<String>,
  pub special_status: Option<String>,
}

impl From<&FamilyMember> for Persona {
  fn from(m: &FamilyMember) -> Self {
    Self {
      gender:         m.gender.clone(),
      age:            m.age,
      height:         m.height,
      weight:         m.weight,
      tags:           m.tags.clone(),
      allergies:      m.allergies.clone(),
      meds:           m.meds.clone(),
      special_status: m.special_status.clone(),
    }
  }
}
