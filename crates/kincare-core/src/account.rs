//! Sign-in and ownership checks shared by every caller-facing operation.

use uuid::Uuid;

use crate::{
  Error, Result,
  member::{FamilyMember, MemberPatch, NewMember, NewUser, SELF_RELATION, User},
  store::CareStore,
};

/// Find or create the user for `external_id`, and make sure they have a
/// "self" family member.
///
/// Idempotent: repeated sign-ins reuse the user, and the self member is only
/// created when none exists.
pub async fn sign_in<S: CareStore>(
  store: &S,
  external_id: &str,
  nickname: Option<&str>,
) -> Result<User> {
  let user = match store
    .find_user_by_external_id(external_id)
    .await
    .map_err(Error::store)?
  {
    Some(user) => user,
    None => {
      let user = store
        .add_user(NewUser {
          external_id: external_id.to_owned(),
          nickname:    nickname.map(str::to_owned),
        })
        .await
        .map_err(Error::store)?;
      tracing::info!(user_id = %user.user_id, "registered new user");
      user
    }
  };

  let members = store.list_members(user.user_id).await.map_err(Error::store)?;
  if !members.iter().any(FamilyMember::is_self) {
    let name = user
      .nickname
      .clone()
      .or_else(|| user.full_name.clone())
      .unwrap_or_else(|| SELF_RELATION.to_owned());
    store
      .add_member(NewMember::new(user.user_id, name, SELF_RELATION))
      .await
      .map_err(Error::store)?;
    tracing::info!(user_id = %user.user_id, "created self member");
  }

  Ok(user)
}

/// Fetch a member owned by `user_id`. A member owned by someone else is
/// reported as [`Error::NotFound`], same as a missing one.
pub async fn owned_member<S: CareStore>(
  store: &S,
  user_id: Uuid,
  member_id: Uuid,
) -> Result<FamilyMember> {
  store
    .get_member(member_id)
    .await
    .map_err(Error::store)?
    .filter(|m| m.user_id == user_id)
    .ok_or_else(|| Error::NotFound(format!("member {member_id}")))
}

/// Delete a member owned by `user_id`. The self member is protected.
pub async fn delete_member<S: CareStore>(
  store: &S,
  user_id: Uuid,
  member_id: Uuid,
) -> Result<()> {
  let member = owned_member(store, user_id, member_id).await?;
  if member.is_self() {
    return Err(Error::Forbidden("the self member cannot be deleted".into()));
  }
  store.delete_member(member_id).await.map_err(Error::store)?;
  Ok(())
}

/// Apply `patch` to a member owned by `user_id` and store the result.
///
/// The self marker is fixed: the self member cannot be relabelled, and no
/// other member can take the self relation.
pub async fn update_member<S: CareStore>(
  store: &S,
  user_id: Uuid,
  member_id: Uuid,
  patch: MemberPatch,
) -> Result<FamilyMember> {
  let mut member = owned_member(store, user_id, member_id).await?;
  if let Some(relation) = &patch.relation
    && (relation.trim() == SELF_RELATION) != member.is_self()
  {
    return Err(Error::Forbidden(format!(
      "relation {SELF_RELATION:?} is reserved for the self member"
    )));
  }
  member.apply(patch);
  store.update_member(member.clone()).await.map_err(Error::store)?;
  Ok(member)
}
