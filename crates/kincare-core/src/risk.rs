//! The risk-decay engine.
//!
//! Completing a care task lowers the risk score of the condition the task
//! targets. A tier whose score reaches zero is demoted to the next lower tier
//! at [`FULL_SCORE`]; a condition at tier 1 whose score reaches zero is
//! resolved and removed from the profile.

use crate::profile::{FULL_SCORE, TagProfile};

// ─── Keyword table ───────────────────────────────────────────────────────────

/// What completing a matching task does to the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deduction {
  /// Lower one specific tag; may demote or resolve it.
  Target { tag: &'static str, points: i32 },
  /// Lower every present tag; never demotes or resolves.
  Wellness { points: i32 },
}

struct Rule {
  keywords:  &'static [&'static str],
  deduction: Deduction,
}

/// Ordered; the first rule with a keyword contained in the title wins.
const RULES: &[Rule] = &[
  Rule {
    keywords:  &["血糖"],
    deduction: Deduction::Target { tag: "糖尿病", points: 15 },
  },
  Rule {
    keywords:  &["步行", "运动", "体温"],
    deduction: Deduction::Target { tag: "肥胖", points: 20 },
  },
  Rule {
    keywords:  &["药"],
    deduction: Deduction::Wellness { points: 5 },
  },
];

fn classify(title: &str) -> Option<Deduction> {
  RULES
    .iter()
    .find(|rule| rule.keywords.iter().any(|k| title.contains(k)))
    .map(|rule| rule.deduction)
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Compute the profile that results from completing a task titled
/// `completed_task_title`.
///
/// Total: a title that matches no rule, or targets a tag the profile does not
/// hold, returns the profile unchanged.
pub fn evolve(mut tags: TagProfile, completed_task_title: &str) -> TagProfile {
  match classify(completed_task_title) {
    None => {}
    Some(Deduction::Wellness { points }) => {
      for state in tags.states_mut() {
        state.score = state.score.saturating_sub(points);
      }
    }
    Some(Deduction::Target { tag, points }) => {
      let Some(state) = tags.get_mut(tag) else {
        return tags;
      };
      state.score = state.score.saturating_sub(points);
      if state.score > 0 {
        return tags;
      }
      if state.level > 1 {
        state.level -= 1;
        state.score = FULL_SCORE;
        tracing::debug!(tag, level = state.level, "condition demoted");
      } else {
        tags.remove(tag);
        tracing::info!(tag, "condition resolved; tag removed from profile");
      }
    }
  }
  tags
}
