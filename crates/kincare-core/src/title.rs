//! Session titles: advisor summarization with a truncation fallback.

use std::time::Duration;

use crate::advisor::Advisor;

/// Number of characters kept by the fallback title.
pub const FALLBACK_TITLE_CHARS: usize = 10;

/// Longest title accepted from the advisor, in characters.
pub const MAX_TITLE_CHARS: usize = 20;

/// Framing the client puts before a symptom description.
const DESCRIPTION_MARKERS: &[&str] = &["用户描述：", "用户描述:"];

/// How a title was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
  Summarized(String),
  Fallback(String),
}

impl TitleOutcome {
  pub fn into_title(self) -> String {
    match self {
      Self::Summarized(t) | Self::Fallback(t) => t,
    }
  }
}

/// Strip a leading description marker and surrounding whitespace.
pub fn strip_description_marker(content: &str) -> &str {
  let trimmed = content.trim();
  DESCRIPTION_MARKERS
    .iter()
    .find_map(|marker| trimmed.strip_prefix(marker))
    .unwrap_or(trimmed)
    .trim()
}

/// The first [`FALLBACK_TITLE_CHARS`] characters of `snippet` plus `...`.
pub fn fallback_title(snippet: &str) -> String {
  let head: String = snippet.chars().take(FALLBACK_TITLE_CHARS).collect();
  format!("{head}...")
}

/// Trim whitespace and quoting from an advisor title. `None` if nothing is left.
fn clean(raw: &str) -> Option<String> {
  let quotes: &[char] = &['"', '\'', '“', '”', '「', '」', '《', '》', '。'];
  let title: String = raw
    .trim()
    .trim_matches(quotes)
    .trim()
    .chars()
    .take(MAX_TITLE_CHARS)
    .collect();
  (!title.is_empty()).then_some(title)
}

/// Ask `advisor` for a title for `content`, falling back to a truncation of
/// the same text when the advisor errors, times out, or returns nothing
/// usable.
pub async fn summarize<A: Advisor>(
  advisor: &A,
  content: &str,
  timeout: Duration,
) -> TitleOutcome {
  let snippet = strip_description_marker(content);
  match tokio::time::timeout(timeout, advisor.summarize_title(snippet)).await {
    Ok(Ok(raw)) => match clean(&raw) {
      Some(title) => TitleOutcome::Summarized(title),
      None => TitleOutcome::Fallback(fallback_title(snippet)),
    },
    Ok(Err(e)) => {
      tracing::warn!(error = %e, "title summarization failed; using fallback");
      TitleOutcome::Fallback(fallback_title(snippet))
    }
    Err(_) => {
      tracing::warn!(?timeout, "title summarization timed out; using fallback");
      TitleOutcome::Fallback(fallback_title(snippet))
    }
  }
}
