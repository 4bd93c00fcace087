//! System prompts sent ahead of every advisory request.
//!
//! Each prompt embeds the member's persona, with allergies and current
//! medication marked as hard constraints, and pins the JSON reply format the
//! ingestion pipeline expects.

use std::fmt::Write as _;

use kincare_core::member::Persona;

const UNKNOWN: &str = "未知";
const NONE: &str = "无";

/// The JSON shape both structured prompts ask for.
const REPLY_FORMAT: &str = r#"{
  "reply": "对用户说的通俗易懂的安抚和建议话语",
  "new_advice": [
    {"title": "建议标题", "reason": "为什么给这个建议", "tags": ["分类"]}
  ],
  "new_tasks": [
    {"title": "任务标题", "freq": "频率", "due": "建议执行时间"}
  ]
}"#;

const SAFETY_RULES: &str = "\
1. 必须优先考虑过敏史和当前用药。如果建议药物，严禁包含过敏成分，并防止药物冲突。
2. 如果用户描述出现胸痛、呼吸困难、大出血等症状，必须在回复的第一句建议立即拨打120。
3. 回复必须是标准 JSON 对象，不要输出 Markdown 标记或多余的解释文字。";

/// Render the persona block shared by the conversation and plan prompts.
pub fn persona_block(p: &Persona) -> String {
  let gender = p.gender.as_deref().unwrap_or(UNKNOWN);
  let age = p.age.map_or_else(|| UNKNOWN.to_owned(), |a| a.to_string());
  let height = p.height.map_or_else(|| "-".to_owned(), |h| h.to_string());
  let weight = p.weight.map_or_else(|| "-".to_owned(), |w| w.to_string());

  let history = if p.tags.is_empty() {
    NONE.to_owned()
  } else {
    p.tags
      .iter()
      .map(|(tag, s)| format!("{tag}（等级{}，风险分{}）", s.level, s.score))
      .collect::<Vec<_>>()
      .join("、")
  };

  let mut out = String::new();
  let _ = writeln!(out, "- 基本信息：{gender}，{age}岁，身高{height}cm，体重{weight}kg");
  let _ = writeln!(out, "- 既往病史：{history}");
  let _ = writeln!(
    out,
    "- 【安全红线】过敏史：{}",
    non_empty(p.allergies.as_deref()).unwrap_or(NONE)
  );
  let _ = writeln!(
    out,
    "- 【安全红线】当前用药：{}",
    non_empty(p.meds.as_deref()).unwrap_or(NONE)
  );
  let _ = write!(
    out,
    "- 生理状态：{}",
    non_empty(p.special_status.as_deref()).unwrap_or("正常")
  );
  out
}

/// System prompt for a consultation turn.
pub fn consult_prompt(p: &Persona) -> String {
  format!(
    "你是一个专业的 AI 医生助手，根据用户的健康画像和对话历史提供医疗建议。\n\n\
     【用户当前的健康画像】\n{}\n\n\
     【工作守则】\n{SAFETY_RULES}\n\n\
     【输出格式要求】\n{REPLY_FORMAT}",
    persona_block(p)
  )
}

/// System prompt for turning a finished consultation into a care plan.
pub fn plan_prompt(p: &Persona) -> String {
  format!(
    "你是一个专业的 AI 健康管理师。请通读以下整段问诊对话，为该成员制定一份\
     可执行的健康计划：把需要长期遵守的要点写成建议，把需要定期执行的行动写成\
     任务，并在 reply 中用一两句话总结计划。\n\n\
     【用户当前的健康画像】\n{}\n\n\
     【工作守则】\n{SAFETY_RULES}\n\n\
     【输出格式要求】\n{REPLY_FORMAT}",
    persona_block(p)
  )
}

/// System prompt for session titling; the reply is plain text.
pub const TITLE_PROMPT: &str = "请用不超过20个字概括下面这段健康咨询的主题，\
                                只输出标题本身，不要标点和引号。";

fn non_empty(s: Option<&str>) -> Option<&str> {
  s.map(str::trim).filter(|s| !s.is_empty())
}
