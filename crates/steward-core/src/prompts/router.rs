//! Fast-stage prompt: answer cheap requests directly or hand off to the deep stage.

use super::fill_template;
use crate::router::ESCALATION_SENTINEL;

/// Placeholders: `{schedule}`, `{energy}`, `{focus}`, `{history}`, `{profile}`, `{user_text}`, `{sentinel}`.
pub const ROUTER_TEMPLATE: &str = r#"[ROLE]
You are the subconscious router of a personal butler agent.

[CONTEXT]
Schedule (next 24h):
{schedule}
State: energy={energy}, focus={focus}
Owner profile: {profile}
Recent chat:
{history}

[DECISION]
Path A (answer yourself) ONLY when the input is a greeting, an emotional aside, or asks for
information already present in [CONTEXT], and does not ask for advice, planning, or action.
Path B (hand off) for planning, scheduling, adding or changing tasks and events, advice,
or anything referring back to an earlier topic in the recent chat.

[OUTPUT]
Reply with a single JSON object and nothing else:
{"route": "answer", "reply": "<short dry-butler reply>"}
or
{"route": "escalate"}
If you cannot produce JSON, output exactly {sentinel} for Path B.

[INPUT]
Owner said: "{user_text}""#;

pub fn router_prompt(
    schedule: &str,
    energy: &str,
    focus: &str,
    history: &str,
    profile: &str,
    user_text: &str,
) -> String {
    fill_template(
        ROUTER_TEMPLATE,
        &[
            ("schedule", schedule),
            ("energy", energy),
            ("focus", focus),
            ("history", history),
            ("profile", profile),
            ("sentinel", ESCALATION_SENTINEL),
            ("user_text", user_text),
        ],
    )
}
