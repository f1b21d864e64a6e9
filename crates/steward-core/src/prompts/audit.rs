//! Energy audit prompts (tactical during the day, strategic in the evening).

use super::fill_template;

/// Placeholders: `{history}`, `{task_count}`.
pub const AUDIT_TACTICAL_TEMPLATE: &str = r#"[TASK]
Tactical energy audit of the owner over the last few hours.

[DATA]
Chat:
{history}
Outstanding tasks: {task_count}

[RULES]
1. Short replies or venting about being tired -> LOW.
2. Complex, focused queries -> HIGH.
3. More than 8 outstanding tasks and no visible progress -> LOW.

[OUTPUT JSON ONLY]
{"current_energy": "HIGH" | "MED" | "LOW", "reason": "brief analysis", "suggested_action": "short message; if LOW suggest dropping maintenance tasks"}"#;

/// Placeholders: `{history}`, `{tasks}`.
pub const AUDIT_STRATEGIC_TEMPLATE: &str = r#"[TASK]
Strategic audit of the owner's whole day.

[DATA]
Chat:
{history}
Tasks:
{tasks}

[GOALS]
1. Bias: too much maintenance work at the expense of important work?
2. Stress point: when did the owner's energy break?
3. Battery: final state.

[OUTPUT JSON ONLY]
{"current_energy": "HIGH" | "MED" | "LOW", "reason": "deep analysis", "balance_check": "what was neglected", "suggested_action": "strategic advice for tomorrow"}"#;

/// Builds the tactical or strategic audit prompt.
pub fn audit_prompt(strategic: bool, history: &str, tasks: &str, task_count: usize) -> String {
    if strategic {
        fill_template(AUDIT_STRATEGIC_TEMPLATE, &[("history", history), ("tasks", tasks)])
    } else {
        let count = task_count.to_string();
        fill_template(AUDIT_TACTICAL_TEMPLATE, &[("history", history), ("task_count", &count)])
    }
}
