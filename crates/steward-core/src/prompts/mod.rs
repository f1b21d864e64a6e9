//! Prompt templates for the router stages, scheduler jobs, and energy audit.

pub mod audit;
pub mod cortex;
pub mod jobs;
pub mod router;

pub use audit::{audit_prompt, AUDIT_STRATEGIC_TEMPLATE, AUDIT_TACTICAL_TEMPLATE};
pub use cortex::{cortex_prompt, cortex_system, CORTEX_SYSTEM_TEMPLATE};
pub use jobs::{supervisor_prompt, wake_prompt, SUPERVISOR_TEMPLATE, WAKE_TEMPLATE};
pub use router::{router_prompt, ROUTER_TEMPLATE};

/// Substitutes `{name}` placeholders in one pass over `template`.
///
/// Substituted values are never rescanned, so placeholder-looking text inside a value
/// stays literal. Braces that do not name a known placeholder (JSON examples) are kept.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_known_placeholders_and_keeps_json_braces() {
        let out = fill_template(r#"Hi {name}: {"route": "x"} {other}"#, &[("name", "Ann")]);
        assert_eq!(out, r#"Hi Ann: {"route": "x"} {other}"#);
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = fill_template("{a}|{b}", &[("a", "{b}"), ("b", "B")]);
        assert_eq!(out, "{b}|B");
    }
}
