//! Prompt text and response schema for the two outbound LLM calls.

use serde_json::{json, Value};

pub const CLASSIFIER_SYSTEM_PROMPT: &str = "You are a focus assistant. You will be shown \
recent screenshots from a user's work session together with their stated focus goal. \
Decide whether the recent activity is focused on that goal or distracted from it. Be \
strict but fair: reference material, documentation, and tooling that plausibly serve \
the goal count as focused.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a focus assistant writing a short \
end-of-session recap. Given the interim activity analyses, interruptions, noted \
distractions, and the user's own reflections, write a concise narrative (3-6 \
sentences) of how the session went. Address the user directly and stay concrete.";

/// Strict JSON schema for the classification response.
pub fn classification_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "focus_check",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "status": {
                        "type": "string",
                        "enum": ["focused", "distracted"]
                    },
                    "analysis": {
                        "type": "string",
                        "description": "One or two sentences on what the screenshots show"
                    },
                    "suggestion": {
                        "type": "string",
                        "description": "A short nudge if the user is distracted"
                    }
                },
                "required": ["status", "analysis", "suggestion"],
                "additionalProperties": false
            }
        }
    })
}

pub fn classification_context(focus_goal: &str, tasks: Option<&[String]>) -> String {
    let mut context = format!(
        "The user's focus goal for this session: {focus_goal}\n"
    );
    if let Some(tasks) = tasks.filter(|tasks| !tasks.is_empty()) {
        context.push_str("Planned tasks:\n");
        for task in tasks {
            context.push_str(&format!("- {task}\n"));
        }
    }
    context.push_str(
        "Classify the recent activity shown in the screenshots as focused or distracted.",
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_includes_goal_and_tasks() {
        let tasks = vec!["outline".to_string(), "draft intro".to_string()];
        let context = classification_context("write report", Some(&tasks));
        assert!(context.contains("write report"));
        assert!(context.contains("- outline"));
        assert!(context.contains("- draft intro"));
    }

    #[test]
    fn context_omits_task_section_when_empty() {
        let context = classification_context("write report", Some(&[]));
        assert!(!context.contains("Planned tasks"));
    }

    #[test]
    fn schema_constrains_status_to_two_values() {
        let schema = classification_schema();
        let statuses = schema
            .pointer("/json_schema/schema/properties/status/enum")
            .and_then(Value::as_array)
            .expect("enum present");
        assert_eq!(statuses.len(), 2);
    }
}
