pub const ANALYZE_PROMPT: &str = r#"
You are an expert prompt analyst.
Analyze the prompt below and provide feedback.

INSTRUCTIONS:
1. Score purpose, clarity, constraint handling and overall quality from 0 to 100.
2. List the strengths of the prompt under `feedback`.
3. List concrete changes that would improve it under `improvements`.
"#;

pub const EVALUATE_PROMPT: &str = r#"
You are an expert prompt evaluator.
Evaluate the prompt below based on these criteria:
- Purpose clarity (score from 0-100)
- Overall clarity (score from 0-100)
- Constraint effectiveness (score from 0-100)
- Overall quality (score from 0-100)

INSTRUCTIONS:
1. Give three feedback points under `feedback`.
2. Give two suggested improvements under `suggestedImprovements`.
"#;

pub const UPGRADE_PROMPT: &str = r#"
You are an expert prompt engineer.
Improve the prompt below to make it more effective, structured, clear,
and aligned with best practices for AI interactions.

Create an upgraded version that includes:
1. Enhanced system role definition
2. Better structured constraints
3. More specific guidance on the thinking process
4. Improved format for examples (if any)
5. Clearer purpose statement

INSTRUCTIONS:
1. Put the full upgraded prompt under `text`.
2. List the five improvements you made under `improvements`.
"#;

pub const TEST_PROMPT: &str = r#"
You are a prompt tester.
Respond to the prompt below as the target model would, then rate your own response.

INSTRUCTIONS:
1. Put the response under `response`.
2. Rate relevance, coherence and specificity from 0 to 100 under `metrics`.
"#;

pub const OPTIMIZE_PROMPT: &str = r#"
You are an expert prompt optimizer.
Using advanced prompt engineering techniques (Chain of Thought, Tree of Thoughts, etc.),
optimize the prompt below for better performance and clarity while keeping its core purpose.

INSTRUCTIONS:
1. Put the optimized prompt under `optimizedPrompt`.
2. Explain what was wrong with the original under `evaluation`.
3. Describe the optimization strategy step by step under `orchestration`.
"#;

pub const BREAKDOWN_PROMPT: &str = r#"
You are an expert prompt analyst.
Break the prompt below down into its components.

INSTRUCTIONS:
1. Fill every field with what the prompt says about that component.
2. Write "Not specified" for components the prompt leaves out.
3. Use `Notes` for anything that fits no other field.
"#;

pub const RESTRUCTURE_PROMPT: &str = r#"
You are an expert prompt engineer.
Using the component analysis below, rewrite the prompt as a structured prompt
with explicit system, persona, input, tasks, output format, quality assurance,
reflection, feedback, constraints and context blocks.

INSTRUCTIONS:
1. Split the work into ordered tasks, each with a title and concrete instructions.
2. Keep the original intent; fill gaps the analysis points out.
"#;

const GENERAL_PURPOSE: &str = "General purpose";

/// Wraps `subject` in a stage instruction that asks for JSON of the given shape.
pub fn stage_instruction(preamble: &str, subject: &str, purpose: Option<&str>, shape: &str) -> String {
    let mut out = format!("{}\nPROMPT:\n{}\n", preamble.trim(), subject);
    if let Some(purpose) = purpose {
        out.push_str(&format!("\nPURPOSE:\n{purpose}\n"));
    }
    out.push_str(&format!(
        "\nReturn ONLY a JSON object (no markdown, no commentary) matching this schema:\n{shape}\n"
    ));
    out
}

/// Restructure preamble with the breakdown of the prompt attached.
pub fn restructure_preamble(breakdown_json: &str) -> String {
    format!("{}\n\nANALYSIS:\n{breakdown_json}\n", RESTRUCTURE_PROMPT.trim())
}

/// Purpose line for stages that always mention one.
pub fn purpose_or_default(purpose: Option<&str>) -> &str {
    purpose
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(GENERAL_PURPOSE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_contains_subject_then_shape() {
        let text = stage_instruction(TEST_PROMPT, "Say hi", None, "{\"type\":\"object\"}");
        let subject = text.find("Say hi").unwrap();
        let shape = text.find("{\"type\":\"object\"}").unwrap();
        assert!(subject < shape);
        assert!(!text.contains("PURPOSE:"));
    }

    #[test]
    fn purpose_is_included_when_given() {
        let text = stage_instruction(OPTIMIZE_PROMPT, "p", Some("onboarding"), "{}");
        assert!(text.contains("PURPOSE:\nonboarding"));
    }

    #[test]
    fn blank_purpose_becomes_general() {
        assert_eq!(purpose_or_default(Some("  ")), "General purpose");
        assert_eq!(purpose_or_default(None), "General purpose");
        assert_eq!(purpose_or_default(Some("docs")), "docs");
    }

    #[test]
    fn restructure_preamble_carries_the_analysis() {
        let text = restructure_preamble("{\"taskObjective\": \"sort\"}");
        assert!(text.starts_with("You are an expert prompt engineer."));
        assert!(text.ends_with("ANALYSIS:\n{\"taskObjective\": \"sort\"}\n"));
    }
}
