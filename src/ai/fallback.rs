//! Locally computed stand-ins for stage results.
//!
//! Used whenever the model call fails or its output does not validate. The
//! scores drawn here are placeholders from fixed ranges, not measurements.

use crate::core::results::{
    AnalysisResult, EvaluationResult, OptimizationResult, PromptBreakdown, Scores,
    StructuredPrompt, TaskBlock, TestMetrics, TestResult, UpgradeResult,
};
use crate::core::template::Template;
use rand::Rng;
use std::ops::RangeInclusive;

const ANALYSIS_RANGE: RangeInclusive<f64> = 80.0..=100.0;

const EVAL_PURPOSE_RANGE: RangeInclusive<f64> = 80.0..=100.0;
const EVAL_CLARITY_RANGE: RangeInclusive<f64> = 70.0..=100.0;
const EVAL_CONSTRAINT_RANGE: RangeInclusive<f64> = 60.0..=100.0;
const EVAL_QUALITY_RANGE: RangeInclusive<f64> = 70.0..=100.0;

const SIMULATED_RESPONSE: &str = "This is a simulated response.

Based on your prompt, here's what I understand you're asking for...

[A detailed response would appear here once the model is reachable]

Let me know if you need any clarification or have follow-up questions.";

pub const UPGRADE_IMPROVEMENTS: [&str; 5] = [
    "Enhanced system role definition",
    "Added structured bullet lists for constraints",
    "Included more specific guidance on the thinking process",
    "Improved the format of examples section",
    "Added clarity to the purpose statement",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn analysis<R: Rng>(rng: &mut R) -> AnalysisResult {
    AnalysisResult {
        scores: Scores::new(
            rng.gen_range(ANALYSIS_RANGE),
            rng.gen_range(ANALYSIS_RANGE),
            rng.gen_range(ANALYSIS_RANGE),
            rng.gen_range(ANALYSIS_RANGE),
        ),
        feedback: strings(&[
            "Clear system role definition",
            "Specific task description",
            "Appropriate thinking style selection",
        ]),
        improvements: strings(&[
            "Add 2-3 concrete examples to guide the model",
            "Specify output length expectations",
            "Include success criteria for the response",
        ]),
    }
}

pub fn evaluation<R: Rng>(rng: &mut R) -> EvaluationResult {
    EvaluationResult {
        scores: Scores::new(
            rng.gen_range(EVAL_PURPOSE_RANGE),
            rng.gen_range(EVAL_CLARITY_RANGE),
            rng.gen_range(EVAL_CONSTRAINT_RANGE),
            rng.gen_range(EVAL_QUALITY_RANGE),
        ),
        feedback: strings(&[
            "Good specification of system context",
            "Clear task definition",
            "Appropriate thinking style for the task",
        ]),
        suggestions: strings(&[
            "Consider adding more specific examples",
            "Clarify the expected output format in more detail",
        ]),
    }
}

const DEFAULT_CONSTRAINTS: [&str; 3] = [
    "Maintain factual accuracy and cite sources when possible",
    "Limit response to relevant information only",
    "Consider diverse perspectives",
];

const DEFAULT_PURPOSE: &str = "To provide comprehensive, accurate, and actionable information";

const CLOSING: &str = "Please provide your detailed response following these guidelines, ensuring clarity, depth, and practical utility.";

const NOT_SPECIFIED: &str = "Not specified";

fn constraints_block(extra: Option<&str>) -> String {
    let mut block = String::from("Constraints:");
    for line in DEFAULT_CONSTRAINTS.iter().copied().chain(extra) {
        block.push_str(&format!("\n- {line}"));
    }
    block
}

/// Re-assembles the template with more explicit, fixed phrasing.
pub fn rewrite(t: &Template) -> String {
    let mut sections = vec![
        format!(
            "System: As a highly specialized {}, you'll demonstrate {} behavior throughout our interaction.",
            t.system_context, t.agentic_behavior
        ),
        format!(
            "Output Format: Structure your response using a detailed {} approach with clear sections and logical progression.",
            t.output_format
        ),
        format!(
            "Thinking Process: Employ {} reasoning, showing your work explicitly and considering multiple perspectives before arriving at conclusions.",
            t.thinking_style
        ),
        format!("Task: {}", t.input.trim()),
        constraints_block(t.constraints()),
    ];

    if let Some(examples) = t.examples() {
        sections.push(format!(
            "Examples for reference:\n{examples}\n\nThese examples demonstrate the expected depth and style."
        ));
    }

    sections.push(format!("Purpose: {}", t.purpose().unwrap_or(DEFAULT_PURPOSE)));
    sections.push(CLOSING.into());
    sections.join("\n\n")
}

/// Wraps a prompt whose template is unknown in the same fixed guidance.
pub fn wrap(prompt: &str) -> String {
    [
        "System: As a highly specialized assistant, you'll follow the task below precisely and explain your reasoning.".to_string(),
        format!("Task:\n{}", prompt.trim()),
        constraints_block(None),
        format!("Purpose: {DEFAULT_PURPOSE}"),
        CLOSING.to_string(),
    ]
    .join("\n\n")
}

fn rewrite_from(source: Option<&Template>, prompt: &str) -> String {
    match source {
        Some(template) => rewrite(template),
        None => wrap(prompt),
    }
}

/// `source` is the template `prompt` was compiled from, when it is known.
pub fn upgrade(source: Option<&Template>, prompt: &str) -> UpgradeResult {
    UpgradeResult {
        text: rewrite_from(source, prompt),
        improvements: strings(&UPGRADE_IMPROVEMENTS),
    }
}

pub fn optimization(source: Option<&Template>, prompt: &str) -> OptimizationResult {
    OptimizationResult {
        optimized_prompt: rewrite_from(source, prompt),
        evaluation: "The optimized prompt includes improved structural elements, clearer constraints, \
                     and better defines the expected output format. The system context and agentic \
                     behavior descriptions have been enhanced to guide the model more effectively."
            .into(),
        orchestration: UPGRADE_IMPROVEMENTS
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn or_unspecified(value: Option<&str>) -> String {
    value.unwrap_or(NOT_SPECIFIED).to_string()
}

fn specified(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != NOT_SPECIFIED).then_some(value)
}

/// Component breakdown read straight off the template, or off the bare prompt.
pub fn breakdown(source: Option<&Template>, prompt: &str) -> PromptBreakdown {
    let unspecified = || NOT_SPECIFIED.to_string();
    match source {
        Some(t) => PromptBreakdown {
            task_objective: t.input.trim().to_string(),
            task_constraints: or_unspecified(t.constraints()),
            output_format: t.output_format.to_string(),
            persona_system: format!("{} with {} behavior", t.system_context, t.agentic_behavior),
            context_knowledge: unspecified(),
            exemplars_best_practices: or_unspecified(t.examples()),
            step_by_step_thinking: format!("{} reasoning", t.thinking_style),
            evaluation_rubric: unspecified(),
            refinement_iterations: unspecified(),
            failure_cases: unspecified(),
            application_scenarios: or_unspecified(t.purpose()),
            notes: "Derived from the template fields".into(),
        },
        None => PromptBreakdown {
            task_objective: prompt.trim().to_string(),
            task_constraints: unspecified(),
            output_format: unspecified(),
            persona_system: unspecified(),
            context_knowledge: unspecified(),
            exemplars_best_practices: unspecified(),
            step_by_step_thinking: unspecified(),
            evaluation_rubric: unspecified(),
            refinement_iterations: unspecified(),
            failure_cases: unspecified(),
            application_scenarios: unspecified(),
            notes: "Derived from the prompt text".into(),
        },
    }
}

/// Lays a breakdown out as a structured prompt with fixed review blocks.
pub fn structured(b: &PromptBreakdown) -> StructuredPrompt {
    let mut answer = Vec::new();
    if let Some(thinking) = specified(&b.step_by_step_thinking) {
        answer.push(format!("Apply {thinking} and show the steps"));
    }
    if let Some(format) = specified(&b.output_format) {
        answer.push(format!("Present the result as {format}"));
    }
    if let Some(examples) = specified(&b.exemplars_best_practices) {
        answer.push(format!("Match the depth and style of: {examples}"));
    }
    answer.push("Check the result against every constraint before answering".into());

    StructuredPrompt {
        system: "You are a highly specialized assistant. Work through the tasks in order and follow every block below.".into(),
        persona: specified(&b.persona_system).unwrap_or("Assistant").to_string(),
        input: b.task_objective.trim().to_string(),
        tasks: vec![
            TaskBlock {
                title: "Understand the request".into(),
                instructions: strings(&[
                    "Restate the objective in your own words",
                    "List any missing information and state your assumptions",
                ]),
            },
            TaskBlock {
                title: "Produce the answer".into(),
                instructions: answer,
            },
        ],
        output_format: specified(&b.output_format).unwrap_or("Step by Step").to_string(),
        quality_assurance: strings(&[
            "Verify factual claims",
            "Confirm every part of the objective is addressed",
        ]),
        reflection: strings(&["Note the weakest part of the answer and how to strengthen it"]),
        feedback: strings(&["Invite follow-up questions on unclear points"]),
        constraints: DEFAULT_CONSTRAINTS
            .iter()
            .map(|c| c.to_string())
            .chain(specified(&b.task_constraints).map(str::to_string))
            .collect(),
        context: specified(&b.application_scenarios)
            .or_else(|| specified(&b.context_knowledge))
            .unwrap_or_default()
            .to_string(),
    }
}

pub fn test_result() -> TestResult {
    TestResult {
        response: SIMULATED_RESPONSE.into(),
        metrics: TestMetrics::default(),
    }
}
