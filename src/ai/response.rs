//! Validation of model output.
//!
//! Every stage asks the model for a JSON object of a known shape. The text that
//! comes back is unwrapped from any markdown fence, parsed, checked against the
//! stage's wire shape and mapped onto the view types in `core::results`. Any
//! mismatch becomes a single `WorkbenchError::Parse`.

use crate::core::results::{
    clamp_score, AnalysisResult, EvaluationResult, OptimizationResult, PromptBreakdown, Scores,
    StructuredPrompt, TaskBlock, TestMetrics, TestResult, UpgradeResult,
};
use crate::error::WorkbenchError;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A shape the model is asked to produce, and how it maps to a view type.
pub trait StageResponse: DeserializeOwned + JsonSchema {
    type Output;

    fn into_output(self) -> Result<Self::Output, String>;
}

pub fn parse<R: StageResponse>(text: &str) -> Result<R::Output, WorkbenchError> {
    let block = extract_json_block(text);
    let value: Value = serde_json::from_str(block)
        .map_err(|e| WorkbenchError::Parse(format!("response is not JSON: {e}")))?;

    if !value.is_object() {
        return Err(WorkbenchError::Parse("expected a JSON object".into()));
    }

    let wire: R = serde_json::from_value(value)
        .map_err(|e| WorkbenchError::Parse(format!("unexpected shape: {e}")))?;
    wire.into_output().map_err(WorkbenchError::Parse)
}

/// Strips a ```json fence and any prose around the outermost object.
fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if end > start => &unfenced[start..=end],
        _ => unfenced,
    }
}

/// Scores arrive as numbers, numeric strings or null.
fn score<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(de)? {
        None => Ok(0.0),
        Some(Raw::Number(n)) => Ok(clamp_score(n)),
        Some(Raw::Text(s)) => s
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map(clamp_score)
            .map_err(|_| serde::de::Error::custom(format!("score is not numeric: {s:?}"))),
    }
}

fn string_list<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(de)?.unwrap_or_default())
}

fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(default, deserialize_with = "score")]
    #[schemars(description = "0-100: how clearly the prompt states its goal.")]
    pub purpose_score: f64,
    #[serde(default, deserialize_with = "score")]
    #[schemars(description = "0-100: how unambiguous the wording is.")]
    pub clarity_score: f64,
    #[serde(default, deserialize_with = "score")]
    #[schemars(description = "0-100: how well constraints bound the answer.")]
    pub constraint_score: f64,
    #[serde(default, deserialize_with = "score")]
    #[schemars(description = "0-100: overall expected output quality.")]
    pub quality_score: f64,
    #[serde(default, deserialize_with = "string_list", alias = "strengths")]
    pub feedback: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub improvements: Vec<String>,
}

impl StageResponse for AnalysisResponse {
    type Output = AnalysisResult;

    fn into_output(self) -> Result<AnalysisResult, String> {
        Ok(AnalysisResult {
            scores: Scores::new(
                self.purpose_score,
                self.clarity_score,
                self.constraint_score,
                self.quality_score,
            ),
            feedback: self.feedback,
            improvements: self.improvements,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    #[serde(default, deserialize_with = "score")]
    pub purpose_score: f64,
    #[serde(default, deserialize_with = "score")]
    pub clarity_score: f64,
    #[serde(default, deserialize_with = "score")]
    pub constraint_score: f64,
    #[serde(default, deserialize_with = "score")]
    pub quality_score: f64,
    #[serde(default, deserialize_with = "string_list")]
    pub feedback: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub suggested_improvements: Vec<String>,
}

impl StageResponse for EvaluationResponse {
    type Output = EvaluationResult;

    fn into_output(self) -> Result<EvaluationResult, String> {
        Ok(EvaluationResult {
            scores: Scores::new(
                self.purpose_score,
                self.clarity_score,
                self.constraint_score,
                self.quality_score,
            ),
            feedback: self.feedback,
            suggestions: self.suggested_improvements,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpgradeResponse {
    #[serde(default, deserialize_with = "text")]
    #[schemars(description = "The complete upgraded prompt.")]
    pub text: String,
    #[serde(default, deserialize_with = "string_list")]
    pub improvements: Vec<String>,
}

impl StageResponse for UpgradeResponse {
    type Output = UpgradeResult;

    fn into_output(self) -> Result<UpgradeResult, String> {
        if self.text.trim().is_empty() {
            return Err("upgrade response has no text".into());
        }
        Ok(UpgradeResult {
            text: self.text,
            improvements: self.improvements,
        })
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TestMetricsResponse {
    #[serde(default, deserialize_with = "score")]
    pub relevance: f64,
    #[serde(default, deserialize_with = "score")]
    pub coherence: f64,
    #[serde(default, deserialize_with = "score")]
    pub specificity: f64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TestResponse {
    pub response: String,
    pub metrics: Option<TestMetricsResponse>,
}

impl StageResponse for TestResponse {
    type Output = TestResult;

    fn into_output(self) -> Result<TestResult, String> {
        let m = self.metrics.unwrap_or_default();
        Ok(TestResult {
            response: self.response,
            metrics: TestMetrics {
                relevance: m.relevance,
                coherence: m.coherence,
                specificity: m.specificity,
            },
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResponse {
    #[serde(default, deserialize_with = "text")]
    pub optimized_prompt: String,
    #[serde(default, deserialize_with = "text")]
    pub evaluation: String,
    #[serde(default, deserialize_with = "text")]
    pub orchestration: String,
}

impl StageResponse for OptimizationResponse {
    type Output = OptimizationResult;

    fn into_output(self) -> Result<OptimizationResult, String> {
        if self.optimized_prompt.trim().is_empty() {
            return Err("optimization response has no optimizedPrompt".into());
        }
        Ok(OptimizationResult {
            optimized_prompt: self.optimized_prompt,
            evaluation: self.evaluation,
            orchestration: self.orchestration,
        })
    }
}

/// Component breakdown; field names follow the labels the model is shown.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct BreakdownResponse {
    #[serde(rename = "Task_Objective", default, deserialize_with = "text")]
    pub task_objective: String,
    #[serde(rename = "Task_Constraints", default, deserialize_with = "text")]
    pub task_constraints: String,
    #[serde(rename = "Output_Format", default, deserialize_with = "text")]
    pub output_format: String,
    #[serde(rename = "Persona_System", default, deserialize_with = "text")]
    pub persona_system: String,
    #[serde(rename = "Context_Knowledge", default, deserialize_with = "text")]
    pub context_knowledge: String,
    #[serde(rename = "Exemplars_BestPractices", default, deserialize_with = "text")]
    pub exemplars_best_practices: String,
    #[serde(rename = "Step_By_Step_Thinking", default, deserialize_with = "text")]
    pub step_by_step_thinking: String,
    #[serde(rename = "Evaluation_Rubric", default, deserialize_with = "text")]
    pub evaluation_rubric: String,
    #[serde(rename = "Refinement_Iterations", default, deserialize_with = "text")]
    pub refinement_iterations: String,
    #[serde(rename = "Failure_Cases", default, deserialize_with = "text")]
    pub failure_cases: String,
    #[serde(rename = "Application_Scenarios", default, deserialize_with = "text")]
    pub application_scenarios: String,
    #[serde(rename = "Notes", default, deserialize_with = "text")]
    pub notes: String,
}

impl StageResponse for BreakdownResponse {
    type Output = PromptBreakdown;

    fn into_output(self) -> Result<PromptBreakdown, String> {
        if self.task_objective.trim().is_empty() {
            return Err("breakdown has no Task_Objective".into());
        }
        Ok(PromptBreakdown {
            task_objective: self.task_objective,
            task_constraints: self.task_constraints,
            output_format: self.output_format,
            persona_system: self.persona_system,
            context_knowledge: self.context_knowledge,
            exemplars_best_practices: self.exemplars_best_practices,
            step_by_step_thinking: self.step_by_step_thinking,
            evaluation_rubric: self.evaluation_rubric,
            refinement_iterations: self.refinement_iterations,
            failure_cases: self.failure_cases,
            application_scenarios: self.application_scenarios,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskBlockResponse {
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "string_list")]
    pub instructions: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StructuredPromptResponse {
    #[serde(default, deserialize_with = "text")]
    pub system: String,
    #[serde(default, deserialize_with = "text")]
    pub persona: String,
    #[serde(default, deserialize_with = "text")]
    pub input: String,
    #[schemars(description = "At least one task with a title and its instructions.")]
    pub tasks: Vec<TaskBlockResponse>,
    #[serde(default, deserialize_with = "text")]
    pub output_format: String,
    #[serde(default, deserialize_with = "string_list")]
    pub quality_assurance: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub reflection: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub feedback: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub constraints: Vec<String>,
    #[serde(default, deserialize_with = "text")]
    pub context: String,
}

impl StageResponse for StructuredPromptResponse {
    type Output = StructuredPrompt;

    fn into_output(self) -> Result<StructuredPrompt, String> {
        let tasks: Vec<TaskBlock> = self
            .tasks
            .into_iter()
            .filter(|t| !t.title.trim().is_empty() || !t.instructions.is_empty())
            .map(|t| TaskBlock {
                title: t.title,
                instructions: t.instructions,
            })
            .collect();
        if tasks.is_empty() {
            return Err("structured upgrade has no tasks".into());
        }
        Ok(StructuredPrompt {
            system: self.system,
            persona: self.persona,
            input: self.input,
            tasks,
            output_format: self.output_format,
            quality_assurance: self.quality_assurance,
            reflection: self.reflection,
            feedback: self.feedback,
            constraints: self.constraints,
            context: self.context,
        })
    }
}
