use serde::{Deserialize, Serialize};

/// Clamps a model-reported number onto the 0..=100 score scale.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn of(score: f64) -> Self {
        if score >= 80.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scores {
    pub purpose: f64,
    pub clarity: f64,
    pub constraint: f64,
    pub quality: f64,
}

impl Scores {
    pub fn new(purpose: f64, clarity: f64, constraint: f64, quality: f64) -> Self {
        Self {
            purpose: clamp_score(purpose),
            clarity: clamp_score(clarity),
            constraint: clamp_score(constraint),
            quality: clamp_score(quality),
        }
    }

    /// Mean of the four scores, rounded to a whole number.
    pub fn average(&self) -> f64 {
        ((self.purpose + self.clarity + self.constraint + self.quality) / 4.0).round()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub scores: Scores,
    pub feedback: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationResult {
    pub scores: Scores,
    pub feedback: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeResult {
    pub text: String,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestMetrics {
    pub relevance: f64,
    pub coherence: f64,
    pub specificity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResult {
    pub response: String,
    pub metrics: TestMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizationResult {
    pub optimized_prompt: String,
    pub evaluation: String,
    pub orchestration: String,
}

/// A prompt taken apart into its components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PromptBreakdown {
    pub task_objective: String,
    pub task_constraints: String,
    pub output_format: String,
    pub persona_system: String,
    pub context_knowledge: String,
    pub exemplars_best_practices: String,
    pub step_by_step_thinking: String,
    pub evaluation_rubric: String,
    pub refinement_iterations: String,
    pub failure_cases: String,
    pub application_scenarios: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskBlock {
    pub title: String,
    pub instructions: Vec<String>,
}

/// An upgraded prompt laid out as labelled blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredPrompt {
    pub system: String,
    pub persona: String,
    pub input: String,
    pub tasks: Vec<TaskBlock>,
    pub output_format: String,
    pub quality_assurance: Vec<String>,
    pub reflection: Vec<String>,
    pub feedback: Vec<String>,
    pub constraints: Vec<String>,
    pub context: String,
}

impl StructuredPrompt {
    /// Renders the blocks as `[Label]` sections; empty blocks are left out.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        push_text(&mut sections, "System", &self.system);
        push_text(&mut sections, "Persona", &self.persona);
        push_text(&mut sections, "Input", &self.input);
        for (i, task) in self.tasks.iter().enumerate() {
            push_list(&mut sections, &format!("Task {}: {}", i + 1, task.title.trim()), &task.instructions);
        }
        push_text(&mut sections, "Output Format", &self.output_format);
        push_list(&mut sections, "Quality Assurance", &self.quality_assurance);
        push_list(&mut sections, "Reflection", &self.reflection);
        push_list(&mut sections, "Feedback", &self.feedback);
        push_list(&mut sections, "Constraints", &self.constraints);
        push_text(&mut sections, "Context", &self.context);
        sections.join("\n\n")
    }
}

fn push_text(sections: &mut Vec<String>, label: &str, body: &str) {
    let body = body.trim();
    if !body.is_empty() {
        sections.push(format!("[{label}]\n{body}"));
    }
}

fn push_list(sections: &mut Vec<String>, label: &str, items: &[String]) {
    let items: Vec<String> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("- {item}"))
        .collect();
    if !items.is_empty() {
        sections.push(format!("[{label}]\n{}", items.join("\n")));
    }
}

/// The breakdown and the structured upgrade built from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestructureResult {
    pub breakdown: PromptBreakdown,
    pub upgrade: StructuredPrompt,
}
