use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum SystemContext {
    #[default]
    Assistant,
    Expert,
    Teacher,
    Analyst,
    Creative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum OutputFormat {
    #[default]
    StepByStep,
    BulletPoints,
    DetailedAnalysis,
    Code,
    Conversation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum AgenticBehavior {
    #[default]
    Proactive,
    Reactive,
    Collaborative,
    Analytical,
    Creative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ThinkingStyle {
    #[default]
    ChainOfThought,
    TreeOfThoughts,
    DirectAnswer,
    Socratic,
    Structured,
}

impl fmt::Display for SystemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Assistant => "Assistant",
            Self::Expert => "Expert",
            Self::Teacher => "Teacher",
            Self::Analyst => "Analyst",
            Self::Creative => "Creative",
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StepByStep => "Step by Step",
            Self::BulletPoints => "Bullet Points",
            Self::DetailedAnalysis => "Detailed Analysis",
            Self::Code => "Code",
            Self::Conversation => "Conversation",
        })
    }
}

impl fmt::Display for AgenticBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Proactive => "Proactive",
            Self::Reactive => "Reactive",
            Self::Collaborative => "Collaborative",
            Self::Analytical => "Analytical",
            Self::Creative => "Creative",
        })
    }
}

impl fmt::Display for ThinkingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChainOfThought => "Chain of Thought",
            Self::TreeOfThoughts => "Tree of Thoughts",
            Self::DirectAnswer => "Direct Answer",
            Self::Socratic => "Socratic",
            Self::Structured => "Structured",
        })
    }
}

/// The structured description a prompt is compiled from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Template {
    pub system_context: SystemContext,
    pub output_format: OutputFormat,
    pub agentic_behavior: AgenticBehavior,
    pub thinking_style: ThinkingStyle,
    pub input: String,
    pub constraints: String,
    pub examples: String,
    pub purpose: String,
}

impl Template {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    /// Optional fields count as absent when they are blank.
    pub fn constraints(&self) -> Option<&str> {
        non_blank(&self.constraints)
    }

    pub fn examples(&self) -> Option<&str> {
        non_blank(&self.examples)
    }

    pub fn purpose(&self) -> Option<&str> {
        non_blank(&self.purpose)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_option_of_each_enum() {
        let t = Template::default();
        assert_eq!(t.system_context, SystemContext::Assistant);
        assert_eq!(t.output_format, OutputFormat::StepByStep);
        assert_eq!(t.agentic_behavior, AgenticBehavior::Proactive);
        assert_eq!(t.thinking_style, ThinkingStyle::ChainOfThought);
    }

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(OutputFormat::StepByStep.to_string(), "Step by Step");
        assert_eq!(ThinkingStyle::TreeOfThoughts.to_string(), "Tree of Thoughts");
        assert_eq!(SystemContext::Analyst.to_string(), "Analyst");
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        let mut t = Template::new("task");
        t.constraints = "   ".into();
        t.purpose = " ship it ".into();
        assert_eq!(t.constraints(), None);
        assert_eq!(t.examples(), None);
        assert_eq!(t.purpose(), Some("ship it"));
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let t: Template =
            serde_json::from_str(r#"{"input":"hi","systemContext":"Expert"}"#).unwrap();
        assert_eq!(t.system_context, SystemContext::Expert);
        assert_eq!(t.thinking_style, ThinkingStyle::ChainOfThought);
        assert!(t.constraints.is_empty());
    }
}
