use super::template::Template;
use crate::error::WorkbenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const SECTION_SEPARATOR: &str = "\n\n";

const CLOSING_INSTRUCTION: &str = "Please provide your response based on these parameters.";

/// One block of a compiled prompt, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Role,
    Format,
    Style,
    Task,
    Constraints,
    Examples,
    Purpose,
    Closing,
}

/// A prompt produced by a single compile action.
///
/// The `id` identifies this particular compile so that results of calls issued
/// against it can be told apart from results for a newer prompt with the same text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPrompt {
    id: Uuid,
    text: String,
}

impl CompiledPrompt {
    /// Wraps text that did not come out of `compile`, e.g. a history entry.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for CompiledPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Sections the template will produce, without rendering them.
pub fn sections(template: &Template) -> Vec<Section> {
    let mut out = vec![Section::Role, Section::Format, Section::Style, Section::Task];
    if template.constraints().is_some() {
        out.push(Section::Constraints);
    }
    if template.examples().is_some() {
        out.push(Section::Examples);
    }
    if template.purpose().is_some() {
        out.push(Section::Purpose);
    }
    out.push(Section::Closing);
    out
}

pub fn compile(template: &Template) -> Result<CompiledPrompt, WorkbenchError> {
    let task = template.input.trim();
    if task.is_empty() {
        return Err(WorkbenchError::InvalidTemplate(
            "input must not be empty".into(),
        ));
    }

    let rendered: Vec<String> = sections(template)
        .into_iter()
        .map(|section| render(section, template, task))
        .collect();

    Ok(CompiledPrompt::from_text(rendered.join(SECTION_SEPARATOR)))
}

fn render(section: Section, t: &Template, task: &str) -> String {
    match section {
        Section::Role => {
            let role = t.system_context.to_string();
            format!(
                "System: You are {} {} with {} behavior.",
                article(&role),
                role,
                t.agentic_behavior
            )
        }
        Section::Format => format!(
            "Output Format: Present your response in {} format.",
            t.output_format
        ),
        Section::Style => format!("Thinking Process: Use {} reasoning.", t.thinking_style),
        Section::Task => format!("Task: {task}"),
        Section::Constraints => format!("Constraints: {}", t.constraints().unwrap_or_default()),
        Section::Examples => format!("Examples: {}", t.examples().unwrap_or_default()),
        Section::Purpose => format!("Purpose: {}", t.purpose().unwrap_or_default()),
        Section::Closing => CLOSING_INSTRUCTION.to_string(),
    }
}

fn article(word: &str) -> &'static str {
    match word.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::template::{AgenticBehavior, OutputFormat, SystemContext, ThinkingStyle};

    fn sort_template() -> Template {
        Template {
            system_context: SystemContext::Expert,
            output_format: OutputFormat::Code,
            agentic_behavior: AgenticBehavior::Analytical,
            thinking_style: ThinkingStyle::ChainOfThought,
            input: "Write a sort function".into(),
            ..Template::default()
        }
    }

    #[test]
    fn minimal_template_has_five_sections() {
        let prompt = compile(&sort_template()).unwrap();
        let parts: Vec<&str> = prompt.text().split(SECTION_SEPARATOR).collect();

        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "System: You are an Expert with Analytical behavior.");
        assert_eq!(parts[1], "Output Format: Present your response in Code format.");
        assert_eq!(parts[2], "Thinking Process: Use Chain of Thought reasoning.");
        assert_eq!(parts[3], "Task: Write a sort function");
        assert_eq!(parts[4], CLOSING_INSTRUCTION);
        assert!(!prompt.text().contains("Constraints:"));
        assert!(!prompt.text().contains("Examples:"));
        assert!(!prompt.text().contains("Purpose:"));
    }

    #[test]
    fn optional_sections_follow_fixed_order() {
        let mut t = sort_template();
        t.purpose = "teach beginners".into();
        t.constraints = "no std sort".into();
        t.examples = "[3,1,2] -> [1,2,3]".into();

        assert_eq!(
            sections(&t),
            vec![
                Section::Role,
                Section::Format,
                Section::Style,
                Section::Task,
                Section::Constraints,
                Section::Examples,
                Section::Purpose,
                Section::Closing,
            ]
        );

        let text = compile(&t).unwrap().text().to_string();
        let c = text.find("Constraints: no std sort").unwrap();
        let e = text.find("Examples: [3,1,2]").unwrap();
        let p = text.find("Purpose: teach beginners").unwrap();
        assert!(c < e && e < p);
        assert!(text.ends_with(CLOSING_INSTRUCTION));
    }

    #[test]
    fn skips_only_the_blank_optional_sections() {
        let mut t = sort_template();
        t.examples = "  \n ".into();
        t.purpose = "demo".into();
        let text = compile(&t).unwrap().text().to_string();
        assert_eq!(text.split(SECTION_SEPARATOR).count(), 6);
        assert!(!text.contains("Examples:"));
    }

    #[test]
    fn rejects_blank_input() {
        for input in ["", "   ", "\n\t"] {
            let t = Template::new(input);
            assert!(matches!(compile(&t), Err(WorkbenchError::InvalidTemplate(_))));
        }
    }

    #[test]
    fn compile_is_deterministic_in_text_but_unique_in_identity() {
        let a = compile(&sort_template()).unwrap();
        let b = compile(&sort_template()).unwrap();
        assert_eq!(a.text(), b.text());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn picks_article_for_role() {
        let mut t = sort_template();
        t.system_context = SystemContext::Teacher;
        assert!(compile(&t).unwrap().text().starts_with("System: You are a Teacher"));
    }
}
