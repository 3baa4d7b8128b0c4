//! Report rendering with Handlebars.
//!
//! Custom helpers:
//! - percent: format a `[0, 1]` number as a percentage (0.85 -> "85%")
//! - inc: 1-based position from `@index`

use dramaturg_core::{DiagnosticIssue, Recommendation};
use handlebars::{handlebars_helper, Handlebars, RenderError, TemplateError};
use serde::{Deserialize, Serialize};

use crate::model::{Frame, Motif};

const MARKDOWN: &str = "markdown";
const PLAIN: &str = "plain";

const MARKDOWN_TEMPLATE: &str = r#"# Script Analysis Report

**Genre:** {{frame.genre}} | **Tone:** {{frame.tone}} | **Protagonist:** {{frame.protagonist_label}}

> {{frame.thesis}}
{{#if frame.logline}}

**Logline:** {{frame.logline}}
{{/if}}

## Stations

| Station | Finding | Confidence |
|---|---|---|
{{#each stations}}
| {{id}} {{name}} | {{summary}} | {{percent confidence}} |
{{/each}}

## Structure

{{network.nodes}} nodes, {{network.edges}} relationships, {{network.conflicts}} conflicts ({{network.resolved}} resolved). Density {{percent network.density}}, structural efficiency {{percent network.efficiency}}.

## Dynamics

Tension follows a {{arc_shape}} arc.
{{#if motifs}}
Motifs:
{{#each motifs}}
- {{name}} ({{percent strength}})
{{/each}}
{{else}}
No recurring motif was detected.
{{/if}}

## Diagnostics

{{#if diagnostics}}
{{#each diagnostics}}
- **{{id}}** [{{severity}}] {{description}}{{#if location}} ({{location}}){{/if}}
{{/each}}
{{else}}
No structural anomalies found.
{{/if}}

## Treatment Plan

{{#if plan}}
{{#each plan}}
{{inc @index}}. **{{title}}** ({{priority}} priority, {{category}}, {{timeline}}): {{description}}
{{/each}}
{{else}}
Nothing to treat.
{{/if}}

## Uncertainty and Limitations

Analysis confidence: {{percent confidence}} (mean of the six analysis stations).
{{#each limitations}}
- {{station}} {{aspect}} ({{kind}}{{#if reducible}}, reducible with more material{{/if}}): {{note}}
{{/each}}
{{#each alternates}}
- Alternative reading: {{this}}
{{/each}}
"#;

const PLAIN_TEMPLATE: &str = r#"SCRIPT ANALYSIS REPORT

Genre: {{frame.genre}}
Tone: {{frame.tone}}
Protagonist: {{frame.protagonist_label}}
Thesis: {{frame.thesis}}
{{#if frame.logline}}
Logline: {{frame.logline}}
{{/if}}

STATIONS
{{#each stations}}
  {{id}} {{name}}: {{summary}} [{{percent confidence}}]
{{/each}}

STRUCTURE
  {{network.nodes}} nodes, {{network.edges}} relationships, {{network.conflicts}} conflicts ({{network.resolved}} resolved)
  Tension arc: {{arc_shape}}

DIAGNOSTICS
{{#each diagnostics}}
  {{id}} [{{severity}}] {{description}}
{{else}}
  No structural anomalies found.
{{/each}}

TREATMENT PLAN
{{#each plan}}
  {{inc @index}}. {{title}} ({{priority}}): {{description}}
{{else}}
  Nothing to treat.
{{/each}}

UNCERTAINTY
  Analysis confidence: {{percent confidence}}
{{#each limitations}}
  - {{station}} {{aspect}} ({{kind}}): {{note}}
{{/each}}
"#;

handlebars_helper!(percent: |value: f64| format!("{}%", (value * 100.0).round() as i64));
handlebars_helper!(inc: |index: u64| index + 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Plain,
}

impl ReportFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            MARKDOWN | "md" => Some(ReportFormat::Markdown),
            PLAIN | "text" | "txt" => Some(ReportFormat::Plain),
            _ => None,
        }
    }

    fn template_name(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => MARKDOWN,
            ReportFormat::Plain => PLAIN,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StationLine {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSummary {
    pub nodes: usize,
    pub edges: usize,
    pub conflicts: usize,
    pub resolved: usize,
    pub density: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Limitation {
    pub station: String,
    pub aspect: String,
    pub kind: String,
    pub reducible: bool,
    pub note: String,
}

/// Everything a report template can reference
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub frame: Frame,
    pub stations: Vec<StationLine>,
    pub network: NetworkSummary,
    pub arc_shape: String,
    pub motifs: Vec<Motif>,
    pub diagnostics: Vec<DiagnosticIssue>,
    /// Recommendations in treatment-plan order
    pub plan: Vec<Recommendation>,
    pub confidence: f64,
    pub limitations: Vec<Limitation>,
    pub alternates: Vec<String>,
}

/// Compiled report templates with helpers registered
pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("percent", Box::new(percent));
        handlebars.register_helper("inc", Box::new(inc));
        handlebars.register_template_string(MARKDOWN, MARKDOWN_TEMPLATE)?;
        handlebars.register_template_string(PLAIN, PLAIN_TEMPLATE)?;
        Ok(Self { handlebars })
    }

    pub fn render(&self, format: ReportFormat, data: &ReportData) -> Result<String, RenderError> {
        self.handlebars.render(format.template_name(), data)
    }
}
