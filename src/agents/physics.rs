use std::sync::Arc;

use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::{Map, Value};
use tracing::debug;

use super::{tool_needed, Agent, AgentPolicy};
use crate::errors::Result;
use crate::gateway::LlmGateway;
use crate::models::message::{ConversationContext, Sender};
use crate::models::response::AgentResponse;
use crate::tools::{Formula, FormulaLookup};

/// Specialist responder for physics questions, backed by the formula lookup
/// tool.
pub struct PhysicsAgent {
    gateway: Arc<LlmGateway>,
    formula_lookup: FormulaLookup,
    policy: AgentPolicy,
}

impl PhysicsAgent {
    pub fn new(gateway: Arc<LlmGateway>, policy: AgentPolicy) -> Self {
        Self {
            formula_lookup: FormulaLookup::new(gateway.clone()),
            gateway,
            policy,
        }
    }

    async fn needs_formula(&self, question: &str) -> Result<bool> {
        let prompt = formatdoc! {"
            Does the following physics question require a physics formula or law?
            Answer with only YES or NO.

            Question: {question}
        "};
        let response = self.gateway.generate_text(&prompt, None).await?;
        Ok(tool_needed(&response, self.policy.tool_check_default))
    }

    fn explanation_prompt(
        &self,
        question: &str,
        formula: Option<&Formula>,
        context: Option<&ConversationContext>,
    ) -> String {
        let mut prompt = formatdoc! {"
            You are a physics tutor specializing in all areas of physics from
            mechanics to quantum physics.
            Please provide a clear explanation for the following physics question.

            Question: {question}
        "};

        if let Some(formula) = formula {
            let info = serde_json::to_string(formula).unwrap_or_default();
            prompt.push_str(&format!("\nRelevant formula information: {info}\n"));
        }

        if let Some(context) = context {
            let turns = context.recent_turns(5, |s| matches!(s, Sender::User | Sender::Physics));
            if !turns.is_empty() {
                prompt.push_str(&format!(
                    "\nConversation history: {}\n",
                    Value::Array(turns)
                ));
            }
        }

        prompt.push_str(&formatdoc! {r"

            Provide a clear explanation of the physics concepts involved and a
            step-by-step approach to solving this problem.

            FORMAT YOUR RESPONSE CAREFULLY FOLLOWING THESE RULES:

            1. ORGANIZATION:
               - Begin with a clear explanation of the relevant physics concepts
               - List and explain all relevant formulas with their variables
               - Outline a step-by-step approach to solving the problem
               - If calculable, show the numerical solution
               - End with the physical interpretation of the result

            2. MATH AND PHYSICS NOTATION:
               - For all mathematical expressions, use LaTeX formatting
               - Use $...$ for inline formulas (e.g., $F = ma$)
               - Use $$...$$ for display formulas, with blank lines before and after
               - For vectors, use \vec{{F}} notation
               - For units, write them as: $\text{{m/s}}^2$ or $\text{{kg}} \cdot \text{{m/s}}^2$
               - Use proper subscripts and superscripts: $v_{{initial}}$ not $v_initial$

            3. FORMATTING:
               - Use ## for main section headings with a space after ##
               - Use ### for subsections with a space after ###
               - Use bullet points for lists of concepts
               - Use numbered steps for solution procedures
               - Use bold for important concepts and results

            Be educational and helpful, ensuring the physics principles are
            clearly understood.
        "});

        prompt
    }
}

#[async_trait]
impl Agent for PhysicsAgent {
    fn id(&self) -> &str {
        "physics"
    }

    fn name(&self) -> &str {
        "Physics Agent"
    }

    fn description(&self) -> &str {
        "Specialist agent for physics questions and problems"
    }

    async fn process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        let mut tools_used = Vec::new();
        let mut tool_results = Map::new();

        let formula = if self.needs_formula(input).await? {
            match self.formula_lookup.lookup_formula(input).await {
                Some(formula) => {
                    tools_used.push("formulaLookup".to_string());
                    tool_results.insert(
                        "formulaLookup".to_string(),
                        serde_json::to_value(&formula)?,
                    );
                    Some(formula)
                }
                None => {
                    debug!("no formula recognized, continuing without one");
                    None
                }
            }
        } else {
            None
        };

        let prompt = self.explanation_prompt(input, formula.as_ref(), context);
        let content = self.gateway.generate_text(&prompt, None).await?;

        Ok(AgentResponse::new(self.id(), content)
            .with_tools(tools_used, tool_results)
            .with_confidence(self.policy.specialist_confidence))
    }
}
