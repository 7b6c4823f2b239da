use std::sync::Arc;

use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{tool_needed, Agent, AgentPolicy};
use crate::errors::Result;
use crate::gateway::LlmGateway;
use crate::models::message::{ConversationContext, Sender};
use crate::models::response::AgentResponse;
use crate::tools::Calculator;

/// Specialist responder for mathematics questions, backed by the calculator
/// tool.
pub struct MathAgent {
    gateway: Arc<LlmGateway>,
    calculator: Calculator,
    policy: AgentPolicy,
}

impl MathAgent {
    pub fn new(gateway: Arc<LlmGateway>, policy: AgentPolicy) -> Self {
        Self {
            calculator: Calculator::new(gateway.clone()),
            gateway,
            policy,
        }
    }

    /// Strict yes/no check for whether the question needs numeric work.
    async fn needs_calculation(&self, question: &str) -> Result<bool> {
        let prompt = formatdoc! {"
            Does the following math question require numerical calculation?
            Answer with only YES or NO.

            Question: {question}
        "};
        let response = self.gateway.generate_text(&prompt, None).await?;
        Ok(tool_needed(&response, self.policy.tool_check_default))
    }

    fn explanation_prompt(
        &self,
        question: &str,
        calculation: Option<f64>,
        context: Option<&ConversationContext>,
    ) -> String {
        let mut prompt = formatdoc! {"
            You are a mathematics tutor specializing in all areas of mathematics
            from basic arithmetic to advanced calculus.
            Please provide a clear, step-by-step explanation for the following
            math question.

            Question: {question}
        "};

        if let Some(result) = calculation {
            prompt.push_str(&format!(
                "\nThe numerical calculation result is: {result}\n"
            ));
        }

        if let Some(context) = context {
            let turns = context.recent_turns(5, |s| matches!(s, Sender::User | Sender::Math));
            if !turns.is_empty() {
                prompt.push_str(&format!(
                    "\nConversation history: {}\n",
                    Value::Array(turns)
                ));
            }
        }

        prompt.push_str(&formatdoc! {r"

            Provide a clear explanation. If appropriate, include a step-by-step
            solution. Be educational and helpful.

            Format all mathematical expressions with LaTeX:
            - Use $...$ for inline math
            - Use $$...$$ for block/display math
            - Always use proper LaTeX notation (e.g., \frac{{numerator}}{{denominator}}, \sqrt{{x}})
            - Ensure variables are in italics and functions are upright
            - Present step-by-step solutions with Markdown formatting
        "});

        prompt
    }
}

#[async_trait]
impl Agent for MathAgent {
    fn id(&self) -> &str {
        "math"
    }

    fn name(&self) -> &str {
        "Math Agent"
    }

    fn description(&self) -> &str {
        "Specialist agent for mathematics questions"
    }

    async fn process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        let mut tools_used = Vec::new();
        let mut tool_results = Map::new();

        // A tool miss is soft: the turn continues without enrichment.
        let calculation = if self.needs_calculation(input).await? {
            match self.calculator.calculate(input).await {
                Some(result) => {
                    tools_used.push("calculator".to_string());
                    tool_results.insert("calculator".to_string(), json!({ "result": result }));
                    Some(result)
                }
                None => {
                    debug!("calculator produced no result, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let prompt = self.explanation_prompt(input, calculation, context);
        let content = self.gateway.generate_text(&prompt, None).await?;

        Ok(AgentResponse::new(self.id(), content)
            .with_tools(tools_used, tool_results)
            .with_confidence(self.policy.specialist_confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TutorError;
    use crate::providers::mock::MockProvider;

    fn agent_with(responses: Vec<&str>) -> MathAgent {
        let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::new(responses))));
        MathAgent::new(gateway, AgentPolicy::default())
    }

    #[tokio::test]
    async fn test_process_with_calculation() -> Result<()> {
        // YES to the tool check, then the explanation. The expression comes
        // from pattern extraction, so no extra gateway call.
        let agent = agent_with(vec!["YES", "5 + 3 equals 8 because..."]);

        let response = agent.process("what is 5 + 3", None).await?;
        assert_eq!(response.agent_id, "math");
        assert_eq!(response.tools_used.as_deref(), Some(&["calculator".to_string()][..]));
        let results = response.tool_results.unwrap();
        assert_eq!(results["calculator"]["result"], 8.0);
        assert_eq!(response.confidence_score, Some(0.9));
        Ok(())
    }

    #[tokio::test]
    async fn test_process_without_calculation() -> Result<()> {
        let agent = agent_with(vec!["NO", "A prime number is..."]);

        let response = agent.process("what is a prime number?", None).await?;
        assert!(response.tools_used.is_none());
        assert!(response.tool_results.is_none());
        assert_eq!(response.content, "A prime number is...");
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_miss_is_soft() -> Result<()> {
        // YES, then the LLM extraction returns NONE, then the explanation.
        let agent = agent_with(vec!["YES", "NONE", "Here is how to think about it..."]);

        let response = agent.process("reason about numbers abstractly", None).await?;
        assert!(response.tools_used.is_none());
        assert_eq!(response.content, "Here is how to think about it...");
        Ok(())
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let agent = agent_with(vec![]);
        let result = agent.process("what is 5 + 3", None).await;
        assert!(matches!(result, Err(TutorError::Gateway(_))));
    }
}
