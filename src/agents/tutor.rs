use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::Value;
use strum::IntoEnumIterator;
use tracing::{error, warn};

use super::{Agent, AgentPolicy, Category, MathAgent, PhysicsAgent};
use crate::errors::Result;
use crate::gateway::LlmGateway;
use crate::models::message::ConversationContext;
use crate::models::response::AgentResponse;
use crate::normalizer::normalize;
use crate::providers::configs::GeminiProviderConfig;
use crate::providers::gemini::GeminiProvider;

const APOLOGY: &str =
    "I apologize, but I encountered an error while processing your question. Please try again.";

/// Coordinator responder: classifies the question, delegates to a registered
/// specialist, and owns every fallback path. `process` is total — the caller
/// always receives an `AgentResponse`.
pub struct TutorAgent {
    gateway: Arc<LlmGateway>,
    specialists: HashMap<Category, Box<dyn Agent>>,
    policy: AgentPolicy,
}

impl TutorAgent {
    /// Construct the full responder tree over the Gemini provider. Fails
    /// fast when the credential is missing or empty; this is the only error
    /// the core surfaces as an error rather than an apology.
    pub fn new(api_key: &str) -> Result<Self> {
        let provider = GeminiProvider::new(GeminiProviderConfig::new(api_key)?)?;
        Ok(Self::with_gateway(
            Arc::new(LlmGateway::new(Box::new(provider))),
            AgentPolicy::default(),
        ))
    }

    /// Build the responder tree over an existing gateway. The single gateway
    /// instance is shared by the router, both specialists, and their tools.
    pub fn with_gateway(gateway: Arc<LlmGateway>, policy: AgentPolicy) -> Self {
        let mut specialists: HashMap<Category, Box<dyn Agent>> = HashMap::new();
        specialists.insert(
            Category::Math,
            Box::new(MathAgent::new(gateway.clone(), policy.clone())),
        );
        specialists.insert(
            Category::Physics,
            Box::new(PhysicsAgent::new(gateway.clone(), policy.clone())),
        );

        Self {
            gateway,
            specialists,
            policy,
        }
    }

    /// Process a question end to end. Never fails: internal errors degrade
    /// to the general path or, at the outermost boundary, to a fixed
    /// apology.
    pub async fn process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> AgentResponse {
        match self.try_process(input, context).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "question processing failed at the outer boundary");
                AgentResponse::new(self.id(), APOLOGY)
            }
        }
    }

    async fn try_process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        let category = self.categorize(input).await?;

        if let Some(specialist) = self.specialists.get(&category) {
            match specialist.process(input, context).await {
                Ok(response) => {
                    return Ok(AgentResponse {
                        agent_id: self.id().to_string(),
                        content: normalize(&response.content),
                        tools_used: response.tools_used,
                        tool_results: response.tool_results,
                        confidence_score: response.confidence_score,
                    });
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "specialist failed, falling back to the general path");
                    let fallback_input = format!(
                        "{input}\n\n(Note: the {category} specialist was unavailable, so answer generally.)"
                    );
                    let content = self.general_response(&fallback_input, context).await?;
                    return Ok(AgentResponse::new(self.id(), normalize(&content))
                        .with_tools(vec!["fallback".to_string()], Default::default())
                        .with_confidence(self.policy.fallback_confidence));
                }
            }
        }

        let content = self.general_response(input, context).await?;
        Ok(AgentResponse::new(self.id(), normalize(&content))
            .with_confidence(self.policy.general_confidence))
    }

    /// Classify the question into exactly one category. Labels that do not
    /// name a known category collapse to the configured fallback.
    async fn categorize(&self, question: &str) -> Result<Category> {
        let categories = Category::iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let prompt = formatdoc! {"
            Analyze the following question and determine which subject category it
            belongs to. Return ONLY ONE of these categories: {categories}

            Question: {question}

            Category:
        "};

        let label = self.gateway.generate_text(&prompt, None).await?;
        let label = label.trim().to_lowercase();
        Ok(Category::from_str(&label).unwrap_or(self.policy.fallback_category))
    }

    /// The general path: no specialist, no tools, just a formatted answer.
    async fn general_response(
        &self,
        question: &str,
        context: Option<&ConversationContext>,
    ) -> Result<String> {
        let mut prompt = formatdoc! {"
            You are a helpful tutor assistant. Please respond to the following
            question in a helpful, educational way.
            Use proper Markdown formatting:
            - Use headings (##) for sections
            - Use bullet or numbered lists for steps
            - Use bold/italic for emphasis
            - For mathematical formulas, use LaTeX inside $$...$$ for block math
              or $...$ for inline math.
            - Use code blocks only for code, not for math.
            If you don't know the answer, say so honestly.

            Question: {question}
        "};

        if let Some(context) = context {
            let turns = context.recent_turns(5, |_| true);
            if !turns.is_empty() {
                prompt.push_str(&format!(
                    "\nConversation history: {}\n",
                    Value::Array(turns)
                ));
            }
        }

        self.gateway.generate_text(&prompt, None).await
    }
}

#[async_trait]
impl Agent for TutorAgent {
    fn id(&self) -> &str {
        "tutor"
    }

    fn name(&self) -> &str {
        "Tutor Agent"
    }

    fn description(&self) -> &str {
        "Main coordinator agent that analyzes queries and delegates to specialist agents"
    }

    async fn process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse> {
        Ok(TutorAgent::process(self, input, context).await)
    }
}
