//! The responder layer: a common `Agent` capability trait, the closed
//! category set used for routing, and the policy knobs the router and
//! specialists share.

pub mod math;
pub mod physics;
pub mod tutor;

use async_trait::async_trait;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::Result;
use crate::models::message::ConversationContext;
use crate::models::response::AgentResponse;

pub use math::MathAgent;
pub use physics::PhysicsAgent;
pub use tutor::TutorAgent;

/// Subject categories a question can be routed to. Classification is total:
/// anything the classifier emits outside this set collapses to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Math,
    Physics,
    General,
}

/// The core responder contract shared by the router and the specialists.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's unique identifier, used as `agent_id` on responses.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// One-line description of the agent's specialty.
    fn description(&self) -> &str;

    /// Process a question, optionally with recent conversation history.
    async fn process(
        &self,
        input: &str,
        context: Option<&ConversationContext>,
    ) -> Result<AgentResponse>;
}

/// Routing and tool-use defaults, kept in one place so a deployment can
/// change them without touching control flow.
#[derive(Debug, Clone)]
pub struct AgentPolicy {
    /// What an ambiguous yes/no tool-need answer means. The default favors
    /// invoking the tool over skipping it.
    pub tool_check_default: bool,
    /// Where unmapped categories and failed specialists route to.
    pub fallback_category: Category,
    /// Advisory confidence for a successful specialist turn.
    pub specialist_confidence: f64,
    /// Advisory confidence for the general path.
    pub general_confidence: f64,
    /// Advisory confidence after a specialist failure forced a fallback.
    pub fallback_confidence: f64,
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self {
            tool_check_default: true,
            fallback_category: Category::General,
            specialist_confidence: 0.9,
            general_confidence: 0.7,
            fallback_confidence: 0.6,
        }
    }
}

/// Interpret a yes/no tool-need answer. Any response containing "YES" counts
/// as yes; only an exact "NO" counts as no; everything else takes the
/// configured default.
pub(crate) fn tool_needed(response: &str, default: bool) -> bool {
    let answer = response.trim().to_uppercase();
    if answer.contains("YES") {
        true
    } else if answer == "NO" {
        false
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_category_round_trip() {
        assert_eq!(Category::from_str("math").unwrap(), Category::Math);
        assert_eq!(Category::from_str("physics").unwrap(), Category::Physics);
        assert!(Category::from_str("chemistry").is_err());
        assert_eq!(Category::Physics.to_string(), "physics");
    }

    #[test]
    fn test_tool_needed_parsing() {
        assert!(tool_needed("YES", true));
        assert!(tool_needed("yes, it does", true));
        assert!(!tool_needed("NO", true));
        assert!(!tool_needed("  no  ", true));
        // Ambiguous answers take the default.
        assert!(tool_needed("maybe", true));
        assert!(!tool_needed("maybe", false));
        // "NONE" is not an exact NO.
        assert!(tool_needed("NONE", true));
    }
}
