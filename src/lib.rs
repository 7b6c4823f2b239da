pub mod agents;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod normalizer;
pub mod providers;
pub mod tools;

pub use agents::{Agent, AgentPolicy, Category, TutorAgent};
pub use errors::{Result, TutorError};
pub use gateway::LlmGateway;
pub use models::message::{ConversationContext, Message, Sender};
pub use models::response::AgentResponse;
