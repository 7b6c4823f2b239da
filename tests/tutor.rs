use std::sync::Arc;

use tutor::agents::AgentPolicy;
use tutor::errors::TutorError;
use tutor::providers::mock::MockProvider;
use tutor::{AgentResponse, ConversationContext, LlmGateway, Message, Sender, TutorAgent};

fn tutor_with(responses: Vec<&str>) -> TutorAgent {
    let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::new(responses))));
    TutorAgent::with_gateway(gateway, AgentPolicy::default())
}

fn assert_well_formed(response: &AgentResponse) {
    assert_eq!(response.agent_id, "tutor");
    assert!(!response.content.is_empty());
}

#[tokio::test]
async fn process_always_resolves() {
    // Classifier garbage, specialist failure, total gateway outage: every
    // shape of failure still produces a response.
    let cases: Vec<TutorAgent> = vec![
        tutor_with(vec!["??unknown??", "fine"]),
        tutor_with(vec!["math"]),
        tutor_with(vec![]),
    ];

    for tutor in cases {
        let response = tutor.process("what is 5 + 3", None).await;
        assert_well_formed(&response);
    }
}

#[tokio::test]
async fn general_path_for_unrecognized_category() {
    let tutor = tutor_with(vec!["history", "The Treaty of Westphalia..."]);
    let response = tutor.process("when was the Peace of Westphalia?", None).await;

    assert_well_formed(&response);
    assert_eq!(response.confidence_score, Some(0.7));
    assert!(response.tools_used.is_none());
}

#[tokio::test]
async fn math_turn_carries_tool_payload() {
    let tutor = tutor_with(vec!["math", "YES", "You get $8$."]);
    let response = tutor.process("calculate 5 + 3", None).await;

    assert_well_formed(&response);
    assert_eq!(
        response.tools_used.as_deref(),
        Some(&["calculator".to_string()][..])
    );
    let results = response.tool_results.expect("calculator payload");
    assert_eq!(results["calculator"]["result"], 8.0);
    assert_eq!(response.confidence_score, Some(0.9));
}

#[tokio::test]
async fn physics_turn_returns_catalog_formula() {
    let tutor = tutor_with(vec![
        "physics",
        "YES",
        "Newton's Second Law",
        "It states that force is mass times acceleration.",
    ]);
    let response = tutor.process("explain Newton's Second Law", None).await;

    assert_well_formed(&response);
    let results = response.tool_results.expect("formula payload");
    assert_eq!(results["formulaLookup"]["formula"], "F = ma");
    assert_eq!(results["formulaLookup"]["name"], "Newton's Second Law");
}

#[tokio::test]
async fn specialist_failure_falls_back_with_tag() {
    let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::with_results(vec![
        Ok("physics".to_string()),
        Err(TutorError::Gateway("upstream timeout".to_string())),
        Ok("A general take on the question.".to_string()),
    ]))));
    let tutor = TutorAgent::with_gateway(gateway, AgentPolicy::default());

    let response = tutor.process("why is the sky blue?", None).await;
    assert_well_formed(&response);
    assert_eq!(
        response.tools_used.as_deref(),
        Some(&["fallback".to_string()][..])
    );
    assert_eq!(response.confidence_score, Some(0.6));
}

#[tokio::test]
async fn responder_output_is_normalized() {
    let tutor = tutor_with(vec!["general", "##Answer\nUse x = y+z here."]);
    let response = tutor.process("how do I combine them?", None).await;

    assert_eq!(response.content, "## Answer\n\nUse $x = y+z$ here.");
}

#[tokio::test]
async fn history_is_accepted_without_side_effects() {
    let history = vec![
        Message::user("earlier question"),
        Message::agent(Sender::Math, "earlier answer"),
    ];
    let context = ConversationContext::new(history.clone());

    let tutor = tutor_with(vec!["general", "All good."]);
    let response = tutor.process("follow-up question", Some(&context)).await;

    assert_well_formed(&response);
    // The context is read-only to the core.
    assert_eq!(context.history, history);
}
