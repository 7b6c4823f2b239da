//! Resolves a physics concept to a structured formula: static catalog first
//! (exact, then fuzzy), model synthesis as the last resort. Like the
//! calculator, every failure degrades to "no result".

use std::collections::BTreeMap;
use std::sync::Arc;

use indoc::formatdoc;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::TutorError;
use crate::gateway::LlmGateway;

/// A physical law or formula, either a static catalog entry or a
/// model-synthesized equivalent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    pub formula: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn entry(
    name: &str,
    formula: &str,
    variables: &[(&str, &str)],
    units: &str,
    field: &str,
    description: &str,
) -> Formula {
    Formula {
        name: name.to_string(),
        formula: formula.to_string(),
        variables: variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        units: Some(units.to_string()),
        field: Some(field.to_string()),
        description: Some(description.to_string()),
    }
}

lazy_static! {
    /// Built-in formula catalog. Populated once at startup, immutable
    /// process-wide.
    static ref FORMULA_CATALOG: Vec<Formula> = vec![
        entry(
            "Newton's Second Law",
            "F = ma",
            &[("F", "Force"), ("m", "Mass"), ("a", "Acceleration")],
            "Newtons (N)",
            "Classical Mechanics",
            "The rate of change of momentum of a body is directly proportional to the force applied.",
        ),
        entry(
            "Gravitational Potential Energy",
            "U = mgh",
            &[
                ("U", "Potential Energy"),
                ("m", "Mass"),
                ("g", "Gravitational Acceleration"),
                ("h", "Height"),
            ],
            "Joules (J)",
            "Classical Mechanics",
            "Energy possessed by an object due to its position in a gravitational field.",
        ),
        entry(
            "Kinetic Energy",
            "KE = (1/2)mv²",
            &[("KE", "Kinetic Energy"), ("m", "Mass"), ("v", "Velocity")],
            "Joules (J)",
            "Classical Mechanics",
            "Energy possessed by an object due to its motion.",
        ),
        entry(
            "Einstein's Mass-Energy Equivalence",
            "E = mc²",
            &[("E", "Energy"), ("m", "Mass"), ("c", "Speed of Light")],
            "Joules (J)",
            "Relativistic Mechanics",
            "Mass and energy are equivalent and can be converted into each other.",
        ),
        entry(
            "Coulomb's Law",
            "F = k(q₁q₂)/r²",
            &[
                ("F", "Electrostatic Force"),
                ("k", "Coulomb's Constant"),
                ("q₁", "First Charge"),
                ("q₂", "Second Charge"),
                ("r", "Distance between Charges"),
            ],
            "Newtons (N)",
            "Electrostatics",
            "The magnitude of the electric force between two charges is proportional to the product of the charges and inversely proportional to the square of the distance between them.",
        ),
    ];
}

pub struct FormulaLookup {
    gateway: Arc<LlmGateway>,
}

impl FormulaLookup {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve the physics concept named in `query` to a formula, or `None`
    /// when no concept is recognized.
    pub async fn lookup_formula(&self, query: &str) -> Option<Formula> {
        let concept = self.extract_concept(query).await?;

        if let Some(found) = catalog_lookup(&concept) {
            return Some(found.clone());
        }

        self.synthesize(&concept).await
    }

    async fn extract_concept(&self, query: &str) -> Option<String> {
        let prompt = formatdoc! {r#"
            Extract the main physics concept, law, or formula that's being asked
            about in this question. Return ONLY the name of the concept/law/formula,
            with no explanation or additional text.
            For example, "What is Newton's Second Law and how is it applied?" should
            return "Newton's Second Law".
            If there's no specific physics concept, return "NONE".

            Question: {query}
        "#};

        let response = match self.gateway.generate_text(&prompt, None).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "concept extraction failed");
                return None;
            }
        };

        let concept = response.trim();
        if concept.is_empty() || concept == "NONE" {
            None
        } else {
            Some(concept.to_string())
        }
    }

    /// Ask the model for a structured formula entry. A `null` or error-object
    /// sentinel means the concept is not recognized; a parse failure after
    /// retries falls back to one free-text request wrapped into a minimal
    /// formula.
    async fn synthesize(&self, concept: &str) -> Option<Formula> {
        let prompt = formatdoc! {r#"
            Generate a detailed physics formula entry for the concept: "{concept}"

            Return the result as a JSON object with the following fields:
            - name: The name of the formula or law
            - formula: The mathematical expression
            - variables: An object with variable names as keys and their descriptions as values
            - units: The units of measurement (if applicable)
            - field: The branch of physics this formula belongs to
            - description: A brief explanation of what the formula describes

            Format the JSON properly. If this isn't a recognizable physics concept, return null.
        "#};

        match self
            .gateway
            .generate_structured::<Value>(&prompt, None, 1)
            .await
        {
            Ok(Value::Null) => None,
            Ok(value) if value.get("error").is_some() => None,
            Ok(value) => match serde_json::from_value::<Formula>(value) {
                Ok(formula) => Some(formula),
                Err(e) => {
                    debug!(error = %e, "synthesized entry had the wrong shape");
                    self.free_text_fallback(concept).await
                }
            },
            Err(TutorError::StructuredParse { .. }) => self.free_text_fallback(concept).await,
            Err(e) => {
                debug!(error = %e, "formula synthesis failed");
                None
            }
        }
    }

    async fn free_text_fallback(&self, concept: &str) -> Option<Formula> {
        let prompt = formatdoc! {"
            Briefly describe the physics concept \"{concept}\" and state its formula
            if it has one.
        "};

        let raw = self.gateway.generate_text(&prompt, None).await.ok()?;
        Some(Formula {
            name: concept.to_string(),
            formula: "N/A".to_string(),
            variables: BTreeMap::new(),
            units: None,
            field: None,
            description: Some(raw),
        })
    }
}

/// Exact match on name or substring match on description, then word-overlap
/// fuzzy match against both.
fn catalog_lookup(concept: &str) -> Option<&'static Formula> {
    let needle = concept.to_lowercase();

    let exact = FORMULA_CATALOG.iter().find(|formula| {
        formula.name.to_lowercase() == needle
            || formula
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    });
    if exact.is_some() {
        return exact;
    }

    FORMULA_CATALOG.iter().find(|formula| {
        similarity(concept, &formula.name) > 0.7
            || formula
                .description
                .as_ref()
                .is_some_and(|d| similarity(concept, d) > 0.6)
    })
}

/// Word-overlap similarity: words longer than three characters shared by both
/// strings, divided by the larger word count.
fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: Vec<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();

    let matches = words_a
        .iter()
        .filter(|word| word.len() > 3 && words_b.contains(word))
        .count();

    let total = words_a.len().max(words_b.len());
    if total == 0 {
        0.0
    } else {
        matches as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    fn gateway_with(responses: Vec<&str>) -> Arc<LlmGateway> {
        Arc::new(LlmGateway::new(Box::new(MockProvider::new(responses))))
    }

    #[test]
    fn test_similarity() {
        assert!(similarity("Newton's Second Law", "Newton's Second Law") > 0.7);
        assert!(similarity("second law", "Newton's Second Law") < 0.7);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_catalog_exact_name() {
        let found = catalog_lookup("newton's second law").unwrap();
        assert_eq!(found.formula, "F = ma");
    }

    #[test]
    fn test_catalog_description_substring() {
        let found = catalog_lookup("momentum of a body").unwrap();
        assert_eq!(found.name, "Newton's Second Law");
    }

    #[test]
    fn test_catalog_fuzzy_name() {
        let found = catalog_lookup("einstein's mass-energy equivalence principle").unwrap();
        assert_eq!(found.formula, "E = mc²");
    }

    #[test]
    fn test_catalog_miss() {
        assert!(catalog_lookup("the ideal gas law").is_none());
    }

    #[tokio::test]
    async fn test_lookup_catalog_entry_skips_synthesis() {
        // One canned response for concept extraction; a second call would
        // fail, proving the catalog short-circuits synthesis.
        let gateway = gateway_with(vec!["Newton's Second Law"]);
        let lookup = FormulaLookup::new(gateway);

        let formula = lookup
            .lookup_formula("What is Newton's Second Law?")
            .await
            .unwrap();
        assert_eq!(formula.formula, "F = ma");
        assert_eq!(formula.units.as_deref(), Some("Newtons (N)"));
    }

    #[tokio::test]
    async fn test_lookup_none_sentinel() {
        let gateway = gateway_with(vec!["NONE"]);
        let lookup = FormulaLookup::new(gateway);
        assert!(lookup.lookup_formula("what's for dinner?").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_synthesized_entry() {
        let gateway = gateway_with(vec![
            "Hooke's Law",
            r#"{"name": "Hooke's Law", "formula": "F = -kx", "variables": {"F": "Restoring force", "k": "Spring constant", "x": "Displacement"}, "field": "Classical Mechanics"}"#,
        ]);
        let lookup = FormulaLookup::new(gateway);

        let formula = lookup
            .lookup_formula("how do springs work?")
            .await
            .unwrap();
        assert_eq!(formula.name, "Hooke's Law");
        assert_eq!(formula.formula, "F = -kx");
        assert!(formula.units.is_none());
    }

    #[tokio::test]
    async fn test_lookup_null_sentinel_means_unrecognized() {
        let gateway = gateway_with(vec!["Flubber Dynamics", "null"]);
        let lookup = FormulaLookup::new(gateway);
        assert!(lookup.lookup_formula("explain flubber").await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_free_text_fallback() {
        // Structured synthesis stays unparseable through the retry, then the
        // free-text request succeeds.
        let gateway = gateway_with(vec![
            "Terminal Velocity",
            "it depends on drag",
            "honestly still not json",
            "Terminal velocity is reached when drag equals gravity.",
        ]);
        let lookup = FormulaLookup::new(gateway);

        let formula = lookup
            .lookup_formula("what is terminal velocity?")
            .await
            .unwrap();
        assert_eq!(formula.formula, "N/A");
        assert_eq!(formula.name, "Terminal Velocity");
        assert!(formula
            .description
            .as_deref()
            .unwrap()
            .contains("drag equals gravity"));
    }
}
