//! Extracts arithmetic expressions from natural language and evaluates them
//! with a restricted parser. All internal failures degrade to "no result";
//! nothing escapes this module as an error.

use std::sync::Arc;

use indoc::formatdoc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::gateway::LlmGateway;

lazy_static! {
    static ref COMMAND_EXPRESSION: Regex =
        Regex::new(r"(?i)(?:calculate|compute|evaluate|what\s+is|find|solve)\s+([0-9\s+\-*/^().]+)")
            .unwrap();
    static ref NUMBER_OPERATOR_NUMBER: Regex =
        Regex::new(r"\d+(?:\.\d+)?\s*[+\-*/^]\s*\d+(?:\.\d+)?").unwrap();
    static ref EQUATION: Regex =
        Regex::new(r"(\d+(?:\.\d+)?(?:\s*[+\-*/^]\s*\d+(?:\.\d+)?)+)\s*=\s*\d+").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
    static ref HAS_OPERATOR: Regex = Regex::new(r"[+\-*/^]").unwrap();
    static ref HAS_DIGIT: Regex = Regex::new(r"\d").unwrap();
    static ref VALID_EXPRESSION: Regex = Regex::new(r"^[0-9.+\-*/^()\s]+$").unwrap();
}

pub struct Calculator {
    gateway: Arc<LlmGateway>,
}

impl Calculator {
    pub fn new(gateway: Arc<LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Extract and evaluate a numeric expression from natural language.
    /// Returns the finite result, or `None` when no usable expression is
    /// found or evaluation fails.
    pub async fn calculate(&self, input: &str) -> Option<f64> {
        let expression = match extract_expression_via_patterns(input) {
            Some(expr) => Some(expr),
            None => self.extract_via_llm(input).await,
        }?;

        let result = evaluate(&expression);
        if result.is_none() {
            debug!(%expression, "expression did not evaluate to a finite number");
        }
        result
    }

    /// Last-resort extraction: ask the model for the bare expression, with a
    /// NONE sentinel when the text contains nothing calculable.
    async fn extract_via_llm(&self, text: &str) -> Option<String> {
        let prompt = formatdoc! {r#"
            Extract the mathematical expression from the following text for calculation.
            Return ONLY the expression, with no explanation or additional text.
            For example, "What is 5 + 3?" should return "5 + 3".
            If there's no calculable expression, return "NONE".

            Text: {text}
        "#};

        let response = match self.gateway.generate_text(&prompt, None).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "LLM expression extraction failed");
                return None;
            }
        };

        let candidate = response.trim();
        if candidate == "NONE" || candidate.len() < 2 {
            return None;
        }
        if HAS_DIGIT.is_match(candidate) && HAS_OPERATOR.is_match(candidate) {
            Some(candidate.to_string())
        } else {
            None
        }
    }
}

/// Pattern-based expression extraction, first success wins: command phrasing,
/// a bare number-operator-number fragment, the left side of an equation, then
/// the span bounded by the first and last numeric tokens.
pub fn extract_expression_via_patterns(text: &str) -> Option<String> {
    if let Some(caps) = COMMAND_EXPRESSION.captures(text) {
        let candidate = caps[1].trim();
        if candidate.len() > 1 && HAS_DIGIT.is_match(candidate) && HAS_OPERATOR.is_match(candidate)
        {
            return Some(candidate.to_string());
        }
    }

    if let Some(caps) = EQUATION.captures(text) {
        return Some(caps[1].trim().to_string());
    }

    if let Some(m) = NUMBER_OPERATOR_NUMBER.find(text) {
        return Some(m.as_str().trim().to_string());
    }

    // Heuristic span: everything between the first and last numeric tokens,
    // kept only if an operator sits inside it.
    let numbers: Vec<_> = NUMBER.find_iter(text).collect();
    if numbers.len() >= 2 {
        let start = numbers[0].start();
        let end = numbers[numbers.len() - 1].end();
        let segment = &text[start..end];
        if HAS_OPERATOR.is_match(segment) {
            return Some(segment.trim().to_string());
        }
    }

    None
}

/// Evaluate an arithmetic expression restricted to digits, `+ - * / ^ ( ) .`
/// and whitespace. Alphabetic characters are stripped first. Division by
/// zero, NaN, and infinities all yield `None`.
pub fn evaluate(expression: &str) -> Option<f64> {
    let sanitized: String = expression.chars().filter(|c| !c.is_alphabetic()).collect();
    let sanitized = sanitized.trim();
    if sanitized.is_empty() || !VALID_EXPRESSION.is_match(sanitized) {
        return None;
    }

    let tokens = tokenize(sanitized)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.parse_expression()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    value.is_finite().then_some(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Number(literal.parse().ok()?));
            }
            _ => return None,
        }
    }

    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn parse_expression(&mut self) -> Option<f64> {
        let mut value = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    value += self.parse_term()?;
                }
                Token::Minus => {
                    self.advance();
                    value -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_term(&mut self) -> Option<f64> {
        let mut value = self.parse_factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    value *= self.parse_factor()?;
                }
                Token::Slash => {
                    self.advance();
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return None;
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_factor(&mut self) -> Option<f64> {
        if self.peek() == Some(Token::Minus) {
            self.advance();
            return Some(-self.parse_factor()?);
        }
        let base = self.parse_atom()?;
        // `^` is right-associative: 2^3^2 is 2^(3^2).
        if self.peek() == Some(Token::Caret) {
            self.advance();
            let exponent = self.parse_factor()?;
            return Some(base.powf(exponent));
        }
        Some(base)
    }

    fn parse_atom(&mut self) -> Option<f64> {
        match self.advance()? {
            Token::Number(n) => Some(n),
            Token::Open => {
                let value = self.parse_expression()?;
                if self.advance()? != Token::Close {
                    return None;
                }
                Some(value)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    #[test]
    fn test_extract_command_phrasing() {
        assert_eq!(
            extract_expression_via_patterns("what is 5 + 3").as_deref(),
            Some("5 + 3")
        );
        assert_eq!(
            extract_expression_via_patterns("Please calculate 12 * (4 - 2)").as_deref(),
            Some("12 * (4 - 2)")
        );
    }

    #[test]
    fn test_extract_bare_fragment() {
        assert_eq!(
            extract_expression_via_patterns("I think 7*8 comes up a lot").as_deref(),
            Some("7*8")
        );
    }

    #[test]
    fn test_extract_equation_left_side() {
        assert_eq!(
            extract_expression_via_patterns("is it true that 2+3 = 6?").as_deref(),
            Some("2+3")
        );
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_expression_via_patterns("no numbers here"), None);
        assert_eq!(extract_expression_via_patterns("the year 1999"), None);
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(evaluate("2 + 3 * 4"), Some(14.0));
        assert_eq!(evaluate("(2 + 3) * 4"), Some(20.0));
        assert_eq!(evaluate("2 ^ 3 ^ 2"), Some(512.0));
        assert_eq!(evaluate("-3 + 5"), Some(2.0));
        assert_eq!(evaluate("10 / 4"), Some(2.5));
    }

    #[test]
    fn test_evaluate_division_by_zero() {
        assert_eq!(evaluate("2/0"), None);
        assert_eq!(evaluate("1 / (3 - 3)"), None);
    }

    #[test]
    fn test_evaluate_strips_alphabetic() {
        assert_eq!(evaluate("2x + 3"), Some(5.0));
    }

    #[test]
    fn test_evaluate_rejects_garbage() {
        assert_eq!(evaluate(""), None);
        assert_eq!(evaluate("+ *"), None);
        assert_eq!(evaluate("(2 + 3"), None);
    }

    #[tokio::test]
    async fn test_calculate_pattern_path_no_gateway_call() {
        // An always-failing provider proves the pattern tier never touches
        // the gateway.
        let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::always_failing())));
        let calculator = Calculator::new(gateway);
        assert_eq!(calculator.calculate("what is 5 + 3").await, Some(8.0));
    }

    #[tokio::test]
    async fn test_calculate_llm_extraction_path() {
        let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::new(vec!["6 * 7"]))));
        let calculator = Calculator::new(gateway);
        assert_eq!(
            calculator.calculate("multiply six by seven for me").await,
            Some(42.0)
        );
    }

    #[tokio::test]
    async fn test_calculate_none_sentinel() {
        let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::new(vec!["NONE"]))));
        let calculator = Calculator::new(gateway);
        assert_eq!(calculator.calculate("tell me about cats").await, None);
    }

    #[tokio::test]
    async fn test_calculate_gateway_failure_is_soft() {
        let gateway = Arc::new(LlmGateway::new(Box::new(MockProvider::always_failing())));
        let calculator = Calculator::new(gateway);
        assert_eq!(calculator.calculate("tell me about cats").await, None);
    }
}
