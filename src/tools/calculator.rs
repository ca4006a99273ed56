//! 计算器工具：四则运算、取余、乘方与括号
//!
//! 递归下降求值，不执行任何代码。extract_expression 从自然语言查询中找出第一个可求值的算式。

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::tools::Tool;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Args: {\"expression\": \"2 + 2\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let expr = args
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'expression' argument".to_string())?;
        let value = evaluate(expr)?;
        Ok(format!("Result: {}", format_number(value)))
    }
}

/// 整数结果不带小数点（2 + 2 → 4）
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// 括号、一元符号与乘方链的最大嵌套层数
const MAX_DEPTH: usize = 64;
/// 可求值算式的最大字符数
const MAX_EXPRESSION_CHARS: usize = 512;

fn expression_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d(][\d\s.+\-*/%^()]*[\d)]").ok())
        .as_ref()
}

/// 从查询中提取第一个含运算符且可求值的算式，如 "What is 2 + 2?" → "2 + 2"
pub fn extract_expression(query: &str) -> Option<String> {
    let re = expression_pattern()?;
    re.find_iter(query)
        .map(|m| m.as_str().trim())
        .filter(|s| s.chars().count() <= MAX_EXPRESSION_CHARS)
        .map(str::to_string)
        .find(|s| s.chars().skip(1).any(|c| "+-*/%^".contains(c)) && evaluate(s).is_ok())
}

/// 求值入口
pub fn evaluate(expr: &str) -> Result<f64, String> {
    if expr.chars().count() > MAX_EXPRESSION_CHARS {
        return Err(format!(
            "expression longer than {} characters",
            MAX_EXPRESSION_CHARS
        ));
    }
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let v = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    if !v.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(v)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number: {}", text))?;
                out.push(Token::Num(n));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                out.push(Token::Op('^'));
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                out.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            other => return Err(format!("unsupported character: {}", other)),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    /// 递归前调用，与 leave 成对
    fn enter(&mut self) -> Result<(), String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".to_string());
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut v = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            v = if op == '+' { v + rhs } else { v - rhs };
        }
        Ok(v)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut v = self.power()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            self.pos += 1;
            let rhs = self.power()?;
            v = match op {
                '*' => v * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                '/' => v / rhs,
                _ => v % rhs,
            };
        }
        Ok(v)
    }

    // 右结合：2 ^ 3 ^ 2 = 2 ^ 9
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.enter()?;
            let exp = self.power();
            self.leave();
            return Ok(base.powf(exp?));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Op(op @ ('-' | '+'))) => {
                self.pos += 1;
                self.enter()?;
                let v = self.unary();
                self.leave();
                if op == '-' {
                    v.map(|v| -v)
                } else {
                    v
                }
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.enter()?;
                let v = self.expr();
                self.leave();
                let v = v?;
                if self.peek() != Some(Token::RParen) {
                    return Err("missing closing parenthesis".to_string());
                }
                self.pos += 1;
                Ok(v)
            }
            Some(t) => Err(format!("unexpected token: {:?}", t)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("2 + 2").unwrap(), 4.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("2 ** 10").unwrap(), 1024.0);
        assert_eq!(evaluate("7 % 4").unwrap(), 3.0);
        assert_eq!(evaluate("1 / 4").unwrap(), 0.25);
    }

    #[test]
    fn test_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("abc").is_err());
        assert!(evaluate("").is_err());
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |n: usize| format!("{}1+1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(evaluate(&nested(30)).unwrap(), 2.0);
        assert_eq!(
            evaluate(&nested(200)).unwrap_err(),
            "expression nested too deeply"
        );
        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(200))).unwrap_err(),
            "expression nested too deeply"
        );
        assert_eq!(
            evaluate(&vec!["2"; 200].join("^")).unwrap_err(),
            "expression nested too deeply"
        );
        assert!(evaluate(&nested(50_000)).is_err());
        assert_eq!(extract_expression(&format!("What is {}?", nested(50_000))), None);
        assert_eq!(
            extract_expression(&format!("{} and 2 + 2", nested(50_000))).as_deref(),
            Some("2 + 2")
        );
    }

    #[test]
    fn test_extract_from_question() {
        assert_eq!(extract_expression("What is 2 + 2?").as_deref(), Some("2 + 2"));
        assert_eq!(
            extract_expression("compute (3+4)*2 please").as_deref(),
            Some("(3+4)*2")
        );
        assert_eq!(extract_expression("Who won in 1998?"), None);
    }

    #[tokio::test]
    async fn test_tool_output() {
        let out = CalculatorTool
            .execute(serde_json::json!({"expression": "10 / 4"}))
            .await
            .unwrap();
        assert_eq!(out, "Result: 2.5");
        assert!(CalculatorTool.execute(serde_json::json!({})).await.is_err());
    }
}
