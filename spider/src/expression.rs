//! Rate and parameter expressions.
//!
//! An [`Expression`] is either a constant, folded once at construction time,
//! or a postfix (RPN) token stack mixing constants, parameter references and
//! arithmetic operators. The tokenizer/parser here is intentionally small:
//! the expression-parser's *tokenizing* internals are an external
//! collaborator concern, the core only needs `evaluate(params) -> i64`.

use crate::error::{SpiderError, SpiderResult};
use crate::pisdf::param::{Param, ParamType};

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinOp::Add => lhs + rhs,
            BinOp::Sub => lhs - rhs,
            BinOp::Mul => lhs * rhs,
            BinOp::Div => lhs / rhs,
            BinOp::Mod => (lhs as i64 % rhs as i64) as f64,
        }
    }
}

/// One element of the postfix expression stack. Mirrors the original
/// `ExpressionElt` tagged union (`RPNElement` + a value-or-operator arg).
#[derive(Debug, Clone, PartialEq)]
enum ExpressionElt {
    Value(f64),
    ParamRef(usize),
    Op(BinOp),
    Neg,
    Ceil,
    Floor,
    Min,
    Max,
}

/// A rate or parameter-value expression.
///
/// Static expressions are folded to a value once and never re-walk their
/// RPN stack; dynamic expressions re-evaluate against the current parameter
/// table on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    stack: Vec<ExpressionElt>,
    value: f64,
    is_static: bool,
}

impl Expression {
    /// Build a constant expression from an integer literal.
    pub fn from_value(value: i64) -> Self {
        Expression {
            stack: Vec::new(),
            value: value as f64,
            is_static: true,
        }
    }

    /// Parse an arithmetic expression referencing the given parameter table
    /// by name. Folds to a static value immediately if it contains no
    /// reference to a still-unresolved `DYNAMIC` parameter.
    pub fn parse(text: &str, params: &[Param]) -> SpiderResult<Self> {
        let mut parser = Parser::new(text, params);
        let stack = parser.parse_expr()?;
        parser.skip_ws();
        if parser.pos != parser.chars.len() {
            return Err(SpiderError::ExpressionParse {
                message: format!("unexpected trailing input in `{}`", text),
            });
        }
        let is_static = stack.iter().all(|elt| match elt {
            ExpressionElt::ParamRef(ix) => params[*ix].kind() != ParamType::Dynamic,
            _ => true,
        });
        let mut expr = Expression {
            stack,
            value: 0.0,
            is_static,
        };
        if is_static {
            expr.value = expr.evaluate_stack(params);
        }
        Ok(expr)
    }

    /// Evaluate and truncate to `i64`, matching the original's
    /// `Expression::evaluate`.
    pub fn evaluate(&self, params: &[Param]) -> i64 {
        self.evaluate_f64(params) as i64
    }

    /// Evaluate without truncation, matching `Expression::evaluateDBL`.
    pub fn evaluate_f64(&self, params: &[Param]) -> f64 {
        if self.is_static {
            self.value
        } else {
            self.evaluate_stack(params)
        }
    }

    /// Last evaluated value, without re-evaluating (cheaper on static
    /// expressions, matching `Expression::value`).
    pub fn value(&self) -> i64 {
        self.value as i64
    }

    /// True if the expression contains an unresolved dynamic reference.
    pub fn dynamic(&self) -> bool {
        !self.is_static
    }

    fn evaluate_stack(&self, params: &[Param]) -> f64 {
        let mut values: Vec<f64> = Vec::with_capacity(self.stack.len());
        for elt in &self.stack {
            match elt {
                ExpressionElt::Value(v) => values.push(*v),
                ExpressionElt::ParamRef(ix) => {
                    let p = &params[*ix];
                    values.push(p.value().unwrap_or(0) as f64);
                }
                ExpressionElt::Op(op) => {
                    let rhs = values.pop().expect("RPN stack underflow");
                    let lhs = values.pop().expect("RPN stack underflow");
                    values.push(op.apply(lhs, rhs));
                }
                ExpressionElt::Neg => {
                    let v = values.pop().expect("RPN stack underflow");
                    values.push(-v);
                }
                ExpressionElt::Ceil => {
                    let v = values.pop().expect("RPN stack underflow");
                    values.push(v.ceil());
                }
                ExpressionElt::Floor => {
                    let v = values.pop().expect("RPN stack underflow");
                    values.push(v.floor());
                }
                ExpressionElt::Min => {
                    let rhs = values.pop().expect("RPN stack underflow");
                    let lhs = values.pop().expect("RPN stack underflow");
                    values.push(lhs.min(rhs));
                }
                ExpressionElt::Max => {
                    let rhs = values.pop().expect("RPN stack underflow");
                    let lhs = values.pop().expect("RPN stack underflow");
                    values.push(lhs.max(rhs));
                }
            }
        }
        values.pop().unwrap_or(0.0)
    }
}

/// Small recursive-descent parser: `expr := term (('+' | '-') term)*`,
/// `term := factor (('*' | '/' | '%') factor)*`, `factor := '-' factor |
/// number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'`.
struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    params: &'a [Param],
}

impl<'a> Parser<'a> {
    fn new(text: &str, params: &'a [Param]) -> Self {
        Parser {
            chars: text.chars().collect(),
            pos: 0,
            params,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.skip_ws();
        let c = self.chars.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn parse_expr(&mut self) -> SpiderResult<Vec<ExpressionElt>> {
        let mut out = self.parse_term()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.bump();
                    out.extend(self.parse_term()?);
                    out.push(ExpressionElt::Op(BinOp::Add));
                }
                Some('-') => {
                    self.bump();
                    out.extend(self.parse_term()?);
                    out.push(ExpressionElt::Op(BinOp::Sub));
                }
                _ => break,
            }
        }
        Ok(out)
    }

    fn parse_term(&mut self) -> SpiderResult<Vec<ExpressionElt>> {
        let mut out = self.parse_factor()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.bump();
                    out.extend(self.parse_factor()?);
                    out.push(ExpressionElt::Op(BinOp::Mul));
                }
                Some('/') => {
                    self.bump();
                    out.extend(self.parse_factor()?);
                    out.push(ExpressionElt::Op(BinOp::Div));
                }
                Some('%') => {
                    self.bump();
                    out.extend(self.parse_factor()?);
                    out.push(ExpressionElt::Op(BinOp::Mod));
                }
                _ => break,
            }
        }
        Ok(out)
    }

    fn parse_factor(&mut self) -> SpiderResult<Vec<ExpressionElt>> {
        match self.peek() {
            Some('-') => {
                self.bump();
                let mut out = self.parse_factor()?;
                out.push(ExpressionElt::Neg);
                Ok(out)
            }
            Some('(') => {
                self.bump();
                let out = self.parse_expr()?;
                match self.bump() {
                    Some(')') => Ok(out),
                    _ => Err(SpiderError::ExpressionParse {
                        message: "expected closing parenthesis".to_owned(),
                    }),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident(),
            other => Err(SpiderError::ExpressionParse {
                message: format!("unexpected token {:?}", other),
            }),
        }
    }

    fn parse_number(&mut self) -> SpiderResult<Vec<ExpressionElt>> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .map(|c| c.is_ascii_digit() || *c == '.')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value: f64 = text.parse().map_err(|_| SpiderError::ExpressionParse {
            message: format!("invalid numeric literal `{}`", text),
        })?;
        Ok(vec![ExpressionElt::Value(value)])
    }

    fn parse_ident(&mut self) -> SpiderResult<Vec<ExpressionElt>> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .map(|c| c.is_alphanumeric() || *c == '_')
            .unwrap_or(false)
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        let lower = name.to_lowercase();
        if self.peek() == Some('(') {
            self.bump();
            let mut args = vec![self.parse_expr()?];
            while self.peek() == Some(',') {
                self.bump();
                args.push(self.parse_expr()?);
            }
            match self.bump() {
                Some(')') => {}
                _ => {
                    return Err(SpiderError::ExpressionParse {
                        message: "expected closing parenthesis in function call".to_owned(),
                    })
                }
            }
            return self.build_call(&lower, args);
        }
        let ix = self
            .params
            .iter()
            .position(|p| p.name() == lower)
            .ok_or_else(|| SpiderError::ExpressionParse {
                message: format!("unknown symbol `{}`", name),
            })?;
        Ok(vec![ExpressionElt::ParamRef(ix)])
    }

    fn build_call(
        &self,
        name: &str,
        mut args: Vec<Vec<ExpressionElt>>,
    ) -> SpiderResult<Vec<ExpressionElt>> {
        match (name, args.len()) {
            ("ceil", 1) => {
                let mut out = args.remove(0);
                out.push(ExpressionElt::Ceil);
                Ok(out)
            }
            ("floor", 1) => {
                let mut out = args.remove(0);
                out.push(ExpressionElt::Floor);
                Ok(out)
            }
            ("min", 2) => {
                let mut out = args.remove(0);
                out.extend(args.remove(0));
                out.push(ExpressionElt::Min);
                Ok(out)
            }
            ("max", 2) => {
                let mut out = args.remove(0);
                out.extend(args.remove(0));
                out.push(ExpressionElt::Max);
                Ok(out)
            }
            (other, arity) => Err(SpiderError::ExpressionParse {
                message: format!("unknown function `{}` with arity {}", other, arity),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pisdf::param::{Param, ParamType};

    #[test]
    fn constant_folds_static() {
        let expr = Expression::from_value(42);
        assert!(!expr.dynamic());
        assert_eq!(expr.evaluate(&[]), 42);
    }

    #[test]
    fn arithmetic_precedence() {
        let expr = Expression::parse("2 + 3 * 4", &[]).unwrap();
        assert_eq!(expr.evaluate(&[]), 14);
    }

    #[test]
    fn parenthesised_expression() {
        let expr = Expression::parse("(2 + 3) * 4", &[]).unwrap();
        assert_eq!(expr.evaluate(&[]), 20);
    }

    #[test]
    fn static_param_folds_immediately() {
        let params = vec![Param::new("n", ParamType::Static, Some(5))];
        let expr = Expression::parse("n * 2", &params).unwrap();
        assert!(!expr.dynamic());
        assert_eq!(expr.evaluate(&params), 10);
    }

    #[test]
    fn dynamic_param_stays_dynamic_until_resolved() {
        let params = vec![Param::new("p", ParamType::Dynamic, None)];
        let expr = Expression::parse("p + 1", &params).unwrap();
        assert!(expr.dynamic());
        let mut resolved = params;
        resolved[0].set_value(5);
        assert_eq!(expr.evaluate(&resolved), 6);
    }

    #[test]
    fn unknown_symbol_is_expression_parse_error() {
        let err = Expression::parse("unknown_sym", &[]).unwrap_err();
        assert_eq!(err.kind(), "ExpressionParseError");
    }

    #[test]
    fn builtin_functions() {
        let expr = Expression::parse("max(ceil(7 / 2), 1)", &[]).unwrap();
        assert_eq!(expr.evaluate(&[]), 4);
    }
}
