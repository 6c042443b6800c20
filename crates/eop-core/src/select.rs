//! Candidate selection expressions.
//!
//! Selections are compiled once at startup from strings like
//! `charge < 0 && fabs(eta_sc) < 1.4 && p > 10`. Supports arithmetic
//! (+, -, *, /), comparisons (==, !=, <, <=, >, >=), boolean operators
//! (&&, ||, !), and built-in functions (abs/fabs, sqrt, log, exp, pow,
//! min, max). Identifiers resolve against the fixed candidate/event
//! field table at compile time, so a typo fails before any file is
//! opened. Comparisons evaluate to 1/0 and a candidate is accepted when
//! the full expression is greater than zero.

use crate::error::{Error, Result};
use crate::event::{Candidate, Event};

// ── Fields ─────────────────────────────────────────────────────

/// Quantities addressable from a selection expression.
///
/// The first twelve are per-candidate, the rest per-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Field {
    Charge,
    SeedIx,
    SeedIy,
    EtaSc,
    PhiSc,
    Eta,
    Phi,
    EnergyRaw,
    Energy,
    EnergyEs,
    P,
    Fbrem,
    Mee,
    Run,
    Lumi,
    EventId,
}

impl Field {
    /// Every addressable field name, in display order.
    pub const NAMES: [&'static str; 16] = [
        "charge",
        "seed_ix",
        "seed_iy",
        "eta_sc",
        "phi_sc",
        "eta",
        "phi",
        "energy_raw",
        "energy",
        "energy_es",
        "p",
        "fbrem",
        "mee",
        "run",
        "lumi",
        "event",
    ];

    fn parse(name: &str) -> Option<Field> {
        let f = match name {
            "charge" => Field::Charge,
            "seed_ix" => Field::SeedIx,
            "seed_iy" => Field::SeedIy,
            "eta_sc" => Field::EtaSc,
            "phi_sc" => Field::PhiSc,
            "eta" => Field::Eta,
            "phi" => Field::Phi,
            "energy_raw" => Field::EnergyRaw,
            "energy" => Field::Energy,
            "energy_es" => Field::EnergyEs,
            "p" => Field::P,
            "fbrem" => Field::Fbrem,
            "mee" => Field::Mee,
            "run" => Field::Run,
            "lumi" => Field::Lumi,
            "event" => Field::EventId,
            _ => return None,
        };
        Some(f)
    }

    /// The field's name as written in expressions.
    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    fn value(self, event: &Event, cand: &Candidate) -> f64 {
        match self {
            Field::Charge => f64::from(cand.charge),
            Field::SeedIx => f64::from(cand.seed.ix),
            Field::SeedIy => f64::from(cand.seed.iy),
            Field::EtaSc => f64::from(cand.eta_sc),
            Field::PhiSc => f64::from(cand.phi_sc),
            Field::Eta => f64::from(cand.eta),
            Field::Phi => f64::from(cand.phi),
            Field::EnergyRaw => f64::from(cand.energy_raw),
            Field::Energy => f64::from(cand.energy),
            Field::EnergyEs => f64::from(cand.energy_es),
            Field::P => f64::from(cand.p),
            Field::Fbrem => f64::from(cand.fbrem),
            Field::Mee => f64::from(event.mee),
            Field::Run => f64::from(event.run),
            Field::Lumi => f64::from(event.lumi),
            Field::EventId => event.event as f64,
        }
    }
}

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Field(usize), // index into Selection::fields
    Neg(Box<Expr>),
    Not(Box<Expr>),
    BinOp(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    fn binop(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinOp(op, Box::new(lhs), Box::new(rhs))
    }

    fn eval(&self, vals: &[f64]) -> f64 {
        match self {
            Expr::Number(n) => *n,
            Expr::Field(i) => vals[*i],
            Expr::Neg(a) => -a.eval(vals),
            Expr::Not(a) => truth(!(a.eval(vals) > 0.0)),
            Expr::BinOp(op, a, b) => {
                let lhs = a.eval(vals);
                let rhs = b.eval(vals);
                match op {
                    BinOp::Add => lhs + rhs,
                    BinOp::Sub => lhs - rhs,
                    BinOp::Mul => lhs * rhs,
                    BinOp::Div => lhs / rhs,
                    BinOp::Eq => truth((lhs - rhs).abs() < f64::EPSILON),
                    BinOp::Ne => truth((lhs - rhs).abs() >= f64::EPSILON),
                    BinOp::Lt => truth(lhs < rhs),
                    BinOp::Le => truth(lhs <= rhs),
                    BinOp::Gt => truth(lhs > rhs),
                    BinOp::Ge => truth(lhs >= rhs),
                    BinOp::And => truth(lhs > 0.0 && rhs > 0.0),
                    BinOp::Or => truth(lhs > 0.0 || rhs > 0.0),
                }
            }
            Expr::Call(f, args) => {
                let a0 = args[0].eval(vals);
                match f {
                    Func::Abs => a0.abs(),
                    Func::Sqrt => a0.sqrt(),
                    Func::Log => a0.ln(),
                    Func::Exp => a0.exp(),
                    Func::Pow => a0.powf(args[1].eval(vals)),
                    Func::Min => a0.min(args[1].eval(vals)),
                    Func::Max => a0.max(args[1].eval(vals)),
                }
            }
        }
    }
}

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn parse(name: &str) -> Option<(Func, usize)> {
        let f = match name {
            "abs" | "fabs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "log" => (Func::Log, 1),
            "exp" => (Func::Exp, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        };
        Some(f)
    }
}

// ── Compiled selection ─────────────────────────────────────────

/// A compiled selection ready for evaluation.
#[derive(Debug, Clone)]
pub struct Selection {
    ast: Expr,
    /// Fields referenced by this selection (ordered by first occurrence).
    pub fields: Vec<Field>,
}

impl Selection {
    /// Parse and compile a selection string.
    ///
    /// Unknown identifiers and syntax errors are reported here, before
    /// any event is read.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser::new(&tokens);
        let ast = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(Error::Selection(format!(
                "unexpected token after expression: {:?}",
                parser.tokens[parser.pos]
            )));
        }
        let fields = std::mem::take(&mut parser.fields);
        Ok(Selection { ast, fields })
    }

    /// Whether `event`'s candidate in `slot` passes the selection.
    ///
    /// Side-effect free and total: an absent slot is simply rejected.
    pub fn accepts(&self, event: &Event, slot: usize) -> bool {
        let Some(cand) = event.candidates().get(slot) else {
            return false;
        };
        let vals: Vec<f64> = self.fields.iter().map(|f| f.value(event, cand)).collect();
        self.ast.eval(&vals) > 0.0
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Two-character operators first
        if i + 1 < chars.len() {
            let two = match (c, chars[i + 1]) {
                ('&', '&') => Some(Token::And),
                ('|', '|') => Some(Token::Or),
                ('=', '=') => Some(Token::Eq),
                ('!', '=') => Some(Token::Ne),
                ('<', '=') => Some(Token::Le),
                ('>', '=') => Some(Token::Ge),
                _ => None,
            };
            if let Some(t) = two {
                tokens.push(t);
                i += 2;
                continue;
            }
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            _ => None,
        };
        if let Some(t) = single {
            tokens.push(t);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_digit()
                    || chars[i] == '.'
                    || chars[i] == 'e'
                    || chars[i] == 'E'
                    || ((chars[i] == '+' || chars[i] == '-')
                        && i > start
                        && (chars[i - 1] == 'e' || chars[i - 1] == 'E')))
            {
                i += 1;
            }
            let s: String = chars[start..i].iter().collect();
            let n: f64 = s
                .parse()
                .map_err(|_| Error::Selection(format!("invalid number: '{}'", s)))?;
            tokens.push(Token::Num(n));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(Error::Selection(format!("unexpected character: '{}'", c)));
        }
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    fields: Vec<Field>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0, fields: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => {
                Err(Error::Selection(format!("expected {:?}, got {:?}", expected, other)))
            }
        }
    }

    fn resolve_field(&mut self, name: &str) -> Result<usize> {
        let field = Field::parse(name).ok_or_else(|| {
            Error::Selection(format!(
                "unknown field '{}'; known fields: {}",
                name,
                Field::NAMES.join(", ")
            ))
        })?;
        Ok(self.fields.iter().position(|f| *f == field).unwrap_or_else(|| {
            self.fields.push(field);
            self.fields.len() - 1
        }))
    }

    // ── Grammar rules ──────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::binop(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::binop(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_add()?;
        Ok(Expr::binop(op, lhs, rhs))
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            Some(Token::Not) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance().cloned() {
            Some(Token::Num(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let e = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(e)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance(); // consume '('
                    self.parse_call(&name)
                } else {
                    let idx = self.resolve_field(&name)?;
                    Ok(Expr::Field(idx))
                }
            }
            other => Err(Error::Selection(format!(
                "expected number, identifier, or '(', got {:?}",
                other
            ))),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr> {
        let (func, arity) = Func::parse(name)
            .ok_or_else(|| Error::Selection(format!("unknown function: '{}'", name)))?;
        let mut args = vec![self.parse_or()?];
        while matches!(self.peek(), Some(Token::Comma)) {
            self.advance();
            args.push(self.parse_or()?);
        }
        self.expect(&Token::RParen)?;
        if args.len() != arity {
            return Err(Error::Selection(format!(
                "{}() takes {} argument(s), got {}",
                name,
                arity,
                args.len()
            )));
        }
        Ok(Expr::Call(func, args))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Seed;

    fn event() -> Event {
        let mut ev = Event::new(362616, 44, 901);
        ev.mee = 91.2;
        ev.push_candidate(Candidate {
            charge: -1,
            seed: Seed { ix: -14, iy: 211 },
            eta_sc: -0.25,
            phi_sc: 1.9,
            eta: -0.26,
            phi: 1.88,
            energy_raw: 39.5,
            energy: 41.2,
            energy_es: 0.0,
            p: 40.0,
            fbrem: 0.12,
            rechits: None,
        })
        .unwrap();
        ev.push_candidate(Candidate {
            charge: 1,
            seed: Seed { ix: 20, iy: 33 },
            eta_sc: 0.36,
            phi_sc: -2.6,
            eta: 0.37,
            phi: -2.61,
            energy_raw: 31.0,
            energy: 33.0,
            energy_es: 0.0,
            p: 55.0,
            fbrem: 0.4,
            rechits: None,
        })
        .unwrap();
        ev
    }

    #[test]
    fn constant_accepts_everything() {
        let sel = Selection::compile("1").unwrap();
        assert!(sel.fields.is_empty());
        assert!(sel.accepts(&event(), 0));
        assert!(sel.accepts(&event(), 1));
    }

    #[test]
    fn charge_cut() {
        let sel = Selection::compile("charge < 0").unwrap();
        assert!(sel.accepts(&event(), 0));
        assert!(!sel.accepts(&event(), 1));
    }

    #[test]
    fn fields_ordered_by_first_occurrence() {
        let sel = Selection::compile("p > 10 && fabs(eta_sc) < 1.4 && p < 200").unwrap();
        assert_eq!(sel.fields, vec![Field::P, Field::EtaSc]);
    }

    #[test]
    fn fabs_is_abs() {
        let sel = Selection::compile("fabs(eta_sc) < 0.3").unwrap();
        assert!(sel.accepts(&event(), 0));
        assert!(!sel.accepts(&event(), 1));
    }

    #[test]
    fn event_level_fields() {
        let sel = Selection::compile("mee > 80 && mee < 100").unwrap();
        assert!(sel.accepts(&event(), 0));
        let sel = Selection::compile("run == 362616").unwrap();
        assert!(sel.accepts(&event(), 1));
    }

    #[test]
    fn arithmetic_and_precedence() {
        let sel = Selection::compile("energy / p > 1.0").unwrap();
        assert!(sel.accepts(&event(), 0)); // 41.2 / 40.0
        assert!(!sel.accepts(&event(), 1)); // 33.0 / 55.0

        let sel = Selection::compile("1 + 2 * 3 == 7").unwrap();
        assert!(sel.accepts(&event(), 0));
    }

    #[test]
    fn negation_and_not() {
        let sel = Selection::compile("-charge > 0").unwrap();
        assert!(sel.accepts(&event(), 0));

        let sel = Selection::compile("!(p > 50)").unwrap();
        assert!(sel.accepts(&event(), 0));
        assert!(!sel.accepts(&event(), 1));
    }

    #[test]
    fn functions() {
        let sel = Selection::compile("sqrt(pow(p, 2)) == p").unwrap();
        assert!(sel.accepts(&event(), 0));
        let sel = Selection::compile("min(energy, p) > 39").unwrap();
        assert!(sel.accepts(&event(), 0));
        assert!(!sel.accepts(&event(), 1));
    }

    #[test]
    fn absent_slot_is_rejected() {
        let sel = Selection::compile("1").unwrap();
        assert!(!sel.accepts(&event(), 2));
        assert!(!sel.accepts(&Event::new(1, 1, 1), 0));
    }

    #[test]
    fn unknown_field_fails_compile() {
        let err = Selection::compile("pt > 25").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown field 'pt'"), "unexpected message: {}", msg);
        assert!(msg.contains("eta_sc"), "should list known fields: {}", msg);
    }

    #[test]
    fn unknown_function_fails_compile() {
        assert!(Selection::compile("cos(phi) > 0").is_err());
    }

    #[test]
    fn wrong_arity_fails_compile() {
        assert!(Selection::compile("pow(p) > 1").is_err());
        assert!(Selection::compile("abs(p, 2) > 1").is_err());
    }

    #[test]
    fn syntax_errors() {
        assert!(Selection::compile("p >").is_err());
        assert!(Selection::compile("(p > 1").is_err());
        assert!(Selection::compile("p ? 1").is_err());
        assert!(Selection::compile("1 2").is_err());
    }

    #[test]
    fn scientific_notation() {
        let sel = Selection::compile("p < 1.5e2").unwrap();
        assert!(sel.accepts(&event(), 0));
    }
}
