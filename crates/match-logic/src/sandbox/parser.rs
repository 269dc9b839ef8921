//! Recursive-descent parser producing the strategy AST.
//!
//! Precedence, loosest first: conditional expression, `or`, `and`, `not`,
//! comparisons (`== != < <= > >= in not in is is not`), `+ -`,
//! `* / // %`, unary `-`/`+`, postfix (call, index, slice, method).

use std::collections::HashMap;
use std::sync::Arc;

use super::lexer::{Keyword, Punct, Spanned, Token};
use super::StrategyFault;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Expr>),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Compare {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        func: String,
        args: Vec<Expr>,
    },
    Method {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        value: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Target {
    Name(String),
    Index { name: String, index: Expr },
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum Stmt {
    Expr(Expr),
    Assign {
        target: Target,
        value: Expr,
    },
    AugAssign {
        target: Target,
        op: BinOp,
        value: Expr,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
}

#[derive(Debug, PartialEq)]
pub(super) struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A screened and parsed strategy, ready to be called.
///
/// Immutable after parsing, so it can be shared between threads and called
/// once per round.
#[derive(Debug)]
pub struct Program {
    pub(super) functions: HashMap<String, Arc<FunctionDef>>,
    pub(super) module: Vec<Stmt>,
}

impl Program {
    /// Number of parameters of a top-level function, if it exists.
    pub fn arity(&self, function: &str) -> Option<usize> {
        self.functions.get(function).map(|f| f.params.len())
    }
}

/// Deepest accepted expression nesting.
const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    loop_depth: usize,
    nesting: usize,
    in_function: bool,
}

type PResult<T> = Result<T, StrategyFault>;

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> PResult<T> {
        Err(StrategyFault::Syntax {
            line: self.line(),
            message: message.into(),
        })
    }

    fn at_punct(&self, p: Punct) -> bool {
        *self.peek() == Token::Punct(p)
    }

    fn at_keyword(&self, k: Keyword) -> bool {
        *self.peek() == Token::Keyword(k)
    }

    fn eat_punct(&mut self, p: Punct) -> bool {
        if self.at_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.at_keyword(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punct, what: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            self.error(format!("expected {}", what))
        }
    }

    fn expect_name(&mut self, what: &str) -> PResult<String> {
        match self.advance() {
            Token::Name(name) => Ok(name),
            _ => self.error(format!("expected {}", what)),
        }
    }

    fn expect_newline(&mut self) -> PResult<()> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => self.error("expected end of line"),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn program(mut self) -> PResult<Program> {
        let mut functions = HashMap::new();
        let mut module = Vec::new();

        loop {
            match self.peek() {
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Keyword(Keyword::Def) => {
                    let def = self.function_def()?;
                    if functions.contains_key(&def.name) {
                        return self.error(format!("function `{}` defined twice", def.name));
                    }
                    functions.insert(def.name.clone(), Arc::new(def));
                }
                Token::Indent => return self.error("unexpected indent"),
                _ => module.push(self.statement()?),
            }
        }

        Ok(Program { functions, module })
    }

    fn function_def(&mut self) -> PResult<FunctionDef> {
        self.advance(); // def
        let name = self.expect_name("function name")?;
        self.expect_punct(Punct::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.at_punct(Punct::RParen) {
            let param = self.expect_name("parameter name")?;
            if params.contains(&param) {
                return self.error(format!("duplicate parameter `{}`", param));
            }
            params.push(param);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "`)`")?;
        self.expect_punct(Punct::Colon, "`:`")?;

        self.in_function = true;
        let body = self.block();
        self.in_function = false;

        Ok(FunctionDef {
            name,
            params,
            body: body?,
        })
    }

    /// Either an indented suite or a single simple statement on the same line.
    fn block(&mut self) -> PResult<Vec<Stmt>> {
        if *self.peek() != Token::Newline {
            let stmt = self.simple_statement()?;
            self.expect_newline()?;
            return Ok(vec![stmt]);
        }
        self.advance();
        if *self.peek() != Token::Indent {
            return self.error("expected an indented block");
        }
        self.advance();

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                _ => body.push(self.statement()?),
            }
        }
        Ok(body)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Token::Keyword(Keyword::Def) => {
                self.error("functions can only be defined at the top level")
            }
            Token::Keyword(Keyword::If) => self.if_statement(),
            Token::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.expression()?;
                self.expect_punct(Punct::Colon, "`:`")?;
                let body = self.loop_body()?;
                Ok(Stmt::While { cond, body })
            }
            Token::Keyword(Keyword::For) => {
                self.advance();
                let var = self.expect_name("loop variable")?;
                if !self.eat_keyword(Keyword::In) {
                    return self.error("expected `in`");
                }
                let iter = self.expression()?;
                self.expect_punct(Punct::Colon, "`:`")?;
                let body = self.loop_body()?;
                Ok(Stmt::For { var, iter, body })
            }
            Token::Indent => self.error("unexpected indent"),
            _ => {
                let stmt = self.simple_statement()?;
                self.expect_newline()?;
                Ok(stmt)
            }
        }
    }

    fn loop_body(&mut self) -> PResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.advance(); // if
        let mut branches = Vec::new();
        let cond = self.expression()?;
        self.expect_punct(Punct::Colon, "`:`")?;
        branches.push((cond, self.block()?));

        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword(Keyword::Elif) {
                let cond = self.expression()?;
                self.expect_punct(Punct::Colon, "`:`")?;
                branches.push((cond, self.block()?));
            } else if self.eat_keyword(Keyword::Else) {
                self.expect_punct(Punct::Colon, "`:`")?;
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    fn simple_statement(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Token::Keyword(Keyword::Pass) => {
                self.advance();
                Ok(Stmt::Pass)
            }
            Token::Keyword(Keyword::Break) => {
                if self.loop_depth == 0 {
                    return self.error("`break` outside loop");
                }
                self.advance();
                Ok(Stmt::Break)
            }
            Token::Keyword(Keyword::Continue) => {
                if self.loop_depth == 0 {
                    return self.error("`continue` outside loop");
                }
                self.advance();
                Ok(Stmt::Continue)
            }
            Token::Keyword(Keyword::Return) => {
                if !self.in_function {
                    return self.error("`return` outside function");
                }
                self.advance();
                if matches!(self.peek(), Token::Newline | Token::Eof) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expression()?)))
                }
            }
            _ => {
                let expr = self.expression()?;
                let aug = match self.peek() {
                    Token::Punct(Punct::PlusAssign) => Some(BinOp::Add),
                    Token::Punct(Punct::MinusAssign) => Some(BinOp::Sub),
                    Token::Punct(Punct::StarAssign) => Some(BinOp::Mul),
                    _ => None,
                };
                if let Some(op) = aug {
                    self.advance();
                    let target = self.target(expr)?;
                    let value = self.expression()?;
                    return Ok(Stmt::AugAssign { target, op, value });
                }
                if self.eat_punct(Punct::Assign) {
                    let target = self.target(expr)?;
                    let value = self.expression()?;
                    return Ok(Stmt::Assign { target, value });
                }
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn target(&self, expr: Expr) -> PResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { value, index } => match *value {
                Expr::Name(name) => Ok(Target::Index { name, index: *index }),
                _ => self.error("can only assign into an element of a named list"),
            },
            _ => self.error("invalid assignment target"),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.nesting >= MAX_NESTING {
            return self.error("expression nested too deeply");
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Count one more level of a left-leaning chain such as `a + b + c`.
    fn deeper(&mut self) -> PResult<()> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return self.error("expression nested too deeply");
        }
        Ok(())
    }

    fn expression(&mut self) -> PResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let then = self.or_expr()?;
        if self.eat_keyword(Keyword::If) {
            let cond = self.or_expr()?;
            if !self.eat_keyword(Keyword::Else) {
                return self.error("expected `else` in conditional expression");
            }
            let otherwise = self.expression()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let mut left = self.and_expr()?;
        while self.eat_keyword(Keyword::Or) {
            self.deeper()?;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.nesting = mark;
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let mut left = self.not_expr()?;
        while self.eat_keyword(Keyword::And) {
            self.deeper()?;
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.nesting = mark;
        Ok(left)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if self.eat_keyword(Keyword::Not) {
            let operand = self.nested(Self::not_expr)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            Token::Punct(Punct::Eq) => CmpOp::Eq,
            Token::Punct(Punct::NotEq) => CmpOp::NotEq,
            Token::Punct(Punct::Lt) => CmpOp::Lt,
            Token::Punct(Punct::Le) => CmpOp::Le,
            Token::Punct(Punct::Gt) => CmpOp::Gt,
            Token::Punct(Punct::Ge) => CmpOp::Ge,
            Token::Keyword(Keyword::In) => CmpOp::In,
            Token::Keyword(Keyword::Is) => {
                self.advance();
                return Some(if self.eat_keyword(Keyword::Not) {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                });
            }
            Token::Keyword(Keyword::Not) => {
                // `not in`; a bare `not` here is not a comparison
                let next = self.tokens.get(self.pos + 1).map(|s| &s.token);
                if next != Some(&Token::Keyword(Keyword::In)) {
                    return None;
                }
                self.advance();
                CmpOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let first = self.additive()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            self.deeper()?;
            rest.push((op, self.additive()?));
        }
        self.nesting = mark;
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Plus) => BinOp::Add,
                Token::Punct(Punct::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.deeper()?;
            let right = self.multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.nesting = mark;
        Ok(left)
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Star) => BinOp::Mul,
                Token::Punct(Punct::Slash) => BinOp::Div,
                Token::Punct(Punct::DoubleSlash) => BinOp::FloorDiv,
                Token::Punct(Punct::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.deeper()?;
            let right = self.unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.nesting = mark;
        Ok(left)
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Token::Punct(Punct::Minus) => UnaryOp::Neg,
            Token::Punct(Punct::Plus) => UnaryOp::Pos,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.nested(Self::unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.at_punct(Punct::RParen) {
            args.push(self.expression()?);
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        self.expect_punct(Punct::RParen, "`)`")?;
        Ok(args)
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mark = self.nesting;
        let mut expr = self.atom()?;
        loop {
            if matches!(self.peek(), Token::Punct(Punct::LParen | Punct::Dot | Punct::LBracket)) {
                self.deeper()?;
            }
            if self.eat_punct(Punct::LParen) {
                let Expr::Name(func) = expr else {
                    return self.error("only named functions can be called");
                };
                let args = self.arguments()?;
                expr = Expr::Call { func, args };
            } else if self.eat_punct(Punct::Dot) {
                let name = self.expect_name("method name")?;
                self.expect_punct(Punct::LParen, "`(` after method name")?;
                let args = self.arguments()?;
                expr = Expr::Method {
                    receiver: Box::new(expr),
                    name,
                    args,
                };
            } else if self.eat_punct(Punct::LBracket) {
                expr = self.subscript(expr)?;
            } else {
                break;
            }
        }
        self.nesting = mark;
        Ok(expr)
    }

    fn subscript(&mut self, value: Expr) -> PResult<Expr> {
        let lower = if self.at_punct(Punct::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        if self.eat_punct(Punct::Colon) {
            let upper = if self.at_punct(Punct::RBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect_punct(Punct::RBracket, "`]`")?;
            return Ok(Expr::Slice {
                value: Box::new(value),
                lower,
                upper,
            });
        }
        self.expect_punct(Punct::RBracket, "`]`")?;
        match lower {
            Some(index) => Ok(Expr::Index {
                value: Box::new(value),
                index,
            }),
            None => self.error("empty subscript"),
        }
    }

    fn atom(&mut self) -> PResult<Expr> {
        match self.advance() {
            Token::Int(v) => Ok(Expr::Int(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::Str(s) => {
                // Adjacent literals concatenate
                let mut s = s;
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Expr::Str(s))
            }
            Token::Name(name) => Ok(Expr::Name(name)),
            Token::Keyword(Keyword::True) => Ok(Expr::Bool(true)),
            Token::Keyword(Keyword::False) => Ok(Expr::Bool(false)),
            Token::Keyword(Keyword::None) => Ok(Expr::None),
            Token::Punct(Punct::LParen) => {
                let inner = self.expression()?;
                self.expect_punct(Punct::RParen, "`)`")?;
                Ok(inner)
            }
            Token::Punct(Punct::LBracket) => {
                let mut items = Vec::new();
                while !self.at_punct(Punct::RBracket) {
                    items.push(self.expression()?);
                    if !self.eat_punct(Punct::Comma) {
                        break;
                    }
                }
                self.expect_punct(Punct::RBracket, "`]`")?;
                Ok(Expr::List(items))
            }
            Token::Newline | Token::Eof => self.error("unexpected end of line"),
            other => self.error(format!("unexpected token {:?}", other)),
        }
    }
}

pub(super) fn parse(tokens: Vec<Spanned>) -> Result<Program, StrategyFault> {
    Parser {
        tokens,
        pos: 0,
        loop_depth: 0,
        nesting: 0,
        in_function: false,
    }
    .program()
}
