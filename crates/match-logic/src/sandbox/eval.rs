//! Tree-walking interpreter.
//!
//! Every statement and expression node burns one unit of fuel, and so does
//! every element a comparison or primitive visits; the deadline is sampled
//! every few steps. Values are single-threaded (`Rc`) and never escape a
//! call: each call gets a fresh interpreter and re-runs the module-level
//! statements.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use super::budget::Budget;
use super::builtins::{self, overflow, runtime};
use super::parser::{BinOp, CmpOp, Expr, FunctionDef, Program, Stmt, Target, UnaryOp};
use super::value::{List, Number, Value, MAX_LIST_DEPTH, TEXT_CHUNK};
use super::{SandboxLimits, StrategyFault, ENTRY_POINT};
use crate::strategy::Move;

/// Bound on nested evaluation (blocks, expressions and calls together), so
/// the interpreter's own recursion stays well inside a thread stack.
const MAX_EVAL_DEPTH: usize = 256;

type EResult<T> = Result<T, StrategyFault>;

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

struct Interpreter<'p> {
    program: &'p Program,
    limits: &'p SandboxLimits,
    budget: Budget,
    depth: usize,
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
}

impl<'p> Interpreter<'p> {
    fn new(program: &'p Program, limits: &'p SandboxLimits, deadline: Instant) -> Self {
        Self {
            program,
            limits,
            budget: Budget::new(limits, deadline),
            depth: 0,
            globals: HashMap::new(),
            frames: Vec::new(),
        }
    }

    fn burn(&mut self, cost: u64) -> EResult<()> {
        self.budget.burn(cost)
    }

    fn enter(&mut self) -> EResult<()> {
        self.depth += 1;
        if self.depth > MAX_EVAL_DEPTH {
            return runtime("evaluation nested too deeply");
        }
        Ok(())
    }

    fn cap(&self, len: usize) -> EResult<()> {
        self.budget.cap(len)
    }

    // ── Variables ────────────────────────────────────────────────────

    fn lookup(&self, name: &str) -> EResult<Value> {
        if let Some(v) = self.frames.last().and_then(|f| f.get(name)) {
            return Ok(v.clone());
        }
        match self.globals.get(name) {
            Some(v) => Ok(v.clone()),
            None => runtime(format!("name '{}' is not defined", name)),
        }
    }

    fn variable_mut(&mut self, name: &str) -> EResult<&mut Value> {
        if let Some(v) = self.frames.last_mut().and_then(|f| f.get_mut(name)) {
            return Ok(v);
        }
        match self.globals.get_mut(name) {
            Some(v) => Ok(v),
            None => runtime(format!("name '{}' is not defined", name)),
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        let scope = match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        };
        scope.insert(name.to_string(), value);
    }

    fn list_mut(&mut self, name: &str) -> EResult<&mut List> {
        match self.variable_mut(name)? {
            Value::List(items) => Ok(Rc::make_mut(items)),
            other => runtime(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            )),
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn exec_block(&mut self, body: &[Stmt]) -> EResult<Flow> {
        self.enter()?;
        let mut flow = Flow::Normal;
        for stmt in body {
            match self.exec(stmt)? {
                Flow::Normal => {}
                other => {
                    flow = other;
                    break;
                }
            }
        }
        self.depth -= 1;
        Ok(flow)
    }

    fn exec(&mut self, stmt: &Stmt) -> EResult<Flow> {
        self.burn(1)?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                match target {
                    Target::Name(name) => self.assign(name, value),
                    Target::Index { name, index } => {
                        let index = self.eval(index)?;
                        nestable(&value)?;
                        let items = self.list_mut(name)?;
                        let i = resolve_index(&index, items.len())?;
                        items.set(i, value);
                    }
                }
            }
            Stmt::AugAssign { target, op, value } => {
                let rhs = self.eval(value)?;
                match target {
                    Target::Name(name) => {
                        let current = self.lookup(name)?;
                        let updated = self.binary(*op, current, rhs)?;
                        self.assign(name, updated);
                    }
                    Target::Index { name, index } => {
                        let index = self.eval(index)?;
                        let current = subscript(&self.lookup(name)?, &index)?;
                        let updated = self.binary(*op, current, rhs)?;
                        nestable(&updated)?;
                        let items = self.list_mut(name)?;
                        let i = resolve_index(&index, items.len())?;
                        items.set(i, updated);
                    }
                }
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                return self.exec_block(orelse);
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.truthy() {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::For { var, iter, body } => {
                let items = builtins::iterate(&self.eval(iter)?)?;
                for item in items {
                    self.burn(1)?;
                    self.assign(var, item);
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Pass => {}
        }
        Ok(Flow::Normal)
    }

    fn call_function(&mut self, def: &FunctionDef, args: Vec<Value>) -> EResult<Value> {
        if args.len() != def.params.len() {
            return runtime(format!(
                "{}() takes {} arguments, got {}",
                def.name,
                def.params.len(),
                args.len()
            ));
        }
        if self.frames.len() >= self.limits.max_call_depth {
            return runtime("maximum recursion depth exceeded");
        }
        self.frames
            .push(def.params.iter().cloned().zip(args).collect());
        let flow = self.exec_block(&def.body);
        self.frames.pop();
        match flow? {
            Flow::Return(v) => Ok(v),
            _ => Ok(Value::None),
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> EResult<Value> {
        self.enter()?;
        let value = self.eval_node(expr);
        self.depth -= 1;
        value
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> EResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_node(&mut self, expr: &Expr) -> EResult<Value> {
        self.burn(1)?;
        match expr {
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::List(items) => {
                self.cap(items.len())?;
                let items = self.eval_all(items)?;
                for item in &items {
                    nestable(item)?;
                }
                Ok(Value::list(items))
            }
            Expr::Name(name) => self.lookup(name),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                unary(*op, v)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                self.binary(*op, l, r)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, rhs) in rest {
                    let right = self.eval(rhs)?;
                    if !compare(*op, &left, &right, &mut self.budget)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(a, b) => {
                let l = self.eval(a)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(b)
            }
            Expr::Or(a, b) => {
                let l = self.eval(a)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(b)
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { func, args } => {
                let args = self.eval_all(args)?;
                let program = self.program;
                if let Some(def) = program.functions.get(func) {
                    return self.call_function(def, args);
                }
                if !builtins::is_builtin(func) {
                    return runtime(format!("name '{}' is not defined", func));
                }
                let cost: usize = args.iter().filter_map(Value::len).sum();
                self.burn(cost as u64)?;
                builtins::call(func, args, &mut self.budget)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let args = self.eval_all(args)?;
                if name == "append" {
                    return self.append(receiver, args);
                }
                let receiver = self.eval(receiver)?;
                self.burn(receiver.len().unwrap_or(0) as u64)?;
                builtins::call_method(&receiver, name, args, &mut self.budget)
            }
            Expr::Index { value, index } => {
                let value = self.eval(value)?;
                let index = self.eval(index)?;
                subscript(&value, &index)
            }
            Expr::Slice {
                value,
                lower,
                upper,
            } => {
                let value = self.eval(value)?;
                let lower = match lower {
                    Some(e) => Some(self.eval(e)?),
                    None => None,
                };
                let upper = match upper {
                    Some(e) => Some(self.eval(e)?),
                    None => None,
                };
                let sliced = slice(&value, lower.as_ref(), upper.as_ref())?;
                self.burn(sliced.len().unwrap_or(0) as u64)?;
                Ok(sliced)
            }
        }
    }

    /// `name.append(x)` mutates the list bound to `name`.
    fn append(&mut self, receiver: &Expr, mut args: Vec<Value>) -> EResult<Value> {
        let Expr::Name(name) = receiver else {
            return runtime("append() is only supported on a named list");
        };
        let (Some(item), 0) = (args.pop(), args.len()) else {
            return runtime("append() takes exactly 1 argument");
        };
        nestable(&item)?;
        let cap = self.budget.max_len();
        let items = match self.variable_mut(name)? {
            Value::List(items) => Rc::make_mut(items),
            other => {
                return runtime(format!(
                    "'{}' object has no method 'append'",
                    other.type_name()
                ))
            }
        };
        if items.len() >= cap {
            return runtime(format!("collection exceeds the limit of {}", cap));
        }
        items.push(item);
        Ok(Value::None)
    }

    fn binary(&mut self, op: BinOp, l: Value, r: Value) -> EResult<Value> {
        match (op, &l, &r) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => {
                self.cap(a.len() + b.len())?;
                Ok(Value::str(&format!("{}{}", a, b)))
            }
            (BinOp::Add, Value::List(a), Value::List(b)) => {
                self.cap(a.len() + b.len())?;
                self.burn((a.len() + b.len()) as u64)?;
                let mut items = Vec::with_capacity(a.len() + b.len());
                items.extend(a.iter().cloned());
                items.extend(b.iter().cloned());
                Ok(Value::list(items))
            }
            (BinOp::Mul, Value::Str(_) | Value::List(_), Value::Int(_) | Value::Bool(_)) => {
                self.repeat(&l, &r)
            }
            (BinOp::Mul, Value::Int(_) | Value::Bool(_), Value::Str(_) | Value::List(_)) => {
                self.repeat(&r, &l)
            }
            _ => match (l.as_number(), r.as_number()) {
                (Some(a), Some(b)) => arithmetic(op, a, b).map(Number::into_value),
                _ => runtime(format!(
                    "unsupported operand types for {}: '{}' and '{}'",
                    symbol(op),
                    l.type_name(),
                    r.type_name()
                )),
            },
        }
    }

    fn repeat(&mut self, seq: &Value, times: &Value) -> EResult<Value> {
        let times = usize::try_from(times.as_int().unwrap_or(0)).unwrap_or(0);
        let len = seq.len().unwrap_or(0);
        let total = len.checked_mul(times).unwrap_or(usize::MAX);
        self.cap(total)?;
        self.burn(total as u64)?;
        match seq {
            Value::Str(s) => Ok(Value::str(&s.repeat(times))),
            Value::List(items) => {
                let mut out = Vec::with_capacity(total);
                for _ in 0..times {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::list(out))
            }
            _ => Ok(Value::None),
        }
    }
}

fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
    }
}

fn arithmetic(op: BinOp, a: Number, b: Number) -> EResult<Number> {
    use Number::{Float, Int};

    match (op, a, b) {
        (BinOp::Add, ..) => builtins::add(a, b),
        (BinOp::Sub, Int(x), Int(y)) => x.checked_sub(y).map(Int).ok_or_else(overflow),
        (BinOp::Mul, Int(x), Int(y)) => x.checked_mul(y).map(Int).ok_or_else(overflow),
        (BinOp::Div, _, _) => {
            let y = b.to_f64();
            if y == 0.0 {
                return runtime("division by zero");
            }
            Ok(Float(a.to_f64() / y))
        }
        (BinOp::FloorDiv, Int(x), Int(y)) => {
            if y == 0 {
                return runtime("integer division by zero");
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                Ok(Int(q - 1))
            } else {
                Ok(Int(q))
            }
        }
        (BinOp::Mod, Int(x), Int(y)) => {
            if y == 0 {
                return runtime("integer modulo by zero");
            }
            let r = x.wrapping_rem(y);
            if r != 0 && ((r < 0) != (y < 0)) {
                Ok(Int(r + y))
            } else {
                Ok(Int(r))
            }
        }
        (op, a, b) => {
            let (x, y) = (a.to_f64(), b.to_f64());
            match op {
                BinOp::Sub => Ok(Float(x - y)),
                BinOp::Mul => Ok(Float(x * y)),
                BinOp::FloorDiv | BinOp::Mod if y == 0.0 => runtime("float division by zero"),
                BinOp::FloorDiv => Ok(Float((x / y).floor())),
                BinOp::Mod => {
                    let r = x % y;
                    if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                        Ok(Float(r + y))
                    } else {
                        Ok(Float(r))
                    }
                }
                BinOp::Add | BinOp::Div => builtins::add(a, b),
            }
        }
    }
}

fn unary(op: UnaryOp, v: Value) -> EResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
        UnaryOp::Neg => match v.as_number() {
            Some(Number::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => runtime(format!("bad operand type for unary -: '{}'", v.type_name())),
        },
        UnaryOp::Pos => match v.as_number() {
            Some(n) => Ok(n.into_value()),
            None => runtime(format!("bad operand type for unary +: '{}'", v.type_name())),
        },
    }
}

/// Refuse to place `item` inside another list once that would pass the
/// nesting limit.
fn nestable(item: &Value) -> EResult<()> {
    if item.depth() >= MAX_LIST_DEPTH {
        return runtime(format!("lists cannot be nested more than {} deep", MAX_LIST_DEPTH));
    }
    Ok(())
}

fn ordered(
    l: &Value,
    r: &Value,
    budget: &mut Budget,
    want: fn(std::cmp::Ordering) -> bool,
) -> EResult<bool> {
    match l.partial_order(r, budget)? {
        Some(ord) => Ok(want(ord)),
        None => runtime(format!(
            "comparison not supported between '{}' and '{}'",
            l.type_name(),
            r.type_name()
        )),
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value, budget: &mut Budget) -> EResult<bool> {
    match op {
        CmpOp::Eq => l.loose_eq(r, budget),
        CmpOp::NotEq => l.loose_eq(r, budget).map(|same| !same),
        CmpOp::Lt => ordered(l, r, budget, |o| o.is_lt()),
        CmpOp::Le => ordered(l, r, budget, |o| o.is_le()),
        CmpOp::Gt => ordered(l, r, budget, |o| o.is_gt()),
        CmpOp::Ge => ordered(l, r, budget, |o| o.is_ge()),
        CmpOp::In => contains(r, l, budget),
        CmpOp::NotIn => contains(r, l, budget).map(|found| !found),
        CmpOp::Is => Ok(identical(l, r)),
        CmpOp::IsNot => Ok(!identical(l, r)),
    }
}

fn contains(container: &Value, item: &Value, budget: &mut Budget) -> EResult<bool> {
    match (container, item) {
        (Value::List(items), _) => {
            for v in items.iter() {
                if v.loose_eq(item, budget)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Str(s), Value::Str(needle)) => {
            budget.burn(1 + (s.len() / TEXT_CHUNK) as u64)?;
            Ok(s.contains(&**needle))
        }
        (Value::Str(_), other) => runtime(format!(
            "'in <string>' requires string as left operand, not '{}'",
            other.type_name()
        )),
        (other, _) => runtime(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        )),
    }
}

fn identical(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

fn resolve_index(index: &Value, len: usize) -> EResult<usize> {
    let Some(i) = index.as_int() else {
        return runtime(format!(
            "indices must be integers, not '{}'",
            index.type_name()
        ));
    };
    let len = len as i64;
    let resolved = if i < 0 { i + len } else { i };
    if resolved < 0 || resolved >= len {
        return runtime("index out of range");
    }
    Ok(resolved as usize)
}

fn subscript(value: &Value, index: &Value) -> EResult<Value> {
    match value {
        Value::List(items) => Ok(items[resolve_index(index, items.len())?].clone()),
        Value::Str(s) => {
            let i = resolve_index(index, s.chars().count())?;
            let c = s.chars().nth(i).unwrap_or_default();
            Ok(Value::str(c.encode_utf8(&mut [0; 4])))
        }
        other => runtime(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        )),
    }
}

fn slice_bound(bound: Option<&Value>, len: usize, default: usize) -> EResult<usize> {
    let i = match bound {
        None | Some(Value::None) => return Ok(default),
        Some(v) => match v.as_int() {
            Some(i) => i,
            None => {
                return runtime(format!(
                    "slice indices must be integers, not '{}'",
                    v.type_name()
                ))
            }
        },
    };
    let len_i = len as i64;
    let clamped = if i < 0 { (i + len_i).max(0) } else { i.min(len_i) };
    Ok(clamped as usize)
}

fn slice(value: &Value, lower: Option<&Value>, upper: Option<&Value>) -> EResult<Value> {
    let len = match value.len() {
        Some(len) => len,
        None => {
            return runtime(format!(
                "'{}' object is not subscriptable",
                value.type_name()
            ))
        }
    };
    let start = slice_bound(lower, len, 0)?;
    let end = slice_bound(upper, len, len)?.max(start);
    match value {
        Value::List(items) => Ok(Value::list(items[start..end].to_vec())),
        Value::Str(s) => Ok(Value::str(
            &s.chars().skip(start).take(end - start).collect::<String>(),
        )),
        _ => Ok(Value::None),
    }
}

fn history(moves: &[Move], c: &Rc<str>, d: &Rc<str>) -> Value {
    Value::list(
        moves
            .iter()
            .map(|m| Value::Str(if m.is_cooperate() { c.clone() } else { d.clone() }))
            .collect(),
    )
}

/// Run module-level statements, then the entry point with one history per
/// opponent followed by the caller's own.
pub(super) fn call_strategy(
    program: &Program,
    limits: &SandboxLimits,
    deadline: Instant,
    opponents: &[&[Move]],
    own: &[Move],
) -> Result<Move, StrategyFault> {
    let def = program
        .functions
        .get(ENTRY_POINT)
        .ok_or(StrategyFault::MissingEntryPoint)?;
    let expected = opponents.len() + 1;
    if def.params.len() != expected {
        return Err(StrategyFault::WrongArity {
            expected,
            found: def.params.len(),
        });
    }

    let mut interp = Interpreter::new(program, limits, deadline);
    interp.exec_block(&program.module)?;

    let (c, d): (Rc<str>, Rc<str>) = (Rc::from("C"), Rc::from("D"));
    let mut args: Vec<Value> = opponents.iter().map(|h| history(h, &c, &d)).collect();
    args.push(history(own, &c, &d));

    let returned = interp.call_function(def, args)?;
    let chosen = match &returned {
        Value::Str(s) => Move::from_symbol(s),
        _ => None,
    };
    chosen.ok_or_else(|| StrategyFault::IllegalReturn(returned.describe()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::{lexer, parser};
    use super::*;

    fn limits() -> SandboxLimits {
        SandboxLimits {
            deadline: Duration::from_secs(10),
            ..SandboxLimits::default()
        }
    }

    /// Evaluate `expr` inside a two-player strategy and return the repr of
    /// the result via the illegal-return path.
    fn eval_repr(body: &str) -> Result<String, StrategyFault> {
        let src = format!("def strategy(o, m):\n{}\n", body);
        let program = parser::parse(lexer::tokenize(&src)?)?;
        let limits = limits();
        let deadline = Instant::now() + limits.deadline;
        match call_strategy(&program, &limits, deadline, &[&[]], &[]) {
            Err(StrategyFault::IllegalReturn(repr)) => Ok(repr),
            Ok(m) => Ok(format!("'{}'", m.symbol())),
            Err(other) => Err(other),
        }
    }

    fn value_of(expr: &str) -> String {
        eval_repr(&format!("    return {}", expr)).unwrap()
    }

    #[test]
    fn test_floor_division_and_modulo() {
        assert_eq!(value_of("7 // 2"), "3");
        assert_eq!(value_of("-7 // 2"), "-4");
        assert_eq!(value_of("7 // -2"), "-4");
        assert_eq!(value_of("-7 % 3"), "2");
        assert_eq!(value_of("7 % -3"), "-2");
        assert_eq!(value_of("7 / 2"), "3.5");
        assert_eq!(value_of("7.5 // 2"), "3.0");
    }

    #[test]
    fn test_integer_overflow_is_a_fault() {
        assert!(matches!(
            eval_repr("    return 9223372036854775807 + 1"),
            Err(StrategyFault::Runtime(_))
        ));
    }

    #[test]
    fn test_short_circuit_returns_operand() {
        assert_eq!(value_of("0 or 'C'"), "'C'");
        assert_eq!(value_of("[] and 1"), "[]");
        // The right side would fail if evaluated.
        assert_eq!(value_of("True or 1 // 0"), "True");
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(value_of("1 < 2 < 3"), "True");
        assert_eq!(value_of("1 < 3 < 2"), "False");
        assert_eq!(value_of("'D' in ['C', 'D']"), "True");
        assert_eq!(value_of("'D' not in 'CCC'"), "True");
        assert_eq!(value_of("None is None"), "True");
    }

    #[test]
    fn test_indexing_and_slicing() {
        assert_eq!(value_of("[1, 2, 3][-1]"), "3");
        assert_eq!(value_of("[1, 2, 3, 4][-2:]"), "[3, 4]");
        assert_eq!(value_of("[1, 2, 3][5:]"), "[]");
        assert_eq!(value_of("'CDD'[1:]"), "'DD'");
        assert_eq!(value_of("[1, 2][:-5]"), "[]");
    }

    #[test]
    fn test_list_mutation() {
        let body = "    x = [0, 0]\n    y = x\n    x[1] = 5\n    x[0] += 2\n    x.append(7)\n    return [x, y]";
        // Assignment copies on write, so `y` keeps the original contents.
        assert_eq!(eval_repr(body).unwrap(), "[[2, 5, 7], [0, 0]]");
    }

    #[test]
    fn test_loops_and_control_flow() {
        let body = "\
    total = 0
    for i in range(10):
        if i % 2 == 0:
            continue
        if i > 7:
            break
        total += i
    n = 0
    while True:
        n += 1
        if n == 3:
            break
    return [total, n]";
        assert_eq!(eval_repr(body).unwrap(), "[16, 3]");
    }

    #[test]
    fn test_histories_are_strings() {
        let src = "def strategy(o, m):\n    return o[0] if len(o) > 0 else 'X'\n";
        let program = parser::parse(lexer::tokenize(src).unwrap()).unwrap();
        let limits = limits();
        let deadline = Instant::now() + limits.deadline;
        let m = call_strategy(&program, &limits, deadline, &[&[Move::Defect]], &[Move::Cooperate]);
        assert_eq!(m, Ok(Move::Defect));
    }

    #[test]
    fn test_wrong_arity_reported_before_running() {
        let src = "def strategy(a, b, c):\n    return 'C'\n";
        let program = parser::parse(lexer::tokenize(src).unwrap()).unwrap();
        let limits = limits();
        let deadline = Instant::now() + limits.deadline;
        assert_eq!(
            call_strategy(&program, &limits, deadline, &[&[]], &[]),
            Err(StrategyFault::WrongArity { expected: 2, found: 3 })
        );
    }

    #[test]
    fn test_undefined_name() {
        assert!(matches!(
            eval_repr("    return missing"),
            Err(StrategyFault::Runtime(_))
        ));
        assert!(matches!(
            eval_repr("    return nothing(1)"),
            Err(StrategyFault::Runtime(_))
        ));
    }

    #[test]
    fn test_collection_cap() {
        assert!(matches!(
            eval_repr("    x = 'C' * 100000\n    return 'C'"),
            Err(StrategyFault::Runtime(_))
        ));
        assert!(matches!(
            eval_repr("    x = []\n    for i in range(10000):\n        x.append(i)\n    x.append(1)\n    return 'C'"),
            Err(StrategyFault::Runtime(_))
        ));
    }
}
