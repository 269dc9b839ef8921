//! Runtime values of the strategy language.
//!
//! Every walk over a nested value (equality, ordering) is charged to the
//! call's [`Budget`], and rendering stops as soon as the output passes its
//! limit, so a large or deep structure costs the strategy, not the host.

use std::cmp::Ordering;
use std::ops::Deref;
use std::rc::Rc;

use super::budget::Budget;
use super::StrategyFault;

/// Deepest allowed list nesting. Keeps every recursive walk, and the drop of
/// a nested list, far inside a thread stack.
pub(super) const MAX_LIST_DEPTH: usize = 32;

/// Longest rendering used in fault messages.
const DESCRIBE_LIMIT: usize = 80;

/// String bytes compared per step.
pub(super) const TEXT_CHUNK: usize = 64;

#[derive(Clone, Debug)]
pub(super) enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<List>),
}

/// List items plus the nesting depth of the list.
///
/// Depth only grows when an item is replaced, so after `set` it may
/// overestimate.
#[derive(Clone, Debug, Default)]
pub(super) struct List {
    items: Vec<Value>,
    depth: usize,
}

impl List {
    fn new(items: Vec<Value>) -> Self {
        let depth = 1 + items.iter().map(Value::depth).max().unwrap_or(0);
        Self { items, depth }
    }

    pub fn push(&mut self, item: Value) {
        self.depth = self.depth.max(item.depth() + 1);
        self.items.push(item);
    }

    pub fn set(&mut self, index: usize, item: Value) {
        self.depth = self.depth.max(item.depth() + 1);
        self.items[index] = item;
    }
}

impl Deref for List {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.items
    }
}

fn compare_cost(a: &Value, b: &Value) -> u64 {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => 1 + (x.len().min(y.len()) / TEXT_CHUNK) as u64,
        _ => 1,
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(List::new(items)))
    }

    /// List nesting depth; 0 for anything that is not a list.
    pub fn depth(&self) -> usize {
        match self {
            Value::List(l) => l.depth,
            _ => 0,
        }
    }
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
        }
    }

    /// Numeric view, with bools counting as 0 and 1.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(l) => Some(l.len()),
            _ => None,
        }
    }

    pub fn loose_eq(&self, other: &Value, budget: &mut Budget) -> Result<bool, StrategyFault> {
        budget.burn(compare_cost(self, other))?;
        match (self, other) {
            (Value::None, Value::None) => Ok(true),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.loose_eq(y, budget)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.cmp_with(b) == Some(Ordering::Equal),
                _ => false,
            }),
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`. `None` when the two
    /// values cannot be ordered.
    pub fn partial_order(
        &self,
        other: &Value,
        budget: &mut Budget,
    ) -> Result<Option<Ordering>, StrategyFault> {
        budget.burn(compare_cost(self, other))?;
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.loose_eq(y, budget)? {
                        return x.partial_order(y, budget);
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => Ok(match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.cmp_with(b),
                _ => None,
            }),
        }
    }

    /// What `str()` produces: strings as they are, anything else in source
    /// form. `None` once the text would pass `limit` bytes.
    pub fn display(&self, limit: usize) -> Option<String> {
        match self {
            Value::Str(s) => (s.len() <= limit).then(|| s.to_string()),
            other => {
                let mut out = String::new();
                other.write_repr(&mut out, limit).then_some(out)
            }
        }
    }

    /// Short source-like rendering for fault messages.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.write_repr(&mut out, DESCRIBE_LIMIT) {
            let mut end = DESCRIBE_LIMIT.min(out.len());
            while !out.is_char_boundary(end) {
                end -= 1;
            }
            out.truncate(end);
            out.push_str("...");
        }
        out
    }

    /// Append the source form to `out`, giving up once it passes `limit`.
    fn write_repr(&self, out: &mut String, limit: usize) -> bool {
        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Float(x) => out.push_str(&format_float(*x)),
            Value::Str(s) => {
                out.push('\'');
                out.extend(s.escape_default());
                out.push('\'');
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if !item.write_repr(out, limit) {
                        return false;
                    }
                }
                out.push(']');
            }
        }
        out.len() <= limit
    }
}

fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn cmp_with(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::super::SandboxLimits;
    use super::*;

    fn budget(fuel: u64) -> Budget {
        let limits = SandboxLimits {
            fuel,
            deadline: Duration::from_secs(10),
            ..SandboxLimits::default()
        };
        Budget::new(&limits, Instant::now() + limits.deadline)
    }

    fn eq(a: &Value, b: &Value) -> bool {
        a.loose_eq(b, &mut budget(u64::MAX)).unwrap()
    }

    fn order(a: &Value, b: &Value) -> Option<Ordering> {
        a.partial_order(b, &mut budget(u64::MAX)).unwrap()
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.truthy());
        assert!(!Value::Int(0).truthy());
        assert!(Value::Float(0.5).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("C").truthy());
        assert!(!Value::list(vec![]).truthy());
        assert!(Value::list(vec![Value::None]).truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert!(eq(&Value::Int(1), &Value::Float(1.0)));
        assert!(eq(&Value::Bool(true), &Value::Int(1)));
        assert!(!eq(&Value::Int(1), &Value::str("1")));
        assert!(!eq(&Value::None, &Value::Int(0)));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(order(&Value::str("C"), &Value::str("D")), Some(Ordering::Less));
        assert_eq!(order(&Value::Int(3), &Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(order(&Value::Int(3), &Value::str("a")), None);
        let a = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert_eq!(order(&a, &b), Some(Ordering::Greater));
        let n = Value::list(vec![Value::None]);
        assert_eq!(order(&n, &n), Some(Ordering::Equal));
    }

    #[test]
    fn test_repr() {
        let v = Value::list(vec![Value::str("C"), Value::Int(2), Value::Float(0.5), Value::Float(3.0), Value::None]);
        assert_eq!(v.describe(), "['C', 2, 0.5, 3.0, None]");
        assert_eq!(Value::str("D").display(10).as_deref(), Some("D"));
        assert_eq!(Value::Bool(true).display(10).as_deref(), Some("True"));
    }

    #[test]
    fn test_rendering_stops_at_limit() {
        let wide = Value::list(vec![Value::str(&"C".repeat(100)); 1000]);
        assert_eq!(wide.display(500), None);
        let short = wide.describe();
        assert!(short.ends_with("..."));
        assert_eq!(short.len(), DESCRIBE_LIMIT + 3);
        assert_eq!(Value::str("CCC").display(2), None);
    }

    #[test]
    fn test_depth_tracking() {
        let flat = Value::list(vec![Value::Int(1)]);
        assert_eq!(Value::Int(1).depth(), 0);
        assert_eq!(flat.depth(), 1);
        let nested = Value::list(vec![flat.clone(), Value::list(vec![flat.clone()])]);
        assert_eq!(nested.depth(), 3);

        let mut list = List::new(vec![Value::None]);
        list.push(nested);
        assert_eq!(list.depth, 4);
        list.set(0, flat);
        assert_eq!(list.depth, 4);
    }

    #[test]
    fn test_walks_are_charged() {
        let row = Value::list(vec![Value::Int(0); 100]);
        let grid = Value::list(vec![row; 100]);
        assert_eq!(
            grid.loose_eq(&grid, &mut budget(1_000)),
            Err(StrategyFault::FuelExhausted(1_000))
        );
        assert!(grid.loose_eq(&grid, &mut budget(20_000)).unwrap());
        assert!(matches!(
            grid.partial_order(&grid, &mut budget(1_000)),
            Err(StrategyFault::FuelExhausted(_))
        ));
    }
}
