//! Pure primitive functions and read-only methods available to strategies.

use std::cmp::Ordering;

use super::budget::Budget;
use super::value::{Number, Value};
use super::StrategyFault;

pub(super) const BUILTINS: &[&str] = &[
    "len", "min", "max", "sum", "abs", "round", "range", "list", "str", "int", "float", "bool",
    "any", "all", "sorted",
];

pub(super) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub(super) fn runtime<T>(message: impl Into<String>) -> Result<T, StrategyFault> {
    Err(StrategyFault::Runtime(message.into()))
}

pub(super) fn overflow() -> StrategyFault {
    StrategyFault::Runtime("integer overflow".into())
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), StrategyFault> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return runtime(format!(
            "{}() takes {} arguments, got {}",
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

/// Items of a list, or the characters of a string.
pub(super) fn iterate(value: &Value) -> Result<Vec<Value>, StrategyFault> {
    match value {
        Value::List(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect()),
        other => runtime(format!("'{}' object is not iterable", other.type_name())),
    }
}

fn number(name: &str, value: &Value) -> Result<Number, StrategyFault> {
    match value.as_number() {
        Some(n) => Ok(n),
        None => runtime(format!(
            "{}() expects a number, got '{}'",
            name,
            value.type_name()
        )),
    }
}

fn int_arg(name: &str, value: &Value) -> Result<i64, StrategyFault> {
    match value.as_int() {
        Some(i) => Ok(i),
        None => runtime(format!(
            "{}() expects an integer, got '{}'",
            name,
            value.type_name()
        )),
    }
}

fn compare(a: &Value, b: &Value, budget: &mut Budget) -> Result<Ordering, StrategyFault> {
    match a.partial_order(b, budget)? {
        Some(ord) => Ok(ord),
        None => runtime(format!(
            "cannot compare '{}' with '{}'",
            a.type_name(),
            b.type_name()
        )),
    }
}

fn extreme(
    name: &str,
    args: Vec<Value>,
    keep: Ordering,
    budget: &mut Budget,
) -> Result<Value, StrategyFault> {
    if args.is_empty() {
        return runtime(format!("{}() expects at least 1 argument", name));
    }
    let items = if args.len() == 1 { iterate(&args[0])? } else { args };
    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return runtime(format!("{}() arg is an empty sequence", name));
    };
    for item in iter {
        if compare(&item, &best, budget)? == keep {
            best = item;
        }
    }
    Ok(best)
}

pub(super) fn add(a: Number, b: Number) -> Result<Number, StrategyFault> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int).ok_or_else(overflow),
        (x, y) => Ok(Number::Float(x.to_f64() + y.to_f64())),
    }
}

/// Round half to even, as the built-in `round` does.
fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        r
    }
}

fn float_to_int(x: f64) -> Result<i64, StrategyFault> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if !x.is_finite() || x >= LIMIT || x < -LIMIT {
        return runtime(format!("cannot convert float {} to integer", x));
    }
    Ok(x as i64)
}

/// Call a primitive. Anything it builds or walks is charged to `budget`.
pub(super) fn call(name: &str, args: Vec<Value>, budget: &mut Budget) -> Result<Value, StrategyFault> {
    match name {
        "len" => {
            arity(name, &args, 1, 1)?;
            match args[0].len() {
                Some(n) => Ok(Value::Int(n as i64)),
                None => runtime(format!("object of type '{}' has no len()", args[0].type_name())),
            }
        }
        "min" => extreme(name, args, Ordering::Less, budget),
        "max" => extreme(name, args, Ordering::Greater, budget),
        "sum" => {
            arity(name, &args, 1, 2)?;
            let mut total = match args.get(1) {
                Some(start) => number(name, start)?,
                None => Number::Int(0),
            };
            for item in iterate(&args[0])? {
                total = add(total, number(name, &item)?)?;
            }
            Ok(total.into_value())
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match number(name, &args[0])? {
                Number::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(overflow),
                Number::Float(f) => Ok(Value::Float(f.abs())),
            }
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let x = number(name, &args[0])?;
            match args.get(1) {
                None | Some(Value::None) => match x {
                    Number::Int(i) => Ok(Value::Int(i)),
                    Number::Float(f) => float_to_int(round_half_even(f)).map(Value::Int),
                },
                Some(digits) => {
                    let digits = int_arg(name, digits)?.clamp(-308, 308) as i32;
                    match x {
                        Number::Int(i) if digits >= 0 => Ok(Value::Int(i)),
                        _ => {
                            let scale = 10f64.powi(digits);
                            Ok(Value::Float(round_half_even(x.to_f64() * scale) / scale))
                        }
                    }
                }
            }
        }
        "range" => {
            arity(name, &args, 1, 3)?;
            let ints = args
                .iter()
                .map(|a| int_arg(name, a))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => return runtime("range() expects 1 to 3 arguments"),
            };
            if step == 0 {
                return runtime("range() arg 3 must not be zero");
            }
            let span = if step > 0 {
                (stop as i128 - start as i128).max(0)
            } else {
                (start as i128 - stop as i128).max(0)
            };
            let step_abs = (step as i128).abs();
            let len = (span + step_abs - 1) / step_abs;
            budget.cap(usize::try_from(len).unwrap_or(usize::MAX))?;
            let items = (0..len)
                .map(|i| Value::Int((start as i128 + i * step as i128) as i64))
                .collect();
            Ok(Value::list(items))
        }
        "list" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::list(Vec::new())),
                Some(v) => Ok(Value::list(iterate(v)?)),
            }
        }
        "str" => {
            arity(name, &args, 0, 1)?;
            let limit = budget.max_len();
            let s = match args.first() {
                None => String::new(),
                Some(v) => match v.display(limit) {
                    Some(s) => s,
                    None => return runtime(format!("str() result exceeds the limit of {} characters", limit)),
                },
            };
            budget.burn(s.len() as u64)?;
            Ok(Value::str(&s))
        }
        "int" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
                Some(Value::Int(i)) => Ok(Value::Int(*i)),
                Some(Value::Float(f)) => float_to_int(f.trunc()).map(Value::Int),
                Some(Value::Str(s)) => match s.trim().replace('_', "").parse::<i64>() {
                    Ok(i) => Ok(Value::Int(i)),
                    Err(_) => runtime(format!("invalid literal for int(): {}", args[0].describe())),
                },
                Some(other) => runtime(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                )),
            }
        }
        "float" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => match s.trim().parse::<f64>() {
                    Ok(f) => Ok(Value::Float(f)),
                    Err(_) => runtime(format!("could not convert string to float: {}", args[0].describe())),
                },
                Some(v) => Ok(Value::Float(number(name, v)?.to_f64())),
            }
        }
        "bool" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }
        "any" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.iter().any(Value::truthy)))
        }
        "all" => {
            arity(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(&args[0])?.iter().all(Value::truthy)))
        }
        "sorted" => {
            arity(name, &args, 1, 1)?;
            let mut items = iterate(&args[0])?;
            let mut failure = None;
            items.sort_by(|a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                compare(a, b, budget).unwrap_or_else(|fault| {
                    failure = Some(fault);
                    Ordering::Equal
                })
            });
            match failure {
                Some(fault) => Err(fault),
                None => Ok(Value::list(items)),
            }
        }
        other => runtime(format!("name '{}' is not defined", other)),
    }
}

/// Read-only methods: `count` and `index` on lists and strings.
pub(super) fn call_method(
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
    budget: &mut Budget,
) -> Result<Value, StrategyFault> {
    match (receiver, name) {
        (Value::List(items), "count") => {
            arity(name, &args, 1, 1)?;
            let mut n = 0;
            for item in items.iter() {
                if item.loose_eq(&args[0], budget)? {
                    n += 1;
                }
            }
            Ok(Value::Int(n))
        }
        (Value::List(items), "index") => {
            arity(name, &args, 1, 1)?;
            for (i, item) in items.iter().enumerate() {
                if item.loose_eq(&args[0], budget)? {
                    return Ok(Value::Int(i as i64));
                }
            }
            runtime(format!("{} is not in list", args[0].describe()))
        }
        (Value::Str(s), "count") => {
            arity(name, &args, 1, 1)?;
            let Value::Str(needle) = &args[0] else {
                return runtime("str.count() expects a string");
            };
            let n = if needle.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(&**needle).count()
            };
            Ok(Value::Int(n as i64))
        }
        (Value::Str(s), "index") => {
            arity(name, &args, 1, 1)?;
            let Value::Str(needle) = &args[0] else {
                return runtime("str.index() expects a string");
            };
            match s.find(&**needle) {
                Some(byte) => Ok(Value::Int(s[..byte].chars().count() as i64)),
                None => runtime("substring not found"),
            }
        }
        (value, _) => runtime(format!(
            "'{}' object has no method '{}'",
            value.type_name(),
            name
        )),
    }
}
