use crate::ast::{BinaryOperator, Expression, FunctionCall, Literal, UnaryOperator};
use crate::error::{Error, Result};
use crate::executor::{Binding, Row};
use crate::query_api::Params;
use crate::value::Value;
use contextgraph_api::GraphView;
use log::{trace, warn};
use regex::Regex;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Compiled `=~` patterns, shared by every evaluation in one query. Patterns
/// that fail to compile are remembered as `None` and never match.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: RefCell<HashMap<String, Option<Regex>>>,
}

impl RegexCache {
    /// Search semantics: the pattern may match anywhere in `text`.
    fn is_match(&self, pattern: &str, text: &str) -> bool {
        if let Some(re) = self.compiled.borrow().get(pattern) {
            return re.as_ref().is_some_and(|re| re.is_match(text));
        }
        let re = match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("invalid regular expression '{pattern}' never matches: {e}");
                None
            }
        };
        let matched = re.as_ref().is_some_and(|re| re.is_match(text));
        self.compiled.borrow_mut().insert(pattern.to_string(), re);
        matched
    }
}

/// Evaluates expressions against one binding row and a read-only graph.
pub struct Evaluator<'a> {
    graph: &'a dyn GraphView,
    params: &'a Params,
    regexes: &'a RegexCache,
}

impl<'a> Evaluator<'a> {
    pub fn new(graph: &'a dyn GraphView, params: &'a Params, regexes: &'a RegexCache) -> Self {
        Self {
            graph,
            params,
            regexes,
        }
    }

    pub fn evaluate(&self, expr: &Expression, row: &Row) -> Result<Value> {
        self.eval(expr, row, None)
    }

    /// Evaluates a condition with truthiness coercion.
    pub fn evaluate_bool(&self, expr: &Expression, row: &Row) -> Result<bool> {
        Ok(self.evaluate(expr, row)?.is_truthy())
    }

    /// Evaluates a RETURN item of an aggregating query. Aggregate calls fold over
    /// `rows`; everything outside them sees an empty binding.
    pub fn evaluate_aggregate(&self, expr: &Expression, rows: &[Row]) -> Result<Value> {
        self.eval(expr, &Row::default(), Some(rows))
    }

    /// Reads a bound variable as a value. Entities deleted since binding read as null.
    pub fn binding_value(&self, binding: &Binding) -> Value {
        match binding {
            Binding::Node(id) => self
                .graph
                .node(*id)
                .map(|n| Value::Node(n.clone()))
                .unwrap_or(Value::Null),
            Binding::Relationship(id) => self
                .graph
                .relationship(*id)
                .map(|r| Value::Relationship(r.clone()))
                .unwrap_or(Value::Null),
            Binding::Path(ids) => Value::List(
                ids.iter()
                    .filter_map(|id| self.graph.relationship(*id))
                    .map(|r| Value::Relationship(r.clone()))
                    .collect(),
            ),
            Binding::Value(v) => v.clone(),
        }
    }

    fn eval(&self, expr: &Expression, row: &Row, group: Option<&[Row]>) -> Result<Value> {
        match expr {
            Expression::Literal(lit) => Ok(match lit {
                Literal::String(s) => Value::String(s.clone()),
                Literal::Integer(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Boolean(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            Expression::Variable(name) => Ok(row
                .get(name)
                .map(|b| self.binding_value(b))
                .unwrap_or(Value::Null)),
            Expression::Parameter(name) => self
                .params
                .get(name)
                .cloned()
                .ok_or_else(|| Error::database(format!("missing parameter ${name}"))),
            Expression::PropertyAccess(pa) => Ok(self.property(row, &pa.variable, &pa.property)),
            Expression::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|e| self.eval(e, row, group))
                    .collect::<Result<_>>()?,
            )),
            Expression::Unary(u) => {
                let operand = self.eval(&u.operand, row, group)?;
                match u.operator {
                    UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
                    UnaryOperator::IsNull => Ok(Value::Bool(operand.is_null())),
                    UnaryOperator::IsNotNull => Ok(Value::Bool(!operand.is_null())),
                    UnaryOperator::Negate => negate(operand),
                }
            }
            Expression::Binary(b) => {
                // Boolean connectives short-circuit.
                match b.operator {
                    BinaryOperator::And => {
                        let left = self.eval(&b.left, row, group)?.is_truthy();
                        return Ok(Value::Bool(
                            left && self.eval(&b.right, row, group)?.is_truthy(),
                        ));
                    }
                    BinaryOperator::Or => {
                        let left = self.eval(&b.left, row, group)?.is_truthy();
                        return Ok(Value::Bool(
                            left || self.eval(&b.right, row, group)?.is_truthy(),
                        ));
                    }
                    _ => {}
                }
                let left = self.eval(&b.left, row, group)?;
                let right = self.eval(&b.right, row, group)?;
                self.apply_binary(b.operator, left, right)
            }
            Expression::FunctionCall(call) => {
                if call.is_aggregate() {
                    return match group {
                        Some(rows) => self.aggregate(call, rows),
                        None => Err(Error::database(format!(
                            "aggregate function {} is only allowed in RETURN",
                            call.name.to_uppercase()
                        ))),
                    };
                }
                let args = call
                    .args
                    .iter()
                    .map(|e| self.eval(e, row, group))
                    .collect::<Result<Vec<_>>>()?;
                call_function(&call.name, args)
            }
        }
    }

    fn property(&self, row: &Row, variable: &str, key: &str) -> Value {
        let found = match row.get(variable) {
            Some(Binding::Node(id)) => self.graph.node_property(*id, key).map(Value::from),
            Some(Binding::Relationship(id)) => {
                self.graph.relationship_property(*id, key).map(Value::from)
            }
            Some(Binding::Value(Value::Map(map))) => map.get(key).cloned(),
            Some(Binding::Value(Value::Node(n))) => n.property(key).map(Value::from),
            Some(Binding::Value(Value::Relationship(r))) => r.property(key).map(Value::from),
            _ => None,
        };
        found.unwrap_or(Value::Null)
    }

    fn apply_binary(&self, operator: BinaryOperator, left: Value, right: Value) -> Result<Value> {
        let result = match operator {
            BinaryOperator::Equal => Value::Bool(values_equal(&left, &right)),
            BinaryOperator::NotEqual => Value::Bool(!values_equal(&left, &right)),
            BinaryOperator::LessThan => {
                Value::Bool(compare_values(&left, &right) == Some(Ordering::Less))
            }
            BinaryOperator::LessEqual => Value::Bool(matches!(
                compare_values(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinaryOperator::GreaterThan => {
                Value::Bool(compare_values(&left, &right) == Some(Ordering::Greater))
            }
            BinaryOperator::GreaterEqual => Value::Bool(matches!(
                compare_values(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOperator::Xor => Value::Bool(left.is_truthy() != right.is_truthy()),
            BinaryOperator::StartsWith
            | BinaryOperator::EndsWith
            | BinaryOperator::Contains
            | BinaryOperator::RegexMatch => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Bool(false));
                }
                let text = left.to_string();
                let needle = right.to_string();
                Value::Bool(match operator {
                    BinaryOperator::StartsWith => text.starts_with(&needle),
                    BinaryOperator::EndsWith => text.ends_with(&needle),
                    BinaryOperator::Contains => text.contains(&needle),
                    _ => {
                        trace!("regex match {needle:?} against {text:?}");
                        self.regexes.is_match(&needle, &text)
                    }
                })
            }
            BinaryOperator::In => match right {
                Value::List(items) => Value::Bool(items.iter().any(|v| values_equal(&left, v))),
                Value::Null => Value::Bool(false),
                other => {
                    return Err(Error::database(format!(
                        "IN expects a list, got {}",
                        other.type_name()
                    )));
                }
            },
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo => return arithmetic(operator, left, right),
            // Handled with short-circuiting in `eval`.
            BinaryOperator::And => Value::Bool(left.is_truthy() && right.is_truthy()),
            BinaryOperator::Or => Value::Bool(left.is_truthy() || right.is_truthy()),
        };
        Ok(result)
    }

    fn aggregate(&self, call: &FunctionCall, rows: &[Row]) -> Result<Value> {
        let name = call.name.to_uppercase();
        if call.star {
            return Ok(Value::Int(rows.len() as i64));
        }
        let [arg] = call.args.as_slice() else {
            return Err(Error::database(format!(
                "{name} expects exactly one argument"
            )));
        };

        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = self.eval(arg, row, None)?;
            if value.is_null() {
                continue;
            }
            if call.distinct && values.iter().any(|seen| values_equal(seen, &value)) {
                continue;
            }
            values.push(value);
        }

        match name.as_str() {
            "COUNT" => Ok(Value::Int(values.len() as i64)),
            "COLLECT" => Ok(Value::List(values)),
            _ => {
                let numbers: Vec<Value> = values.into_iter().filter(Value::is_numeric).collect();
                if numbers.is_empty() {
                    return Ok(Value::Null);
                }
                match name.as_str() {
                    "SUM" => sum(&numbers),
                    "AVG" => {
                        let total: f64 = numbers.iter().filter_map(Value::as_f64).sum();
                        Ok(Value::Float(total / numbers.len() as f64))
                    }
                    "MIN" => Ok(extreme(numbers, Ordering::Less)),
                    "MAX" => Ok(extreme(numbers, Ordering::Greater)),
                    _ => Err(Error::database(format!("unknown aggregate function: {name}"))),
                }
            }
        }
    }
}

fn sum(numbers: &[Value]) -> Result<Value> {
    if numbers.iter().any(|v| matches!(v, Value::Float(_))) {
        return Ok(Value::Float(numbers.iter().filter_map(Value::as_f64).sum()));
    }
    let mut total: i64 = 0;
    for n in numbers.iter().filter_map(Value::as_i64) {
        total = total
            .checked_add(n)
            .ok_or_else(|| Error::database("integer overflow in SUM"))?;
    }
    Ok(Value::Int(total))
}

fn extreme(numbers: Vec<Value>, keep: Ordering) -> Value {
    numbers
        .into_iter()
        .reduce(|best, v| {
            if compare_values(&v, &best) == Some(keep) {
                v
            } else {
                best
            }
        })
        .unwrap_or(Value::Null)
}

/// Equality used by `=`, `<>`, `IN` and DISTINCT aggregates. Null equals null;
/// integers and floats compare numerically; entities compare by id.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        (Value::Node(a), Value::Node(b)) => a.id == b.id,
        (Value::Relationship(a), Value::Relationship(b)) => a.id == b.id,
        _ => left == right,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`. Only numbers, strings and booleans are
/// comparable; everything else (null included) yields `None`.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        _ => None,
    }
}

/// Total order used for sorting. Values of different kinds are grouped by kind;
/// nulls are placed by the caller.
pub fn sort_order(left: &Value, right: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::List(_) => 3,
            Value::Map(_) => 4,
            Value::Node(_) => 5,
            Value::Relationship(_) => 6,
            Value::Null => 7,
        }
    }
    if let Some(ord) = compare_values(left, right) {
        return ord;
    }
    match (left, right) {
        (Value::Node(a), Value::Node(b)) => a.id.cmp(&b.id),
        (Value::Relationship(a), Value::Relationship(b)) => a.id.cmp(&b.id),
        (Value::List(a), Value::List(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| sort_order(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(left)
            .cmp(&rank(right))
            .then_with(|| left.to_string().cmp(&right.to_string())),
    }
}

fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::database("integer overflow")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(Error::database(format!(
            "cannot negate a {}",
            other.type_name()
        ))),
    }
}

fn arithmetic(operator: BinaryOperator, left: Value, right: Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let symbol = operator.symbol();
    match (operator, left, right) {
        (BinaryOperator::Add, Value::String(a), b) => Ok(Value::String(format!("{a}{b}"))),
        (BinaryOperator::Add, a, Value::String(b)) if !matches!(a, Value::List(_)) => {
            Ok(Value::String(format!("{a}{b}")))
        }
        (BinaryOperator::Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (BinaryOperator::Add, Value::List(mut a), b) => {
            a.push(b);
            Ok(Value::List(a))
        }
        (op, Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOperator::Add => a.checked_add(b),
                BinaryOperator::Subtract => a.checked_sub(b),
                BinaryOperator::Multiply => a.checked_mul(b),
                BinaryOperator::Divide | BinaryOperator::Modulo if b == 0 => {
                    return Err(Error::database("division by zero"));
                }
                BinaryOperator::Divide => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| Error::database(format!("integer overflow in {a} {symbol} {b}")))
        }
        (op, a, b) if a.is_numeric() && b.is_numeric() => {
            let (x, y) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            Ok(Value::Float(match op {
                BinaryOperator::Add => x + y,
                BinaryOperator::Subtract => x - y,
                BinaryOperator::Multiply => x * y,
                BinaryOperator::Divide => x / y,
                _ => x % y,
            }))
        }
        (_, a, b) => Err(Error::database(format!(
            "unsupported operand types for {symbol}: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(Error::database(format!(
            "{name} expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn call_function(name: &str, args: Vec<Value>) -> Result<Value> {
    let upper = name.to_uppercase();
    match upper.as_str() {
        "UPPER" | "LOWER" | "TRIM" | "LTRIM" | "RTRIM" | "LENGTH" | "REVERSE" => {
            expect_args(&upper, &args, 1, 1)?;
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            let text = args[0].to_string();
            Ok(match upper.as_str() {
                "UPPER" => Value::String(text.to_uppercase()),
                "LOWER" => Value::String(text.to_lowercase()),
                "TRIM" => Value::String(text.trim().to_string()),
                "LTRIM" => Value::String(text.trim_start().to_string()),
                "RTRIM" => Value::String(text.trim_end().to_string()),
                "LENGTH" => Value::Int(text.chars().count() as i64),
                _ => Value::String(text.chars().rev().collect()),
            })
        }
        "SUBSTRING" => {
            expect_args(&upper, &args, 2, 3)?;
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            let chars: Vec<char> = args[0].to_string().chars().collect();
            let Some(start) = integer_arg(&args[1]) else {
                return Ok(Value::Null);
            };
            let end = match args.get(2) {
                Some(len) => match integer_arg(len) {
                    Some(len) => Some(start.saturating_add(len)),
                    None => return Ok(Value::Null),
                },
                None => None,
            };
            Ok(Value::String(slice_chars(&chars, start, end)))
        }
        "REPLACE" => {
            expect_args(&upper, &args, 3, 3)?;
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            Ok(Value::String(
                args[0]
                    .to_string()
                    .replace(&args[1].to_string(), &args[2].to_string()),
            ))
        }
        "SPLIT" => {
            expect_args(&upper, &args, 1, 2)?;
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            let text = args[0].to_string();
            let parts: Vec<Value> = match args.get(1) {
                None => text.split_whitespace().map(Value::from).collect(),
                Some(delimiter) => {
                    let delimiter = delimiter.to_string();
                    if delimiter.is_empty() {
                        return Ok(Value::Null);
                    }
                    text.split(delimiter.as_str()).map(Value::from).collect()
                }
            };
            Ok(Value::List(parts))
        }
        "ID" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::Node(n) => Ok(Value::Int(n.id as i64)),
                Value::Relationship(r) => Ok(Value::Int(r.id as i64)),
                Value::Null => Ok(Value::Null),
                other => Err(type_error(&upper, "a node or relationship", other)),
            }
        }
        "TYPE" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::Relationship(r) => Ok(Value::String(r.rel_type.clone())),
                Value::Null => Ok(Value::Null),
                other => Err(type_error(&upper, "a relationship", other)),
            }
        }
        "LABELS" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::Node(n) => Ok(Value::from(n.labels.clone())),
                Value::Null => Ok(Value::Null),
                other => Err(type_error(&upper, "a node", other)),
            }
        }
        "COALESCE" => {
            expect_args(&upper, &args, 1, usize::MAX)?;
            Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null))
        }
        "SIZE" => {
            expect_args(&upper, &args, 1, 1)?;
            match &args[0] {
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                Value::Map(map) => Ok(Value::Int(map.len() as i64)),
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::Null => Ok(Value::Null),
                other => Err(type_error(&upper, "a list, map or string", other)),
            }
        }
        "TOSTRING" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                other => Value::String(other.to_string()),
            })
        }
        "TOINTEGER" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(match &args[0] {
                Value::Int(i) => Value::Int(*i),
                Value::Float(f) => float_to_int(*f),
                Value::String(s) => {
                    let s = s.trim();
                    match s.parse::<i64>() {
                        Ok(i) => Value::Int(i),
                        Err(_) => s.parse::<f64>().map(float_to_int).unwrap_or(Value::Null),
                    }
                }
                _ => Value::Null,
            })
        }
        "TOFLOAT" => {
            expect_args(&upper, &args, 1, 1)?;
            Ok(match &args[0] {
                Value::Int(i) => Value::Float(*i as f64),
                Value::Float(f) => Value::Float(*f),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }
        _ => Err(Error::database(format!("unknown function: {name}"))),
    }
}

fn type_error(function: &str, expected: &str, got: &Value) -> Error {
    Error::database(format!(
        "{function} expects {expected}, got {}",
        got.type_name()
    ))
}

fn integer_arg(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        _ => None,
    }
}

fn float_to_int(f: f64) -> Value {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Value::Int(f.trunc() as i64)
    } else {
        Value::Null
    }
}

/// Slices characters with negative indices counting from the end; out-of-range
/// bounds clamp instead of failing.
fn slice_chars(chars: &[char], start: i64, end: Option<i64>) -> String {
    let len = chars.len() as i64;
    let clamp = |i: i64| -> usize {
        let i = if i < 0 { (len + i).max(0) } else { i.min(len) };
        i as usize
    };
    let from = clamp(start);
    let to = end.map_or(chars.len(), clamp);
    if from >= to {
        return String::new();
    }
    chars[from..to].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use contextgraph_api::{Properties, PropertyValue};
    use contextgraph_storage::GraphStore;

    fn eval_with(store: &GraphStore, row: &Row, text: &str) -> Result<Value> {
        let query = Parser::parse(&format!("RETURN {text}")).unwrap();
        let expr = &query.return_clause.unwrap().items[0].expression;
        let params = Params::new();
        let regexes = RegexCache::default();
        Evaluator::new(store, &params, &regexes).evaluate(expr, row)
    }

    fn eval(text: &str) -> Value {
        eval_with(&GraphStore::default(), &Row::default(), text).unwrap()
    }

    #[test]
    fn test_null_comparison_semantics() {
        assert_eq!(eval("null = null"), Value::Bool(true));
        assert_eq!(eval("1 = null"), Value::Bool(false));
        assert_eq!(eval("1 <> null"), Value::Bool(true));
        assert_eq!(eval("null < 1"), Value::Bool(false));
        assert_eq!(eval("null >= null"), Value::Bool(false));
        assert_eq!(eval("'a' < 1"), Value::Bool(false));
        assert_eq!(eval("1 = 1.0"), Value::Bool(true));
        assert_eq!(eval("2 > 1.5"), Value::Bool(true));
    }

    #[test]
    fn test_boolean_connectives_use_truthiness() {
        assert_eq!(eval("1 AND 'x'"), Value::Bool(true));
        assert_eq!(eval("0 OR ''"), Value::Bool(false));
        assert_eq!(eval("NOT []"), Value::Bool(true));
        assert_eq!(eval("true XOR true"), Value::Bool(false));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("7 / 2"), Value::Int(3));
        assert_eq!(eval("7 / 2.0"), Value::Float(3.5));
        assert_eq!(eval("7 % 3"), Value::Int(1));
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("-(2 - 5)"), Value::Int(3));
        assert_eq!(eval("'a' + 1"), Value::from("a1"));
        assert_eq!(eval("[1] + [2, 3]"), Value::from(vec![1i64, 2, 3]));
        assert_eq!(eval("null + 1"), Value::Null);
        let store = GraphStore::default();
        assert!(eval_with(&store, &Row::default(), "1 / 0").is_err());
        assert!(eval_with(&store, &Row::default(), "true * 2").is_err());
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(eval("'Alice' STARTS WITH 'Al'"), Value::Bool(true));
        assert_eq!(eval("'Alice' ENDS WITH 'ce'"), Value::Bool(true));
        assert_eq!(eval("'Alice' CONTAINS 'lic'"), Value::Bool(true));
        assert_eq!(eval("'Alice' CONTAINS null"), Value::Bool(false));
        assert_eq!(eval("'alice@example.com' =~ '@example'"), Value::Bool(true));
        assert_eq!(eval("'Bob' =~ '^A'"), Value::Bool(false));
        assert_eq!(eval("'x' =~ '('"), Value::Bool(false));
        assert_eq!(eval("'(' =~ '('"), Value::Bool(false));
    }

    #[test]
    fn test_invalid_regex_is_remembered() {
        let cache = RegexCache::default();
        assert!(!cache.is_match("[", "["));
        assert!(!cache.is_match("[", "[["));
        assert!(cache.compiled.borrow().get("[").is_some_and(Option::is_none));
        assert!(cache.is_match("a+", "baa"));
    }

    #[test]
    fn test_in_list() {
        assert_eq!(eval("2 IN [1, 2, 3]"), Value::Bool(true));
        assert_eq!(eval("'z' IN ['a']"), Value::Bool(false));
        assert_eq!(eval("1 IN null"), Value::Bool(false));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("UPPER('abc')"), Value::from("ABC"));
        assert_eq!(eval("lower('ABC')"), Value::from("abc"));
        assert_eq!(eval("TRIM('  x  ')"), Value::from("x"));
        assert_eq!(eval("LTRIM('  x ')"), Value::from("x "));
        assert_eq!(eval("RTRIM(' x  ')"), Value::from(" x"));
        assert_eq!(eval("LENGTH('héllo')"), Value::Int(5));
        assert_eq!(eval("LENGTH(12345)"), Value::Int(5));
        assert_eq!(eval("REVERSE('abc')"), Value::from("cba"));
        assert_eq!(eval("SUBSTRING('hello', 1, 3)"), Value::from("ell"));
        assert_eq!(eval("SUBSTRING('hello', 2)"), Value::from("llo"));
        assert_eq!(eval("SUBSTRING('hello', -3, 2)"), Value::from("ll"));
        assert_eq!(eval("SUBSTRING('hello', 10)"), Value::from(""));
        assert_eq!(eval("REPLACE('a-b-c', '-', '+')"), Value::from("a+b+c"));
        assert_eq!(
            eval("SPLIT('a b  c')"),
            Value::from(vec!["a", "b", "c"])
        );
        assert_eq!(eval("SPLIT('a,b', ',')"), Value::from(vec!["a", "b"]));
        assert_eq!(eval("UPPER(null)"), Value::Null);
    }

    #[test]
    fn test_conversion_functions() {
        assert_eq!(eval("TOINTEGER('42')"), Value::Int(42));
        assert_eq!(eval("TOINTEGER('4.7')"), Value::Int(4));
        assert_eq!(eval("TOINTEGER('x')"), Value::Null);
        assert_eq!(eval("TOFLOAT(3)"), Value::Float(3.0));
        assert_eq!(eval("TOSTRING(2.0)"), Value::from("2.0"));
        assert_eq!(eval("COALESCE(null, null, 3)"), Value::Int(3));
        assert_eq!(eval("SIZE([1, 2])"), Value::Int(2));
    }

    #[test]
    fn test_unknown_function_and_misplaced_aggregate() {
        let store = GraphStore::default();
        assert!(matches!(
            eval_with(&store, &Row::default(), "NOPE(1)"),
            Err(Error::Database(msg)) if msg.contains("unknown function")
        ));
        assert!(eval_with(&store, &Row::default(), "COUNT(1)").is_err());
    }

    #[test]
    fn test_entity_access_and_deleted_binding() {
        let mut store = GraphStore::default();
        let a = store
            .create_node(
                ["Person"],
                Properties::from([("name".to_string(), PropertyValue::from("Ann"))]),
                None,
            )
            .unwrap();
        let b = store.create_node(["Person"], Properties::new(), None).unwrap();
        let r = store.create_relationship(a, b, "KNOWS", Properties::new()).unwrap();
        let row = Row::default()
            .with("a", Binding::Node(a))
            .with("r", Binding::Relationship(r));

        assert_eq!(eval_with(&store, &row, "a.name").unwrap(), Value::from("Ann"));
        assert_eq!(eval_with(&store, &row, "a.missing").unwrap(), Value::Null);
        assert_eq!(eval_with(&store, &row, "TYPE(r)").unwrap(), Value::from("KNOWS"));
        assert_eq!(eval_with(&store, &row, "ID(a)").unwrap(), Value::Int(a as i64));
        assert_eq!(
            eval_with(&store, &row, "LABELS(a)").unwrap(),
            Value::from(vec!["Person"])
        );
        assert_eq!(eval_with(&store, &row, "unbound").unwrap(), Value::Null);

        store.delete_node(a);
        assert_eq!(eval_with(&store, &row, "a").unwrap(), Value::Null);
        assert_eq!(eval_with(&store, &row, "r").unwrap(), Value::Null);
    }

    #[test]
    fn test_aggregates() {
        let store = GraphStore::default();
        let rows: Vec<Row> = [
            Value::Int(1),
            Value::Float(2.5),
            Value::from("skip"),
            Value::Null,
            Value::Int(1),
        ]
        .into_iter()
        .map(|v| Row::default().with("x", Binding::Value(v)))
        .collect();
        let params = Params::new();
        let regexes = RegexCache::default();
        let evaluator = Evaluator::new(&store, &params, &regexes);
        let agg = |text: &str| {
            let query = Parser::parse(&format!("RETURN {text}")).unwrap();
            let expr = query.return_clause.unwrap().items[0].expression.clone();
            evaluator.evaluate_aggregate(&expr, &rows).unwrap()
        };

        assert_eq!(agg("COUNT(*)"), Value::Int(5));
        assert_eq!(agg("COUNT(x)"), Value::Int(4));
        assert_eq!(agg("COUNT(DISTINCT x)"), Value::Int(3));
        assert_eq!(agg("SUM(x)"), Value::Float(4.5));
        assert_eq!(agg("AVG(x)"), Value::Float(1.5));
        assert_eq!(agg("MIN(x)"), Value::Int(1));
        assert_eq!(agg("MAX(x)"), Value::Float(2.5));
        assert_eq!(agg("COUNT(*) + 1"), Value::Int(6));
        assert_eq!(
            agg("COLLECT(x)"),
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("skip"),
                Value::Int(1)
            ])
        );

        let empty: Vec<Row> = Vec::new();
        let query = Parser::parse("RETURN SUM(x)").unwrap();
        let expr = &query.return_clause.unwrap().items[0].expression;
        assert_eq!(evaluator.evaluate_aggregate(expr, &empty).unwrap(), Value::Null);
    }

    #[test]
    fn test_sort_order_groups_kinds() {
        assert_eq!(sort_order(&Value::Int(2), &Value::Float(1.5)), Ordering::Greater);
        assert_eq!(sort_order(&Value::from("a"), &Value::Int(9)), Ordering::Greater);
        assert_eq!(sort_order(&Value::from("a"), &Value::from("b")), Ordering::Less);
    }
}
