// src/template/funcs.rs

//! Helper functions callable from templates.
//!
//! Names and argument order follow the sprig conventions that Helm charts
//! use (the piped value is always the *last* argument, so
//! `{{ env "HOSTNAME" | splitList "-" | mustLast }}` works as expected).
//! `include` is not here; it needs the executor and lives in `exec.rs`.

use std::cmp::Ordering;

use super::value::Value;
use super::TemplateError;
use crate::cluster::{node_address_at, random_node_address, NodeAddresses};
use crate::identity::Environment;

/// Everything helpers may consult outside their arguments.
pub struct HelperContext<'a> {
    pub env: &'a Environment,
    pub nodes: &'a dyn NodeAddresses,
}

pub fn call(name: &str, args: Vec<Value>, ctx: &HelperContext<'_>) -> Result<Value, TemplateError> {
    match name {
        // environment / cluster
        "env" => {
            let [key] = exact::<1>(name, args)?;
            Ok(Value::Str(ctx.env.get(&key.to_string()).unwrap_or_default()))
        }
        "getRandomNodeIP" => {
            exact::<0>(name, args)?;
            random_node_address(ctx.nodes)
                .map(Value::Str)
                .map_err(|e| helper_failed(name, e))
        }
        "getNodeIPWithIndex" => {
            let [idx] = exact::<1>(name, args)?;
            node_address_at(ctx.nodes, idx.to_int()?)
                .map(Value::Str)
                .map_err(|e| helper_failed(name, e))
        }

        // strings
        "upper" => map_str(name, args, |s| s.to_uppercase()),
        "lower" => map_str(name, args, |s| s.to_lowercase()),
        "trim" => map_str(name, args, |s| s.trim().to_string()),
        "toString" => map_str(name, args, |s| s),
        "quote" => Ok(Value::Str(
            args.iter().map(|a| format!("{:?}", a.to_string())).collect::<Vec<_>>().join(" "),
        )),
        "squote" => Ok(Value::Str(
            args.iter().map(|a| format!("'{a}'")).collect::<Vec<_>>().join(" "),
        )),
        "trimPrefix" => {
            let [prefix, s] = exact::<2>(name, args)?;
            let (prefix, s) = (prefix.to_string(), s.to_string());
            Ok(Value::Str(s.strip_prefix(&prefix).unwrap_or(&s).to_string()))
        }
        "trimSuffix" => {
            let [suffix, s] = exact::<2>(name, args)?;
            let (suffix, s) = (suffix.to_string(), s.to_string());
            Ok(Value::Str(s.strip_suffix(&suffix).unwrap_or(&s).to_string()))
        }
        "replace" => {
            let [old, new, s] = exact::<3>(name, args)?;
            Ok(Value::Str(s.to_string().replace(&old.to_string(), &new.to_string())))
        }
        "contains" => {
            let [needle, s] = exact::<2>(name, args)?;
            Ok(Value::Bool(s.to_string().contains(&needle.to_string())))
        }
        "hasPrefix" => {
            let [prefix, s] = exact::<2>(name, args)?;
            Ok(Value::Bool(s.to_string().starts_with(&prefix.to_string())))
        }
        "hasSuffix" => {
            let [suffix, s] = exact::<2>(name, args)?;
            Ok(Value::Bool(s.to_string().ends_with(&suffix.to_string())))
        }
        "print" => Ok(Value::Str(sprint(&args))),
        "printf" => {
            let mut args = args.into_iter();
            let format = args
                .next()
                .ok_or_else(|| arity_error(name, "at least 1", 0))?
                .to_string();
            printf(&format, args.collect()).map(Value::Str)
        }

        // lists
        "list" => Ok(Value::List(args)),
        "splitList" => {
            let [sep, s] = exact::<2>(name, args)?;
            let (sep, s) = (sep.to_string(), s.to_string());
            Ok(Value::List(s.split(sep.as_str()).map(Value::from).collect()))
        }
        "join" => {
            let [sep, list] = exact::<2>(name, args)?;
            let parts: Vec<String> = list.into_list()?.iter().map(|v| v.to_string()).collect();
            Ok(Value::Str(parts.join(&sep.to_string())))
        }
        "append" => {
            let [list, item] = exact::<2>(name, args)?;
            let mut list = list.into_list()?;
            list.push(item);
            Ok(Value::List(list))
        }
        "first" | "mustFirst" => {
            let [list] = exact::<1>(name, args)?;
            match list.into_list()?.into_iter().next() {
                Some(v) => Ok(v),
                None if name == "mustFirst" => Err(empty_list(name)),
                None => Ok(Value::Nil),
            }
        }
        "last" | "mustLast" => {
            let [list] = exact::<1>(name, args)?;
            match list.into_list()?.pop() {
                Some(v) => Ok(v),
                None if name == "mustLast" => Err(empty_list(name)),
                None => Ok(Value::Nil),
            }
        }
        "index" => {
            let mut args = args.into_iter();
            let mut current = args.next().ok_or_else(|| arity_error(name, "at least 1", 0))?;
            for key in args {
                current = index_into(current, &key)?;
            }
            Ok(current)
        }
        "len" => {
            let [v] = exact::<1>(name, args)?;
            let len = match &v {
                Value::Str(s) => s.len(),
                Value::List(l) => l.len(),
                Value::Map(m) => m.len(),
                Value::Nil => 0,
                other => {
                    return Err(TemplateError::Exec(format!(
                        "len of {} is not defined",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(len as i64))
        }
        "until" => {
            let [n] = exact::<1>(name, args)?;
            Ok(Value::List((0..n.to_int()?.max(0)).map(Value::Int).collect()))
        }

        // defaults / logic
        "default" => {
            let [fallback, v] = exact::<2>(name, args)?;
            Ok(if v.is_truthy() { v } else { fallback })
        }
        "empty" => {
            let [v] = exact::<1>(name, args)?;
            Ok(Value::Bool(!v.is_truthy()))
        }
        "coalesce" => Ok(args.into_iter().find(Value::is_truthy).unwrap_or(Value::Nil)),
        "ternary" => {
            let [when_true, when_false, cond] = exact::<3>(name, args)?;
            Ok(if cond.is_truthy() { when_true } else { when_false })
        }
        "and" => {
            let mut last = Value::Nil;
            for v in args {
                if !v.is_truthy() {
                    return Ok(v);
                }
                last = v;
            }
            Ok(last)
        }
        "or" => {
            let mut last = Value::Nil;
            for v in args {
                if v.is_truthy() {
                    return Ok(v);
                }
                last = v;
            }
            Ok(last)
        }
        "not" => {
            let [v] = exact::<1>(name, args)?;
            Ok(Value::Bool(!v.is_truthy()))
        }
        "eq" => {
            let mut args = args.into_iter();
            let first = args.next().ok_or_else(|| arity_error(name, "at least 2", 0))?;
            let rest: Vec<Value> = args.collect();
            if rest.is_empty() {
                return Err(arity_error(name, "at least 2", 1));
            }
            Ok(Value::Bool(rest.iter().any(|v| loosely_equal(&first, v))))
        }
        "ne" => {
            let [a, b] = exact::<2>(name, args)?;
            Ok(Value::Bool(!loosely_equal(&a, &b)))
        }
        "lt" | "le" | "gt" | "ge" => {
            let [a, b] = exact::<2>(name, args)?;
            let ord = compare(&a, &b)?;
            Ok(Value::Bool(match name {
                "lt" => ord == Ordering::Less,
                "le" => ord != Ordering::Greater,
                "gt" => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }

        // math
        "atoi" => {
            let [s] = exact::<1>(name, args)?;
            Ok(Value::Int(s.to_string().trim().parse().unwrap_or(0)))
        }
        "int" => {
            let [v] = exact::<1>(name, args)?;
            Ok(Value::Int(v.to_int()?))
        }
        "add1" => {
            let [v] = exact::<1>(name, args)?;
            Ok(Value::Int(v.to_int()?.wrapping_add(1)))
        }
        "add" => fold_ints(name, args, |a, b| Ok(a.wrapping_add(b))),
        "mul" => fold_ints(name, args, |a, b| Ok(a.wrapping_mul(b))),
        "max" => fold_ints(name, args, |a, b| Ok(a.max(b))),
        "min" => fold_ints(name, args, |a, b| Ok(a.min(b))),
        "sub" => {
            let [a, b] = exact::<2>(name, args)?;
            Ok(Value::Int(a.to_int()?.wrapping_sub(b.to_int()?)))
        }
        "div" | "mod" => {
            let [a, b] = exact::<2>(name, args)?;
            let (a, b) = (a.to_int()?, b.to_int()?);
            if b == 0 {
                return Err(TemplateError::Exec(format!("{name}: division by zero")));
            }
            let quotient = if name == "div" { a.checked_div(b) } else { a.checked_rem(b) };
            quotient
                .map(Value::Int)
                .ok_or_else(|| TemplateError::Exec(format!("{name}: integer overflow")))
        }

        _ => Err(TemplateError::UnknownFunction(name.to_string())),
    }
}

fn exact<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], TemplateError> {
    let got = args.len();
    args.try_into()
        .map_err(|_| arity_error(name, &N.to_string(), got))
}

fn arity_error(name: &str, expected: &str, got: usize) -> TemplateError {
    TemplateError::Exec(format!(
        "wrong number of args for {name}: want {expected} got {got}"
    ))
}

fn empty_list(name: &str) -> TemplateError {
    TemplateError::Exec(format!("{name}: cannot take an element of an empty list"))
}

fn helper_failed(name: &str, err: anyhow::Error) -> TemplateError {
    TemplateError::Exec(format!("error calling {name}: {err}"))
}

fn map_str(
    name: &str,
    args: Vec<Value>,
    f: impl FnOnce(String) -> String,
) -> Result<Value, TemplateError> {
    let [v] = exact::<1>(name, args)?;
    Ok(Value::Str(f(v.to_string())))
}

fn fold_ints(
    name: &str,
    args: Vec<Value>,
    f: impl Fn(i64, i64) -> Result<i64, TemplateError>,
) -> Result<Value, TemplateError> {
    let mut iter = args.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| arity_error(name, "at least 1", 0))?
        .to_int()?;
    let mut acc = first;
    for v in iter {
        acc = f(acc, v.to_int()?)?;
    }
    Ok(Value::Int(acc))
}

fn index_into(coll: Value, key: &Value) -> Result<Value, TemplateError> {
    match coll {
        Value::List(list) => {
            let idx = key.to_int()?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| list.into_iter().nth(i))
                .ok_or_else(|| TemplateError::Exec(format!("index out of range: {idx}")))
        }
        Value::Map(map) => Ok(map.get(&key.to_string()).cloned().unwrap_or(Value::Nil)),
        Value::Nil => Ok(Value::Nil),
        other => Err(TemplateError::Exec(format!(
            "can't index item of type {}",
            other.type_name()
        ))),
    }
}

/// Ints and numeric strings compare by value; everything else structurally.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Str(s)) | (Value::Str(s), Value::Int(x)) => {
            s.trim().parse::<i64>().map(|y| y == *x).unwrap_or(false)
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, TemplateError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Str(_) | Value::Bool(_), Value::Int(_) | Value::Str(_) | Value::Bool(_)) => {
            Ok(a.to_int()?.cmp(&b.to_int()?))
        }
        _ => Err(TemplateError::Exec(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Operands are separated by a space when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::Str(_)) && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn printf(format: &str, args: Vec<Value>) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut args = args.into_iter();
    let mut chars = format.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let verb = chars
            .next()
            .ok_or_else(|| TemplateError::Exec("printf: dangling %".to_string()))?;
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| TemplateError::Exec(format!("printf: missing argument for %{verb}")))?;
        match verb {
            's' | 'v' => out.push_str(&arg.to_string()),
            'd' => out.push_str(&arg.to_int()?.to_string()),
            'q' => out.push_str(&format!("{:?}", arg.to_string())),
            other => {
                return Err(TemplateError::Exec(format!("printf: unsupported verb %{other}")));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::StaticNodeAddresses;

    fn call_with(name: &str, args: Vec<Value>) -> Result<Value, TemplateError> {
        let env = Environment::isolated().with_var("HOSTNAME", "validator-7");
        let nodes = StaticNodeAddresses::new(vec!["10.0.0.1".into(), "10.0.0.2".into()]);
        let ctx = HelperContext {
            env: &env,
            nodes: &nodes,
        };
        call(name, args, &ctx)
    }

    #[test]
    fn env_reads_overrides_and_defaults_to_empty() {
        assert_eq!(call_with("env", vec!["HOSTNAME".into()]).unwrap(), Value::from("validator-7"));
        assert_eq!(call_with("env", vec!["MISSING".into()]).unwrap(), Value::from(""));
    }

    #[test]
    fn split_and_last() {
        let list = call_with("splitList", vec!["-".into(), "pod-statefulset-2".into()]).unwrap();
        assert_eq!(call_with("mustLast", vec![list.clone()]).unwrap(), Value::from("2"));
        assert_eq!(call_with("first", vec![list]).unwrap(), Value::from("pod"));
        assert!(call_with("mustLast", vec![Value::List(vec![])]).is_err());
        assert_eq!(call_with("last", vec![Value::List(vec![])]).unwrap(), Value::Nil);
    }

    #[test]
    fn math_helpers_coerce_strings() {
        assert_eq!(call_with("add", vec![Value::Int(30333), "2".into()]).unwrap(), Value::Int(30335));
        assert_eq!(call_with("sub", vec![Value::Int(5), Value::Int(7)]).unwrap(), Value::Int(-2));
        assert_eq!(call_with("mod", vec![Value::Int(7), Value::Int(3)]).unwrap(), Value::Int(1));
        assert!(call_with("div", vec![Value::Int(1), Value::Int(0)]).is_err());
    }

    #[test]
    fn division_overflow_is_an_error() {
        for name in ["div", "mod"] {
            let result = call_with(name, vec![Value::Int(i64::MIN), Value::Int(-1)]);
            assert!(
                matches!(&result, Err(TemplateError::Exec(msg)) if msg.contains("overflow")),
                "{name}: {result:?}"
            );
        }
        assert_eq!(call_with("div", vec![Value::Int(i64::MIN), Value::Int(1)]).unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn node_address_helpers() {
        assert_eq!(
            call_with("getNodeIPWithIndex", vec![Value::Int(3)]).unwrap(),
            Value::from("10.0.0.2")
        );
        let random = call_with("getRandomNodeIP", vec![]).unwrap().to_string();
        assert!(random.starts_with("10.0.0."));
    }

    #[test]
    fn printf_verbs() {
        let out = call_with("printf", vec!["%s-%d %q 100%%".into(), "node".into(), "3".into(), "x".into()])
            .unwrap();
        assert_eq!(out, Value::from("node-3 \"x\" 100%"));
        assert!(call_with("printf", vec!["%s".into()]).is_err());
    }

    #[test]
    fn comparisons() {
        assert_eq!(call_with("eq", vec![Value::Int(2), "2".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call_with("lt", vec![Value::Int(1), Value::Int(2)]).unwrap(), Value::Bool(true));
        assert_eq!(call_with("ge", vec!["b".into(), "a".into()]).unwrap(), Value::Bool(true));
        assert!(call_with("lt", vec![Value::List(vec![]), Value::Int(1)]).is_err());
    }

    #[test]
    fn wrong_arity_and_unknown_functions() {
        assert!(matches!(call_with("upper", vec![]), Err(TemplateError::Exec(_))));
        assert!(matches!(
            call_with("nope", vec![]),
            Err(TemplateError::UnknownFunction(name)) if name == "nope"
        ));
    }
}
