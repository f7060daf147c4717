//! Global objects and prototype methods available to every script.

use super::value::{ObjRef, Object, ObjectKind, Value};
use super::{Abrupt, Interpreter};
use crate::ast::Span;

const ERROR_KINDS: [&str; 5] = ["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"];

pub(super) fn install(interp: &mut Interpreter) {
    let global = Value::Object(interp.global.clone());
    interp.set_global("window", global.clone());
    interp.set_global("globalThis", global);
    interp.set_global("undefined", Value::Undefined);
    interp.set_global("NaN", Value::Number(f64::NAN));
    interp.set_global("Infinity", Value::Number(f64::INFINITY));

    install_errors(interp);
    install_object(interp);
    install_function_prototype(interp);
    install_array(interp);
    install_string_prototype(interp);
    install_math(interp);
    install_console(interp);
    install_conversions(interp);
    install_timers(interp);
}

fn method<F>(interp: &Interpreter, target: &ObjRef, name: &str, f: F)
where
    F: Fn(&mut Interpreter, &Value, &[Value], Span) -> Result<Value, Abrupt> + 'static,
{
    let func = interp.native(name, f);
    target.borrow_mut().properties.insert(name.to_string(), func);
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn install_errors(interp: &mut Interpreter) {
    let base = interp.new_object();
    base.borrow_mut().properties.insert("name".to_string(), Value::from("Error"));
    base.borrow_mut().properties.insert("message".to_string(), Value::from(""));

    for kind in ERROR_KINDS {
        let prototype = if kind == "Error" {
            base.clone()
        } else {
            let prototype = Object::new(ObjectKind::Ordinary, Some(base.clone()));
            prototype.borrow_mut().properties.insert("name".to_string(), Value::from(kind));
            prototype
        };
        interp.error_protos.insert(kind, prototype.clone());

        let ctor = interp.native(kind, move |interp, _, args, _| {
            let message = match args.first() {
                None | Some(Value::Undefined) => String::new(),
                Some(value) => value.to_js_string(),
            };
            Ok(interp.make_error(kind, message))
        });
        if let Some(ctor_object) = ctor.as_object() {
            ctor_object
                .borrow_mut()
                .properties
                .insert("prototype".to_string(), Value::Object(prototype.clone()));
        }
        prototype.borrow_mut().properties.insert("constructor".to_string(), ctor.clone());
        interp.set_global(kind, ctor);
    }
}

fn install_object(interp: &mut Interpreter) {
    let proto = interp.object_proto.clone();
    method(interp, &proto, "hasOwnProperty", |_, this, args, _| {
        let key = arg(args, 0).to_js_string();
        Ok(Value::Bool(this.as_object().is_some_and(|obj| obj.borrow().has_own(&key))))
    });
    method(interp, &proto, "toString", |_, this, _, _| Ok(Value::from(this.to_js_string())));

    let object_ctor = interp.new_object();
    method(interp, &object_ctor, "keys", |interp, _, args, span| match arg(args, 0) {
        Value::Object(obj) => {
            let keys = obj.borrow().own_keys().into_iter().map(Value::from).collect();
            Ok(interp.new_array(keys))
        }
        other => Err(interp.throw(
            "TypeError",
            format!("Cannot convert {} to object", other.to_js_string()),
            span,
        )),
    });
    interp.set_global("Object", Value::Object(object_ctor));
}

fn install_function_prototype(interp: &mut Interpreter) {
    let proto = interp.function_proto.clone();
    method(interp, &proto, "call", |interp, this, args, span| {
        let rest = args.get(1..).unwrap_or(&[]);
        interp.call_value(this, arg(args, 0), rest, span)
    });
    method(interp, &proto, "apply", |interp, this, args, span| {
        let list = array_items(&arg(args, 1)).unwrap_or_default();
        interp.call_value(this, arg(args, 0), &list, span)
    });
}

fn array_items(value: &Value) -> Option<Vec<Value>> {
    let obj = value.as_object()?;
    let borrowed = obj.borrow();
    match &borrowed.kind {
        ObjectKind::Array(items) => Some(items.clone()),
        _ => None,
    }
}

fn with_array<R>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    let obj = this.as_object()?;
    let mut borrowed = obj.borrow_mut();
    match &mut borrowed.kind {
        ObjectKind::Array(items) => Some(f(items)),
        _ => None,
    }
}

fn not_an_array(interp: &Interpreter, name: &str, span: Span) -> Abrupt {
    interp.throw("TypeError", format!("Array.prototype.{} called on non-array", name), span)
}

/// Resolve a possibly negative `slice`/`substring` bound against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn install_array(interp: &mut Interpreter) {
    let proto = interp.array_proto.clone();
    method(interp, &proto, "push", |interp, this, args, span| {
        with_array(this, |items| {
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        })
        .ok_or_else(|| not_an_array(interp, "push", span))
    });
    method(interp, &proto, "pop", |interp, this, _, span| {
        with_array(this, |items| items.pop().unwrap_or_default()).ok_or_else(|| not_an_array(interp, "pop", span))
    });
    method(interp, &proto, "join", |interp, this, args, span| {
        let items = array_items(this).ok_or_else(|| not_an_array(interp, "join", span))?;
        let separator = match arg(args, 0) {
            Value::Undefined => ",".to_string(),
            other => other.to_js_string(),
        };
        let parts: Vec<String> = items
            .iter()
            .map(|item| match item {
                Value::Undefined | Value::Null => String::new(),
                other => other.to_js_string(),
            })
            .collect();
        Ok(Value::from(parts.join(&separator)))
    });
    method(interp, &proto, "indexOf", |interp, this, args, span| {
        let items = array_items(this).ok_or_else(|| not_an_array(interp, "indexOf", span))?;
        let needle = arg(args, 0);
        let position = items.iter().position(|item| item.strict_equals(&needle));
        Ok(Value::Number(position.map_or(-1.0, |p| p as f64)))
    });
    method(interp, &proto, "slice", |interp, this, args, span| {
        let items = array_items(this).ok_or_else(|| not_an_array(interp, "slice", span))?;
        let start = relative_index(&arg(args, 0), items.len(), 0);
        let end = relative_index(&arg(args, 1), items.len(), items.len());
        let sliced = items.get(start..end.max(start)).unwrap_or_default().to_vec();
        Ok(interp.new_array(sliced))
    });

    let array_ctor = interp.native("Array", |interp, _, args, _| match args {
        [Value::Number(n)] if *n >= 0.0 && n.fract() == 0.0 && *n <= 10_000.0 => {
            Ok(interp.new_array(vec![Value::Undefined; *n as usize]))
        }
        _ => Ok(interp.new_array(args.to_vec())),
    });
    if let Some(ctor_object) = array_ctor.as_object() {
        ctor_object
            .borrow_mut()
            .properties
            .insert("prototype".to_string(), Value::Object(proto.clone()));
        let is_array = interp.native("isArray", |_, _, args, _| Ok(Value::Bool(array_items(&arg(args, 0)).is_some())));
        ctor_object.borrow_mut().properties.insert("isArray".to_string(), is_array);
    }
    interp.set_global("Array", array_ctor);
}

fn char_index_of(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_from = haystack.char_indices().nth(from).map_or(haystack.len(), |(i, _)| i);
    let found = haystack.get(byte_from..)?.find(needle)?;
    Some(haystack[..byte_from + found].chars().count())
}

fn install_string_prototype(interp: &mut Interpreter) {
    let proto = interp.string_proto.clone();
    method(interp, &proto, "charAt", |_, this, args, _| {
        let index = arg(args, 0).to_number();
        let index = if index.is_nan() { 0.0 } else { index };
        let c = if index < 0.0 {
            None
        } else {
            this.to_js_string().chars().nth(index as usize)
        };
        Ok(Value::from(c.map(String::from).unwrap_or_default()))
    });
    method(interp, &proto, "indexOf", |_, this, args, _| {
        let haystack = this.to_js_string();
        let needle = arg(args, 0).to_js_string();
        let from = relative_index(&arg(args, 1), haystack.chars().count(), 0);
        Ok(Value::Number(char_index_of(&haystack, &needle, from).map_or(-1.0, |i| i as f64)))
    });
    method(interp, &proto, "substring", |_, this, args, _| {
        let chars: Vec<char> = this.to_js_string().chars().collect();
        let clamp = |value: &Value, default: usize| match value {
            Value::Undefined => default,
            other => {
                let n = other.to_number();
                if n.is_nan() || n < 0.0 { 0 } else { n.min(chars.len() as f64) as usize }
            }
        };
        let start = clamp(&arg(args, 0), 0);
        let end = clamp(&arg(args, 1), chars.len());
        let (start, end) = if start > end { (end, start) } else { (start, end) };
        Ok(Value::from(chars[start..end].iter().collect::<String>()))
    });
    method(interp, &proto, "split", |interp, this, args, _| {
        let s = this.to_js_string();
        let parts: Vec<Value> = match arg(args, 0) {
            Value::Undefined => vec![Value::from(s)],
            separator => {
                let separator = separator.to_js_string();
                if separator.is_empty() {
                    s.chars().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(separator.as_str()).map(Value::from).collect()
                }
            }
        };
        Ok(interp.new_array(parts))
    });
    method(interp, &proto, "replace", |_, this, args, _| {
        let s = this.to_js_string();
        let pattern = arg(args, 0).to_js_string();
        let replacement = arg(args, 1).to_js_string();
        Ok(Value::from(s.replacen(&pattern, &replacement, 1)))
    });
    method(interp, &proto, "toUpperCase", |_, this, _, _| Ok(Value::from(this.to_js_string().to_uppercase())));
    method(interp, &proto, "toLowerCase", |_, this, _, _| Ok(Value::from(this.to_js_string().to_lowercase())));
    method(interp, &proto, "trim", |_, this, _, _| Ok(Value::from(this.to_js_string().trim())));
}

fn install_math(interp: &mut Interpreter) {
    let math = interp.new_object();
    math.borrow_mut().properties.insert("PI".to_string(), Value::Number(std::f64::consts::PI));

    let unary: [(&str, fn(f64) -> f64); 5] = [
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("abs", f64::abs),
        ("sqrt", f64::sqrt),
        ("round", |x| (x + 0.5).floor()),
    ];
    for (name, f) in unary {
        method(interp, &math, name, move |_, _, args, _| Ok(Value::Number(f(arg(args, 0).to_number()))));
    }
    method(interp, &math, "pow", |_, _, args, _| {
        Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
    });
    method(interp, &math, "max", |_, _, args, _| Ok(Value::Number(fold_extreme(args, f64::NEG_INFINITY, f64::max))));
    method(interp, &math, "min", |_, _, args, _| Ok(Value::Number(fold_extreme(args, f64::INFINITY, f64::min))));
    interp.set_global("Math", Value::Object(math));
}

/// `Math.max`/`Math.min`: any NaN argument poisons the result.
fn fold_extreme(args: &[Value], initial: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut acc = initial;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        acc = pick(acc, n);
    }
    acc
}

fn console_line(args: &[Value]) -> String {
    args.iter().map(Value::to_js_string).collect::<Vec<_>>().join(" ")
}

/// `setTimeout` and `setInterval` queue callbacks on the interpreter; the host decides when they run.
fn install_timers(interp: &mut Interpreter) {
    for (name, repeat) in [("setTimeout", false), ("setInterval", true)] {
        let func = interp.native(name, move |interp, _, args, span| {
            let delay = arg(args, 1).to_number();
            let extra = args.get(2..).unwrap_or(&[]).to_vec();
            let id = interp.schedule(arg(args, 0), delay, extra, repeat, span);
            Ok(Value::Number(id as f64))
        });
        interp.set_global(name, func);
    }
    for name in ["clearTimeout", "clearInterval"] {
        let func = interp.native(name, |interp, _, args, _| {
            let id = arg(args, 0).to_number();
            if id.is_finite() && id >= 1.0 {
                interp.clear_timer(id as u64);
            }
            Ok(Value::Undefined)
        });
        interp.set_global(name, func);
    }
}

fn install_console(interp: &mut Interpreter) {
    let console = interp.new_object();
    method(interp, &console, "log", |_, _, args, _| {
        tracing::info!(target: "genverify_script::console", "{}", console_line(args));
        Ok(Value::Undefined)
    });
    method(interp, &console, "info", |_, _, args, _| {
        tracing::info!(target: "genverify_script::console", "{}", console_line(args));
        Ok(Value::Undefined)
    });
    method(interp, &console, "debug", |_, _, args, _| {
        tracing::debug!(target: "genverify_script::console", "{}", console_line(args));
        Ok(Value::Undefined)
    });
    method(interp, &console, "warn", |_, _, args, _| {
        tracing::warn!(target: "genverify_script::console", "{}", console_line(args));
        Ok(Value::Undefined)
    });
    method(interp, &console, "error", |_, _, args, _| {
        tracing::error!(target: "genverify_script::console", "{}", console_line(args));
        Ok(Value::Undefined)
    });
    interp.set_global("console", Value::Object(console));
}

fn install_conversions(interp: &mut Interpreter) {
    let string = interp.native("String", |_, _, args, _| {
        Ok(Value::from(args.first().map(Value::to_js_string).unwrap_or_default()))
    });
    if let Some(ctor_object) = string.as_object() {
        ctor_object
            .borrow_mut()
            .properties
            .insert("prototype".to_string(), Value::Object(interp.string_proto.clone()));
    }
    interp.set_global("String", string);

    let number = interp.native("Number", |_, _, args, _| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    interp.set_global("Number", number);

    let boolean = interp.native("Boolean", |_, _, args, _| Ok(Value::Bool(arg(args, 0).truthy())));
    interp.set_global("Boolean", boolean);

    let parse_int_fn = interp.native("parseInt", |_, _, args, _| {
        let radix = match arg(args, 1) {
            Value::Undefined => None,
            other => Some(other.to_number()).filter(|r| *r != 0.0).map(|r| r as u32),
        };
        Ok(Value::Number(parse_int(&arg(args, 0).to_js_string(), radix)))
    });
    interp.set_global("parseInt", parse_int_fn);

    let parse_float_fn = interp.native("parseFloat", |_, _, args, _| {
        Ok(Value::Number(parse_float(&arg(args, 0).to_js_string())))
    });
    interp.set_global("parseFloat", parse_float_fn);

    let is_nan = interp.native("isNaN", |_, _, args, _| Ok(Value::Bool(arg(args, 0).to_number().is_nan())));
    interp.set_global("isNaN", is_nan);
}

fn parse_int(input: &str, radix: Option<u32>) -> f64 {
    let s = input.trim_start();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let (radix, digits) = match (radix, hex) {
        (None | Some(16), Some(rest)) => (16, rest),
        (None, None) => (10, s),
        (Some(r), _) if (2..=36).contains(&r) => (r, s),
        _ => return f64::NAN,
    };

    let mut value = 0.0;
    let mut any = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    match (any, negative) {
        (false, _) => f64::NAN,
        (true, true) => -value,
        (true, false) => value,
    }
}

fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    for infinity in ["Infinity", "+Infinity", "-Infinity"] {
        if s.starts_with(infinity) {
            return if infinity.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
        }
    }
    let candidate_len = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')))
        .unwrap_or(s.len());
    (1..=candidate_len)
        .rev()
        .find_map(|end| s[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(source: &str) -> String {
        Interpreter::new().run(source).unwrap().to_js_string()
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", None), 42.0);
        assert_eq!(parse_int("  -7", None), -7.0);
        assert_eq!(parse_int("0x1f", None), 31.0);
        assert_eq!(parse_int("ff", Some(16)), 255.0);
        assert!(parse_int("px", None).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.5kg"), 3.5);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval_str("'a.b.c'.split('.').length"), "3");
        assert_eq!(eval_str("'hello'.charAt(1) + 'hello'.indexOf('l') + 'hello'.substring(3, 1)"), "e2el");
        assert_eq!(eval_str("'  Mixed '.trim().toUpperCase()"), "MIXED");
        assert_eq!(eval_str("'abc'.length"), "3");
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(eval_str("var a = [3, 1]; a.push(4); a.join('|')"), "3|1|4");
        assert_eq!(eval_str("[1, 2, 3, 4].slice(1, -1).join()"), "2,3");
        assert_eq!(eval_str("[1, 2, 3].indexOf(3)"), "2");
        assert_eq!(eval_str("Array.isArray([]) + ':' + Array.isArray({})"), "true:false");
    }

    #[test]
    fn test_call_and_apply_bind_this() {
        let source = "function who(greeting) { return greeting + ' ' + this.name; }\n\
                      var o = { name: 'x' };\n\
                      who.call(o, 'hi') + '/' + who.apply(o, ['yo'])";
        assert_eq!(eval_str(source), "hi x/yo x");
    }

    #[test]
    fn test_error_objects() {
        assert_eq!(eval_str("var e = new TypeError('bad'); (e instanceof Error) + ':' + e"), "true:TypeError: bad");
        assert_eq!(eval_str("String(new Error())"), "Error");
    }

    #[test]
    fn test_math_and_conversions() {
        assert_eq!(eval_str("Math.max(1, 5, 3) + Math.floor(2.7)"), "7");
        assert_eq!(eval_str("Number('12') + 1"), "13");
        assert_eq!(eval_str("String(12) + 1"), "121");
        assert_eq!(eval_str("isNaN('x')"), "true");
    }

    #[test]
    fn test_has_own_property_and_object_keys() {
        let source = "function T() { this.own = 1; } T.prototype.inherited = 2; var t = new T();\n\
                      t.hasOwnProperty('own') + ':' + t.hasOwnProperty('inherited') + ':' + Object.keys(t).join()";
        assert_eq!(eval_str(source), "true:false:own");
    }
}
