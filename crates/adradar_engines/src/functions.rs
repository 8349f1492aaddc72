#![forbid(unsafe_code)]

//! Registry of named pure transforms reachable from `applyFunction` steps.

use std::collections::BTreeMap;

use adradar_contracts::raw::RawValue;

pub type TransformFn = fn(&RawValue) -> Result<RawValue, &'static str>;

#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, TransformFn>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard_v1()
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    pub fn standard_v1() -> Self {
        let mut r = Self::empty();
        r.register("parseFloat", parse_float);
        r.register("parseInt", parse_int);
        r.register("Number", to_number);
        r.register("String", to_string);
        r.register("toLowerCase", to_lower_case);
        r.register("toUpperCase", to_upper_case);
        r.register("first", first);
        r
    }

    pub fn register(&mut self, name: &'static str, f: TransformFn) {
        self.functions.insert(name, f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    /// `None` when `name` is not registered.
    pub fn apply(&self, name: &str, input: &RawValue) -> Option<Result<RawValue, &'static str>> {
        self.functions.get(name).map(|f| f(input))
    }
}

fn number_or_null(n: f64) -> RawValue {
    if n.is_nan() {
        RawValue::Null
    } else {
        RawValue::Number(n)
    }
}

/// Length of the longest prefix of `s` that reads as a decimal float.
fn float_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

fn parse_float(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::Number(n) => Ok(number_or_null(*n)),
        RawValue::String(s) => {
            let s = s.trim_start();
            let len = float_prefix_len(s);
            if len == 0 {
                return Ok(RawValue::Null);
            }
            Ok(s[..len]
                .parse::<f64>()
                .map_or(RawValue::Null, number_or_null))
        }
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("parseFloat expects a string or number"),
    }
}

fn parse_int(input: &RawValue) -> Result<RawValue, &'static str> {
    match parse_float(input)? {
        RawValue::Number(n) => Ok(RawValue::Number(n.trunc())),
        other => Ok(other),
    }
}

fn to_number(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::Number(n) => Ok(number_or_null(*n)),
        RawValue::Bool(b) => Ok(RawValue::Number(if *b { 1.0 } else { 0.0 })),
        RawValue::String(s) => Ok(s.trim().parse::<f64>().map_or(RawValue::Null, number_or_null)),
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("Number expects a scalar"),
    }
}

fn to_string(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::String(s) => Ok(RawValue::String(s.clone())),
        RawValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
            Ok(RawValue::String(format!("{}", *n as i64)))
        }
        RawValue::Number(n) => Ok(RawValue::String(n.to_string())),
        RawValue::Bool(b) => Ok(RawValue::String(b.to_string())),
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("String expects a scalar"),
    }
}

fn to_lower_case(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::String(s) => Ok(RawValue::String(s.to_lowercase())),
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("toLowerCase expects a string"),
    }
}

fn to_upper_case(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::String(s) => Ok(RawValue::String(s.to_uppercase())),
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("toUpperCase expects a string"),
    }
}

fn first(input: &RawValue) -> Result<RawValue, &'static str> {
    match input {
        RawValue::Array(items) => Ok(items.first().cloned().unwrap_or(RawValue::Null)),
        RawValue::Null => Ok(RawValue::Null),
        _ => Err("first expects an array"),
    }
}
