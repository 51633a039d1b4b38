//! Key Builder Module
//!
//! Derives stable cache keys for memoization callers from a function
//! identifier and its arguments. Arguments are modelled with value semantics
//! via [`KeyArg`]; anything that only has identity cannot produce a stable key
//! and is rejected.
//!
//! ```
//! use regioncache::keys::{build_key, KeyArg};
//!
//! let key = build_key(
//!     "search",
//!     &[KeyArg::from("dune"), KeyArg::from(2021)],
//!     &[("page", KeyArg::from(1)), ("lang", KeyArg::from("en"))],
//! )
//! .unwrap();
//! assert_eq!(key, r#"search("dune", 2021, lang="en", page=1)"#);
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::error::{CacheError, Result};

/// 2^53: every integral float below this magnitude is an exact `i64`.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

// == Key Argument ==
/// A memoization argument with value semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyArg {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// Integral values render like the equal integer
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<KeyArg>),
    /// Rendered with keys sorted, so insertion order never matters
    Map(BTreeMap<String, KeyArg>),
    /// A value known only by identity; never renders
    Opaque { type_name: String },
}

impl KeyArg {
    /// Marks an argument of type `T` as identity-only.
    pub fn opaque<T: ?Sized>() -> Self {
        KeyArg::Opaque {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }

    fn render(&self, out: &mut String) -> Result<()> {
        match self {
            KeyArg::Null => out.push_str("None"),
            KeyArg::Bool(b) => out.push_str(if *b { "True" } else { "False" }),
            KeyArg::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            KeyArg::UInt(u) => {
                let _ = write!(out, "{}", u);
            }
            KeyArg::Float(f) => {
                if f.is_nan() {
                    return Err(CacheError::UnhashableArgument(
                        "NaN has no value equality".to_string(),
                    ));
                }
                // Numerically equal arguments render the same: 1.0 as "1",
                // -0.0 as "0"
                if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT {
                    let _ = write!(out, "{}", *f as i64);
                } else {
                    let _ = write!(out, "{:?}", f);
                }
            }
            KeyArg::Str(s) => {
                let _ = write!(out, "{:?}", s);
            }
            KeyArg::Bytes(bytes) => {
                out.push_str("b\"");
                for byte in bytes {
                    let _ = write!(out, "{}", std::ascii::escape_default(*byte));
                }
                out.push('"');
            }
            KeyArg::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(out)?;
                }
                out.push(']');
            }
            KeyArg::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{:?}: ", key);
                    value.render(out)?;
                }
                out.push('}');
            }
            KeyArg::Opaque { type_name } => {
                return Err(CacheError::UnhashableArgument(format!(
                    "{} has identity but no stable value representation",
                    type_name
                )));
            }
        }
        Ok(())
    }
}

// == Build Key ==
/// Builds `identifier(p1, p2, a=x, b=y)` from a call's arguments.
///
/// Named arguments are sorted by name, so call-site order never changes the
/// key. Fails with `UnhashableArgument` for identity-only values, NaN floats
/// and duplicated argument names.
pub fn build_key(identifier: &str, positional: &[KeyArg], named: &[(&str, KeyArg)]) -> Result<String> {
    let mut sorted: Vec<&(&str, KeyArg)> = named.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(CacheError::UnhashableArgument(format!(
            "named argument '{}' given more than once",
            pair[0].0
        )));
    }

    let mut key = String::with_capacity(identifier.len() + 16);
    key.push_str(identifier);
    key.push('(');
    let mut first = true;
    for arg in positional {
        if !first {
            key.push_str(", ");
        }
        first = false;
        arg.render(&mut key)?;
    }
    for (name, arg) in sorted {
        if !first {
            key.push_str(", ");
        }
        first = false;
        key.push_str(name);
        key.push('=');
        arg.render(&mut key)?;
    }
    key.push(')');
    Ok(key)
}

// == Conversions ==

impl From<bool> for KeyArg {
    fn from(value: bool) -> Self {
        KeyArg::Bool(value)
    }
}

macro_rules! signed_key_arg {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KeyArg {
            fn from(value: $ty) -> Self {
                KeyArg::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! unsigned_key_arg {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KeyArg {
            fn from(value: $ty) -> Self {
                KeyArg::UInt(u64::from(value))
            }
        })*
    };
}

signed_key_arg!(i8, i16, i32, i64);
unsigned_key_arg!(u8, u16, u32, u64);

impl From<usize> for KeyArg {
    fn from(value: usize) -> Self {
        KeyArg::UInt(value as u64)
    }
}

impl From<f64> for KeyArg {
    fn from(value: f64) -> Self {
        KeyArg::Float(value)
    }
}

impl From<f32> for KeyArg {
    fn from(value: f32) -> Self {
        KeyArg::Float(f64::from(value))
    }
}

impl From<&str> for KeyArg {
    fn from(value: &str) -> Self {
        KeyArg::Str(value.to_string())
    }
}

impl From<String> for KeyArg {
    fn from(value: String) -> Self {
        KeyArg::Str(value)
    }
}

impl From<&[u8]> for KeyArg {
    fn from(value: &[u8]) -> Self {
        KeyArg::Bytes(value.to_vec())
    }
}

impl<T: Into<KeyArg>> From<Option<T>> for KeyArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(KeyArg::Null, Into::into)
    }
}

impl<T: Into<KeyArg>> From<Vec<T>> for KeyArg {
    fn from(value: Vec<T>) -> Self {
        KeyArg::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for KeyArg {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => KeyArg::Null,
            Json::Bool(b) => KeyArg::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    KeyArg::Int(i)
                } else if let Some(u) = n.as_u64() {
                    KeyArg::UInt(u)
                } else {
                    KeyArg::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => KeyArg::Str(s),
            Json::Array(items) => KeyArg::List(items.into_iter().map(KeyArg::from).collect()),
            Json::Object(map) => KeyArg::Map(
                map.into_iter()
                    .map(|(key, value)| (key, KeyArg::from(value)))
                    .collect(),
            ),
        }
    }
}
