//! URL pattern matching for registered routes.

use crate::error::{SetupError, SetupResult};
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug, Clone)]
enum PatternSegment {
    Static(String),
    Param { name: String, regex: Option<Regex> },
    Wildcard,
}

/// Compiled route URL such as `/jobs/:jobId(^\d+$)/*`.
#[derive(Debug, Clone)]
pub(crate) struct RoutePattern {
    segments: Vec<PatternSegment>,
}

impl RoutePattern {
    pub fn parse(url: &str) -> SetupResult<Self> {
        let rest = url
            .strip_prefix('/')
            .ok_or_else(|| SetupError::InvalidRouteUrl(url.to_string()))?;
        let mut segments = Vec::new();
        for raw in split_path(rest) {
            let segment = if raw == "*" {
                PatternSegment::Wildcard
            } else if let Some(param) = raw.strip_prefix(':') {
                let (name, regex) = match param.find('(') {
                    Some(open) if param.ends_with(')') => {
                        let source = &param[open + 1..param.len() - 1];
                        let regex = Regex::new(source)
                            .map_err(|_| SetupError::InvalidRouteUrl(url.to_string()))?;
                        (&param[..open], Some(regex))
                    }
                    _ => (param, None),
                };
                if name.is_empty() {
                    return Err(SetupError::InvalidRouteUrl(url.to_string()));
                }
                PatternSegment::Param {
                    name: name.to_string(),
                    regex,
                }
            } else {
                PatternSegment::Static(raw.to_string())
            };
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Sort key among patterns matching the same path: per segment, static
    /// beats a constrained param, which beats a param, which beats `*`.
    pub fn specificity(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|segment| match segment {
                PatternSegment::Static(_) => 0,
                PatternSegment::Param { regex: Some(_), .. } => 1,
                PatternSegment::Param { regex: None, .. } => 2,
                PatternSegment::Wildcard => 3,
            })
            .collect()
    }

    /// Path parameters of a matching path, as strings.
    pub fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = split_path(rest).collect();
        let mut params = Map::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                PatternSegment::Wildcard => {
                    params.insert("*".into(), Value::String(parts.get(index..)?.join("/")));
                    return Some(params);
                }
                PatternSegment::Static(expected) => {
                    if parts.get(index) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                PatternSegment::Param { name, regex } => {
                    let raw = parts.get(index)?;
                    let value = percent_decode(raw);
                    if value.is_empty() || regex.as_ref().is_some_and(|r| !r.is_match(&value)) {
                        return None;
                    }
                    params.insert(name.clone(), Value::String(value));
                }
            }
        }
        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Decode `%XX` escapes. Invalid escapes are kept.
pub(crate) fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Parse a query string into an object. Repeated keys collect into an array.
pub(crate) fn parse_query(query: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(&key.replace('+', " "));
        let value = Value::String(percent_decode(&value.replace('+', " ")));
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    map
}
