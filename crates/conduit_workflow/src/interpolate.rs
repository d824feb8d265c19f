//! The `{{path.to.value}}` variable interpolation engine.
//!
//! A token's `path` is a dot-separated walk: the first segment names a
//! variable bound in the run context (a step/loop output, or one of the
//! special names `input`, `env`, `loop`); remaining segments index into that
//! value's JSON structure. A token may carry a `| default: "literal"`
//! filter, evaluated only when the path resolves to nothing.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use conduit_error::{WorkflowError, WorkflowErrorKind};

use crate::context::RunContext;

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^}]+?)\s*\}\}").unwrap())
}

/// One parsed `{{...}}` token: a dotted path plus an optional default.
struct Token<'a> {
    path: &'a str,
    default: Option<&'a str>,
}

fn parse_token(raw: &str) -> Token<'_> {
    match raw.split_once('|') {
        Some((path, filter)) => {
            let path = path.trim();
            let filter = filter.trim();
            let default = filter
                .strip_prefix("default:")
                .map(str::trim)
                .map(|lit| lit.trim_matches(|c| c == '"' || c == '\''));
            Token { path, default }
        }
        None => Token { path: raw.trim(), default: None },
    }
}

/// Resolves a dotted path (`a.b.c`) against the run context.
fn resolve_path(path: &str, ctx: &RunContext) -> Option<Value> {
    let mut segments = path.split('.');
    let root = segments.next()?;
    let mut value = ctx.resolve_root(root)?;
    for segment in segments {
        value = match value {
            Value::Object(ref map) => map.get(segment).cloned()?,
            Value::Array(ref items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned())?,
            _ => return None,
        };
    }
    Some(value)
}

/// Resolves one token (without its surrounding `{{ }}`) to a JSON value,
/// applying `| default:` when the path is undefined.
pub fn resolve_token(raw: &str, ctx: &RunContext) -> Result<Value, WorkflowError> {
    let token = parse_token(raw);
    match resolve_path(token.path, ctx) {
        Some(value) => Ok(value),
        None => match token.default {
            Some(literal) => Ok(Value::String(literal.to_string())),
            None => Err(WorkflowError::new(WorkflowErrorKind::UndefinedVariable(token.path.to_string()))),
        },
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Interpolates a template string. When the entire string is exactly one
/// `{{...}}` token, the resolved value's original type is preserved;
/// otherwise every token is stringified (JSON-encoded when non-string) and
/// spliced into the surrounding text.
pub fn interpolate(template: &str, ctx: &RunContext) -> Result<Value, WorkflowError> {
    let re = token_pattern();
    if let Some(caps) = re.captures(template) {
        if caps.get(0).unwrap().as_str() == template {
            return resolve_token(&caps[1], ctx);
        }
    }

    let mut err = None;
    let result = re.replace_all(template, |caps: &regex::Captures| match resolve_token(&caps[1], ctx) {
        Ok(value) => value_to_text(&value),
        Err(e) => {
            err.get_or_insert(e);
            String::new()
        }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(Value::String(result.into_owned())),
    }
}

/// Interpolates every string found in `value`, recursing through objects
/// and arrays. Used for step argument maps (`tool`/`skill`/`with:` bodies)
/// where each leaf is independently a template.
pub fn interpolate_value(value: &Value, ctx: &RunContext) -> Result<Value, WorkflowError> {
    match value {
        Value::String(s) => interpolate(s, ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(interpolate_value(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), interpolate_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

/// Extracts the root identifiers referenced by `{{...}}` tokens in
/// `template`, for implicit DAG-edge inference. `input`, `env`, and `loop`
/// are excluded since they never name a step.
pub fn referenced_step_names(template: &str) -> Vec<String> {
    let re = token_pattern();
    re.captures_iter(template)
        .filter_map(|caps| {
            let token = parse_token(&caps[1]);
            let root = token.path.split('.').next()?;
            if root == "input" || root == "env" || root == "loop" {
                None
            } else {
                Some(root.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunContext;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn ctx_with(vars: &[(&str, Value)]) -> RunContext {
        let ctx = RunContext::root(json!({"text": "hello"}), Default::default(), CancellationToken::new(), 10, 0);
        for (k, v) in vars {
            ctx.set(k, v.clone());
        }
        ctx
    }

    #[test]
    fn resolves_whole_value_preserving_type() {
        let ctx = ctx_with(&[("draft", json!({"score": 7}))]);
        let v = interpolate("{{draft}}", &ctx).unwrap();
        assert_eq!(v, json!({"score": 7}));
    }

    #[test]
    fn resolves_nested_path() {
        let ctx = ctx_with(&[("draft", json!({"score": 7}))]);
        let v = interpolate("{{draft.score}}", &ctx).unwrap();
        assert_eq!(v, json!(7));
    }

    #[test]
    fn stringifies_embedded_non_string_values() {
        let ctx = ctx_with(&[("draft", json!({"score": 7}))]);
        let v = interpolate("score is {{draft.score}} today", &ctx).unwrap();
        assert_eq!(v, json!("score is 7 today"));
    }

    #[test]
    fn applies_default_when_undefined() {
        let ctx = ctx_with(&[]);
        let v = interpolate("{{missing | default: \"n/a\"}}", &ctx).unwrap();
        assert_eq!(v, json!("n/a"));
    }

    #[test]
    fn fails_on_undefined_without_default() {
        let ctx = ctx_with(&[]);
        assert!(interpolate("{{missing}}", &ctx).is_err());
    }

    #[test]
    fn resolves_special_input_reference() {
        let ctx = ctx_with(&[]);
        let v = interpolate("{{input.text}}", &ctx).unwrap();
        assert_eq!(v, json!("hello"));
    }

    #[test]
    fn extracts_referenced_step_names() {
        let refs = referenced_step_names("{{draft}} and {{review.score | default: \"0\"}} but not {{input.text}}");
        assert_eq!(refs, vec!["draft".to_string(), "review".to_string()]);
    }
}
