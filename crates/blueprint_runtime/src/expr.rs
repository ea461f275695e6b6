// Token Expressions - The closed grammar for parameter tokens
//
// A token is one of:
//   literal   123 | -4.5 | true | False | None | null | "text" | 'text'
//   path      name | name.field.field
//
// Paths look up the first segment in the environment and walk object fields
// for the rest. A token that is not an expression, or whose path does not
// resolve, is taken verbatim as a string.

use blueprint_types::Value;

use crate::environment::Environment;

/// Parsed parameter token
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
}

impl Expr {
    /// Parse a token; `None` when it belongs to neither production
    pub fn parse(token: &str) -> Option<Expr> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Some(text) = parse_quoted(token) {
            return Some(Expr::Literal(Value::String(text)));
        }

        match token {
            "true" | "True" => return Some(Expr::Literal(Value::Bool(true))),
            "false" | "False" => return Some(Expr::Literal(Value::Bool(false))),
            "null" | "None" => return Some(Expr::Literal(Value::Null)),
            _ => {}
        }

        if let Some(number) = parse_number(token) {
            return Some(Expr::Literal(number));
        }

        let segments: Vec<&str> = token.split('.').map(str::trim).collect();
        if segments.iter().all(|s| is_identifier(s)) {
            return Some(Expr::Path(segments.into_iter().map(String::from).collect()));
        }

        None
    }

    /// Evaluate against the environment; `None` when a path does not resolve
    pub fn eval(&self, env: &Environment) -> Option<Value> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::Path(segments) => {
                let (head, rest) = segments.split_first()?;
                let mut current = env.get(head)?;
                for field in rest {
                    current = current.get(field)?;
                }
                Some(current.clone())
            }
        }
    }
}

/// Resolve a parameter token, falling back to the raw token as a string
pub fn resolve_token(token: &str, env: &Environment) -> Value {
    Expr::parse(token)
        .and_then(|expr| expr.eval(env))
        .unwrap_or_else(|| Value::String(token.to_string()))
}

fn parse_quoted(token: &str) -> Option<String> {
    let quote = token.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    if token.len() < 2 || !token.ends_with(quote) {
        return None;
    }

    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c if c == quote => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

fn parse_number(token: &str) -> Option<Value> {
    let body = token.strip_prefix(['-', '+']).unwrap_or(token);
    if !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+' | '_'))
    {
        return None;
    }

    let cleaned = token.replace('_', "");
    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Value::Int(i));
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.set("speed", 3);
        env.set(
            "player",
            Value::object_from_pairs([("hp", Value::Int(7)), ("name", Value::from("hero"))]),
        );
        env
    }

    #[test]
    fn test_literals() {
        let env = Environment::new();
        assert_eq!(resolve_token("42", &env), Value::Int(42));
        assert_eq!(resolve_token("-1.5", &env), Value::Float(-1.5));
        assert_eq!(resolve_token("True", &env), Value::Bool(true));
        assert_eq!(resolve_token("None", &env), Value::Null);
        assert_eq!(resolve_token("'it\\'s'", &env), Value::from("it's"));
        assert_eq!(resolve_token("\"a b\"", &env), Value::from("a b"));
    }

    #[test]
    fn test_paths_walk_the_environment() {
        let env = env();
        assert_eq!(resolve_token("speed", &env), Value::Int(3));
        assert_eq!(resolve_token("player.hp", &env), Value::Int(7));
        assert_eq!(resolve_token("player . name", &env), Value::from("hero"));
    }

    #[test]
    fn test_unresolved_tokens_stay_strings() {
        let env = env();
        assert_eq!(resolve_token("walk_left", &env), Value::from("walk_left"));
        assert_eq!(resolve_token("player.mana", &env), Value::from("player.mana"));
        assert_eq!(resolve_token("a + b", &env), Value::from("a + b"));
        assert_eq!(resolve_token("__import__('os')", &env), Value::from("__import__('os')"));
        assert_eq!(resolve_token("inf", &env), Value::from("inf"));
    }
}
