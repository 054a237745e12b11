//! Query placeholders
//!
//! Scans query text for `@name` placeholders, e.g.
//! `select * from God where name = @name and age > @age`, and builds the
//! matching [`Params`]. Placeholders inside `'...'` or `"..."` literals are
//! plain text. Inside a literal, a doubled quote or a backslash escapes the
//! next character.
//!
//! Tokenization is single-pass over bytes: `@`, quotes and name characters
//! are all ASCII, so byte offsets always fall on UTF-8 boundaries.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::config::BindConfig;
use crate::error::ParamError;
use crate::params::{is_name_byte, Params};
use crate::value::Value;

/// Token representing a parsed query fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text (range in the original string)
    Literal(Range<usize>),
    /// Placeholder `@name`; `span` covers the `@` too
    Placeholder { name: String, span: Range<usize> },
}

/// Split `text` into literal and placeholder tokens
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParamError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut quote: Option<(u8, usize)> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some((q, _)) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                if bytes.get(i + 1) == Some(&q) {
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' | b'"' => {
                quote = Some((b, i));
                i += 1;
            }
            b'@' => {
                let name_start = i + 1;
                match bytes.get(name_start) {
                    Some(&c) if c.is_ascii_alphabetic() || c == b'_' => {}
                    _ => {
                        return Err(ParamError::QuerySyntax {
                            position: i,
                            details: "expected a parameter name after '@'".into(),
                        });
                    }
                }
                let name_end = bytes[name_start..]
                    .iter()
                    .position(|&c| !is_name_byte(c))
                    .map_or(bytes.len(), |off| name_start + off);

                if i > literal_start {
                    tokens.push(Token::Literal(literal_start..i));
                }
                tokens.push(Token::Placeholder {
                    name: text[name_start..name_end].to_string(),
                    span: i..name_end,
                });
                literal_start = name_end;
                i = name_end;
            }
            _ => i += 1,
        }
    }

    if let Some((_, start)) = quote {
        return Err(ParamError::QuerySyntax {
            position: start,
            details: "unterminated string literal".into(),
        });
    }

    if literal_start < text.len() {
        tokens.push(Token::Literal(literal_start..text.len()));
    }

    Ok(tokens)
}

/// Query text paired with the parameters its placeholders declare
#[derive(Debug)]
pub struct Query {
    text: String,
    tokens: Arc<Vec<Token>>,
    params: Params,
}

impl Query {
    pub fn parse(text: &str) -> Result<Self, ParamError> {
        Self::parse_with(text, BindConfig::default())
    }

    pub fn parse_with(text: &str, config: BindConfig) -> Result<Self, ParamError> {
        let tokens = Arc::new(tokenize(text)?);
        Self::from_tokens(text, tokens, config)
    }

    fn from_tokens(text: &str, tokens: Arc<Vec<Token>>, config: BindConfig) -> Result<Self, ParamError> {
        let mut params = Params::with_config(config);
        for token in tokens.iter() {
            if let Token::Placeholder { name, .. } = token {
                params.add(name)?;
            }
        }
        Ok(Self {
            text: text.to_string(),
            tokens,
            params,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.params.names()
    }

    /// Shorthand for `self.params().bind(..)`
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<(), ParamError> {
        self.params.bind(name, value)
    }

    /// Substitute every placeholder with its bound value's literal
    pub fn render(&self) -> Result<String, ParamError> {
        self.params.ensure_bound()?;

        let mut out = String::with_capacity(self.text.len() * 2);
        for token in self.tokens.iter() {
            match token {
                Token::Literal(range) => out.push_str(&self.text[range.clone()]),
                Token::Placeholder { name, .. } => {
                    let param = self
                        .params
                        .get(name)
                        .ok_or_else(|| ParamError::NotFound { name: name.clone() })?;
                    out.push_str(&param.get()?.to_query_literal());
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Query parser with a token cache
///
/// Each parse returns a fresh [`Query`] with its own unbound [`Params`];
/// only the tokenized form is shared.
#[derive(Debug, Default)]
pub struct QueryCache {
    cache: DashMap<String, Arc<Vec<Token>>>,
    config: BindConfig,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BindConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    pub fn parse(&self, text: &str) -> Result<Query, ParamError> {
        if let Some(cached) = self.cache.get(text) {
            trace!(query = text, "query cache hit");
            let tokens = Arc::clone(&cached);
            drop(cached);
            return Query::from_tokens(text, tokens, self.config);
        }

        let tokens = Arc::new(tokenize(text)?);
        self.cache.insert(text.to_string(), Arc::clone(&tokens));
        Query::from_tokens(text, tokens, self.config)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn placeholder_names(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter_map(|t| match t {
                Token::Placeholder { name, .. } => Some(name.as_str()),
                Token::Literal(_) => None,
            })
            .collect()
    }

    #[test]
    fn tokenize_finds_placeholders() {
        let text = "select * from God where name = @name and age > @age";
        let tokens = tokenize(text).unwrap();
        assert_eq!(placeholder_names(&tokens), vec!["name", "age"]);
        assert_eq!(tokens[1], Token::Placeholder { name: "name".into(), span: 31..36 });
    }

    #[test]
    fn tokenize_placeholder_at_edges() {
        let tokens = tokenize("@a,@b").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(placeholder_names(&tokens), vec!["a", "b"]);
    }

    #[test]
    fn tokenize_ignores_quoted_at() {
        let tokens = tokenize("where email = 'ada@example.com' and x = \"@no\"").unwrap();
        assert!(placeholder_names(&tokens).is_empty());
    }

    #[test]
    fn tokenize_handles_escaped_quotes() {
        let tokens = tokenize("where n = 'O''Brien @x' and m = 'a\\'b' and k = @k").unwrap();
        assert_eq!(placeholder_names(&tokens), vec!["k"]);
    }

    #[test]
    fn tokenize_bare_at_is_error() {
        match tokenize("where x = @ 1") {
            Err(ParamError::QuerySyntax { position, .. }) => assert_eq!(position, 10),
            other => panic!("expected QuerySyntax, got {other:?}"),
        }
        assert!(tokenize("trailing @").is_err());
        assert!(tokenize("@1abc").is_err());
    }

    #[test]
    fn tokenize_unterminated_literal() {
        match tokenize("where name = 'Ada") {
            Err(ParamError::QuerySyntax { position, details }) => {
                assert_eq!(position, 13);
                assert!(details.contains("unterminated"));
            }
            other => panic!("expected QuerySyntax, got {other:?}"),
        }
    }

    #[test]
    fn tokenize_multibyte_literal() {
        let tokens = tokenize("where city = 'Zürich' and n = @n é ok").unwrap();
        assert_eq!(placeholder_names(&tokens), vec!["n"]);
    }

    #[test]
    fn parse_registers_distinct_names() {
        let query = Query::parse("where a = @x or b = @x or c = @y").unwrap();
        assert_eq!(query.names().into_iter().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(query.params().len(), 2);
    }

    #[test]
    fn render_substitutes_literals() {
        let query = Query::parse("select * from God where name = @name and age > @age").unwrap();
        query.bind("name", "Ada Lovelace").unwrap();
        query.bind("age", 36).unwrap();
        assert_eq!(
            query.render().unwrap(),
            "select * from God where name = 'Ada Lovelace' and age > 36"
        );
    }

    #[test]
    fn render_repeated_placeholder() {
        let query = Query::parse("@x + @x").unwrap();
        query.bind("x", 2).unwrap();
        assert_eq!(query.render().unwrap(), "2 + 2");
    }

    #[test]
    fn render_requires_every_binding() {
        let query = Query::parse("where a = @a and b = @b").unwrap();
        query.bind("a", 1).unwrap();
        match query.render() {
            Err(ParamError::Unbound { names }) => assert_eq!(names, vec!["b"]),
            other => panic!("expected Unbound, got {other:?}"),
        }
    }

    #[test]
    fn handles_from_query_observe_binds() {
        let query = Query::parse("where name = @name").unwrap();
        let name = query.params().get("name").unwrap();
        assert!(name.is_instance_of(ValueType::Integer));
        query.bind("name", "Ada").unwrap();
        assert!(!name.is_instance_of(ValueType::Integer));
    }

    #[test]
    fn cache_reuses_tokens_not_bindings() {
        let cache = QueryCache::new();
        let first = cache.parse("where n = @n").unwrap();
        first.bind("n", 1).unwrap();

        let second = cache.parse("where n = @n").unwrap();
        assert_eq!(cache.len(), 1);
        assert!(!second.params().is_fully_bound());
        assert!(Arc::ptr_eq(&first.tokens, &second.tokens));
    }

    #[test]
    fn cache_does_not_store_failures() {
        let cache = QueryCache::new();
        assert!(cache.parse("where n = @").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_clear_empties() {
        let cache = QueryCache::new();
        cache.parse("where a = @a").unwrap();
        cache.parse("where b = @b").unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());

        assert!(cache.parse("where a = @a").is_ok());
        assert_eq!(cache.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────
    // Rendered output tokenizes back without new placeholders
    // ─────────────────────────────────────────────────────────────

    fn render_with(value: Value) -> String {
        let query = Query::parse("select * from God where name = @name and k = @k").unwrap();
        query.bind("name", value).unwrap();
        query.bind("k", 1).unwrap();
        query.render().unwrap()
    }

    fn assert_retokenizes(rendered: &str) {
        let tokens = tokenize(rendered)
            .unwrap_or_else(|e| panic!("rendered query does not tokenize: {rendered:?}: {e}"));
        assert!(
            placeholder_names(&tokens).is_empty(),
            "rendered query grew placeholders: {rendered:?}"
        );
    }

    #[test]
    fn render_escapes_backslash_and_quote() {
        let rendered = render_with(Value::from(r"\' or secret = @leak or x = '"));
        assert_eq!(
            rendered,
            r"select * from God where name = '\\'' or secret = @leak or x = ''' and k = 1"
        );
        assert_retokenizes(&rendered);

        let rendered = render_with(Value::from(r"C:\"));
        assert!(rendered.contains(r"name = 'C:\\' and"), "{rendered}");
        assert_retokenizes(&rendered);
    }

    #[test]
    fn render_hostile_strings_stay_inside_literal() {
        let hostile = [
            "'",
            "''",
            r"\",
            r"\\'",
            r"'\",
            "@x",
            "a' or b = @b or c = '",
            "\"@x\"",
            "line\nbreak\ttab\r\u{0}nul\u{7f}",
            r"Zürich '@z' \",
        ];
        for s in hostile {
            assert_retokenizes(&render_with(Value::from(s)));
        }
    }

    #[test]
    fn render_nested_and_non_finite_values_retokenize() {
        let values = [
            Value::from(vec![r"\'", "@x", "''"]),
            Value::from(serde_json::json!({"k\"@x": "\\' @y", "n": [1, "'"]})),
            Value::Float(f64::NAN),
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
        ];
        for v in values {
            assert_retokenizes(&render_with(v));
        }
        assert!(render_with(Value::Float(f64::NAN)).contains("name = null"));
    }
}
