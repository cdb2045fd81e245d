//! Parsing of declarative `on:` attribute bindings.
//!
//! ```text
//! on:<nativeEvent>[.<modifier>...]="<eventName>[(<eventData>)]"
//! ```
//!
//! Parsing is lenient: a data literal that cannot be understood yields no
//! data instead of rejecting the binding.

use serde_json::Value;
use std::str::FromStr;

/// Default attribute prefix for declarative bindings
pub const DEFAULT_ATTRIBUTE_PREFIX: &str = "on:";

/// Modifier applied when a binding fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// `prevent`: cancel the native default action
    Prevent,
    /// `stop`: stop native propagation and the delegated walk
    Stop,
    /// `self`: fire only when the bound element is the event target
    SelfOnly,
    /// `once`: drop the binding after its first run
    Once,
}

impl FromStr for Modifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prevent" => Ok(Modifier::Prevent),
            "stop" => Ok(Modifier::Stop),
            "self" => Ok(Modifier::SelfOnly),
            "once" => Ok(Modifier::Once),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Modifier::Prevent => "prevent",
            Modifier::Stop => "stop",
            Modifier::SelfOnly => "self",
            Modifier::Once => "once",
        };
        write!(f, "{}", s)
    }
}

/// One parsed declarative binding
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSpec {
    /// Native event kind, e.g. `click`
    pub native_event: String,
    /// Modifiers in attribute order, unknown ones dropped
    pub modifiers: Vec<Modifier>,
    /// Bus event to trigger
    pub event_name: String,
    /// Parsed literal argument
    pub data: Option<Value>,
}

impl BindingSpec {
    /// Whether the modifier is present
    pub fn has(&self, modifier: Modifier) -> bool {
        self.modifiers.contains(&modifier)
    }
}

/// Parse one attribute into a binding.
///
/// Returns `None` when the attribute does not carry `prefix`, names no native
/// event, or has an empty value.
pub fn parse_binding(prefix: &str, attr_name: &str, attr_value: &str) -> Option<BindingSpec> {
    let descriptor = attr_name.strip_prefix(prefix)?;

    let mut parts = descriptor.split('.');
    let native_event = parts.next().unwrap_or_default().trim();
    if native_event.is_empty() {
        tracing::warn!(attribute = attr_name, "Binding names no native event");
        return None;
    }

    let modifiers = parts
        .filter(|m| !m.is_empty())
        .filter_map(|m| match m.parse::<Modifier>() {
            Ok(modifier) => Some(modifier),
            Err(unknown) => {
                tracing::warn!(attribute = attr_name, modifier = %unknown, "Ignoring unknown modifier");
                None
            }
        })
        .collect();

    let value = attr_value.trim();
    let (event_name, data) = match value.find('(') {
        Some(open) => {
            let name = value[..open].trim();
            let rest = &value[open + 1..];
            let data = match rest.rfind(')') {
                Some(close) => {
                    let trailing = rest[close + 1..].trim();
                    if !trailing.is_empty() {
                        tracing::warn!(
                            attribute = attr_name,
                            trailing,
                            "Ignoring text after binding argument"
                        );
                    }
                    parse_data_literal(&rest[..close])
                }
                None => {
                    tracing::warn!(attribute = attr_name, value, "Unclosed binding argument");
                    None
                }
            };
            (name, data)
        }
        None => (value, None),
    };

    if event_name.is_empty() {
        tracing::warn!(attribute = attr_name, "Binding names no bus event");
        return None;
    }

    Some(BindingSpec {
        native_event: native_event.to_string(),
        modifiers,
        event_name: event_name.to_string(),
        data,
    })
}

/// Parse the literal between a binding's parentheses.
///
/// The literal spans from the first `(` to the last `)` of the value; text
/// after the last `)` is dropped with a warning.
///
/// Quoted text becomes a string, JSON becomes that value, a bare word becomes
/// a string, anything else is `None`.
pub fn parse_data_literal(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Some(Value::String(raw[1..raw.len() - 1].to_string()));
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Some(value);
    }

    if raw.chars().all(is_bare_word_char) {
        return Some(Value::String(raw.to_string()));
    }

    tracing::debug!(literal = raw, "Unparseable binding data");
    None
}

fn is_bare_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '[' | ']' | '/' | ' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_with_modifier_and_bare_word() {
        let spec = parse_binding("on:", "on:click.prevent", "foo(bar)").unwrap();
        assert_eq!(spec.native_event, "click");
        assert_eq!(spec.modifiers, vec![Modifier::Prevent]);
        assert_eq!(spec.event_name, "foo");
        assert_eq!(spec.data, Some(json!("bar")));
    }

    #[test]
    fn test_parse_without_argument() {
        let spec = parse_binding("on:", "on:submit", "form[signup]::validate").unwrap();
        assert_eq!(spec.event_name, "form[signup]::validate");
        assert_eq!(spec.data, None);
        assert!(spec.modifiers.is_empty());
    }

    #[test]
    fn test_parse_multiple_and_unknown_modifiers() {
        let spec = parse_binding("on:", "on:click.stop.bogus.once.", "menu::close").unwrap();
        assert_eq!(spec.modifiers, vec![Modifier::Stop, Modifier::Once]);
        assert!(spec.has(Modifier::Once));
        assert!(!spec.has(Modifier::Prevent));
    }

    #[test]
    fn test_parse_rejects_foreign_or_empty() {
        assert!(parse_binding("on:", "data-on", "x").is_none());
        assert!(parse_binding("on:", "on:", "x").is_none());
        assert!(parse_binding("on:", "on:.prevent", "x").is_none());
        assert!(parse_binding("on:", "on:click", "   ").is_none());
        assert!(parse_binding("on:", "on:click", "(x)").is_none());
    }

    #[test]
    fn test_custom_prefix() {
        let spec = parse_binding("x-on:", "x-on:input", "search::query").unwrap();
        assert_eq!(spec.native_event, "input");
        assert!(parse_binding("x-on:", "on:input", "search::query").is_none());
    }

    #[test]
    fn test_unclosed_argument_degrades() {
        let spec = parse_binding("on:", "on:click", "modal::open(intro").unwrap();
        assert_eq!(spec.event_name, "modal::open");
        assert_eq!(spec.data, None);
    }

    #[test]
    fn test_text_after_argument_is_dropped() {
        let spec = parse_binding("on:", "on:click", "modal::open(intro) extra").unwrap();
        assert_eq!(spec.event_name, "modal::open");
        assert_eq!(spec.data, Some(json!("intro")));

        let spec = parse_binding("on:", "on:click", "foo(a) (b)").unwrap();
        assert_eq!(spec.event_name, "foo");
        assert_eq!(spec.data, None);
    }

    #[test]
    fn test_data_literals() {
        assert_eq!(parse_data_literal("42"), Some(json!(42)));
        assert_eq!(parse_data_literal("true"), Some(json!(true)));
        assert_eq!(parse_data_literal("null"), Some(Value::Null));
        assert_eq!(parse_data_literal("'hello world'"), Some(json!("hello world")));
        assert_eq!(parse_data_literal("\"x\""), Some(json!("x")));
        assert_eq!(parse_data_literal(r#"{"slide": 3}"#), Some(json!({"slide": 3})));
        assert_eq!(parse_data_literal("[1, 2]"), Some(json!([1, 2])));
        assert_eq!(parse_data_literal("next-slide"), Some(json!("next-slide")));
        assert_eq!(parse_data_literal(""), None);
        assert_eq!(parse_data_literal("{broken"), None);
        assert_eq!(parse_data_literal("a,b"), None);
    }
}
