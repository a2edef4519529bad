use serde_json::Value;
use std::sync::Arc;

pub type KeyFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;
pub type ValueFormatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Pure formatting hooks applied by `DeckService` to outgoing keys and values.
#[derive(Clone)]
pub struct Presenter {
    pub format_key: KeyFormatter,
    pub format_value: ValueFormatter,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            format_key: Arc::new(|k: &str| k.to_string()),
            format_value: Arc::new(plain_value),
        }
    }
}

impl Presenter {
    pub fn with_value_formatter(mut self, f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        self.format_value = Arc::new(f);
        self
    }

    pub fn with_key_formatter(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.format_key = Arc::new(f);
        self
    }
}

pub fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders an object as `name: text` entries separated by blank lines, HTML style.
/// Non-object values fall back to `plain_value`.
pub fn html_entries(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(name, text)| format!("{name}: {}", plain_value(text)).replace('\n', "<br>"))
            .collect::<Vec<_>>()
            .join("<br><br>"),
        other => plain_value(other).replace('\n', "<br>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_strings_are_unquoted() {
        assert_eq!(plain_value(&json!("hello")), "hello");
        assert_eq!(plain_value(&json!(3)), "3");
    }

    #[test]
    fn html_entries_joins_readings() {
        let v = json!({ "hao3": "good\nwell", "hao4": "to like" });
        assert_eq!(
            html_entries(&v),
            "hao3: good<br>well<br><br>hao4: to like"
        );
        assert_eq!(html_entries(&json!("a\nb")), "a<br>b");
    }

    #[test]
    fn presenter_hooks_are_replaceable() {
        let p = Presenter::default().with_key_formatter(|k| format!("<b>{k}</b>"));
        assert_eq!((p.format_key)("x"), "<b>x</b>");
        assert_eq!((p.format_value)(&json!("v")), "v");
    }
}
