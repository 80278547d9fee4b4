//! Command line parsing
//!
//! Turns a single command string such as `cache:clear --store="my store" -v users`
//! into a command name plus structured [`Parameters`].
//!
//! Tokenization splits on whitespace and honours single and double quotes.
//! Quote characters are consumed, never nested, and an unterminated quote runs
//! to the end of the input.

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Value of a named option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Present without a value (`--force`, `-v`)
    Flag,
    /// `--key=value`
    Value(String),
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Flag => serializer.serialize_bool(true),
            ParamValue::Value(value) => serializer.serialize_str(value),
        }
    }
}

/// Options (in first-seen order) and positional arguments of a command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parameters {
    /// Option name including its dashes (`--store`, `-v`) and value
    pub options: Vec<(String, ParamValue)>,
    /// Positional arguments in original order
    pub arguments: Vec<String>,
}

impl Parameters {
    pub fn is_empty(&self) -> bool {
        self.options.is_empty() && self.arguments.is_empty()
    }

    /// Set an option, replacing an earlier value for the same name
    pub fn set_option(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.options.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.options.push((name, value)),
        }
    }

    /// Look up an option by its full name (`--store`)
    pub fn option(&self, name: &str) -> Option<&ParamValue> {
        self.options
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Positional argument by index
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).map(String::as_str)
    }

    /// Merge `other` into `self`; options from `other` win and its arguments are appended.
    pub fn merge(&mut self, other: Parameters) {
        for (name, value) in other.options {
            self.set_option(name, value);
        }
        self.arguments.extend(other.arguments);
    }

    /// Build parameters from a JSON object of key/value pairs.
    ///
    /// - keys starting with `-` are options as given
    /// - numeric keys are positional arguments, ordered by index
    /// - any other key becomes a `--key` option
    ///
    /// `true` makes a flag, `false` and `null` are skipped, other scalars are
    /// rendered as strings. Non-object input yields no parameters.
    pub fn from_json(value: &Value) -> Self {
        let mut params = Parameters::default();
        let Some(map) = value.as_object() else {
            return params;
        };

        let mut positional: Vec<(usize, String)> = Vec::new();

        for (key, raw) in map {
            let rendered = match raw {
                Value::Null | Value::Bool(false) => continue,
                Value::Bool(true) => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };

            if let Ok(index) = key.parse::<usize>() {
                if let Some(value) = rendered {
                    positional.push((index, value));
                }
                continue;
            }

            let name = if key.starts_with('-') {
                key.clone()
            } else {
                format!("--{}", key)
            };
            let value = match rendered {
                Some(v) => ParamValue::Value(v),
                None => ParamValue::Flag,
            };
            params.set_option(name, value);
        }

        positional.sort_by_key(|(index, _)| *index);
        params.arguments = positional.into_iter().map(|(_, v)| v).collect();
        params
    }

    /// Render as process arguments: positional arguments first, then options
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.arguments.clone();
        for (name, value) in &self.options {
            match value {
                ParamValue::Flag => args.push(name.clone()),
                ParamValue::Value(v) => args.push(format!("{}={}", name, v)),
            }
        }
        args
    }
}

/// A parsed command string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    pub command: String,
    pub parameters: Parameters,
}

/// Parse a command string. Empty input yields an empty command name.
pub fn parse_command(input: &str) -> ParsedCommand {
    let mut tokens = tokenize(input.trim()).into_iter();

    let Some(command) = tokens.next() else {
        return ParsedCommand::default();
    };

    let mut parameters = Parameters::default();
    for token in tokens {
        if let Some(long) = token.strip_prefix("--") {
            match long.split_once('=') {
                Some((key, value)) => {
                    parameters.set_option(format!("--{}", key), ParamValue::Value(value.to_string()))
                }
                None => parameters.set_option(token.clone(), ParamValue::Flag),
            }
        } else if token.starts_with('-') && token.len() > 1 {
            parameters.set_option(token, ParamValue::Flag);
        } else {
            parameters.arguments.push(token);
        }
    }

    ParsedCommand {
        command,
        parameters,
    }
}

/// Text before the first space, trimmed
pub fn base_command(command: &str) -> &str {
    let command = command.trim();
    command.split(' ').next().unwrap_or(command)
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_empty_input() {
        assert_eq!(parse_command(""), ParsedCommand::default());
        assert_eq!(parse_command("   "), ParsedCommand::default());
    }

    #[test]
    fn test_parse_command_only() {
        let parsed = parse_command("route:list");
        assert_eq!(parsed.command, "route:list");
        assert!(parsed.parameters.is_empty());
    }

    #[test]
    fn test_quoted_option_value_keeps_spaces() {
        let parsed = parse_command(r#"cache:clear --store="my store""#);
        assert_eq!(parsed.command, "cache:clear");
        assert_eq!(
            parsed.parameters.option("--store"),
            Some(&ParamValue::Value("my store".to_string()))
        );
    }

    #[test]
    fn test_option_kinds() {
        let parsed = parse_command("queue:retry all --queue=emails --force -v -");
        let params = &parsed.parameters;
        assert_eq!(params.option("--queue"), Some(&ParamValue::Value("emails".to_string())));
        assert_eq!(params.option("--force"), Some(&ParamValue::Flag));
        assert_eq!(params.option("-v"), Some(&ParamValue::Flag));
        assert_eq!(params.arguments, vec!["all", "-"]);
    }

    #[test]
    fn test_value_with_equals_sign() {
        let parsed = parse_command("config:set --pair=a=b");
        assert_eq!(
            parsed.parameters.option("--pair"),
            Some(&ParamValue::Value("a=b".to_string()))
        );
    }

    #[test]
    fn test_single_quotes_and_unterminated_quote() {
        let parsed = parse_command("about 'hello world' \"open ended");
        assert_eq!(parsed.parameters.arguments, vec!["hello world", "open ended"]);
    }

    #[test]
    fn test_quotes_do_not_nest() {
        let parsed = parse_command(r#"about "it's fine""#);
        assert_eq!(parsed.parameters.argument(0), Some("it's fine"));
    }

    #[test]
    fn test_duplicate_option_replaces_value() {
        let parsed = parse_command("about --env=a --env=b");
        assert_eq!(parsed.parameters.options.len(), 1);
        assert_eq!(
            parsed.parameters.option("--env"),
            Some(&ParamValue::Value("b".to_string()))
        );
    }

    #[test]
    fn test_base_command() {
        assert_eq!(base_command("route:list --path=/api"), "route:list");
        assert_eq!(base_command("  about  "), "about");
        assert_eq!(base_command(""), "");
    }

    #[test]
    fn test_from_json() {
        let params = Parameters::from_json(&json!({
            "--store": "redis",
            "force": true,
            "quiet": false,
            "1": "second",
            "0": "first",
            "tries": 3,
            "skip": null
        }));

        assert_eq!(params.option("--store"), Some(&ParamValue::Value("redis".to_string())));
        assert_eq!(params.option("--force"), Some(&ParamValue::Flag));
        assert_eq!(params.option("--tries"), Some(&ParamValue::Value("3".to_string())));
        assert!(params.option("--quiet").is_none());
        assert!(params.option("--skip").is_none());
        assert_eq!(params.arguments, vec!["first", "second"]);
    }

    #[test]
    fn test_from_json_non_object() {
        assert!(Parameters::from_json(&json!(["a"])).is_empty());
        assert!(Parameters::from_json(&Value::Null).is_empty());
    }

    #[test]
    fn test_to_args_and_merge() {
        let mut params = parse_command("about first --a=1 -v").parameters;
        params.merge(Parameters::from_json(&json!({"a": "2", "0": "second"})));
        assert_eq!(params.to_args(), vec!["first", "second", "--a=2", "-v"]);
    }

    #[test]
    fn test_serializes_flags_as_true() {
        let params = parse_command("about --force --env=prod x").parameters;
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({"options": [["--force", true], ["--env", "prod"]], "arguments": ["x"]})
        );
    }

    proptest! {
        #[test]
        fn prop_plain_words_round_trip(words in prop::collection::vec("[a-z:]{1,10}", 1..8)) {
            let parsed = parse_command(&words.join(" "));
            prop_assert_eq!(&parsed.command, &words[0]);
            prop_assert_eq!(parsed.parameters.arguments, words[1..].to_vec());
        }
    }
}
