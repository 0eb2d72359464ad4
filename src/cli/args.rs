//! Flat `--flag [value]` argument parsing against a command's parameter contract.
//!
//! Parsing never fails: anything that does not fit the contract ends up in
//! [`ParsedArguments::unexpected_args`] and the caller decides what to do.

use std::collections::{BTreeMap, BTreeSet};

pub const FLAG_PREFIX: &str = "--";

/// Declaration of a single command parameter.
///
/// `name` is stored without the `--` prefix. A parameter takes a value exactly
/// when it has a value placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub is_required: bool,
    pub is_hidden: bool,
    pub value_placeholder: Option<&'static str>,
    pub takes_path: bool,
    pub config_path: Option<&'static str>,
    pub default_value: Option<&'static str>,
}

impl ParameterSpec {
    /// A boolean switch such as `--clear`.
    pub const fn flag(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            is_required: false,
            is_hidden: false,
            value_placeholder: None,
            takes_path: false,
            config_path: None,
            default_value: None,
        }
    }

    /// A parameter followed by a value, e.g. `--app <app>`.
    pub const fn value(
        name: &'static str,
        placeholder: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            value_placeholder: Some(placeholder),
            ..Self::flag(name, description)
        }
    }

    pub const fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub const fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    pub const fn path(mut self) -> Self {
        self.takes_path = true;
        self
    }

    pub const fn config(mut self, path: &'static str) -> Self {
        self.config_path = Some(path);
        self
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn takes_value(&self) -> bool {
        self.value_placeholder.is_some()
    }

    /// Command-line form, e.g. `--source-dir`.
    pub fn flag_form(&self) -> String {
        format!("{}{}", FLAG_PREFIX, self.name)
    }

    /// Usage fragment, e.g. `--app <app>` or `[--clear]` for optional parameters.
    pub fn usage(&self) -> String {
        let mut fragment = self.flag_form();
        if let Some(placeholder) = self.value_placeholder {
            fragment.push(' ');
            fragment.push_str(placeholder);
        }
        if self.is_required {
            fragment
        } else {
            format!("[{}]", fragment)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArguments {
    pub values: BTreeMap<String, String>,
    pub flags: BTreeSet<String>,
    pub unexpected_args: Vec<String>,
}

/// Scan `args` left to right against `params`.
pub fn parse(args: &[String], params: &[ParameterSpec]) -> ParsedArguments {
    let mut parsed = ParsedArguments::default();
    let mut index = 0;

    while index < args.len() {
        let token = &args[index];
        index += 1;

        let Some(body) = token.strip_prefix(FLAG_PREFIX) else {
            parsed.unexpected_args.push(token.clone());
            continue;
        };

        // `--name=value` is accepted as a spelling of `--name value`
        let (name, inline_value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        let Some(spec) = params.iter().find(|p| p.name == name) else {
            parsed.unexpected_args.push(token.clone());
            continue;
        };

        match (spec.takes_value(), inline_value) {
            (true, Some(value)) => {
                parsed.values.insert(spec.name.to_string(), value.to_string());
            }
            (true, None) => match args.get(index) {
                Some(next) if !next.starts_with(FLAG_PREFIX) => {
                    parsed.values.insert(spec.name.to_string(), next.clone());
                    index += 1;
                }
                // Dangling value flag: the following flag (if any) is scanned on its own
                _ => parsed.unexpected_args.push(token.clone()),
            },
            (false, None) => {
                parsed.flags.insert(spec.name.to_string());
            }
            (false, Some(_)) => parsed.unexpected_args.push(token.clone()),
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::value("app", "<app>", "Application name").required(),
            ParameterSpec::value("source-dir", "<dir>", "Source directory").path(),
            ParameterSpec::flag("clear", "Clear before deploying"),
        ]
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_value_pairs_round_trip() {
        let parsed = parse(&args(&["--app", "bank", "--source-dir", "src/main"]), &params());
        assert_eq!(parsed.values.get("app").map(String::as_str), Some("bank"));
        assert_eq!(
            parsed.values.get("source-dir").map(String::as_str),
            Some("src/main")
        );
        assert!(parsed.flags.is_empty());
        assert!(parsed.unexpected_args.is_empty());
    }

    #[test]
    fn test_boolean_flag() {
        let parsed = parse(&args(&["--clear", "--app", "bank"]), &params());
        assert!(parsed.flags.contains("clear"));
        assert_eq!(parsed.values.len(), 1);
        assert!(parsed.unexpected_args.is_empty());
    }

    #[test]
    fn test_trailing_value_flag_is_unexpected() {
        let parsed = parse(&args(&["--clear", "--app"]), &params());
        assert!(!parsed.values.contains_key("app"));
        assert_eq!(parsed.unexpected_args, vec!["--app".to_string()]);
    }

    #[test]
    fn test_value_flag_followed_by_flag() {
        let parsed = parse(&args(&["--app", "--clear"]), &params());
        assert!(!parsed.values.contains_key("app"));
        assert_eq!(parsed.unexpected_args, vec!["--app".to_string()]);
        // The following flag is still recognised on its own
        assert!(parsed.flags.contains("clear"));
    }

    #[test]
    fn test_unknown_tokens_keep_order() {
        let parsed = parse(
            &args(&["stray", "--unknown", "--app", "bank", "other"]),
            &params(),
        );
        assert_eq!(
            parsed.unexpected_args,
            args(&["stray", "--unknown", "other"])
        );
        assert_eq!(parsed.values.get("app").map(String::as_str), Some("bank"));
    }

    #[test]
    fn test_inline_value_syntax() {
        let parsed = parse(&args(&["--app=bank", "--clear=yes"]), &params());
        assert_eq!(parsed.values.get("app").map(String::as_str), Some("bank"));
        assert!(!parsed.flags.contains("clear"));
        assert_eq!(parsed.unexpected_args, args(&["--clear=yes"]));
    }

    #[test]
    fn test_last_value_wins() {
        let parsed = parse(&args(&["--app", "one", "--app", "two"]), &params());
        assert_eq!(parsed.values.get("app").map(String::as_str), Some("two"));
    }

    #[test]
    fn test_usage_fragments() {
        let params = params();
        assert_eq!(params[0].usage(), "--app <app>");
        assert_eq!(params[2].usage(), "[--clear]");
        assert!(params[0].takes_value());
        assert!(!params[2].takes_value());
    }
}
