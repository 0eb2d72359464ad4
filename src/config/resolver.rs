//! Layered parameter resolution: command line, then `npl.yml`, then defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

use super::ConfigFile;
use crate::cli::args::{self, ParameterSpec, ParsedArguments};
use crate::cli::registry::CommandDescriptor;
use crate::error::{CliError, CliResult};

/// Flags that older releases accepted. They are still parsed, with their
/// values, but have no effect.
const DEPRECATED_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::flag("dev-mode", "Deprecated").hidden(),
    ParameterSpec::value("target-dir", "<directory>", "Deprecated").hidden(),
    ParameterSpec::value("engine-version", "<version>", "Deprecated").hidden(),
];

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    CommandLine,
    ConfigFile,
    Default,
}

/// Effective parameter values of one invocation, after merging all layers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArgs {
    values: BTreeMap<String, (String, ValueSource)>,
    flags: BTreeSet<String>,
}

impl ResolvedArgs {
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|(value, _)| value.as_str())
    }

    pub fn source(&self, name: &str) -> Option<ValueSource> {
        self.values.get(name).map(|(_, source)| *source)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.value(name).map(PathBuf::from)
    }

    /// Value of a parameter declared as required; resolution already guaranteed it.
    pub fn required(&self, name: &str) -> CliResult<String> {
        self.value(name)
            .map(str::to_string)
            .ok_or_else(|| CliError::InvalidSetting {
                name: name.to_string(),
                reason: "no value".to_string(),
            })
    }
}

pub struct ConfigResolver {
    config_file: ConfigFile,
}

impl ConfigResolver {
    pub fn new(config_file: ConfigFile) -> Self {
        Self { config_file }
    }

    /// Parse `raw_args` against the descriptor's parameters and merge in the
    /// config file and defaults.
    pub fn resolve(
        &self,
        raw_args: &[String],
        descriptor: &CommandDescriptor,
    ) -> CliResult<ResolvedArgs> {
        let params: Vec<ParameterSpec> = descriptor
            .parameters
            .iter()
            .chain(DEPRECATED_PARAMETERS)
            .cloned()
            .collect();
        let mut parsed = args::parse(raw_args, &params);
        drop_deprecated(&mut parsed, descriptor);

        if !parsed.unexpected_args.is_empty() {
            return Err(CliError::ArgumentParsing {
                command: descriptor.command_name.to_string(),
                unexpected: parsed.unexpected_args,
            });
        }

        let mut resolved = ResolvedArgs::default();
        let mut missing = Vec::new();

        for param in descriptor.parameters {
            if param.takes_value() {
                match self.layered_value(param, &parsed.values) {
                    Some((value, source)) => {
                        let value = if param.takes_path {
                            expand_home(value)
                        } else {
                            value
                        };
                        debug!(parameter = param.name, ?source, "Resolved parameter");
                        resolved
                            .values
                            .insert(param.name.to_string(), (value, source));
                    }
                    None if param.is_required => missing.push(param.name.to_string()),
                    None => {}
                }
            } else if self.flag_enabled(param, &parsed.flags) {
                resolved.flags.insert(param.name.to_string());
            }
        }

        if !missing.is_empty() {
            return Err(CliError::RequiredParameterMissing {
                names: missing,
                usage: descriptor.usage(),
            });
        }

        Ok(resolved)
    }

    fn layered_value(
        &self,
        param: &ParameterSpec,
        cli_values: &BTreeMap<String, String>,
    ) -> Option<(String, ValueSource)> {
        if let Some(value) = cli_values.get(param.name) {
            return Some((value.clone(), ValueSource::CommandLine));
        }
        if let Some(value) = param.config_path.and_then(|p| self.config_file.lookup(p)) {
            return Some((value, ValueSource::ConfigFile));
        }
        param
            .default_value
            .map(|value| (value.to_string(), ValueSource::Default))
    }

    fn flag_enabled(&self, param: &ParameterSpec, cli_flags: &BTreeSet<String>) -> bool {
        if cli_flags.contains(param.name) {
            return true;
        }
        let configured = param.config_path.and_then(|p| self.config_file.lookup(p));
        match configured.as_deref() {
            Some("true") => true,
            Some("false") | None => param.default_value == Some("true"),
            Some(other) => {
                warn!(
                    "Ignoring non-boolean value '{}' for '{}' in config file",
                    other, param.name
                );
                param.default_value == Some("true")
            }
        }
    }

    /// Config file keys that no parameter of `descriptors` reads.
    pub fn unknown_keys<'a>(
        &self,
        descriptors: impl Iterator<Item = &'a CommandDescriptor>,
    ) -> Vec<String> {
        let known: BTreeSet<&str> = descriptors
            .flat_map(|d| d.parameters.iter())
            .filter_map(|p| p.config_path)
            .collect();

        self.config_file
            .leaf_paths()
            .into_iter()
            .filter(|key| !known.contains(key.as_str()))
            .collect()
    }

    /// Log a warning for every config file key that no registered parameter reads.
    pub fn warn_unknown_keys<'a>(&self, descriptors: impl Iterator<Item = &'a CommandDescriptor>) {
        let location = self
            .config_file
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "npl.yml".to_string());

        for key in self.unknown_keys(descriptors) {
            warn!("Unknown configuration field in {}: {}", location, key);
        }
    }
}

/// Expand a leading `~` in path parameters to the user's home directory.
fn expand_home(value: String) -> String {
    let expandable = value == "~" || value.starts_with("~/");
    match dirs::home_dir() {
        Some(home) if expandable => format!("{}{}", home.display(), &value[1..]),
        _ => value,
    }
}

/// Remove deprecated parameters from a parse result, including a deprecated
/// value flag left dangling at the end of the command line.
fn drop_deprecated(parsed: &mut ParsedArguments, descriptor: &CommandDescriptor) {
    for param in DEPRECATED_PARAMETERS {
        if descriptor.parameters.iter().any(|p| p.name == param.name) {
            continue;
        }

        let flag_form = param.flag_form();
        let before = parsed.unexpected_args.len();
        parsed.unexpected_args.retain(|token| *token != flag_form);
        let dangling = parsed.unexpected_args.len() != before;

        let valued = parsed.values.remove(param.name).is_some();
        let switched = parsed.flags.remove(param.name);
        if valued || switched || dangling {
            warn!("Parameter {} is deprecated and ignored", flag_form);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::registry::tests::descriptor;

    const PARAMS: &[ParameterSpec] = &[
        ParameterSpec::value("app", "<app>", "Application").required().config("cloud.app"),
        ParameterSpec::value("tenant", "<tenant>", "Tenant").required().config("cloud.tenant"),
        ParameterSpec::value("url", "<url>", "Portal URL")
            .config("cloud.url")
            .default("https://portal.example.com"),
        ParameterSpec::flag("clear", "Clear first").config("cloud.clear"),
    ];

    fn cloud_descriptor() -> CommandDescriptor {
        CommandDescriptor {
            parameters: PARAMS,
            ..descriptor("cloud deploy")
        }
    }

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn resolver(yaml: &str) -> ConfigResolver {
        ConfigResolver::new(ConfigFile::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_cli_value_wins_over_config_file() {
        let resolved = resolver("cloud:\n  app: from-file\n  tenant: acme\n")
            .resolve(&args(&["--app", "from-cli"]), &cloud_descriptor())
            .unwrap();
        assert_eq!(resolved.value("app"), Some("from-cli"));
        assert_eq!(resolved.source("app"), Some(ValueSource::CommandLine));
        assert_eq!(resolved.value("tenant"), Some("acme"));
        assert_eq!(resolved.source("tenant"), Some(ValueSource::ConfigFile));
    }

    #[test]
    fn test_default_applies_when_no_layer_has_value() {
        let resolved = resolver("{}")
            .resolve(&args(&["--app", "a", "--tenant", "t"]), &cloud_descriptor())
            .unwrap();
        assert_eq!(resolved.value("url"), Some("https://portal.example.com"));
        assert_eq!(resolved.source("url"), Some(ValueSource::Default));
    }

    #[test]
    fn test_config_file_overrides_default() {
        let resolved = resolver("cloud:\n  url: https://other.example.com\n")
            .resolve(&args(&["--app", "a", "--tenant", "t"]), &cloud_descriptor())
            .unwrap();
        assert_eq!(resolved.value("url"), Some("https://other.example.com"));
    }

    #[test]
    fn test_missing_required_names_all() {
        let err = ConfigResolver::new(ConfigFile::empty())
            .resolve(&[], &cloud_descriptor())
            .unwrap_err();
        match err {
            CliError::RequiredParameterMissing { names, usage } => {
                assert_eq!(names, vec!["app".to_string(), "tenant".to_string()]);
                assert!(usage.starts_with("npl cloud deploy --app <app> --tenant <tenant>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_flag_from_config_file() {
        let resolved = resolver("cloud:\n  app: a\n  tenant: t\n  clear: true\n")
            .resolve(&[], &cloud_descriptor())
            .unwrap();
        assert!(resolved.flag("clear"));

        let resolved = resolver("cloud:\n  app: a\n  tenant: t\n")
            .resolve(&[], &cloud_descriptor())
            .unwrap();
        assert!(!resolved.flag("clear"));
    }

    #[test]
    fn test_path_parameters_expand_home() {
        const PATHS: &[ParameterSpec] = &[
            ParameterSpec::value("source-dir", "<dir>", "Sources").path(),
            ParameterSpec::value("label", "<text>", "Not a path"),
        ];
        let descriptor = CommandDescriptor {
            parameters: PATHS,
            ..descriptor("check")
        };
        let resolved = ConfigResolver::new(ConfigFile::empty())
            .resolve(&args(&["--source-dir", "~/npl", "--label", "~/npl"]), &descriptor)
            .unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(resolved.path("source-dir"), Some(home.join("npl")));
        assert_eq!(resolved.value("label"), Some("~/npl"));
        assert_eq!(expand_home("~other/x".to_string()), "~other/x");
    }

    #[test]
    fn test_deprecated_flags_are_ignored() {
        let resolved = ConfigResolver::new(ConfigFile::empty())
            .resolve(
                &args(&[
                    "--dev-mode",
                    "--app",
                    "a",
                    "--target-dir",
                    "out",
                    "--engine-version=2024.1",
                    "--tenant",
                    "t",
                ]),
                &cloud_descriptor(),
            )
            .unwrap();
        assert_eq!(resolved.value("app"), Some("a"));
        assert_eq!(resolved.value("tenant"), Some("t"));
    }

    #[test]
    fn test_other_unexpected_arguments_fail() {
        let err = ConfigResolver::new(ConfigFile::empty())
            .resolve(
                &args(&["--app", "a", "--tenant", "t", "--dev-mode", "--bogus", "x"]),
                &cloud_descriptor(),
            )
            .unwrap_err();
        match err {
            CliError::ArgumentParsing {
                command,
                unexpected,
            } => {
                assert_eq!(command, "cloud deploy");
                assert_eq!(unexpected, args(&["--bogus", "x"]));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_deprecated_value_flag_only_takes_adjacent_value() {
        let err = ConfigResolver::new(ConfigFile::empty())
            .resolve(
                &args(&["--target-dir", "--app", "a", "stray"]),
                &cloud_descriptor(),
            )
            .unwrap_err();
        match err {
            CliError::ArgumentParsing { unexpected, .. } => {
                assert_eq!(unexpected, args(&["stray"]));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let resolved = ConfigResolver::new(ConfigFile::empty())
            .resolve(
                &args(&["--app", "a", "--tenant", "t", "--engine-version"]),
                &cloud_descriptor(),
            )
            .unwrap();
        assert_eq!(resolved.value("tenant"), Some("t"));
        assert_eq!(resolved.value("engine-version"), None);
    }

    #[test]
    fn test_unknown_config_keys() {
        let resolver = resolver(
            "cloud:\n  app: a\n  tenent: typo\nlocal:\n  password: secret\n",
        );
        let descriptor = cloud_descriptor();
        assert_eq!(
            resolver.unknown_keys(std::iter::once(&descriptor)),
            vec!["cloud.tenent".to_string(), "local.password".to_string()]
        );

        let registry = crate::cli::commands();
        assert_eq!(
            resolver.unknown_keys(registry.visible()),
            vec!["cloud.tenent".to_string()]
        );
    }

    #[test]
    fn test_parsing_failure_reported_before_missing_parameters() {
        let err = ConfigResolver::new(ConfigFile::empty())
            .resolve(&args(&["stray"]), &cloud_descriptor())
            .unwrap_err();
        assert!(matches!(err, CliError::ArgumentParsing { .. }));
    }
}
