//! CLI configuration.

use anyhow::{bail, Context, Result};
use reconcile_core::{DuplicatePolicy, IgnoredFields, MergeOptions};

/// Merge settings gathered from the environment and command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliConfig {
    /// Report conflicts instead of auto-resolving
    pub report_conflicts: bool,

    /// Fields excluded from structural comparison
    pub ignore_fields: IgnoredFields,

    /// Repeated-id handling
    pub duplicates: DuplicatePolicy,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RECONCILE_REPORT_CONFLICTS`: `1`/`true` to report conflicts
    /// - `RECONCILE_IGNORE_FIELDS`: comma-separated field names
    /// - `RECONCILE_DUPLICATES`: `reject` or `last-wins`
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an unrecognized value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an unrecognized value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(report) = lookup("RECONCILE_REPORT_CONFLICTS") {
            config.report_conflicts =
                parse_bool(&report).context("Invalid RECONCILE_REPORT_CONFLICTS")?;
        }

        if let Some(fields) = lookup("RECONCILE_IGNORE_FIELDS") {
            config.add_ignored(&fields);
        }

        if let Some(policy) = lookup("RECONCILE_DUPLICATES") {
            config.duplicates = parse_policy(&policy).context("Invalid RECONCILE_DUPLICATES")?;
        }

        Ok(config)
    }

    /// Apply command-line flags, returning the remaining positional arguments.
    ///
    /// # Errors
    ///
    /// Returns error on an unknown flag or a flag missing its value.
    pub fn apply_args(&mut self, args: &[String]) -> Result<Vec<String>> {
        let mut positional = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--report-conflicts" => self.report_conflicts = true,
                "--ignore" => {
                    let fields = iter.next().context("--ignore needs a field list")?;
                    self.add_ignored(fields);
                }
                "--duplicates" => {
                    let policy = iter.next().context("--duplicates needs a policy")?;
                    self.duplicates = parse_policy(policy)?;
                }
                flag if flag.starts_with("--") => bail!("Unknown flag: {flag}"),
                _ => positional.push(arg.clone()),
            }
        }

        Ok(positional)
    }

    /// Merge options for the engine.
    #[must_use]
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            report_conflicts: self.report_conflicts,
            ignore_fields: self.ignore_fields.clone(),
            duplicates: self.duplicates,
        }
    }

    fn add_ignored(&mut self, list: &str) {
        for field in list.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            self.ignore_fields.insert(field);
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}

fn parse_policy(value: &str) -> Result<DuplicatePolicy> {
    match value.trim() {
        "reject" => Ok(DuplicatePolicy::Reject),
        "last-wins" => Ok(DuplicatePolicy::LastWins),
        other => bail!("expected `reject` or `last-wins`, got {other:?}"),
    }
}
