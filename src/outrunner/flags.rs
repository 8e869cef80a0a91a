//! Command-line flags handed to bbl.

use crate::concourse::{BblArgs, Source};
use std::fmt;

/// `--name=value`, or a bare `--name` when there is no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub value: Option<String>,
}

impl Flag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "--{}={}", self.name, value),
            None => write!(f, "--{}", self.name),
        }
    }
}

/// Flags configured once on the resource.
pub fn source_flags(source: &Source) -> Vec<Flag> {
    [
        ("iaas", &source.iaas),
        ("gcp-service-account-key", &source.gcp_service_account_key),
        ("gcp-region", &source.gcp_region),
        ("lb-type", &source.lb_type),
        ("lb-domain", &source.lb_domain),
    ]
    .into_iter()
    .filter(|(_, value)| !value.is_empty())
    .map(|(name, value)| Flag::new(name, value.as_str()))
    .collect()
}

/// Flags given on the individual `put` step.
pub fn arg_flags(args: &BblArgs) -> Vec<Flag> {
    let named = [
        ("lb-cert", &args.lb_cert),
        ("lb-key", &args.lb_key),
        ("lb-type", &args.lb_type),
        ("lb-domain", &args.lb_domain),
        ("domain", &args.domain),
        ("gcp-zone", &args.gcp_zone),
        ("aws-region", &args.aws_region),
    ];

    let mut flags: Vec<Flag> = named
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| Flag::new(name, v.as_str())))
        .collect();

    if args.no_director {
        flags.push(Flag::switch("no-director"));
    }

    for extra in &args.extra {
        if extra.value.is_empty() {
            flags.push(Flag::switch(extra.name.as_str()));
        } else {
            flags.push(Flag::new(extra.name.as_str(), extra.value.as_str()));
        }
    }
    flags
}

/// Source flags first; step arguments override by coming later.
pub fn all_flags(source: &Source, args: &BblArgs) -> Vec<Flag> {
    let mut flags = source_flags(source);
    flags.extend(arg_flags(args));
    flags
}
