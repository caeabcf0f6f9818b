//! Linker flag construction.
//!
//! Flags stay structured until [`LinkerFlags::to_ldflags`] joins them into
//! the single `-ldflags` argument the toolchain expects.

use std::collections::BTreeMap;

/// Build variable marking binaries produced by this service.
pub const MARKER_VAR: &str = "main.CLOUD_GOX";

/// Build variable receiving the build time in unix seconds.
pub const BUILD_TIME_VAR: &str = "main.BUILD_TIME";

/// A single linker flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkerFlag {
    /// `-s`: omit the symbol table.
    Strip,
    /// `-w`: omit DWARF debug information.
    OmitDwarf,
    /// `-X name=value`: set a string variable at link time.
    Var { name: String, value: String },
}

impl LinkerFlag {
    fn var(name: &str, value: &str) -> Self {
        LinkerFlag::Var {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for LinkerFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkerFlag::Strip => f.write_str("-s"),
            LinkerFlag::OmitDwarf => f.write_str("-w"),
            LinkerFlag::Var { name, value } => write!(f, "-X {name}={value}"),
        }
    }
}

/// Ordered linker flags for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkerFlags {
    flags: Vec<LinkerFlag>,
}

impl LinkerFlags {
    /// Build the flag set for a job.
    ///
    /// Order: shrink flags, caller variables (key order), the resolved commit
    /// variable if any, then the marker and build-time variables. A caller
    /// variable sharing a name with any of the injected variables is
    /// superseded by it.
    pub fn compile(
        variables: &BTreeMap<String, String>,
        commit: Option<(&str, &str)>,
        shrink: bool,
        build_time: i64,
    ) -> Self {
        let mut flags = Vec::with_capacity(variables.len() + 5);
        if shrink {
            flags.push(LinkerFlag::Strip);
            flags.push(LinkerFlag::OmitDwarf);
        }

        let commit_name = commit.map(|(name, _)| name);
        let injected = |name: &str| {
            Some(name) == commit_name || name == MARKER_VAR || name == BUILD_TIME_VAR
        };
        for (name, value) in variables {
            if injected(name.as_str()) {
                continue;
            }
            flags.push(LinkerFlag::var(name, value));
        }
        if let Some((name, hash)) = commit {
            flags.push(LinkerFlag::var(name, hash));
        }

        flags.push(LinkerFlag::var(MARKER_VAR, "1"));
        flags.push(LinkerFlag::var(BUILD_TIME_VAR, &build_time.to_string()));

        Self { flags }
    }

    pub fn flags(&self) -> &[LinkerFlag] {
        &self.flags
    }

    /// One rendered string per flag.
    pub fn to_args(&self) -> Vec<String> {
        self.flags.iter().map(ToString::to_string).collect()
    }

    /// The `-ldflags` value handed to the compiler.
    pub fn to_ldflags(&self) -> String {
        self.to_args().join(" ")
    }
}
