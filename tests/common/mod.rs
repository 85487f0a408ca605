//! Integration Test Utilities and Common Code

#![allow(dead_code)]

pub use assert_cmd::prelude::*;
pub use assert_fs::prelude::*;
pub use assert_fs::{fixture::ChildPath, TempDir};
pub use predicates::str::{contains, is_empty, RegexPredicate};
pub use pretty_assertions::{assert_eq, assert_ne};
pub use std::path::Path;
pub use std::process::Command;

/// Build a `Command` for the `repometrics` crate binary with variadic command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! repometrics {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = repometrics_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Build an `assert_cmd::assert::Assert` by calling `repometrics!(args).assert().success()`.
#[macro_export]
macro_rules! repometrics_success {
    ( $( $arg:expr ),* ) => { repometrics!($( $arg ),*).assert().success() }
}

/// Build an `assert_cmd::assert::Assert` by calling `repometrics!(args).assert().failure()`.
#[macro_export]
macro_rules! repometrics_failure {
    ( $( $arg:expr ),* ) => { repometrics!($( $arg ),*).assert().failure() }
}

// make macros easily visible to other modules
pub use {repometrics, repometrics_failure, repometrics_success};

/// Build a `Command` for the `repometrics` crate binary.
///
/// Variables that would change the binary's behavior are removed from its environment.
pub fn repometrics_cmd() -> Command {
    let mut cmd = Command::cargo_bin("repometrics").expect("repometrics should be executable");
    cmd.env_remove("GITHUB_TOKEN")
        .env_remove("REPOMETRICS_DATASTORE")
        .env("NO_COLOR", "1");
    cmd
}

/// Create a `RegexPredicate` from the given pattern.
pub fn is_match(pat: &str) -> RegexPredicate {
    predicates::str::is_match(pat).expect("pattern should compile")
}

/// A type to represent a scratch directory holding a datastore and a configuration file.
pub struct MetricsEnv {
    pub root: TempDir,
    pub datastore: ChildPath,
}

impl MetricsEnv {
    pub fn new() -> Self {
        let root = TempDir::new().expect("should be able to create tempdir");
        let datastore = root.child("metrics.db");
        assert!(!datastore.exists());

        Self { root, datastore }
    }

    /// Write a configuration file with the given name and contents.
    pub fn config_file(&self, name: &str, contents: &str) -> ChildPath {
        let config = self.root.child(name);
        config
            .write_str(contents)
            .expect("should be able to write configuration file");
        config
    }

    pub fn datastore_path(&self) -> &Path {
        self.datastore.path()
    }
}
