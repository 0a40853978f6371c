//! Scripted [`CommandRunner`] for tests.
//!
//! Expectations are consumed strictly in the order they were registered. A
//! call that does not match the next expectation panics, which catches both
//! wrong arguments and wrong ordering.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::exec::{CommandOutput, CommandRunner};

/// A recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Program that was run.
    pub program: PathBuf,
    /// Arguments it was given.
    pub args: Vec<String>,
}

#[derive(Debug)]
enum Reply {
    Output(CommandOutput),
    LaunchFailure,
}

#[derive(Debug)]
struct Expectation {
    call: Call,
    reply: Reply,
}

/// Runner that replays scripted replies and records calls.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    expected: Mutex<VecDeque<Expectation>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    /// Create a runner with no expectations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `program args` next and reply with `output`.
    pub fn expect(&self, program: impl Into<PathBuf>, args: &[&str], output: CommandOutput) {
        self.push(program.into(), args, Reply::Output(output));
    }

    /// Expect `program args` next and fail to launch it.
    pub fn expect_launch_failure(&self, program: impl Into<PathBuf>, args: &[&str]) {
        self.push(program.into(), args, Reply::LaunchFailure);
    }

    fn push(&self, program: PathBuf, args: &[&str], reply: Reply) {
        let call = Call {
            program,
            args: args.iter().map(ToString::to_string).collect(),
        };
        self.expected.lock().push_back(Expectation { call, reply });
    }

    /// All calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Panic if any expectation was not consumed.
    ///
    /// # Panics
    ///
    /// When expected calls remain.
    pub fn assert_done(&self) {
        let remaining = self.expected.lock();
        assert!(
            remaining.is_empty(),
            "expected calls were not made: {:?}",
            remaining.iter().map(|e| &e.call).collect::<Vec<_>>()
        );
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let call = Call {
            program: program.to_path_buf(),
            args: args.to_vec(),
        };
        self.calls.lock().push(call.clone());

        let next = self.expected.lock().pop_front();
        let Some(expectation) = next else {
            panic!("unexpected call: {call:?}");
        };
        assert_eq!(call, expectation.call, "call out of order or with wrong arguments");

        match expectation.reply {
            Reply::Output(output) => Ok(output),
            Reply::LaunchFailure => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", program.display()),
            )),
        }
    }
}
