//! In-memory `CommandRunner` that replays scripted outputs and records every
//! invocation, so the CLI contracts can be checked without the binaries.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::{CommandOutput, CommandRunner, CommandSpec, Result, SystemError};

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    SpawnFailure,
    Timeout,
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    args: Vec<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, command: &CommandSpec) -> bool {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        command.program == self.program && command.has_args(&args)
    }
}

/// Rules are checked in insertion order; the first match wins. Commands with
/// no matching rule succeed with empty output.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, program: &str, args: &[&str], output: CommandOutput) -> Self {
        self.rule(program, args, Reply::Output(output))
    }

    pub fn on_spawn_failure(self, program: &str, args: &[&str]) -> Self {
        self.rule(program, args, Reply::SpawnFailure)
    }

    pub fn on_timeout(self, program: &str, args: &[&str]) -> Self {
        self.rule(program, args, Reply::Timeout)
    }

    fn rule(mut self, program: &str, args: &[&str], reply: Reply) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        let reply = self
            .rules
            .iter()
            .find(|rule| rule.matches(command))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| Reply::Output(CommandOutput::ok("")));

        match reply {
            Reply::Output(output) => Ok(output),
            Reply::SpawnFailure => Err(SystemError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn failure"),
            }),
            Reply::Timeout => Err(SystemError::Timeout {
                command: command.to_string(),
                after: Duration::from_secs(0),
            }),
        }
    }
}
