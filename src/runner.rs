use declarative::{CommandOutput, CommandRunner, Error, ExecOptions, Result};
use std::process::{Command, Stdio};

/// Runs commands on the local system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &str, args: &[&str], env: &[(&str, &str)]) -> Result<CommandOutput> {
        let line = command_line(cmd, args, env);
        log::debug!("exec: {line}");

        let output = Command::new(cmd)
            .args(args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                command: line.clone(),
                source,
            })?;

        if !output.status.success() {
            log::debug!("exec failed ({:?}): {line}", output.status.code());
        }
        Ok(output.into())
    }
}

/// Run a shell snippet with `sh -c`, failing when it exits unsuccessfully
pub fn run_shell(runner: &dyn CommandRunner, script: &str) -> Result<String> {
    runner.exec_or_fail(
        "sh",
        &["-c", script],
        &format!("command '{script}' failed"),
        ExecOptions::default(),
    )
}

/// Render a command for logs: `K=V cmd arg...`
pub fn command_line(cmd: &str, args: &[&str], env: &[(&str, &str)]) -> String {
    let mut parts: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    parts.push(cmd.to_string());
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}
