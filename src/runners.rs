use anyhow::{Context, Result};
use log::{debug, error, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;

pub struct LocalJobStarter;

impl LocalJobStarter {
    /// Runs a configured tool. `tool` may itself carry leading words
    /// (`conda run -n vina vina`); `args` are appended verbatim without any
    /// shell interpretation, so SMILES strings and paths need no quoting.
    pub async fn run_tool<I, S>(tool: &str, args: I, working_dir: &Path) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let words = shell_words::split(tool).context("Failed to parse tool command")?;
        let (program, prefix) = words
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Tool command is empty"))?;
        let mut all: Vec<OsString> = prefix.iter().map(OsString::from).collect();
        all.extend(args.into_iter().map(Into::into));

        let rendered = std::iter::once(program.to_string())
            .chain(all.iter().map(|a| a.to_string_lossy().to_string()))
            .collect::<Vec<_>>();
        let cmd_str = shell_words::join(&rendered);
        info!("Running tool: {}", cmd_str);

        let output = Command::new(program)
            .args(&all)
            .current_dir(working_dir)
            .kill_on_drop(true)
            .output()
            .await
            .context(format!("Failed to execute {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Tool failed: {}\nStderr: {}", cmd_str, stderr);
            return Err(anyhow::anyhow!(
                "Command failed with status: {}. Stderr: {}",
                output.status,
                stderr.trim()
            ));
        }
        debug!("Tool finished: {}", cmd_str);

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quoted_words_in_tool_command_are_split() {
        let out = LocalJobStarter::run_tool("echo 'hello world'", ["again"], Path::new("."))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello world again");
    }

    #[tokio::test]
    async fn tool_prefix_words_are_kept() {
        let out = LocalJobStarter::run_tool("echo -n", ["C(=O)O", "x y"], Path::new("."))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "C(=O)O x y");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = LocalJobStarter::run_tool("false", Vec::<String>::new(), Path::new("."))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Command failed"));
    }

    #[tokio::test]
    async fn empty_tool_is_rejected() {
        let result = LocalJobStarter::run_tool("   ", ["x"], Path::new(".")).await;
        assert!(result.is_err());
    }
}
