//! Post-tool hook installation.
//!
//! `activate` (re)writes an executable hook that appends the output of
//! failed Bash tool invocations to `knowledge/failures.md`.

use crate::config::Config;
use crate::error::Result;
use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::info;

/// File name of the error-capture hook inside the scripts directory.
pub const ERROR_CAPTURE_HOOK: &str = "hooks_PostToolUse_ErrorCapture.sh";

const ERROR_CAPTURE_SCRIPT: &str = r#"#!/usr/bin/env bash
# PostToolUse hook: record failed Bash commands in knowledge/failures.md.
# Rewritten by `ce activate`; local edits are overwritten.

tool_name="${CLAUDE_TOOL_NAME:-}"
exit_code="${CLAUDE_EXIT_CODE:-0}"

[ "$tool_name" = "Bash" ] || exit 0
[ "$exit_code" = "0" ] && exit 0

output="${CLAUDE_TOOL_OUTPUT:-}"
symptom="$(printf '%s\n' "$output" \
    | grep -m1 -iE 'error|exception|failed|traceback|fatal' | cut -c1-200)"
[ -n "$symptom" ] || exit 0

memory_dir="${PROJECT_MEMORY_DIR:-$(cd "$(dirname "$0")/.." && pwd)}"
failures="$memory_dir/knowledge/failures.md"
mkdir -p "$(dirname "$failures")"

{
    printf '\n## %s\n' "$symptom"
    printf -- '- **Captured:** %s\n' "$(date '+%Y-%m-%d %H:%M:%S')"
    printf -- '- **Command:** `%s`\n' "${CLAUDE_TOOL_INPUT:-Unknown}"
    printf -- '- **Exit code:** %s\n\n' "$exit_code"
    printf '```\n%s\n```\n' "$(printf '%s\n' "$output" | head -n 20)"
} >> "$failures"

echo "[CE] Error auto-captured to knowledge/failures.md"
"#;

/// Write the error-capture hook with mode 0755. Returns its path.
pub fn install(config: &Config) -> Result<PathBuf> {
    let dir = config.scripts_dir();
    fs::create_dir_all(&dir)?;

    let path = dir.join(ERROR_CAPTURE_HOOK);
    fs::write(&path, ERROR_CAPTURE_SCRIPT)?;
    fs::set_permissions(&path, Permissions::from_mode(0o755))?;

    info!("Installed hook {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::tempdir;

    #[test]
    fn test_install_writes_executable_hook() {
        let temp = tempdir().unwrap();
        let config = Config::for_root(temp.path());

        let path = install(&config).unwrap();

        assert_eq!(path, config.scripts_dir().join(ERROR_CAPTURE_HOOK));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(fs::read_to_string(&path).unwrap().starts_with("#!/usr/bin/env bash"));

        // Reinstalling overwrites in place.
        assert_eq!(install(&config).unwrap(), path);
    }

    #[test]
    fn test_hook_records_failed_bash_output() {
        let temp = tempdir().unwrap();
        let config = Config::for_root(temp.path());
        let path = install(&config).unwrap();

        let status = Command::new("bash")
            .arg(&path)
            .env("PROJECT_MEMORY_DIR", temp.path())
            .env("CLAUDE_TOOL_NAME", "Bash")
            .env("CLAUDE_EXIT_CODE", "1")
            .env("CLAUDE_TOOL_INPUT", "cargo frob")
            .env("CLAUDE_TOOL_OUTPUT", "compiling\nerror: no such command: `frob`\n")
            .status()
            .unwrap();
        assert!(status.success());

        let failures = fs::read_to_string(config.knowledge_dir().join("failures.md")).unwrap();
        assert!(failures.contains("## error: no such command: `frob`"));
        assert!(failures.contains("cargo frob"));
    }

    #[test]
    fn test_hook_ignores_successful_commands() {
        let temp = tempdir().unwrap();
        let config = Config::for_root(temp.path());
        let path = install(&config).unwrap();

        let status = Command::new("bash")
            .arg(&path)
            .env("PROJECT_MEMORY_DIR", temp.path())
            .env("CLAUDE_TOOL_NAME", "Bash")
            .env("CLAUDE_EXIT_CODE", "0")
            .env("CLAUDE_TOOL_OUTPUT", "error: but exit was zero")
            .status()
            .unwrap();
        assert!(status.success());
        assert!(!config.knowledge_dir().join("failures.md").exists());
    }
}
