use crate::config::{Command, Config};

pub fn check(cfg: &Config) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    // Check 1: vault directory usable
    match cfg.vault_dir() {
        Ok(dir) => {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                errors.push(format!("cannot create vault directory {}: {e}", dir.display()));
            } else if let Ok(meta) = std::fs::metadata(&dir) {
                if meta.permissions().readonly() {
                    errors.push(format!(
                        "vault directory {} is read-only\n  \
                         → pass a writable directory with --data-dir",
                        dir.display()
                    ));
                }
            }
        }
        Err(e) => errors.push(format!(
            "{e}\n  \
             → pass --data-dir explicitly"
        )),
    }

    // Check 2: pinentry binary found, only when a prompt can happen
    if matches!(cfg.command, Command::Register { .. } | Command::Assert { .. }) {
        if let Err(e) = std::process::Command::new(&cfg.pinentry).arg("--version").output() {
            errors.push(format!(
                "pinentry binary not found: '{}': {e}\n  \
                 → install pinentry or pass --pinentry <path>",
                cfg.pinentry
            ));
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    for err in &errors {
        eprintln!("ERROR: {err}");
    }
    anyhow::bail!("{} preflight check(s) failed", errors.len());
}
