use anyhow::{bail, Context};
use colored::Colorize;
use ustore_accounts::{QuotaLedger, StoreConfig, UserDirectory, WriteOutcome};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let directory = open_directory(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Init => cmd_init(&directory),
        Command::User(args) => cmd_user(&directory, format, args.action),
        Command::Group(args) => cmd_group(&directory, args.action),
        Command::Quota(args) => cmd_quota(&directory, format, args.action),
    }
}

fn open_directory(cli: &Cli) -> anyhow::Result<UserDirectory> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(UserDirectory::new(config))
}

fn cmd_init(directory: &UserDirectory) -> anyhow::Result<()> {
    directory.ensure_root()?;
    println!("{} Users directory ready at {}", "✓".green().bold(), directory.users_root().display().to_string().bold());
    Ok(())
}

fn cmd_user(directory: &UserDirectory, format: OutputFormat, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::Add { name, password, groups } => {
            if directory.user_exists(&name) {
                bail!("user {name} already exists");
            }
            let hash = ustore_crypto::hash_password(&password)?;
            let mut user = directory.new_user();
            user.set(&name, groups, hash)?;
            match user.write()? {
                WriteOutcome::CapacityExceeded => {
                    bail!("user limit of {} reached", directory.config().max_users)
                }
                _ => println!("{} Created user {}", "✓".green().bold(), name.yellow()),
            }
        }
        UserAction::Remove { name } => {
            directory.load_user(&name)?.remove()?;
            println!("{} Removed user {}", "✓".green().bold(), name.yellow());
        }
        UserAction::List => {
            let names = directory.list_user_names()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&names)?),
                OutputFormat::Text if names.is_empty() => println!("No users."),
                OutputFormat::Text => {
                    for name in names {
                        println!("{name}");
                    }
                }
            }
        }
        UserAction::Show { name } => {
            let session = directory.load_user(&name)?.session_data()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&session)?),
                OutputFormat::Text => {
                    println!("User: {}", session.user.yellow().bold());
                    println!("Groups: {}", session.groups.join(", "));
                }
            }
        }
        UserAction::Passwd { name, password } => {
            directory.update_user(&name, |user| user.set_password(&password))?;
            println!("{} Password changed for {}", "✓".green().bold(), name.yellow());
        }
        UserAction::Verify { name, password } => {
            if directory.load_user(&name)?.verify_password(&password)? {
                println!("{} Password matches", "✓".green().bold());
            } else {
                bail!("password does not match");
            }
        }
    }
    Ok(())
}

fn cmd_group(directory: &UserDirectory, action: GroupAction) -> anyhow::Result<()> {
    match action {
        GroupAction::Add { name, group } => {
            directory.update_user(&name, |user| user.add_group(&group))?;
            println!("Added {} to {}", name.yellow(), group.bold());
        }
        GroupAction::Remove { name, group } => {
            directory.update_user(&name, |user| user.remove_group(&group))?;
            println!("Removed {} from {}", name.yellow(), group.bold());
        }
    }
    Ok(())
}

fn cmd_quota(directory: &UserDirectory, format: OutputFormat, action: QuotaAction) -> anyhow::Result<()> {
    match action {
        QuotaAction::Show { name } => {
            let user = directory.load_user(&name)?;
            let ledger = QuotaLedger::open(&user, None)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(ledger.data())?),
                OutputFormat::Text => {
                    for (key, entry) in ledger.data() {
                        println!("{:<16} {:>6} / {}", key.bold(), entry.used, entry.limit);
                    }
                }
            }
        }
        QuotaAction::Set { name, key, limit } => {
            let user = directory.load_user(&name)?;
            QuotaLedger::update(&user, None, |ledger| ledger.set_limit(&key, limit))?;
            println!("Set {} limit for {} to {}", key.bold(), name.yellow(), limit);
        }
        QuotaAction::Use { name, key, amount } => {
            let user = directory.load_user(&name)?;
            let granted = QuotaLedger::update(&user, None, |ledger| ledger.use_quota(&key, amount))
                .with_context(|| format!("updating quota of {name}"))?;
            if !granted {
                bail!("quota exceeded: {name} cannot use {amount} more {key}");
            }
            println!("{} Used {} {}", "✓".green().bold(), amount, key);
        }
        QuotaAction::Free { name, key, amount } => {
            let user = directory.load_user(&name)?;
            let freed = QuotaLedger::update(&user, None, |ledger| ledger.free_quota(&key, amount))
                .with_context(|| format!("updating quota of {name}"))?;
            if !freed {
                bail!("cannot free {amount} {key} for {name}");
            }
            println!("{} Freed {} {}", "✓".green().bold(), amount, key);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    fn run(root: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["ustore", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    fn directory(root: &Path) -> UserDirectory {
        UserDirectory::new(StoreConfig {
            root: root.to_path_buf(),
            ..StoreConfig::default()
        })
    }

    #[test]
    fn user_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        run(tmp.path(), &["init"]).unwrap();
        run(tmp.path(), &["user", "add", "alice", "--password", "pw", "-g", "admin"]).unwrap();

        let dir = directory(tmp.path());
        assert!(dir.user_exists("alice"));
        assert!(run(tmp.path(), &["user", "add", "alice", "--password", "pw"]).is_err());

        run(tmp.path(), &["user", "verify", "alice", "--password", "pw"]).unwrap();
        assert!(run(tmp.path(), &["user", "verify", "alice", "--password", "nope"]).is_err());

        run(tmp.path(), &["group", "add", "alice", "editor"]).unwrap();
        run(tmp.path(), &["group", "remove", "alice", "admin"]).unwrap();
        assert_eq!(dir.load_user("alice").unwrap().groups().unwrap(), ["editor"]);

        run(tmp.path(), &["user", "remove", "alice"]).unwrap();
        assert!(!dir.user_exists("alice"));
    }

    #[test]
    fn user_limit_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("ustore.toml");
        std::fs::write(&config, "max_users = 1\n").unwrap();
        let config = config.to_str().unwrap();

        run(tmp.path(), &["--config", config, "init"]).unwrap();
        run(tmp.path(), &["--config", config, "user", "add", "alice", "--password", "pw"]).unwrap();
        let err = run(tmp.path(), &["--config", config, "user", "add", "bob", "--password", "pw"])
            .unwrap_err();
        assert!(err.to_string().contains("user limit"));
        assert!(!directory(tmp.path()).user_dir("bob").exists());
    }

    #[test]
    fn quota_commands() {
        let tmp = tempfile::tempdir().unwrap();
        run(tmp.path(), &["init"]).unwrap();
        run(tmp.path(), &["user", "add", "alice", "--password", "pw"]).unwrap();

        run(tmp.path(), &["quota", "set", "alice", "slides", "2"]).unwrap();
        run(tmp.path(), &["quota", "use", "alice", "slides", "2"]).unwrap();
        assert!(run(tmp.path(), &["quota", "use", "alice", "slides"]).is_err());
        run(tmp.path(), &["quota", "free", "alice", "slides"]).unwrap();
        run(tmp.path(), &["--format", "json", "quota", "show", "alice"]).unwrap();

        let dir = directory(tmp.path());
        let ledger = QuotaLedger::open(&dir.load_user("alice").unwrap(), None).unwrap();
        let slides = ledger.entry("slides").unwrap();
        assert_eq!((slides.limit, slides.used), (2, 1));
    }

    #[test]
    fn commands_on_missing_user_fail() {
        let tmp = tempfile::tempdir().unwrap();
        run(tmp.path(), &["init"]).unwrap();
        assert!(run(tmp.path(), &["user", "show", "ghost"]).is_err());
        assert!(run(tmp.path(), &["group", "add", "ghost", "admin"]).is_err());
        assert!(run(tmp.path(), &["quota", "use", "ghost", "slides"]).is_err());
    }

    #[test]
    fn list_without_init_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(run(tmp.path(), &["user", "list"]).is_err());
        run(tmp.path(), &["init"]).unwrap();
        run(tmp.path(), &["--format", "json", "user", "list"]).unwrap();
    }
}
