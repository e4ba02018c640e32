use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ustore",
    about = "ustore: user records and quotas, one directory per user",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Installation root, overrides the configuration file
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the users directory
    Init,
    /// Manage user records
    User(UserArgs),
    /// Manage group memberships
    Group(GroupArgs),
    /// Inspect and change quota ledgers
    Quota(QuotaArgs),
}

#[derive(Args)]
pub struct UserArgs {
    #[command(subcommand)]
    pub action: UserAction,
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user
    Add {
        name: String,
        #[arg(long)]
        password: String,
        #[arg(short = 'g', long = "group")]
        groups: Vec<String>,
    },
    /// Delete a user and all of its data
    Remove { name: String },
    /// List users
    List,
    /// Show a user's session data
    Show { name: String },
    /// Change a user's password
    Passwd {
        name: String,
        #[arg(long)]
        password: String,
    },
    /// Check a password
    Verify {
        name: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Args)]
pub struct GroupArgs {
    #[command(subcommand)]
    pub action: GroupAction,
}

#[derive(Subcommand)]
pub enum GroupAction {
    Add { name: String, group: String },
    Remove { name: String, group: String },
}

#[derive(Args)]
pub struct QuotaArgs {
    #[command(subcommand)]
    pub action: QuotaAction,
}

#[derive(Subcommand)]
pub enum QuotaAction {
    /// Show all counters of a user
    Show { name: String },
    /// Set the limit of a resource key
    Set { name: String, key: String, limit: u64 },
    /// Consume quota
    Use {
        name: String,
        key: String,
        #[arg(default_value = "1")]
        amount: u64,
    },
    /// Release quota
    Free {
        name: String,
        key: String,
        #[arg(default_value = "1")]
        amount: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["ustore", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
    }

    #[test]
    fn parse_user_add_with_groups() {
        let cli = Cli::try_parse_from([
            "ustore", "user", "add", "alice", "--password", "pw", "-g", "admin", "--group", "editor",
        ])
        .unwrap();
        if let Command::User(UserArgs { action: UserAction::Add { name, password, groups } }) = cli.command {
            assert_eq!(name, "alice");
            assert_eq!(password, "pw");
            assert_eq!(groups, vec!["admin", "editor"]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn user_add_requires_password() {
        assert!(Cli::try_parse_from(["ustore", "user", "add", "alice"]).is_err());
    }

    #[test]
    fn parse_quota_use_default_amount() {
        let cli = Cli::try_parse_from(["ustore", "quota", "use", "alice", "slides"]).unwrap();
        if let Command::Quota(QuotaArgs { action: QuotaAction::Use { amount, key, .. } }) = cli.command {
            assert_eq!(amount, 1);
            assert_eq!(key, "slides");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_quota_set() {
        let cli = Cli::try_parse_from(["ustore", "quota", "set", "alice", "slides", "10"]).unwrap();
        if let Command::Quota(QuotaArgs { action: QuotaAction::Set { limit, .. } }) = cli.command {
            assert_eq!(limit, 10);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn negative_amount_is_rejected() {
        assert!(Cli::try_parse_from(["ustore", "quota", "free", "alice", "slides", "-1"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "ustore", "--root", "/srv/app", "--format", "json", "-v", "user", "list",
        ])
        .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/app")));
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(cli.verbose);
    }
}
