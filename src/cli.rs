use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "craftctl", about = "A Minecraft server supervisor", version)]
pub struct Cli {
    /// Path to the server configuration file
    #[arg(long, global = true, default_value = "craftctl.toml")]
    pub config: PathBuf,

    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all configured servers and their status
    #[command(visible_alias = "ls")]
    List,
    /// Show status of one server
    Status { id: String },
    /// Start a server
    Start { id: String },
    /// Stop a server
    Stop {
        id: String,
        /// Block until the process is confirmed gone
        #[arg(long)]
        wait: bool,
    },
    /// Show recent console output
    Log {
        id: String,
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
    /// Snapshot a server's working directory
    Backup { id: String },
    /// List backups, newest first
    Backups { id: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list() {
        let cli = Cli::try_parse_from(["craftctl", "list"]).unwrap();
        assert!(matches!(cli.command.unwrap(), Command::List));
    }

    #[test]
    fn test_list_ls_alias() {
        let cli = Cli::try_parse_from(["craftctl", "ls"]).unwrap();
        assert!(matches!(cli.command.unwrap(), Command::List));
    }

    #[test]
    fn test_status() {
        let cli = Cli::try_parse_from(["craftctl", "status", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Status { id } => assert_eq!(id, "survival"),
            _ => panic!("expected Status"),
        }
    }

    #[test]
    fn test_start() {
        let cli = Cli::try_parse_from(["craftctl", "start", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Start { id } => assert_eq!(id, "survival"),
            _ => panic!("expected Start"),
        }
    }

    #[test]
    fn test_stop_defaults() {
        let cli = Cli::try_parse_from(["craftctl", "stop", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Stop { id, wait } => {
                assert_eq!(id, "survival");
                assert!(!wait);
            }
            _ => panic!("expected Stop"),
        }
    }

    #[test]
    fn test_stop_with_wait() {
        let cli = Cli::try_parse_from(["craftctl", "stop", "survival", "--wait"]).unwrap();
        match cli.command.unwrap() {
            Command::Stop { wait, .. } => assert!(wait),
            _ => panic!("expected Stop"),
        }
    }

    #[test]
    fn test_log_defaults() {
        let cli = Cli::try_parse_from(["craftctl", "log", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Log { id, lines } => {
                assert_eq!(id, "survival");
                assert_eq!(lines, 50);
            }
            _ => panic!("expected Log"),
        }
    }

    #[test]
    fn test_log_with_lines() {
        let cli = Cli::try_parse_from(["craftctl", "log", "survival", "--lines", "200"]).unwrap();
        match cli.command.unwrap() {
            Command::Log { lines, .. } => assert_eq!(lines, 200),
            _ => panic!("expected Log"),
        }
    }

    #[test]
    fn test_backup() {
        let cli = Cli::try_parse_from(["craftctl", "backup", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Backup { id } => assert_eq!(id, "survival"),
            _ => panic!("expected Backup"),
        }
    }

    #[test]
    fn test_backups_with_and_without_filter() {
        let cli = Cli::try_parse_from(["craftctl", "backups"]).unwrap();
        match cli.command.unwrap() {
            Command::Backups { id } => assert!(id.is_none()),
            _ => panic!("expected Backups"),
        }

        let cli = Cli::try_parse_from(["craftctl", "backups", "survival"]).unwrap();
        match cli.command.unwrap() {
            Command::Backups { id } => assert_eq!(id.as_deref(), Some("survival")),
            _ => panic!("expected Backups"),
        }
    }

    #[test]
    fn test_config_override() {
        let cli =
            Cli::try_parse_from(["craftctl", "--config", "/etc/mc/fleet.toml", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/mc/fleet.toml"));
    }

    #[test]
    fn test_config_default() {
        let cli = Cli::try_parse_from(["craftctl", "list"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("craftctl.toml"));
    }

    #[test]
    fn test_json_flag_is_global() {
        let cli = Cli::try_parse_from(["craftctl", "list", "--json"]).unwrap();
        assert!(cli.json);
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["craftctl", "bogus"]).is_err());
    }

    #[test]
    fn test_start_missing_id() {
        assert!(Cli::try_parse_from(["craftctl", "start"]).is_err());
    }

    #[test]
    fn test_no_args_no_command() {
        let cli = Cli::try_parse_from(["craftctl"]).unwrap();
        assert!(cli.command.is_none());
    }
}
