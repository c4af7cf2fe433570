use clap::{CommandFactory, Parser};
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL_CONDENSED};
use craftctl::backup::BackupRecord;
use craftctl::cli::{Cli, Command};
use craftctl::manager::{Manager, Outcome, ServerStatus};
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config =
        craftctl::config::load_config(&cli.config).map_err(|e| color_eyre::eyre::eyre!("{e}"))?;
    let manager = Manager::new(config);

    match command {
        Command::List => {
            let statuses = manager.list_servers().await;
            if cli.json {
                println!("{}", serde_json::to_string(&statuses)?);
            } else {
                print_status_table(&statuses);
            }
        }
        Command::Status { id } => {
            let status = manager.status(&id).await;
            if cli.json {
                println!("{}", serde_json::to_string(&status)?);
            } else {
                match status {
                    Some(status) => print_status_detail(&status),
                    None => print_not_found(&id),
                }
            }
        }
        Command::Start { id } => {
            print_outcome(&manager.start(&id).await, cli.json)?;
        }
        Command::Stop { id, wait } => {
            let outcome = manager.stop(&id, wait).await;
            print_outcome(&outcome, cli.json)?;
            if outcome.success && !wait {
                // Detached cleanup tasks die with this process; linger
                // until the marker removal has run.
                tokio::time::sleep(
                    craftctl::process::MARKER_CLEANUP_DELAY + std::time::Duration::from_secs(1),
                )
                .await;
            }
        }
        Command::Log { id, lines } => {
            let output = manager.console(&id, lines);
            if cli.json {
                println!("{}", serde_json::to_string(&output)?);
            } else {
                match output {
                    Some(lines) => {
                        for line in lines {
                            println!("{line}");
                        }
                    }
                    None => print_not_found(&id),
                }
            }
        }
        Command::Backup { id } => {
            print_outcome(&manager.create_backup(&id), cli.json)?;
        }
        Command::Backups { id } => {
            let records = manager.backups(id.as_deref());
            if cli.json {
                println!("{}", serde_json::to_string(&records)?);
            } else {
                print_backups_table(&records);
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &Outcome, json: bool) -> color_eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
    } else if outcome.success {
        println!("{}", outcome.message.green());
    } else {
        eprintln!("{} {}", "error:".red().bold(), outcome.message);
    }
    Ok(())
}

fn print_not_found(id: &str) {
    eprintln!(
        "{} server '{id}' not found in configuration",
        "error:".red().bold()
    );
}

fn print_status_table(statuses: &[ServerStatus]) {
    if statuses.is_empty() {
        println!("{}", "no servers configured".yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("id").add_attribute(Attribute::Bold),
        Cell::new("name").add_attribute(Attribute::Bold),
        Cell::new("status").add_attribute(Attribute::Bold),
        Cell::new("pid").add_attribute(Attribute::Bold),
        Cell::new("cpu").add_attribute(Attribute::Bold),
        Cell::new("mem").add_attribute(Attribute::Bold),
        Cell::new("port").add_attribute(Attribute::Bold),
    ]);
    for status in statuses {
        let (label, color) = if status.running {
            ("running", Color::Green)
        } else {
            ("stopped", Color::Reset)
        };
        let pid = status
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&status.id).fg(Color::Cyan),
            Cell::new(&status.name),
            Cell::new(label).fg(color),
            Cell::new(&pid),
            Cell::new(format_cpu(status.cpu_percent)),
            Cell::new(format_mem(status.memory_mb)),
            Cell::new(status.port.to_string()),
        ]);
    }
    println!("{table}");
}

fn print_status_detail(status: &ServerStatus) {
    let state = if status.running {
        "running".green().to_string()
    } else {
        "stopped".to_string()
    };
    println!("{}: {}", status.id.cyan().bold(), state);
    println!("  {} {}", "name:".dimmed(), status.name);
    println!("  {} {}", "dir:".dimmed(), status.dir);
    println!("  {} {}", "port:".dimmed(), status.port);
    if let Some(pid) = status.pid {
        println!("  {} {pid}", "pid:".dimmed());
    }
    if status.running {
        println!("  {} {}", "cpu:".dimmed(), format_cpu(status.cpu_percent));
        println!("  {} {}", "memory:".dimmed(), format_mem(status.memory_mb));
    }
}

fn print_backups_table(records: &[BackupRecord]) {
    if records.is_empty() {
        println!("{}", "no backups found".yellow());
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("name").add_attribute(Attribute::Bold),
        Cell::new("created").add_attribute(Attribute::Bold),
        Cell::new("size").add_attribute(Attribute::Bold),
    ]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.name).fg(Color::Cyan),
            Cell::new(record.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(format_size(record.size_bytes)),
        ]);
    }
    println!("{table}");
}

fn format_cpu(cpu: Option<f64>) -> String {
    match cpu {
        Some(v) => format!("{v:.1}%"),
        None => "-".to_string(),
    }
}

fn format_mem(mb: Option<f64>) -> String {
    match mb {
        Some(v) if v >= 1024.0 => format!("{:.1}G", v / 1024.0),
        Some(v) => format!("{v:.1}M"),
        None => "-".to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b}B"),
        b if b < 1024 * 1024 => format!("{:.1}K", b as f64 / 1024.0),
        b if b < 1024 * 1024 * 1024 => format!("{:.1}M", b as f64 / (1024.0 * 1024.0)),
        b => format!("{:.1}G", b as f64 / (1024.0 * 1024.0 * 1024.0)),
    }
}
