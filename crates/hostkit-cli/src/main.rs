//! hostkit CLI
//!
//! Runs commands, file transfers and host queries on the local machine or on
//! a configured SSH host.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::WrapErr;
use hostkit_caps::{HostExt, Signal};
use hostkit_exec::{Command, ControlsOverride, ExecutionResult, Host};
use hostkit_transfer::{TransferExt, TransferOptions};
use serde::Serialize;

mod config;
mod logging;
mod target;

use config::Config;
use target::Target;

#[derive(Parser)]
#[command(name = "hostkit")]
#[command(about = "Run commands and query hosts, locally or over SSH", long_about = None)]
struct Cli {
    /// Config file (default: $HOSTKIT_CONFIG, ./hostkit.toml, /etc/hostkit/hostkit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Configured host name or address; `local` or nothing for this machine
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// SSH user, overriding the config
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and exit with its status
    Exec {
        /// Stream output to this terminal
        #[arg(short, long)]
        interactive: bool,
        /// Request a pseudo-terminal (remote hosts)
        #[arg(long)]
        pty: bool,
        /// Run through `sh -c`
        #[arg(long)]
        shell: bool,
        /// Deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Copy a file from another host to the selected one
    Get {
        rmthost: String,
        rmtpath: String,
        localpath: String,
        #[command(flatten)]
        copy: CopyArgs,
    },
    /// Copy a file from the selected host to another one
    Put {
        localpath: String,
        rmthost: String,
        rmtpath: String,
        #[command(flatten)]
        copy: CopyArgs,
    },
    /// Describe a path
    Stat { path: String },
    /// List users, or show one by uid or login
    Users { id: Option<String> },
    /// List groups, or show one by gid or name
    Groups { id: Option<String> },
    /// Signal a process
    Kill {
        pid: u32,
        /// Signal number or name
        #[arg(short, long, default_value = "15")]
        signal: String,
    },
    /// Show system facts
    Facts,
}

#[derive(clap::Args)]
struct CopyArgs {
    /// scp, rsync or tar
    #[arg(short, long, default_value = "scp")]
    method: String,
    /// User on the other host
    #[arg(long)]
    rmtuser: Option<String>,
    /// Copy directories recursively (scp)
    #[arg(short, long)]
    recursive: bool,
    /// Extra ssh option for scp, e.g. `-o Port=2222`; repeatable
    #[arg(short = 'o', long = "ssh-option")]
    ssh_options: Vec<String>,
    #[arg(short, long)]
    interactive: bool,
}

impl CopyArgs {
    fn options(self) -> TransferOptions {
        let mut opts = TransferOptions::new()
            .method(self.method)
            .interactive(self.interactive);
        if let Some(user) = self.rmtuser {
            opts = opts.rmtuser(user);
        }
        if self.recursive {
            opts = opts.opt("r", true);
        }
        if !self.ssh_options.is_empty() {
            opts = opts.opt("o", self.ssh_options);
        }
        opts
    }
}

#[derive(Serialize)]
struct PathReport {
    path: String,
    exists: bool,
    file_type: Option<String>,
    size_kb: Option<u64>,
    permissions: Option<String>,
    owner: Option<String>,
    group: Option<String>,
}

#[derive(Serialize)]
struct Facts {
    kind: String,
    os_type: String,
    arch: String,
    hostname: String,
    username: String,
    is_root: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    logging::init(&config.log, cli.verbose);

    let target = Target::open(&config, cli.host.as_deref(), cli.user.as_deref()).await?;
    let outcome = run(target.host(), cli.command, cli.json).await;
    target.close().await;

    let status = outcome?;
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}

/// Run one subcommand; returns the process exit status
async fn run(host: &dyn Host, command: Commands, json: bool) -> Result<i32> {
    match command {
        Commands::Exec {
            interactive,
            pty,
            shell,
            timeout,
            command,
        } => {
            let (program, args) = command
                .split_first()
                .ok_or_else(|| eyre::eyre!("no command given"))?;
            let _guard = host.set_controls(
                &ControlsOverride::new()
                    .shell(shell)
                    .timeout(timeout.map(std::time::Duration::from_secs)),
            );
            let result = host
                .execute(
                    Command::new(program.as_str())
                        .args(args)
                        .interactive(interactive)
                        .pty(pty),
                )
                .await?;
            print_result(&result, json)?;
            Ok(exit_status(&result))
        }
        Commands::Get {
            rmthost,
            rmtpath,
            localpath,
            copy,
        } => {
            let result = host
                .transfer()
                .get(&rmthost, &rmtpath, &localpath, copy.options())
                .await?;
            print_result(&result, json)?;
            Ok(exit_status(&result))
        }
        Commands::Put {
            localpath,
            rmthost,
            rmtpath,
            copy,
        } => {
            let result = host
                .transfer()
                .put(&localpath, &rmthost, &rmtpath, copy.options())
                .await?;
            print_result(&result, json)?;
            Ok(exit_status(&result))
        }
        Commands::Stat { path } => {
            let report = stat(host, &path).await?;
            if json {
                print_json(&report)?;
            } else if report.exists {
                println!(
                    "{}: {} {} {}:{} {} KiB",
                    report.path,
                    report.file_type.as_deref().unwrap_or("-"),
                    report.permissions.as_deref().unwrap_or("-"),
                    report.owner.as_deref().unwrap_or("-"),
                    report.group.as_deref().unwrap_or("-"),
                    report.size_kb.map_or_else(|| "-".to_string(), |s| s.to_string()),
                );
            } else {
                println!("{}: does not exist", report.path);
            }
            Ok(if report.exists { 0 } else { 1 })
        }
        Commands::Users { id } => {
            let users = host.users();
            match id {
                Some(id) => {
                    let user = users.get(id).await?;
                    if json {
                        print_json(&user)?;
                    } else {
                        println!(
                            "{}:{}:{}:{}:{}",
                            user.login, user.uid, user.gid, user.home, user.shell
                        );
                    }
                }
                None if json => print_json(&users.details().await?)?,
                None => users.list().await?.iter().for_each(|name| println!("{name}")),
            }
            Ok(0)
        }
        Commands::Groups { id } => {
            let groups = host.groups();
            match id {
                Some(id) => {
                    let group = groups.get(id).await?;
                    if json {
                        print_json(&group)?;
                    } else {
                        println!("{}:{}:{}", group.name, group.gid, group.members.join(","));
                    }
                }
                None if json => print_json(&groups.details().await?)?,
                None => groups.list().await?.iter().for_each(|name| println!("{name}")),
            }
            Ok(0)
        }
        Commands::Kill { pid, signal } => {
            let result = host
                .processes()
                .kill(pid, Signal::from(signal.as_str()))
                .await?;
            print_result(&result, json)?;
            Ok(exit_status(&result))
        }
        Commands::Facts => {
            let system = host.system();
            let facts = Facts {
                kind: host.kind().to_string(),
                os_type: system.os_type().await?,
                arch: system.arch().await?,
                hostname: system.hostname().await?,
                username: system.username().await?,
                is_root: system.is_root().await?,
            };
            if json {
                print_json(&facts)?;
            } else {
                println!("kind:     {}", facts.kind);
                println!("os:       {}", facts.os_type);
                println!("arch:     {}", facts.arch);
                println!("hostname: {}", facts.hostname);
                println!("user:     {}{}", facts.username, if facts.is_root { " (root)" } else { "" });
            }
            Ok(0)
        }
    }
}

async fn stat(host: &dyn Host, path: &str) -> Result<PathReport> {
    let paths = host.path();
    let exists = paths
        .exists(path)
        .await
        .wrap_err_with(|| format!("checking {path}"))?;
    if !exists {
        return Ok(PathReport {
            path: path.to_string(),
            exists,
            file_type: None,
            size_kb: None,
            permissions: None,
            owner: None,
            group: None,
        });
    }
    Ok(PathReport {
        path: path.to_string(),
        exists,
        file_type: paths.file_type(path).await.ok(),
        size_kb: paths.size(path).await.ok(),
        permissions: Some(paths.permissions(path).await?),
        owner: Some(paths.owner(path).await?),
        group: Some(paths.group(path).await?),
    })
}

fn exit_status(result: &ExecutionResult) -> i32 {
    match result.status {
        0 => 0,
        status if status > 0 => status,
        _ => 1,
    }
}

fn print_result(result: &ExecutionResult, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
