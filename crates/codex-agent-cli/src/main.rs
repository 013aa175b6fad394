//! `codex-agent` — the thin command-line surface over the control-plane
//! crates (§1: "an external collaborator... specified only as the
//! contract"). Every subcommand operates directly against the local
//! rollout tree and JSON repositories; `daemon`/`__serve` are the only
//! commands that touch the HTTP/WS boundary, since that's the only part
//! of the system meant to run as a separate long-lived process.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;

use cli::{
    BookmarkCommands, Cli, Commands, DaemonCommands, ExecArgs, ForkArgs, GroupCommands,
    QueueCommands, ResumeArgs, SessionsCommands, TokenCommands,
};
use codex_agent_core::{Bookmark, ListSessionsOptions, Permission, PromptMode};
use codex_agent_repo::{BookmarkRepository, GroupRepository, QueueRepository, TokenRepository};
use codex_agent_supervisor::{ForkOptions, SpawnOptions, Supervisor};
use config::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if cli.token.is_some() {
        config.token = cli.token.clone();
    }

    let result = run(cli, config).await;
    if let Err(err) = result {
        eprintln!("{}: {}", "Error".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Daemon { command } => cmd_daemon(command, &config).await,
        Commands::Sessions { command } => cmd_sessions(command, &config, cli.json).await,
        Commands::Exec(args) => cmd_exec(args, &config, cli.json).await,
        Commands::Resume(args) => cmd_resume(args, &config, cli.json).await,
        Commands::Fork(args) => cmd_fork(args, &config, cli.json).await,
        Commands::Group { command } => cmd_group(command, &config, cli.json).await,
        Commands::Queue { command } => cmd_queue(command, &config, cli.json).await,
        Commands::Bookmark { command } => cmd_bookmark(command, &config).await,
        Commands::Token { command } => cmd_token(command, &config).await,
        Commands::Serve => cmd_serve(&config).await,
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()));
}

// ---- daemon lifecycle ----

async fn cmd_daemon(command: DaemonCommands, config: &Config) -> anyhow::Result<()> {
    let config_dir = config.config_dir();
    std::fs::create_dir_all(&config_dir)?;

    match command {
        DaemonCommands::Start => {
            let exe = std::env::current_exe()?;
            let mut args = vec!["__serve".to_string()];
            args.push("--port".to_string());
            args.push(config.port.to_string());
            args.push("--host".to_string());
            args.push(config.host.clone());
            if let Some(token) = &config.token {
                args.push("--token".to_string());
                args.push(token.clone());
            }
            let record = codex_agent_daemon::start_daemon(
                &config_dir,
                &exe,
                &args,
                &config.host,
                config.port,
                config.daemon_mode(),
            )
            .await?;
            println!("daemon started (pid {}, port {})", record.pid, record.port);
            Ok(())
        }
        DaemonCommands::Stop => {
            codex_agent_daemon::stop_daemon(&config_dir)?;
            println!("daemon stopped");
            Ok(())
        }
        DaemonCommands::Status => {
            let (status, record) = codex_agent_daemon::daemon_status(&config_dir);
            match record {
                Some(record) => println!("{status:?} (pid {}, port {})", record.pid, record.port),
                None => println!("{status:?}"),
            }
            Ok(())
        }
    }
}

/// Hidden `__serve`: runs the HTTP/WS daemon in the foreground. `daemon
/// start` spawns this as a detached child and waits for its health check.
async fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let config_dir = config.config_dir();
    std::fs::create_dir_all(&config_dir)?;
    std::fs::create_dir_all(&config.home)?;

    let state = codex_agent_daemon::AppState::new(codex_agent_daemon::DaemonConfig {
        config_dir,
        home: config.home.clone(),
        host: config.host.clone(),
        port: config.port,
        static_token: config.token.clone(),
        binary: config.binary.clone(),
        mode: config.daemon_mode(),
    });

    codex_agent_daemon::serve(state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

// ---- sessions ----

async fn cmd_sessions(command: SessionsCommands, config: &Config, json: bool) -> anyhow::Result<()> {
    match command {
        SessionsCommands::List { cwd, limit } => {
            let opts = ListSessionsOptions {
                cwd,
                limit,
                ..Default::default()
            };
            let page = codex_agent_index::list_sessions(&config.home, &opts).await;
            if json {
                print_json(&page);
            } else {
                for session in &page.sessions {
                    println!("{}  {}  {}", session.id, session.cwd, session.title);
                }
                println!("({} of {})", page.sessions.len(), page.total);
            }
            Ok(())
        }
        SessionsCommands::Show { id } => {
            let record = codex_agent_index::find_session(&config.home, &id)
                .await
                .ok_or_else(|| anyhow::anyhow!("no such session: {id}"))?;
            print_json(&record);
            Ok(())
        }
        SessionsCommands::Tail { id, follow } => tail_session(&id, config, follow).await,
    }
}

async fn tail_session(id: &str, config: &Config, follow: bool) -> anyhow::Result<()> {
    let record = codex_agent_index::find_session(&config.home, id)
        .await
        .ok_or_else(|| anyhow::anyhow!("no such session: {id}"))?;

    let lines = codex_agent_rollout::read_all(&record.rollout_path).await?;
    for line in &lines {
        print_json(line);
    }

    if !follow {
        return Ok(());
    }

    let (watcher, mut events) = codex_agent_rollout::RolloutWatcher::spawn()?;
    watcher.watch_file(&record.rollout_path)?;
    while let Some(event) = events.recv().await {
        match event {
            codex_agent_rollout::RolloutEvent::Appended { lines, .. } => {
                for line in &lines {
                    print_json(line);
                }
            }
            codex_agent_rollout::RolloutEvent::ReadError { message, .. } => {
                eprintln!("{}: {message}", "watch error".yellow());
            }
            codex_agent_rollout::RolloutEvent::NewSessionFile { .. } => {}
        }
    }
    watcher.stop();
    Ok(())
}

// ---- exec / resume / fork ----

fn spawn_options(cwd: Option<String>, model: Option<String>, full_auto: bool) -> SpawnOptions {
    SpawnOptions {
        cwd: cwd.map(std::path::PathBuf::from),
        model,
        full_auto,
        ..Default::default()
    }
}

async fn cmd_exec(args: ExecArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(config.binary.clone());
    let mut opts = spawn_options(args.cwd, args.model, args.full_auto);
    opts.sandbox = args.sandbox;
    opts.ask_for_approval = args.ask_for_approval;
    opts.images = args.images.into_iter().map(std::path::PathBuf::from).collect();

    let result = supervisor.spawn_exec(&args.prompt, &opts).await?;
    if json {
        for line in &result.lines {
            print_json(line);
        }
    } else {
        for line in &result.lines {
            println!("{line:?}");
        }
    }
    std::process::exit(result.exit_code);
}

async fn drain_stream(mut stream: codex_agent_supervisor::ExecStream, json: bool) -> anyhow::Result<i32> {
    while let Some(line) = stream.lines.recv().await {
        if json {
            print_json(&line);
        } else {
            println!("{line:?}");
        }
    }
    Ok(stream.completion.await.unwrap_or(1))
}

async fn cmd_resume(args: ResumeArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(config.binary.clone());
    let opts = spawn_options(None, args.model, args.full_auto);
    let stream = supervisor
        .spawn_resume(&args.session_id, &opts, args.prompt.as_deref())
        .await?;
    let exit_code = drain_stream(stream, json).await?;
    std::process::exit(exit_code);
}

async fn cmd_fork(args: ForkArgs, config: &Config, json: bool) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(config.binary.clone());
    let opts = ForkOptions {
        spawn: spawn_options(None, args.model, false),
        nth_message: args.at.map(|n| n as u32),
    };
    let stream = supervisor.spawn_fork(&args.session_id, &opts).await?;
    let exit_code = drain_stream(stream, json).await?;
    std::process::exit(exit_code);
}

// ---- groups ----

async fn cmd_group(command: GroupCommands, config: &Config, json: bool) -> anyhow::Result<()> {
    let repo = GroupRepository::new(config.config_dir().join("groups.json"));
    match command {
        GroupCommands::List => {
            print_json(&repo.list().await);
            Ok(())
        }
        GroupCommands::Create { name, description } => {
            print_json(&repo.create(name, description).await?);
            Ok(())
        }
        GroupCommands::AddSession { group_id, session_id } => {
            let group = repo
                .add_session(&group_id, session_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such group: {group_id}"))?;
            print_json(&group);
            Ok(())
        }
        GroupCommands::RemoveSession { group_id, session_id } => {
            let group = repo
                .remove_session(&group_id, &session_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such group: {group_id}"))?;
            print_json(&group);
            Ok(())
        }
        GroupCommands::Pause { group_id } => {
            let group = repo
                .set_paused(&group_id, true)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such group: {group_id}"))?;
            print_json(&group);
            Ok(())
        }
        GroupCommands::Resume { group_id } => {
            let group = repo
                .set_paused(&group_id, false)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such group: {group_id}"))?;
            print_json(&group);
            Ok(())
        }
        GroupCommands::Delete { group_id } => {
            if !repo.delete(&group_id).await? {
                anyhow::bail!("no such group: {group_id}");
            }
            Ok(())
        }
        GroupCommands::Run { group_id, prompt } => {
            let group = repo
                .get(&group_id)
                .await
                .ok_or_else(|| anyhow::anyhow!("no such group: {group_id}"))?;
            let supervisor = Arc::new(Supervisor::new(config.binary.clone()));
            let stream = codex_agent_dispatch::group_runner::run_group(
                supervisor,
                group,
                prompt,
                SpawnOptions::default(),
                codex_agent_dispatch::group_runner::DEFAULT_MAX_CONCURRENT,
            )?;
            futures::pin_mut!(stream);
            while let Some(event) = futures::StreamExt::next(&mut stream).await {
                if json {
                    print_json(&event);
                } else {
                    println!("{event:?}");
                }
            }
            Ok(())
        }
    }
}

// ---- queues ----

async fn cmd_queue(command: QueueCommands, config: &Config, json: bool) -> anyhow::Result<()> {
    let repo = Arc::new(QueueRepository::new(config.config_dir().join("queues.json")));
    let parse_mode = |s: &str| -> anyhow::Result<PromptMode> {
        match s {
            "auto" => Ok(PromptMode::Auto),
            "manual" => Ok(PromptMode::Manual),
            other => anyhow::bail!("unknown prompt mode: {other}"),
        }
    };

    match command {
        QueueCommands::List => {
            print_json(&repo.list().await);
            Ok(())
        }
        QueueCommands::Create { name, project_path } => {
            print_json(&repo.create(name, project_path).await?);
            Ok(())
        }
        QueueCommands::AddPrompt { queue_id, prompt, mode } => {
            let prompt = repo
                .add_prompt(&queue_id, prompt, Vec::new(), parse_mode(&mode)?)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such queue: {queue_id}"))?;
            print_json(&prompt);
            Ok(())
        }
        QueueCommands::Move { queue_id, command_id, new_index } => {
            let queue = repo
                .move_prompt(&queue_id, &command_id, new_index)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such queue or prompt"))?;
            print_json(&queue);
            Ok(())
        }
        QueueCommands::Mode { queue_id, command_id, mode } => {
            let prompt = repo
                .set_prompt_mode(&queue_id, &command_id, parse_mode(&mode)?)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such queue or prompt"))?;
            print_json(&prompt);
            Ok(())
        }
        QueueCommands::Pause { queue_id } => {
            let queue = repo
                .set_paused(&queue_id, true)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such queue: {queue_id}"))?;
            print_json(&queue);
            Ok(())
        }
        QueueCommands::Resume { queue_id } => {
            let queue = repo
                .set_paused(&queue_id, false)
                .await?
                .ok_or_else(|| anyhow::anyhow!("no such queue: {queue_id}"))?;
            print_json(&queue);
            Ok(())
        }
        QueueCommands::Stop { queue_id } => {
            // A bare CLI invocation never has an in-flight `Run` in its own
            // process to stop; the running fan-out (if any) lives in the
            // daemon, which owns the stop signal for it.
            let _ = &queue_id;
            anyhow::bail!("stop only applies to a queue run in progress via the daemon")
        }
        QueueCommands::Delete { queue_id } => {
            if !repo.delete(&queue_id).await? {
                anyhow::bail!("no such queue: {queue_id}");
            }
            Ok(())
        }
        QueueCommands::Run { queue_id } => {
            let queue = repo
                .get(&queue_id)
                .await
                .ok_or_else(|| anyhow::anyhow!("no such queue: {queue_id}"))?;
            let supervisor = Arc::new(Supervisor::new(config.binary.clone()));
            let stream = codex_agent_dispatch::queue_runner::run_queue(
                supervisor,
                Arc::clone(&repo),
                queue,
                SpawnOptions::default(),
                None,
            );
            futures::pin_mut!(stream);
            while let Some(event) = futures::StreamExt::next(&mut stream).await {
                if json {
                    print_json(&event);
                } else {
                    println!("{event:?}");
                }
            }
            Ok(())
        }
    }
}

// ---- bookmarks ----

async fn cmd_bookmark(command: BookmarkCommands, config: &Config) -> anyhow::Result<()> {
    let repo = BookmarkRepository::new(config.config_dir().join("bookmarks.json"));
    match command {
        BookmarkCommands::List => {
            print_json(&repo.list().await);
            Ok(())
        }
        BookmarkCommands::Create { kind, session_id, name, description, tags } => {
            if kind != "session" {
                anyhow::bail!("only `--type session` bookmarks are supported from the command line");
            }
            let bookmark = Bookmark::new_session(session_id, name, description, tags);
            print_json(&repo.create(bookmark).await?);
            Ok(())
        }
        BookmarkCommands::Delete { id } => {
            if !repo.delete(&id).await? {
                anyhow::bail!("no such bookmark: {id}");
            }
            Ok(())
        }
    }
}

// ---- tokens ----

async fn cmd_token(command: TokenCommands, config: &Config) -> anyhow::Result<()> {
    let repo = TokenRepository::new(config.config_dir().join("tokens.json"));
    match command {
        TokenCommands::List => {
            print_json(&repo.list().await);
            Ok(())
        }
        TokenCommands::Create { name, permissions } => {
            let permissions: Vec<Permission> = permissions.into_iter().map(Permission::new).collect();
            let minted = codex_agent_auth::mint(name, permissions, None);
            let record = repo.insert(minted.record).await?;
            println!("token: {}", minted.wire_token.bold());
            print_json(&record);
            Ok(())
        }
        TokenCommands::Revoke { id } => {
            let record = repo.revoke(&id).await?.ok_or_else(|| anyhow::anyhow!("no such token: {id}"))?;
            print_json(&record);
            Ok(())
        }
    }
}
