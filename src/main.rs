use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use lividpenguin::logging::{self, LogTarget};
use lividpenguin::{
    Cli, LifecycleError, Lifecycle, LogLevel, PidFile, Server, ServerConfig, ServerLifecycle,
    TracingSink,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.load().context("invalid configuration")?;

    if cfg.foreground || cli.detached {
        let target = if cli.detached {
            LogTarget::File(cfg.log_file())
        } else {
            LogTarget::Stdout
        };
        logging::init(cfg.log_level, target)?;
        return run_attached(cfg);
    }

    logging::init(LogLevel::Debug, LogTarget::Stdout)?;
    detach(&cfg)
}

/// Runs the server on this process until it stops.
fn run_attached(cfg: ServerConfig) -> anyhow::Result<()> {
    let foreground = cfg.foreground;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("unable to build runtime")?;

    runtime.block_on(async move {
        let server = Server::builder(cfg).with_sink(Arc::new(TracingSink)).build();
        let lifecycle = ServerLifecycle::new(server);

        if let Err(err) = lifecycle.ensure_not_running() {
            tracing::error!("{err}");
            std::process::exit(1);
        }
        if foreground {
            println!();
            println!("    +++ Running server in foreground.");
            println!("    +++ Terminate with ^C (Ctrl+C).");
            println!();
        }

        let _signals = lifecycle.listen_for_signals();
        match lifecycle.start(true).await {
            Ok(()) => Ok(()),
            Err(err @ LifecycleError::Fatal(_)) => {
                tracing::error!("{err}");
                std::process::exit(1);
            }
            Err(err) => Err(err.into()),
        }
    })
}

/// Re-executes this binary in the background and returns.
fn detach(cfg: &ServerConfig) -> anyhow::Result<()> {
    let pid_file = PidFile::for_config(cfg);
    if pid_file.is_alive() {
        tracing::error!("Already running; pid: {}", pid_file.path().display());
        std::process::exit(1);
    }
    std::fs::create_dir_all(&cfg.pid_path)
        .with_context(|| format!("unable to create {}", cfg.pid_path.display()))?;

    let exe = std::env::current_exe().context("unable to locate own executable")?;
    let mut command = Command::new(exe);
    command
        .args(std::env::args_os().skip(1))
        .arg("--detached")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().context("unable to start background process")?;
    tracing::info!(
        "started {} in background (pid {}); logging to {}",
        lividpenguin::DAEMON_NAME,
        child.id(),
        cfg.log_file().display()
    );
    Ok(())
}
