// PinLink Linux: UDP broadcast host with a stdin console.

mod bench;
mod config;
mod console;
mod radio;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pinlink_core::{BoardId, Clock, MonotonicClock, Node, SendError, SendOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bench::Bench;
use config::Config;
use console::Command;
use radio::UdpRadio;

const VERSION: &str = env!("CARGO_PKG_VERSION");

type Engine = Node<UdpRadio, Bench>;

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("pinlink-linux {}", VERSION);
            return Ok(());
        }
    }

    let cfg = config::load()?;
    init_logging(&cfg.log);
    let board = BoardId::new(cfg.board_id.clone())
        .with_context(|| format!("invalid board id `{}`", cfg.board_id))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cfg, board))
}

/// RUST_LOG wins over the configured level.
fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cfg: Config, board: BoardId) -> anyhow::Result<()> {
    let (radio, socket) = UdpRadio::bind(cfg.port, cfg.broadcast)
        .with_context(|| format!("binding udp port {}", cfg.port))?;
    let clock = MonotonicClock::new();

    let mut node = Node::with_dispatcher(board, cfg.core.clone(), radio, Bench::default());
    node.on_send_failure(|f| warn!(board = %f.board, kind = ?f.kind, reason = ?f.reason, "send failed"));
    node.begin(clock.now());
    info!(board = %node.board_id(), port = cfg.port, broadcast = %cfg.broadcast, "pinlink-linux up");

    let handle = node.link_handle();
    let node = Arc::new(Mutex::new(node));

    tokio::spawn(async move {
        if let Err(e) = radio::recv_loop(socket, handle).await {
            warn!(error = %e, "receive loop stopped");
        }
    });

    let ticker = node.clone();
    let period = Duration::from_millis(cfg.tick_ms.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            ticker.lock().await.update(clock.now());
        }
    });

    tokio::select! {
        r = console_loop(node, clock) => r?,
        r = shutdown_signal() => r?,
    }
    info!("shutting down");
    Ok(())
}

async fn console_loop(node: Arc<Mutex<Engine>>, clock: MonotonicClock) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => return Ok(()),
            Ok(Some(cmd)) => execute(&node, &clock, cmd).await,
            Err(e) => println!("{e}"),
        }
    }
    // stdin closed (running as a service): keep going until a signal.
    std::future::pending::<()>().await;
    Ok(())
}

async fn execute(node: &Mutex<Engine>, clock: &MonotonicClock, cmd: Command) {
    let now = clock.now();
    let mut node = node.lock().await;
    let result = match cmd {
        Command::Peers => {
            if node.peer_count() == 0 {
                println!("no peers yet");
            }
            for peer in node.peers().iter() {
                println!(
                    "{:<31} {:<21} seen {:.1}s ago",
                    peer.board_id,
                    peer.address,
                    now.since(peer.last_seen).as_secs_f32()
                );
            }
            return;
        }
        Command::Status => {
            match node.status_json(now) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "status not rendered"),
            }
            return;
        }
        Command::Help | Command::Quit => {
            println!("{}", console::HELP);
            return;
        }
        Command::Pin { board, pin, value } => {
            node.control_remote_pin_with(&board, pin, value, now, |o| {
                let verdict = if o.success { "confirmed" } else { "FAILED" };
                println!("{}: pin {} = {} {}", o.target, o.pin, o.value, verdict);
            })
        }
        Command::Read { board, pin } => node.read_remote_pin(&board, pin, now, |o| {
            if o.success {
                println!("{}: pin {} reads {}", o.target, o.pin, o.value);
            } else {
                println!("{}: read of pin {} failed", o.target, o.pin);
            }
        }),
        Command::Say { board, message } => node.send_direct_message(&board, &message, now),
        Command::Publish { topic, message } => node.publish_topic(&topic, &message),
        Command::Serial { data } => node.forward_serial_data(&data),
    };
    report(result);
}

fn report(result: Result<SendOutcome, SendError>) {
    match result {
        Ok(SendOutcome::Untracked(_)) => println!("sent without confirmation (tracker full)"),
        Ok(_) => {}
        Err(e) => println!("not sent: {e}"),
    }
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
