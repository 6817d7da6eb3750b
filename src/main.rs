use std::error::Error;

use clap::Parser;
use tokio::net::TcpListener;

use armdmux::arm::{Arm, ArmSimulator, Point, SerialArm};
use armdmux::config::{self, Config};
use armdmux::run::{RunController, RunOutcome};
use armdmux::weblog::LogBroadcaster;
use armdmux::{feed, web};

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Streams G-code programs to a robot arm over its serial data line.
#[derive(Parser, Debug)]
#[command(name = "armdmux", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,
    /// Serial device of the arm's data line
    #[arg(long)]
    arm: Option<String>,
    #[arg(long)]
    baudrate: Option<u32>,
    /// Use the simulator instead of a real arm
    #[arg(long)]
    dummy: bool,
    /// HTTP listen address
    #[arg(long)]
    addr: Option<String>,
    /// Raw TCP G-code feed listen address
    #[arg(long)]
    feed_addr: Option<String>,
    /// Run one program from standard input and exit
    #[arg(long)]
    stdin: bool,
    #[arg(short, long)]
    verbose: bool,
    /// Program origin in the arm's frame, as X,Y,Z
    #[arg(long, value_parser = config::parse_origin, allow_hyphen_values = true)]
    origin: Option<Point>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.arm {
            config.arm.port = port.clone();
        }
        if let Some(baud) = self.baudrate {
            config.arm.baud = baud;
        }
        if self.dummy {
            config.arm.simulate = true;
        }
        if let Some(addr) = &self.addr {
            config.server.addr = addr.clone();
        }
        if let Some(addr) = &self.feed_addr {
            config.server.feed_addr = Some(addr.clone());
        }
        if let Some(origin) = self.origin {
            config.origin.x = origin.x;
            config.origin.y = origin.y;
            config.origin.z = origin.z;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            config::load_config(path)?
        }
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let arm: Box<dyn Arm> = if config.arm.simulate {
        tracing::info!("Using simulated arm (limit ±{} mm)", config.simulator.limit);
        Box::new(ArmSimulator::new(config.simulator.limit))
    } else {
        Box::new(SerialArm::open(&config.arm.port, config.arm.baud).map_err(|e| {
            tracing::error!("Failed to open arm on '{}': {}", config.arm.port, e);
            e
        })?)
    };
    tracing::info!("Origin: {}", config.origin.point());

    let log = LogBroadcaster::new(config.server.log_capacity);
    let controller = RunController::new(arm, config.run_settings(), log);

    if cli.stdin {
        let outcome = controller.start(tokio::io::stdin(), "stdin").await?;
        tracing::info!("{:?}", outcome);
        return match outcome {
            RunOutcome::Aborted { line, error } => Err(format!("aborted at line {}: {}", line, error).into()),
            _ => Ok(()),
        };
    }

    if let Some(addr) = &config.server.feed_addr {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("G-code feed listening on {}", listener.local_addr()?);
        tokio::spawn(feed::serve_feed(listener, controller.clone()));
    }

    let app = web::api::create_router(controller);
    let listener = TcpListener::bind(&config.server.addr).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;
    Ok(())
}
