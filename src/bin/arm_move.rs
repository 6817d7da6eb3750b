//! Jog the arm by a relative offset from wherever it currently is.

use clap::Parser;

use armdmux::arm::{Arm, Point, SerialArm};

#[derive(Parser, Debug)]
#[command(name = "arm-move", version, about)]
struct Cli {
    #[arg(long, default_value = "/dev/staubli-data")]
    port: String,
    #[arg(long, default_value_t = 19200)]
    baud: u32,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    x: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    y: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    z: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    let cli = Cli::parse();

    let mut arm = SerialArm::open(&cli.port, cli.baud)?;
    let position = arm.resync().await?;
    tracing::info!("Arm at {}", position);

    let target = position + Point::new(cli.x, cli.y, cli.z);
    arm.move_to(target).await?;
    tracing::info!("Moved to {}", target);
    Ok(())
}
