use anyhow::Context;
use balloon_telemetry::{
    devices::SerialConnector, locate, output::OutputFormat, presenter::Console, Monitor, Step,
};
use clap::Parser;
use log::error;

/// Print the telemetry of the balloon payload, one line per frame.
#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    /// Serial device to read from. Found automatically if omitted
    #[arg(long, short)]
    device: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t=OutputFormat::Stringify)]
    output: OutputFormat,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { device, output } = Cli::parse();

    let path = match device {
        Some(path) => path,
        None => locate::find_device()?,
    };
    let mut monitor = Monitor::new(
        SerialConnector::new(path.as_str()),
        Console::new(std::io::stdout(), output),
    );

    if let Step::ConnectFailed(e) = monitor.step().await {
        return Err(e).context("Error opening serial port");
    }
    println!("Reading Pico telemetry...\n");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let step = tokio::select! {
            _ = &mut ctrl_c => {
                println!("\nExiting...");
                break;
            }
            step = monitor.step() => step,
        };
        if ends_session(&step) {
            break;
        }
    }

    Ok(())
}

/// The reader does not reconnect: losing the device or stdout ends it like an interrupt.
fn ends_session(step: &Step) -> bool {
    match step {
        Step::Disconnected(e) => error!("Unexpected error: {e}"),
        Step::Failed(e) => error!("Unexpected error: {e}"),
        _ => return false,
    }
    true
}

#[test]
fn link_and_output_failures_end_the_session() {
    use balloon_telemetry::error::{DeviceError, ReadError};
    use std::io;

    let lost: ReadError = DeviceError::ConnectionLost.into();
    assert!(ends_session(&Step::Disconnected(lost)));
    assert!(ends_session(&Step::Failed(io::ErrorKind::BrokenPipe.into())));
    assert!(!ends_session(&Step::Idle));
    assert!(!ends_session(&Step::Connected));
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
