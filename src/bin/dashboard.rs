use std::time::Duration;

use anyhow::Context;
use balloon_telemetry::{
    devices::SerialConnector, link::RetryPolicy, locate, presenter::Dashboard, web, Monitor,
};
use clap::Parser;
use log::{error, info};
use tokio::net::TcpListener;

/// Serve a live dashboard of the balloon payload's telemetry on localhost.
#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    /// Serial device to read from. Found automatically if omitted
    #[arg(long, short)]
    device: Option<String>,

    /// Local port to serve the dashboard on
    #[arg(long, short, default_value_t=web::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { device, port } = Cli::parse();

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Could not listen on port {port}"))?;
    info!("Dashboard running at http://{}/", listener.local_addr()?);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let path = match device.map(Ok).unwrap_or_else(locate::find_device) {
        Ok(path) => path,
        Err(e) => {
            error!("{e}");
            let halted = Dashboard::halted(e.to_string());
            tokio::select! {
                _ = &mut ctrl_c => {}
                _ = async {
                    loop {
                        web::serve_for(&listener, &halted, Duration::from_secs(60)).await;
                    }
                } => {}
            }
            return Ok(());
        }
    };

    let policy = RetryPolicy::DASHBOARD;
    let mut monitor = Monitor::new(SerialConnector::new(path), Dashboard::new());

    loop {
        let step = tokio::select! {
            _ = &mut ctrl_c => break,
            step = monitor.step() => step,
        };

        let pause = policy.pause_after(step.event());
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = web::serve_for(&listener, monitor.presenter(), pause) => {}
        }
    }

    info!("Shutting down");
    Ok(())
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
