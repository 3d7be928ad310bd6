use anyhow::Result;
use log::*;
use std::process::exit;
use tickfill_client::{write_packets, Config, RecoveryController, RecoveryReport, TcpTransport};

#[tokio::main]
async fn main() {
    env_logger::init();

    match run().await {
        Ok(report) if report.is_complete() => exit(0),
        Ok(_) => exit(2),
        Err(err) => {
            error!("Error occurred: {:?}", err);
            exit(1)
        }
    }
}

async fn run() -> Result<RecoveryReport> {
    let config = Config::from_env()?;
    let transport = TcpTransport::new(config.server_host(), config.server_port());

    let report = RecoveryController::new(config.clone(), transport)
        .run()
        .await?;

    println!("Final sequence check:");
    for packet in report.packets.iter() {
        println!("Sequence: {}", packet.sequence);
    }
    println!(
        "Total sequences received: {} of {}",
        report.packets.len(),
        report.known_total
    );

    write_packets(config.output_path(), &report.packets)?;

    Ok(report)
}
