//! Scan one page to a raw file
//!
//! ```text
//! SCANNER_IP=192.168.1.50 cargo run --example scan_to_file -- page.raw
//! ```

use std::fs::File;
use std::io::Write;

use anyhow::Context;
use mfpscan::{DeviceFamily, DriverConfig, ScanMode, ScanSource, Scanner};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let ip = std::env::var("SCANNER_IP").unwrap_or_else(|_| "192.168.1.50".to_string());
    let path = std::env::args().nth(1).unwrap_or_else(|| "page.raw".to_string());

    let mut scanner = Scanner::tcp(ip, mfpscan::DEFAULT_PORT, DriverConfig::new(DeviceFamily::Family4));
    scanner.connect().context("connecting to scanner")?;

    let buttons = scanner.check_sensor()?;
    println!("{}", buttons);

    scanner.set_scan_mode(ScanMode::Gray)?;
    scanner.set_resolution(300, 300)?;
    scanner.set_source(ScanSource::Flatbed)?;
    scanner.set_compression(true)?;
    scanner.start_scan().context("starting scan")?;

    if let Some(geometry) = scanner.geometry() {
        println!("Page: {}", geometry);
    }

    let mut file = File::create(&path).with_context(|| format!("creating {}", path))?;
    let mut buf = [0u8; 16 * 1024];
    let mut total = 0;
    loop {
        match scanner.read_scan_data(&mut buf) {
            Ok(0) => std::thread::sleep(std::time::Duration::from_millis(10)),
            Ok(n) => {
                file.write_all(&buf[..n])?;
                total += n;
            }
            Err(e) if e.is_end_of_stream() => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("Wrote {} bytes to {}", total, path);

    scanner.cancel_scan()?;
    scanner.disconnect()?;

    Ok(())
}
