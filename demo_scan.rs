// Run with: cargo run --example demo_scan -- [atsc-t|atsc-c|dvb-t|dvb-c|dtmb] [all-band]
// Registered in tunescan-core/Cargo.toml: [[example]] name = "demo_scan" path = "../demo_scan.rs"

use std::sync::Arc;
use std::time::{Duration, Instant};

use tunescan_core::sim::SimulatedDriver;
use tunescan_core::{
    AtvScanMode, BroadcastStandard, MemoryChannelStore, MemorySystemControl, ScanNotification,
    ScanSession, ScanSettings, format_frequency,
};

fn main() {
    let mut args = std::env::args().skip(1);
    let standard = args
        .next()
        .and_then(|name| {
            BroadcastStandard::ALL
                .into_iter()
                .find(|s| s.name().eq_ignore_ascii_case(&name))
        })
        .unwrap_or(BroadcastStandard::AtscT);
    let all_band = args.next().is_some_and(|a| a == "all-band");

    let settings = ScanSettings {
        dtv_standard: standard,
        atv_scan_mode: if all_band {
            AtvScanMode::AllBand
        } else {
            AtvScanMode::FreqTable
        },
        ..ScanSettings::default()
    };
    println!("Scanning: {} (atv {:?})", standard.name(), settings.atv_scan_mode);

    let store = Arc::new(MemoryChannelStore::new());
    let driver = Arc::new(
        SimulatedDriver::demo()
            .with_step_delay(Duration::from_millis(5))
            .with_channel_store(store.clone()),
    );
    let session = ScanSession::new(
        driver.clone(),
        store.clone(),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    );
    let (handle, rx, worker) = session.spawn();
    driver.attach(handle.event_sink());

    if let Err(e) = handle.start_auto(None) {
        println!("ERROR: {e}");
        return;
    }

    let start = Instant::now();
    let mut last_percent = 0;
    for notification in rx.iter() {
        let elapsed = start.elapsed().as_secs_f64();
        match notification {
            ScanNotification::Progress(p) => {
                if p.percent >= last_percent + 10 {
                    println!(
                        "[{:>6.2}s] {:>3}% tv={:<3} radio={:<3} freq={}",
                        elapsed,
                        p.percent,
                        p.tv_channels,
                        p.radio_channels,
                        format_frequency(p.signal.frequency)
                    );
                    last_percent = p.percent;
                }
            }
            ScanNotification::ChannelFound {
                kind,
                frequency,
                name,
            } => {
                println!(
                    "[{:>6.2}s] FOUND {:?} {} {}",
                    elapsed,
                    kind,
                    format_frequency(frequency),
                    name.unwrap_or_default()
                );
            }
            ScanNotification::Paused { by_driver } => {
                // all-band manual search holds here; a demo just carries on
                println!("[{:>6.2}s] PAUSED by_driver={}", elapsed, by_driver);
                let _ = handle.resume();
            }
            ScanNotification::Finished(summary) => {
                println!("[{:>6.2}s] FINISHED {:?}", elapsed, summary.reason);
                break;
            }
            ScanNotification::Error(e) => {
                println!("[{:>6.2}s] ERROR: {}", elapsed, e);
            }
            other => println!("[{:>6.2}s] {:?}", elapsed, other),
        }
    }

    let _ = handle.shutdown();
    let summary = worker.join().ok().flatten();
    println!(
        "\nFinal: {} channels in store, {} found this scan",
        store.len(),
        summary.map(|s| s.progress.total_channels()).unwrap_or(0)
    );
}
