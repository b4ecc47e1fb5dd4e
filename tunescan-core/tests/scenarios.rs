use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tunescan_core::consumer::{SessionContext, SessionKind};
use tunescan_core::driver::{
    AtvScanType, DtvScanType, ScanStatus, ServiceType,
};
use tunescan_core::number_search::{self, NumberSearchController};
use tunescan_core::purge::StoredChannel;
use tunescan_core::sim::{RecordingDriver, SimulatedDriver};
use tunescan_core::{
    AtvScanMode, BroadcastStandard, CableSubMode, CallerInput, DriverCommand, DriverEvent,
    FrequencyBounds, MemoryChannelStore, MemorySystemControl, ModeCode, NumberSearchOutcome,
    ScanEventConsumer, ScanNotification, ScanSession, ScanSettings, ScanState, SearchMode,
};

fn wait_for(
    rx: &Receiver<ScanNotification>,
    pred: impl Fn(&ScanNotification) -> bool,
) -> ScanNotification {
    loop {
        let notification = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("timed out waiting for notification");
        if pred(&notification) {
            return notification;
        }
    }
}

fn seeded_store() -> Arc<MemoryChannelStore> {
    let store = Arc::new(MemoryChannelStore::new());
    store.upsert(StoredChannel {
        standard: None,
        frequency: 55_250_000,
        name: "Old analog".to_string(),
    });
    store.upsert(StoredChannel {
        standard: Some(BroadcastStandard::AtscC),
        frequency: 177_000_000,
        name: "Old cable".to_string(),
    });
    store.upsert(StoredChannel {
        standard: Some(BroadcastStandard::AtscT),
        frequency: 405_000_000,
        name: "Old air".to_string(),
    });
    store
}

#[test]
fn test_mixed_atsc_cable_lrc_auto_scan() {
    let driver = Arc::new(RecordingDriver::new());
    let store = seeded_store();
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: true,
        dtv_standard: BroadcastStandard::AtscC,
        cable_sub_mode: CableSubMode::Lrc,
        ..ScanSettings::default()
    };
    let (handle, _rx, worker) = ScanSession::new(
        driver.clone(),
        store.clone(),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();

    handle.start_auto(None).unwrap();
    assert!(store.is_empty());

    handle.shutdown().unwrap();
    worker.join().unwrap();

    let commands = driver.commands();
    let starts: Vec<_> = commands.iter().filter(|c| c.is_start()).collect();
    assert_eq!(starts.len(), 1);
    match starts[0] {
        DriverCommand::TvScan { fe, scan } => {
            assert!(fe.mode.is_mixed());
            assert_eq!(fe.mode.list(), 2);
            assert_eq!(scan.atv_modifier.map(|m| m.list()), Some(7));
            assert_ne!(scan.atv_type, AtvScanType::None);
            assert_ne!(scan.dtv_type, DtvScanType::None);
        }
        other => panic!("expected a combined scan, got {other:?}"),
    }
}

#[test]
fn test_dtv_rescan_keeps_other_standard() {
    let driver = Arc::new(RecordingDriver::new());
    let store = seeded_store();
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: false,
        dtv_standard: BroadcastStandard::AtscT,
        ..ScanSettings::default()
    };
    let (handle, _rx, worker) = ScanSession::new(
        driver,
        store.clone(),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();

    handle.start_auto(None).unwrap();
    handle.shutdown().unwrap();
    worker.join().unwrap();

    let names: Vec<String> = store.channels().into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Old analog", "Old cable"]);
}

#[test]
fn test_all_band_manual_pause_is_held() {
    let driver = Arc::new(RecordingDriver::new());
    let settings = ScanSettings {
        search_dtv: false,
        search_atv: true,
        atv_scan_mode: AtvScanMode::AllBand,
        search_mode: SearchMode::Manual,
        ..ScanSettings::default()
    };
    let (handle, rx, worker) = ScanSession::new(
        driver.clone(),
        Arc::new(MemoryChannelStore::new()),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();

    handle
        .start_manual(CallerInput::manual_range(100_000_000, 200_000_000))
        .unwrap();
    driver.set_status(ScanStatus::PAUSED);
    handle
        .event_sink()
        .deliver(DriverEvent::analog_lock(30, 175_250_000));

    let paused = wait_for(&rx, |n| matches!(n, ScanNotification::Paused { .. }));
    assert_eq!(paused, ScanNotification::Paused { by_driver: true });

    handle.shutdown().unwrap();
    worker.join().unwrap();
    assert!(!driver.commands().contains(&DriverCommand::Resume));
}

#[test]
fn test_driver_pause_auto_resumed_elsewhere() {
    let driver = Arc::new(RecordingDriver::new());
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: true,
        dtv_standard: BroadcastStandard::Dtmb,
        ..ScanSettings::default()
    };
    let (handle, rx, worker) = ScanSession::new(
        driver.clone(),
        Arc::new(MemoryChannelStore::new()),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();

    handle.start_auto(None).unwrap();
    driver.set_status(ScanStatus::PAUSED);
    handle
        .event_sink()
        .deliver(DriverEvent::analog_lock(10, 55_250_000));
    wait_for(&rx, |n| matches!(n, ScanNotification::ChannelFound { .. }));

    handle.shutdown().unwrap();
    worker.join().unwrap();
    assert!(driver.commands().contains(&DriverCommand::Resume));
}

#[test]
fn test_number_search_atsc_times_out() {
    let driver = RecordingDriver::new();
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: false,
        dtv_standard: BroadcastStandard::AtscT,
        ..ScanSettings::default()
    };

    let (request, command) = number_search::prepare(&settings, &driver, 5).unwrap();
    assert_eq!(request.plan.map(|p| p.code()), Some(5));
    // row 4 of the ATSC table is user channel 5
    assert_eq!(
        command,
        DriverCommand::DtvManualScan {
            mode: ModeCode::for_standard(BroadcastStandard::AtscT).with_list(5),
            frequency: 75_000_000,
        }
    );

    let started = Instant::now();
    let mut consumer = ScanEventConsumer::new();
    consumer.begin(SessionContext::for_request(&request, SessionKind::NumberSearch));
    let mut controller = NumberSearchController::new(5, started);
    assert_eq!(controller.deadline() - started, Duration::from_secs(30));

    let reactions = controller.on_timeout(&mut consumer);
    let stops = reactions
        .iter()
        .filter(|r| matches!(r, tunescan_core::Reaction::Command(DriverCommand::Stop)))
        .count();
    assert_eq!(stops, 1);
    assert_eq!(
        controller.outcome(),
        Some(&NumberSearchOutcome::NotFound { timed_out: true })
    );
    assert_eq!(consumer.state(), ScanState::Stopped);
}

#[test]
fn test_number_search_finds_channel() {
    let driver = Arc::new(RecordingDriver::new());
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: false,
        dtv_standard: BroadcastStandard::DvbT,
        ..ScanSettings::default()
    };
    let (handle, rx, worker) = ScanSession::new(
        driver.clone(),
        Arc::new(MemoryChannelStore::new()),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();

    handle.start_number_search(27).unwrap();
    let sink = handle.event_sink();
    let mode = ModeCode::for_standard(BroadcastStandard::DvbT);
    sink.deliver(DriverEvent::progress(mode, 50, 522_000_000));
    sink.deliver(DriverEvent::digital_program(
        mode,
        100,
        522_000_000,
        "Sim 2",
        ServiceType::Tv,
    ));
    sink.deliver(DriverEvent::scan_end());
    sink.deliver(DriverEvent::scan_exit());

    let outcome = wait_for(&rx, |n| matches!(n, ScanNotification::NumberSearch(_)));
    match outcome {
        ScanNotification::NumberSearch(NumberSearchOutcome::Found { count, info }) => {
            assert_eq!(count, 1);
            assert_eq!(info.get("dtv_program"), Some(522_000_000));
            assert_eq!(info.get("auto_search_mode"), None);
        }
        other => panic!("unexpected {other:?}"),
    }

    handle.shutdown().unwrap();
    worker.join().unwrap();
    let commands = driver.commands();
    assert_eq!(
        commands[0],
        DriverCommand::DtvManualScan {
            mode,
            frequency: 522_000_000
        }
    );
    assert_eq!(
        commands.iter().filter(|c| **c == DriverCommand::Stop).count(),
        1
    );
}

#[test]
fn test_counters_reset_between_sessions() {
    let driver = Arc::new(RecordingDriver::new());
    let settings = ScanSettings {
        search_dtv: false,
        search_atv: true,
        ..ScanSettings::default()
    };
    let (handle, rx, worker) = ScanSession::new(
        driver,
        Arc::new(MemoryChannelStore::new()),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();
    let sink = handle.event_sink();

    handle.start_auto(None).unwrap();
    sink.deliver(DriverEvent::analog_lock(20, 55_250_000));
    sink.deliver(DriverEvent::analog_lock(40, 61_250_000));
    sink.deliver(DriverEvent::scan_exit());
    let first = wait_for(&rx, |n| matches!(n, ScanNotification::Finished(_)));

    handle.start_auto(None).unwrap();
    sink.deliver(DriverEvent::scan_exit());
    let second = wait_for(&rx, |n| matches!(n, ScanNotification::Finished(_)));

    let (ScanNotification::Finished(first), ScanNotification::Finished(second)) = (first, second)
    else {
        unreachable!()
    };
    assert_eq!(first.progress.atv_channels, 2);
    assert_eq!(first.progress.percent, 40);
    assert_eq!(second.progress.atv_channels, 0);
    assert_eq!(second.progress.percent, 0);

    handle.shutdown().unwrap();
    worker.join().unwrap();
}

#[test]
fn test_simulated_auto_scan_completes() {
    let store = Arc::new(MemoryChannelStore::new());
    let driver = Arc::new(
        SimulatedDriver::demo()
            .with_step_delay(Duration::from_millis(1))
            .with_channel_store(store.clone()),
    );
    let settings = ScanSettings {
        search_dtv: true,
        search_atv: false,
        dtv_standard: BroadcastStandard::DvbT,
        ..ScanSettings::default()
    };
    let (handle, rx, worker) = ScanSession::new(
        driver.clone(),
        store.clone(),
        Arc::new(MemorySystemControl::new()),
        Box::new(settings),
    )
    .spawn();
    driver.attach(handle.event_sink());

    handle
        .start_auto(Some(FrequencyBounds::new(470_000_000, 530_000_000)))
        .unwrap();
    let finished = wait_for(&rx, |n| matches!(n, ScanNotification::Finished(_)));
    let ScanNotification::Finished(summary) = finished else {
        unreachable!()
    };

    // Sim 1 and Sim 2 on TV, Sim FM on radio, the data service is skipped
    assert_eq!(summary.progress.tv_channels, 2);
    assert_eq!(summary.progress.radio_channels, 1);
    assert_eq!(summary.progress.percent, 100);
    assert!(store.len() >= 4);

    handle.shutdown().unwrap();
    worker.join().unwrap();
}
