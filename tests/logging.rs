use des_ethernet::{prelude::*, tracing::format};
use tracing::{level_filters::LevelFilter, subscriber::with_default};

#[path = "common/mock.rs"]
mod mock;

fn subscriber(logs: &mock::CapturedLogs, level: LevelFilter) -> impl tracing::Subscriber {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(level)
        .event_format(format())
        .with_writer(logs.clone())
        .finish()
}

#[test]
#[serial_test::serial]
fn events_are_prefixed_with_sim_time() {
    let logs = mock::CapturedLogs::new();

    with_default(subscriber(&logs, LevelFilter::INFO), || {
        let _ = Builder::seeded(123).quiet().build(Sim::default()).run();

        tracing::info!(GENERAL = "Kenobi", "Hello there");
        assert_eq!(
            logs.content(),
            "[ 0ns ] INFO logging: Hello there GENERAL=\"Kenobi\"\n"
        );
    });
}

#[test]
#[serial_test::serial]
fn time_advances_between_events() {
    let logs = mock::CapturedLogs::new();

    with_default(subscriber(&logs, LevelFilter::INFO), || {
        schedule_in(Duration::from_millis(5), || tracing::info!("first"));
        schedule_in(Duration::from_secs(2), || tracing::warn!("second"));
        let _ = Builder::seeded(123).quiet().build(Sim::default()).run();

        assert_eq!(
            logs.lines(),
            vec![
                "[ 5ms ] INFO logging: first".to_string(),
                "[ 2s ] WARN logging: second".to_string()
            ]
        );
    });
}

#[test]
#[serial_test::serial]
fn runtime_reports_start_and_end() {
    let logs = mock::CapturedLogs::new();

    with_default(subscriber(&logs, LevelFilter::INFO), || {
        let _ = Builder::seeded(123).build(Sim::default()).run();

        let lines = logs.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Simulation starting"), "{}", lines[0]);
        assert!(lines[1].contains("Simulation ended"), "{}", lines[1]);
    });
}

#[test]
#[serial_test::serial]
fn link_setup_is_logged() {
    let logs = mock::CapturedLogs::new();

    with_default(subscriber(&logs, LevelFilter::DEBUG), || {
        let link = EthernetChannel::new();
        let d1 = EthernetDevice::new();
        d1.set_address(MacAddress::new([0, 0, 0, 0, 0, 1]));
        let d2 = EthernetDevice::new();
        d2.set_address(MacAddress::new([0, 0, 0, 0, 0, 2]));
        d1.attach(&link);
        d2.attach(&link);

        let content = logs.content();
        assert!(content.contains(
            "DEBUG des_ethernet::net::ethernet::channel: link complete: 00:00:00:00:00:01 <-> 00:00:00:00:00:02"
        ), "{content}");

        // re-attaching is allowed, but reported
        let other = EthernetChannel::new();
        d1.attach(&other);
        assert!(logs.content().contains("WARN des_ethernet::net::ethernet::device: endpoint 00:00:00:00:00:01 is already attached, re-attaching same_link=false"));
    });
}
