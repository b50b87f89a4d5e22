use des_ethernet::{
    net::{csma::CsmaDevice, trace::*},
    prelude::*,
};
use std::{cell::RefCell, rc::Rc, rc::Weak};

type Log = Rc<RefCell<Vec<(Option<String>, u64)>>>;

fn endpoint(last: u8) -> Rc<EthernetDevice> {
    let device = EthernetDevice::new();
    device.set_address(MacAddress::new([0, 0, 0, 0, 0, last]));
    device
}

fn connected() -> (Rc<EthernetChannel>, Rc<EthernetDevice>, Rc<EthernetDevice>) {
    let link = EthernetChannel::new();
    let d1 = endpoint(1);
    let d2 = endpoint(2);
    d1.attach(&link);
    d2.attach(&link);
    (link, d1, d2)
}

fn sink() -> (TraceSink, Log) {
    let log: Log = Rc::default();
    let l = log.clone();
    let sink = TraceSink::with_context(move |context, packet| {
        l.borrow_mut()
            .push((context.map(str::to_string), packet.uid()));
    });
    (sink, log)
}

fn run() {
    Builder::seeded(3)
        .quiet()
        .build(Sim::default())
        .run()
        .unwrap();
}

#[test]
fn endpoint_exposes_ten_events() {
    let d1 = endpoint(1);
    for name in [
        MAC_TX,
        MAC_TX_DROP,
        PHY_TX_BEGIN,
        PHY_TX_END,
        PHY_TX_DROP,
        MAC_PROMISC_RX,
        MAC_RX,
        PHY_RX_END,
        PHY_RX_DROP,
    ] {
        assert_eq!(d1.trace(name).map(TraceFanout::num_targets), Some(1), "{name}");
    }
    assert_eq!(d1.trace(PROMISC_SNIFFER).unwrap().num_targets(), 2);

    assert!(d1.trace(SNIFFER).is_none());
    assert!(!d1.trace_connect("Bogus", None, sink().0));
}

#[test]
fn transmit_and_receive_events_reach_the_right_endpoint() {
    let (_link, d1, d2) = connected();

    let events = [MAC_TX, PHY_TX_BEGIN, PHY_TX_END, PHY_RX_END, MAC_RX];
    let logs: Vec<(Log, Log)> = events
        .iter()
        .map(|name| {
            let (s1, l1) = sink();
            let (s2, l2) = sink();
            assert!(d1.trace_connect(name, None, s1));
            assert!(d2.trace_connect(name, None, s2));
            (l1, l2)
        })
        .collect();

    let packet = Packet::zeroed(20);
    assert!(d1.send(packet.clone(), d2.address(), 0x0800));
    run();

    let once = vec![(None, packet.uid())];
    for (name, (at_d1, at_d2)) in events.iter().zip(&logs) {
        let (sender, receiver) = match *name {
            MAC_TX | PHY_TX_BEGIN | PHY_TX_END => (once.clone(), vec![]),
            _ => (vec![], once.clone()),
        };
        assert_eq!(*at_d1.borrow(), sender, "{name} at sender");
        assert_eq!(*at_d2.borrow(), receiver, "{name} at receiver");
    }
}

#[test]
fn promisc_sniffer_observes_both_directions() {
    let (_link, d1, d2) = connected();
    let (s, log) = sink();
    d1.trace(PROMISC_SNIFFER).unwrap().connect(s, "d1");

    let outgoing = Packet::zeroed(20);
    let incoming = Packet::zeroed(20);
    assert!(d1.send(outgoing.clone(), d2.address(), 0x0800));
    assert!(d2.send(incoming.clone(), d1.address(), 0x0800));
    run();

    let mut seen: Vec<u64> = log.borrow().iter().map(|(_, uid)| *uid).collect();
    seen.sort_unstable();
    let mut expected = vec![outgoing.uid(), incoming.uid()];
    expected.sort_unstable();
    assert_eq!(seen, expected);
    assert!(log.borrow().iter().all(|(ctx, _)| ctx.as_deref() == Some("d1")));
}

#[test]
fn single_target_events_are_not_duplicated() {
    let (_link, d1, d2) = connected();
    let (s, log) = sink();
    d2.trace(MAC_PROMISC_RX).unwrap().connect_without_context(s.clone());
    d2.set_promisc_receive_callback(Some(Rc::new(|_, _, _, _, _, _| true)));

    assert!(d1.send(Packet::zeroed(20), d2.address(), 0x0800));
    run();

    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn disconnect_stops_delivery() {
    let (_link, d1, d2) = connected();
    let (s, log) = sink();

    assert!(d1.trace_connect(MAC_TX, Some("ctx"), s.clone()));
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert_eq!(log.borrow().len(), 1);

    // a subscription is identified by sink and context
    assert!(d1.trace_disconnect(MAC_TX, None, &s));
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert_eq!(log.borrow().len(), 2);

    assert!(d1.trace_disconnect(MAC_TX, Some("ctx"), &s));
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert_eq!(log.borrow().len(), 2);

    let (other, _) = sink();
    d1.trace(PROMISC_SNIFFER).unwrap().disconnect_without_context(&other);
    run();
}

#[test]
fn drop_events_are_reported() {
    let (_link, d1, d2) = connected();
    let (tx_drop, tx_log) = sink();
    let (rx_drop, rx_log) = sink();
    assert!(d1.trace_connect(MAC_TX_DROP, Some("tx"), tx_drop));
    assert!(d2.trace_connect(PHY_RX_DROP, Some("rx"), rx_drop));

    d1.set_mtu(64);
    let oversized = Packet::zeroed(65);
    assert!(!d1.send(oversized.clone(), d2.address(), 0x0800));

    d2.set_receive_error_model(Some(RateErrorModel::shared(1.0, ErrorUnit::Packet)));
    let corrupt = Packet::zeroed(64);
    assert!(d1.send(corrupt.clone(), d2.address(), 0x0800));
    run();

    assert_eq!(*tx_log.borrow(), vec![(Some("tx".to_string()), oversized.uid())]);
    assert_eq!(*rx_log.borrow(), vec![(Some("rx".to_string()), corrupt.uid())]);
}

#[test]
#[should_panic(expected = "requires a primary target")]
fn fanout_requires_a_primary_target() {
    let _ = TraceFanout::new(MAC_TX, None, None);
}

#[test]
#[should_panic(expected = "has no primary target")]
fn fanout_with_expired_primary() {
    let primary: Weak<dyn TraceSource> = {
        let device = CsmaDevice::new();
        let weak: Weak<CsmaDevice> = Rc::downgrade(&device);
        weak
    };
    let fanout = TraceFanout::new(MAC_TX, Some(primary), None);
    fanout.connect_without_context(sink().0);
}
