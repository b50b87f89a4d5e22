use des_ethernet::{
    net::{trace::*, ErrorModelRef, QueueRef},
    prelude::*,
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

#[derive(Debug, Clone, PartialEq)]
struct Delivery {
    device: MacAddress,
    uid: u64,
    content: Vec<u8>,
    protocol: u16,
    from: MacAddress,
    time: SimTime,
}

type Deliveries = Rc<RefCell<Vec<Delivery>>>;

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

fn record(device: &Rc<EthernetDevice>) -> Deliveries {
    let deliveries: Deliveries = Rc::default();
    let d = deliveries.clone();
    device.set_receive_callback(Some(Rc::new(move |dev, packet, protocol, from| {
        d.borrow_mut().push(Delivery {
            device: dev.address(),
            uid: packet.uid(),
            content: packet.content().to_vec(),
            protocol,
            from,
            time: SimTime::now(),
        });
        true
    })));
    deliveries
}

fn counter(device: &EthernetDevice, name: &str) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let c = count.clone();
    assert!(device.trace_connect(name, None, TraceSink::new(move |_| c.set(c.get() + 1))));
    count
}

fn run() -> SimTime {
    let (_, time, _) = Builder::seeded(1)
        .quiet()
        .build(Sim::default())
        .run()
        .unwrap();
    time
}

fn at_millis(ms: u64) -> SimTime {
    SimTime::ZERO + Duration::from_millis(ms)
}

#[test]
fn two_endpoint_scenario() {
    let link = EthernetChannel::new();
    let d1 = endpoint(1);
    let d2 = endpoint(2);
    d1.attach(&link);
    d2.attach(&link);
    assert_eq!(link.n_devices(), 2);

    let unbounded: QueueRef = DropTailQueue::shared(QueueLimit::Unbounded);
    d1.set_queue(unbounded);
    let at_d1 = record(&d1);

    // the callback sees the endpoint, not one of its interfaces
    let reported = Rc::new(Cell::new(0));
    let r = reported.clone();
    let expected = Rc::downgrade(&d2);
    d2.set_receive_callback(Some(Rc::new(move |dev, packet, protocol, _| {
        let expected = expected.upgrade().unwrap();
        assert!(std::ptr::addr_eq(Rc::as_ptr(&dev), Rc::as_ptr(&expected)));
        assert_eq!(packet.content(), b"hello, world");
        assert_eq!(protocol, 0x0800);
        r.set(r.get() + 1);
        true
    })));

    assert!(d1.send(Packet::new(*b"hello, world"), MacAddress::BROADCAST, 0x0800));
    let end = run();

    assert_eq!(reported.get(), 1);
    assert!(at_d1.borrow().is_empty());
    assert!(end > SimTime::ZERO);
}

#[test]
fn delivery_reaches_peer_only() {
    let (_link, d1, d2) = connected();
    let at_d1 = record(&d1);
    let at_d2 = record(&d2);

    let packet = Packet::new(*b"payload");
    assert!(d1.send(packet.clone(), MacAddress::BROADCAST, 0x0800));
    run();

    let at_d2 = at_d2.borrow();
    assert_eq!(at_d2.len(), 1);
    assert_eq!(at_d2[0].device, d2.address());
    assert_eq!(at_d2[0].uid, packet.uid());
    assert_eq!(at_d2[0].content, b"payload");
    assert_eq!(at_d2[0].protocol, 0x0800);
    assert_eq!(at_d2[0].from, d1.address());
    assert!(at_d2[0].time > SimTime::ZERO);
    assert!(at_d1.borrow().is_empty());
}

#[test]
fn both_directions_at_once() {
    let (link, d1, d2) = connected();
    link.set_data_rate(DataRate::from_bps(8_000));
    link.set_delay(Duration::from_millis(1));

    let at_d1 = record(&d1);
    let at_d2 = record(&d2);

    assert!(d1.send(Packet::zeroed(50), d2.address(), 0x0800));
    assert!(d2.send(Packet::zeroed(50), d1.address(), 0x0800));
    run();

    // 68 bytes on the wire at 1ms per byte, plus 1ms propagation
    assert_eq!(at_d1.borrow().len(), 1);
    assert_eq!(at_d2.borrow().len(), 1);
    assert_eq!(at_d1.borrow()[0].time, at_millis(69));
    assert_eq!(at_d2.borrow()[0].time, at_millis(69));
}

#[test]
fn frames_arrive_in_send_order() {
    let (link, d1, d2) = connected();
    link.set_delay(Duration::from_micros(10));
    let at_d2 = record(&d2);

    let packets: Vec<Packet> = (0..10).map(|i| Packet::zeroed(100 + i)).collect();
    for packet in &packets {
        assert!(d1.send(packet.clone(), d2.address(), 0x0800));
    }
    run();

    let received: Vec<u64> = at_d2.borrow().iter().map(|d| d.uid).collect();
    let sent: Vec<u64> = packets.iter().map(Packet::uid).collect();
    assert_eq!(received, sent);

    let times: Vec<SimTime> = at_d2.borrow().iter().map(|d| d.time).collect();
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn long_delay_keeps_queued_frames() {
    let (link, d1, d2) = connected();
    link.set_data_rate(DataRate::from_bps(8_000));
    link.set_delay(Duration::from_secs(2));
    let at_d2 = record(&d2);
    let drops = counter(&d1, MAC_TX_DROP);

    let packets: Vec<Packet> = (0..3).map(|_| Packet::zeroed(50)).collect();
    for packet in &packets {
        assert!(d1.send(packet.clone(), d2.address(), 0x0800));
    }
    run();

    assert_eq!(drops.get(), 0);
    let at_d2 = at_d2.borrow();
    let received: Vec<u64> = at_d2.iter().map(|d| d.uid).collect();
    let sent: Vec<u64> = packets.iter().map(Packet::uid).collect();
    assert_eq!(received, sent);

    // each frame waits until the previous one has propagated
    let times: Vec<SimTime> = at_d2.iter().map(|d| d.time).collect();
    assert_eq!(times, vec![at_millis(2_068), at_millis(4_136), at_millis(6_204)]);
}

#[test]
fn rate_and_delay_are_mirrored() {
    let (link, _d1, _d2) = connected();

    let rate: DataRate = "10Mbps".parse().unwrap();
    assert!(link.set_data_rate(rate));
    assert!(link.set_delay(Duration::from_micros(7)));

    assert_eq!(link.data_rate(), rate);
    assert_eq!(link.delay(), Duration::from_micros(7));
    for sub in [link.forward_channel(), link.reverse_channel()] {
        assert_eq!(sub.data_rate(), rate);
        assert_eq!(sub.delay(), Duration::from_micros(7));
    }
}

#[test]
fn rate_change_applies_to_later_frames() {
    let (link, d1, d2) = connected();
    let at_d2 = record(&d2);

    link.set_data_rate(DataRate::from_bps(8_000));
    assert!(d1.send(Packet::zeroed(100), d2.address(), 0x0800));
    run();

    // 118 bytes at 1ms per byte
    assert_eq!(at_d2.borrow()[0].time, at_millis(118));
}

#[test]
fn source_addressing() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);

    let addr: MacAddress = "02:00:00:aa:bb:cc".parse().unwrap();
    d1.set_address(addr);
    assert_eq!(d1.address(), addr);

    let spoofed: MacAddress = "02:00:00:00:00:99".parse().unwrap();
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x86dd));
    assert!(d1.send_from(Packet::zeroed(10), spoofed, d2.address(), 0x86dd));
    run();

    let at_d2 = at_d2.borrow();
    assert_eq!(at_d2.len(), 2);
    assert_eq!(at_d2[0].from, addr);
    assert_eq!(at_d2[1].from, spoofed);
    assert_eq!(at_d2[1].protocol, 0x86dd);
}

#[test]
fn unicast_to_other_host_is_not_passed_up() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);

    let promisc: Rc<RefCell<Vec<(MacAddress, PacketType)>>> = Rc::default();
    let p = promisc.clone();
    d2.set_promisc_receive_callback(Some(Rc::new(move |dev, _, _, _, _, ty| {
        p.borrow_mut().push((dev.address(), ty));
        true
    })));

    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert!(d1.send(Packet::zeroed(10), MacAddress::new([0, 0, 0, 0, 0, 42]), 0x0800));
    assert!(d1.send(Packet::zeroed(10), MacAddress::BROADCAST, 0x0800));
    run();

    assert_eq!(at_d2.borrow().len(), 2);
    assert_eq!(
        *promisc.borrow(),
        vec![
            (d2.address(), PacketType::Host),
            (d2.address(), PacketType::OtherHost),
            (d2.address(), PacketType::Broadcast),
        ]
    );
}

#[test]
fn mtu_exceeded_is_rejected() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);
    let drops = counter(&d1, MAC_TX_DROP);

    assert!(d1.set_mtu(100));
    assert_eq!(d1.mtu(), 100);
    assert!(!d1.send(Packet::zeroed(101), d2.address(), 0x0800));
    assert!(d1.send(Packet::zeroed(100), d2.address(), 0x0800));
    run();

    assert_eq!(drops.get(), 1);
    assert_eq!(at_d2.borrow().len(), 1);
}

#[test]
fn full_queue_is_rejected() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);
    d1.set_queue(DropTailQueue::shared(QueueLimit::Packets(1)));

    // the first frame goes onto the wire at once, the second waits
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert!(!d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    assert_eq!(d1.queue().borrow().stats().dropped, 1);
    run();

    assert_eq!(at_d2.borrow().len(), 2);
}

#[test]
fn receive_error_model_applies_to_receiver() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);
    let rx_drops = counter(&d2, PHY_RX_DROP);

    let lost = Packet::zeroed(10);
    let model: ErrorModelRef = ListErrorModel::shared([lost.uid()]);
    d2.set_receive_error_model(Some(model));

    assert!(d1.send(lost, d2.address(), 0x0800));
    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    run();

    assert_eq!(rx_drops.get(), 1);
    assert_eq!(at_d2.borrow().len(), 1);
}

#[test]
fn sending_requires_a_complete_link() {
    let link = EthernetChannel::new();
    let d1 = endpoint(1);
    let d2 = endpoint(2);

    assert!(!d1.is_link_up());
    assert!(!d1.send(Packet::zeroed(10), MacAddress::BROADCAST, 0x0800));

    d1.attach(&link);
    assert!(d1.is_link_up());
    // the interfaces are wired once the second endpoint attaches
    assert!(!d1.send(Packet::zeroed(10), MacAddress::BROADCAST, 0x0800));

    d2.attach(&link);
    assert!(d1.send(Packet::zeroed(10), MacAddress::BROADCAST, 0x0800));
}

#[test]
fn link_up_notifies_observers() {
    let link = EthernetChannel::new();
    let d1 = endpoint(1);

    let notified = Rc::new(Cell::new(0));
    let n = notified.clone();
    let observed = Rc::downgrade(&d1);
    d1.add_link_change_callback(Rc::new(move || {
        // observers re-query the device
        assert!(observed.upgrade().unwrap().is_link_up());
        n.set(n.get() + 1);
    }));

    d1.attach(&link);
    assert_eq!(notified.get(), 1);
    assert!(Rc::ptr_eq(&d1.ethernet_channel().unwrap(), &link));
}

#[test]
fn reattach_overwrites_link() {
    let (first, d1, d2) = connected();
    let at_d2 = record(&d2);

    let second = EthernetChannel::new();
    let d3 = endpoint(3);
    d3.attach(&second);
    let at_d3 = record(&d3);

    let notified = Rc::new(Cell::new(0));
    let n = notified.clone();
    d1.add_link_change_callback(Rc::new(move || n.set(n.get() + 1)));

    assert!(d1.attach(&second));
    assert_eq!(notified.get(), 1);
    assert!(d1.is_link_up());

    // the endpoint now belongs to the second link ...
    assert!(Rc::ptr_eq(&d1.ethernet_channel().unwrap(), &second));
    assert_eq!(second.n_devices(), 2);
    // ... while the first link keeps its stale entry
    assert_eq!(first.n_devices(), 2);
    assert!(Rc::ptr_eq(&first.ethernet_device(0).unwrap(), &d1));

    assert!(d1.send(Packet::zeroed(10), MacAddress::BROADCAST, 0x0800));
    run();

    assert_eq!(at_d3.borrow().len(), 1);
    assert!(at_d2.borrow().is_empty());
}

#[test]
fn disposed_endpoint_drops_pending_deliveries() {
    let (_link, d1, d2) = connected();
    let at_d2 = record(&d2);

    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    d2.dispose();
    run();

    assert!(at_d2.borrow().is_empty());
    assert!(d2.is_disposed());
    assert!(!d2.is_link_up());
    assert!(d2.ethernet_channel().is_none());
    assert!(d2.tx_device().is_disposed());
    assert!(d2.rx_device().is_disposed());
    assert!(!d2.send(Packet::zeroed(10), d1.address(), 0x0800));
}

#[test]
fn disposed_link_releases_endpoints() {
    let (link, d1, d2) = connected();
    let at_d2 = record(&d2);

    assert!(d1.send(Packet::zeroed(10), d2.address(), 0x0800));
    link.dispose();
    run();

    assert_eq!(link.n_devices(), 0);
    assert_eq!(link.forward_channel().n_devices(), 0);
    assert_eq!(link.reverse_channel().n_devices(), 0);
    assert!(at_d2.borrow().is_empty());
}

#[test]
fn nodes_are_mirrored_to_interfaces() {
    let (a, b) = (Node::new(), Node::new());
    let link = EthernetHelper::default().install(&a, &b);
    let [d1, d2] = &link.devices;

    assert_eq!(a.n_devices(), 1);
    assert_eq!(d1.if_index(), 0);
    assert_eq!(d1.node().map(|n| n.id()), Some(a.id()));
    assert_eq!(d1.tx_device().node().map(|n| n.id()), Some(a.id()));
    assert_eq!(d1.rx_device().node().map(|n| n.id()), Some(a.id()));
    assert_eq!(d2.node().map(|n| n.id()), Some(b.id()));

    assert_ne!(d1.address(), d2.address());
    assert!(!d1.address().is_group());
    assert_eq!(link.channel.n_devices(), 2);
}

#[test]
fn helper_applies_config() {
    let config = EthernetConfig::from_yaml(
        r"
queue:
  limit: unbounded
device:
  mtu: 500
  receive-error-rate: 1.0
channel:
  data-rate: 8kbps
  delay: 0.5
",
    )
    .unwrap();

    let (a, b) = (Node::new(), Node::new());
    let link = EthernetHelper::new(config).unwrap().install(&a, &b);
    let [d1, d2] = &link.devices;
    let at_d2 = record(d2);
    let rx_drops = counter(d2, PHY_RX_DROP);

    assert_eq!(link.channel.data_rate(), DataRate::from_bps(8_000));
    assert_eq!(link.channel.delay(), Duration::from_millis(500));
    assert_eq!(d1.mtu(), 500);

    assert!(!d1.send(Packet::zeroed(501), d2.address(), 0x0800));
    for _ in 0..3 {
        assert!(d1.send(Packet::zeroed(500), d2.address(), 0x0800));
    }

    let mut sim = Sim::default();
    link.register(&mut sim);
    let (sim, _, _) = Builder::seeded(9).quiet().build(sim).run().unwrap();
    assert_eq!(sim.channels().len(), 1);

    assert_eq!(rx_drops.get(), 3);
    assert!(at_d2.borrow().is_empty());
}
