//! Runs the dispatch loop and the bridge against the simulated adapter.
//!
//! Every frame the adapter transmits is fed back into its receiver, so the IPv4 frames sent
//! through the upward handle come back to the small stack below. A peer ARP request for the
//! interface address is injected as well and answered through the transmit path.
use std::{
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use clap::Parser as _;
use fugit::MicrosDurationU32;
use simple_logger::SimpleLogger;
use smap::BD_COUNT;
use smap_driver::{
    BridgeConfig, DriverConfig, NetConfig, Packet, PacketBuffer, Shared,
    bridge::{self, Bridge, NetStack},
    dispatch::{self, EventLoop},
    sim::{SimAlarm, SimSmap, StdEventFlags},
};
use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    EthernetRepr,
};

const POLL: Duration = Duration::from_millis(1);
const INIT_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE: Duration = Duration::from_millis(200);
const PEER_MAC: EthernetAddress = EthernetAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

#[derive(clap::Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Interface addressing: ip-address subnet-mask gateway-address.
    addresses: Vec<String>,
    /// Number of IPv4 frames sent through the loopback.
    #[arg(short, long, default_value_t = 16)]
    frames: usize,
    /// Length of each IPv4 frame including the Ethernet header.
    #[arg(short, long, default_value_t = 128, value_parser = clap::value_parser!(u16).range(14..=1514))]
    length: u16,
}

#[derive(Debug, Default, Clone, Copy)]
struct Stats {
    ip_frames: usize,
    arp_replies: usize,
    arp_ticks: usize,
}

struct LoopbackStack {
    mac: EthernetAddress,
    net: NetConfig,
    stats: Stats,
}

impl NetStack for LoopbackStack {
    fn arp_init(&mut self) {
        log::info!("ARP up for {} at {}", self.net.address, self.mac);
    }

    fn ip_input(&mut self, packet: Packet) {
        self.stats.ip_frames += 1;
        log::debug!("IPv4 frame of {} bytes", packet.len());
    }

    fn arp_input(&mut self, packet: Packet) -> Option<Packet> {
        let data = packet.to_vec();
        let frame = EthernetFrame::new_checked(&data[..]).ok()?;
        let repr = ArpRepr::parse(&ArpPacket::new_checked(frame.payload()).ok()?).ok()?;
        let ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Request,
            source_hardware_addr,
            source_protocol_addr,
            target_protocol_addr,
            ..
        } = repr
        else {
            return None;
        };
        if target_protocol_addr != self.net.address {
            return None;
        }
        let reply = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Reply,
            source_hardware_addr: self.mac,
            source_protocol_addr: self.net.address,
            target_hardware_addr: source_hardware_addr,
            target_protocol_addr: source_protocol_addr,
        };
        self.stats.arp_replies += 1;
        Some(arp_frame(self.mac, source_hardware_addr, &reply))
    }

    fn arp_tick(&mut self) {
        self.stats.arp_ticks += 1;
    }
}

fn arp_frame(src: EthernetAddress, dst: EthernetAddress, repr: &ArpRepr) -> Packet {
    let eth = EthernetRepr {
        src_addr: src,
        dst_addr: dst,
        ethertype: EthernetProtocol::Arp,
    };
    let mut buf = vec![0; eth.buffer_len() + repr.buffer_len()];
    let mut frame = EthernetFrame::new_unchecked(&mut buf[..]);
    eth.emit(&mut frame);
    repr.emit(&mut ArpPacket::new_unchecked(frame.payload_mut()));
    Arc::new(PacketBuffer::from_slice(&buf))
}

fn ip_frame(src: EthernetAddress, fill: u8, len: usize) -> Packet {
    let eth = EthernetRepr {
        src_addr: src,
        dst_addr: PEER_MAC,
        ethertype: EthernetProtocol::Ipv4,
    };
    let mut buf = vec![fill; len];
    eth.emit(&mut EthernetFrame::new_unchecked(&mut buf[..]));
    Arc::new(PacketBuffer::from_slice(&buf))
}

#[inline]
fn to_std(period: MicrosDurationU32) -> Duration {
    Duration::from_micros(period.to_micros().into())
}

/// Fire `expired` once per period while the alarm is running.
fn run_alarm(alarm: &SimAlarm, done: &AtomicBool, expired: impl Fn()) {
    let mut deadline = None;
    while !done.load(Ordering::Relaxed) {
        match (alarm.running_period(), deadline) {
            (None, _) => deadline = None,
            (Some(period), None) => deadline = Some(Instant::now() + to_std(period)),
            (Some(period), Some(at)) if Instant::now() >= at => {
                expired();
                deadline = Some(at + to_std(period));
            }
            _ => (),
        }
        thread::sleep(POLL);
    }
}

/// Send everything the adapter posted and feed it back into the receiver.
fn run_wire(sim: &SimSmap, done: &AtomicBool) {
    while !done.load(Ordering::Relaxed) {
        sim.complete_tx(BD_COUNT);
        for frame in sim.take_transmitted() {
            log::trace!("wire: {} bytes", frame.len());
            if !sim.inject_frame(&frame) {
                log::warn!("RX descriptors exhausted, frame lost on the wire");
            }
        }
        thread::sleep(POLL);
    }
}

/// Raise the platform interrupt while an enabled cause is pending.
fn run_irq_line(sim: &SimSmap, shared: &Shared<StdEventFlags>, done: &AtomicBool) {
    let mut regs = sim.clone();
    while !done.load(Ordering::Relaxed) {
        if sim.irq_pending() {
            dispatch::on_interrupt(&mut regs, shared.events());
        }
        thread::sleep(POLL);
    }
}

fn main() -> ExitCode {
    if let Err(e) = SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("logger setup failed: {e}");
    }
    let cli = Cli::parse();
    let net = match NetConfig::from_args(&cli.addresses) {
        Ok(net) => net,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(e.code() as u8);
        }
    };

    let sim = SimSmap::new();
    let config = DriverConfig::default();
    let mut device = sim.device(config);
    let mac = match device.reset() {
        Ok(mac) => EthernetAddress(mac),
        Err(e) => {
            log::error!("SMAP reset failed: {e}");
            return ExitCode::from(e.code() as u8);
        }
    };
    log::info!(
        "interface {} netmask {} gateway {}",
        net.address,
        net.netmask,
        net.gateway
    );

    let shared = Shared::new(
        StdEventFlags::new(),
        StdEventFlags::new(),
        config.tx_queue_limit,
    );
    let link_alarm = SimAlarm::new();
    let arp_alarm = SimAlarm::new();
    let done = AtomicBool::new(false);
    let stack = LoopbackStack {
        mac,
        net,
        stats: Stats::default(),
    };

    let (ready, stats) = thread::scope(|s| {
        let shared = &shared;
        let sim = &sim;
        let done = &done;
        let dispatch = s.spawn({
            let alarm = link_alarm.clone();
            move || EventLoop::new(device, shared, alarm).run()
        });
        let bridge = s.spawn({
            let alarm = arp_alarm.clone();
            move || {
                let mut bridge = Bridge::new(shared, stack, alarm, BridgeConfig::default());
                bridge.run();
                bridge.stack().stats
            }
        });
        s.spawn(|| run_irq_line(sim, shared, done));
        s.spawn(|| run_wire(sim, done));
        s.spawn(|| run_alarm(&link_alarm, done, || dispatch::on_alarm(shared.events())));
        s.spawn(|| {
            run_alarm(&arp_alarm, done, || {
                bridge::on_arp_timer(shared.bridge_events())
            })
        });

        let handle = shared.handle();
        handle.start();
        let started = Instant::now();
        while !shared.is_initialized() && started.elapsed() < INIT_TIMEOUT {
            thread::sleep(POLL);
        }
        let ready = shared.is_initialized();
        if ready {
            let request = ArpRepr::EthernetIpv4 {
                operation: ArpOperation::Request,
                source_hardware_addr: PEER_MAC,
                source_protocol_addr: net.gateway,
                target_hardware_addr: EthernetAddress([0; 6]),
                target_protocol_addr: net.address,
            };
            let frame = arp_frame(PEER_MAC, EthernetAddress::BROADCAST, &request);
            sim.inject_frame(&frame.to_vec());
            for seq in 0..cli.frames {
                let frame = ip_frame(mac, seq as u8, cli.length.into());
                if handle.transmit(&frame).is_err() {
                    log::warn!("frame {seq} was not queued");
                }
            }
            thread::sleep(SETTLE);
        } else {
            log::error!("device did not come up within {INIT_TIMEOUT:?}");
        }

        handle.stop();
        if dispatch.join().is_err() {
            log::error!("dispatch thread panicked");
        }
        let stats = bridge.join().unwrap_or_default();
        done.store(true, Ordering::Relaxed);
        (ready, stats)
    });

    log::info!(
        "{} of {} IPv4 frames looped back, {} ARP replies, {} ARP ticks",
        stats.ip_frames,
        cli.frames,
        stats.arp_replies,
        stats.arp_ticks
    );
    if ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
