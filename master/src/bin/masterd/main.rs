use std::io::stderr;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use common::obs::assemble_logger;
use common::time::MonotonicClock;
use master::{Master, Outbound};
use slog::{error, info, warn};
use tokio::net::UdpSocket;
use whts::{CodecConfig, Packet, ProtocolCodec};

#[tokio::main]
async fn main() -> Result<()> {
	let matches = Command::new("masterd")
		.version("0.1.0")
		.about("WHTS master gateway between the backend and the slave population")
		.arg(
			Arg::new("listen-port")
				.default_value("8080")
				.long("listen-port")
				.short('l')
				.num_args(1)
				.help("UDP port to receive backend and slave traffic on"),
		)
		.arg(
			Arg::new("backend-addr")
				.default_value("127.0.0.1:8079")
				.long("backend-addr")
				.short('b')
				.num_args(1)
				.help("Address backend responses and forwarded data go to"),
		)
		.arg(
			Arg::new("slave-broadcast-addr")
				.default_value("127.255.255.255:8081")
				.long("slave-broadcast-addr")
				.short('s')
				.num_args(1)
				.help("Broadcast address slave commands are sent to"),
		)
		.arg(
			Arg::new("mtu")
				.default_value("100")
				.long("mtu")
				.num_args(1)
				.help("Maximum frame size before fragmentation"),
		)
		.arg(
			Arg::new("max-receive-buffer")
				.default_value("4096")
				.long("max-receive-buffer")
				.num_args(1)
				.help("Reassembly input buffer cap in bytes"),
		)
		.arg(
			Arg::new("fragment-timeout-ms")
				.default_value("5000")
				.long("fragment-timeout-ms")
				.num_args(1)
				.help("How long a partial fragment group is kept"),
		)
		.arg(
			Arg::new("cycle-interval-ms")
				.default_value("5000")
				.long("cycle-interval-ms")
				.num_args(1)
				.help("Minimum gap between collection cycle starts"),
		)
		.get_matches();

	let logger = assemble_logger(stderr());

	let listen_port: u16 = matches.get_one::<String>("listen-port").unwrap().parse()?;
	let backend_addr: SocketAddr = matches.get_one::<String>("backend-addr").unwrap().parse()?;
	let slave_addr: SocketAddr = matches
		.get_one::<String>("slave-broadcast-addr")
		.unwrap()
		.parse()?;
	let mtu: usize = matches.get_one::<String>("mtu").unwrap().parse()?;
	if mtu <= whts::FRAME_HEADER_SIZE {
		return Err(anyhow!("mtu must be larger than the 7-byte frame header"));
	}
	let max_receive_buffer: usize = matches.get_one::<String>("max-receive-buffer").unwrap().parse()?;
	let fragment_timeout_ms: u32 = matches.get_one::<String>("fragment-timeout-ms").unwrap().parse()?;
	let cycle_interval_ms: u32 = matches.get_one::<String>("cycle-interval-ms").unwrap().parse()?;
	let codec_config = CodecConfig {
		mtu,
		max_receive_buffer,
		fragment_timeout_ms,
	};

	let socket = UdpSocket::bind(("0.0.0.0", listen_port)).await?;
	// The broadcast channel stands in for the wireless downlink.
	socket.set_broadcast(true)?;

	info!(logger, "Master gateway listening";
		"port" => listen_port,
		"backend" => backend_addr.to_string(),
		"slave_broadcast" => slave_addr.to_string());

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(logger, "Shutting down");
			Ok(())
		}
		result = run(logger.clone(), socket, backend_addr, slave_addr, codec_config, cycle_interval_ms) => {
			if let Err(ref e) = result {
				error!(logger, "Gateway loop failed"; "error" => e.to_string());
			}
			result
		}
	}
}

async fn run(
	logger: slog::Logger,
	socket: UdpSocket,
	backend_addr: SocketAddr,
	slave_addr: SocketAddr,
	codec_config: CodecConfig,
	cycle_interval_ms: u32,
) -> Result<()> {
	let clock = MonotonicClock::new();
	let mut codec = ProtocolCodec::with_config(codec_config);
	let mut master = Master::new(logger.clone(), cycle_interval_ms);

	let mut buf = [0u8; 2048];
	loop {
		let outbound = master.tick(clock.now_ms());
		dispatch(&logger, &socket, &codec, outbound, backend_addr, slave_addr).await;

		let received =
			match tokio::time::timeout(Duration::from_millis(10), socket.recv_from(&mut buf)).await {
				Ok(Ok((len, _sender))) => len,
				Ok(Err(e)) => {
					error!(logger, "Receive failed"; "error" => e.to_string());
					continue;
				}
				Err(_) => continue,
			};

		codec.push_bytes(&buf[..received], clock.now_ms());
		while let Some(frame) = codec.next_frame() {
			let packet = match Packet::decode(&frame) {
				Ok(packet) => packet,
				Err(e) => {
					warn!(logger, "Dropping undecodable frame"; "error" => e.to_string());
					continue;
				}
			};

			let now_ms = clock.now_ms();
			let outbound = match packet {
				Packet::BackendToMaster { message } => master.handle_backend(&message, now_ms),
				Packet::SlaveToMaster { slave_id, message } => {
					master.handle_slave(slave_id, &message, now_ms)
				}
				Packet::SlaveToBackend { slave_id, device_status, message } => {
					master.handle_slave_data(slave_id, device_status, &message, now_ms)
				}
				other => {
					warn!(logger, "Unsupported packet direction";
						"packet_id" => u8::from(&other.packet_id()));
					Vec::new()
				}
			};

			dispatch(&logger, &socket, &codec, outbound, backend_addr, slave_addr).await;
		}
	}
}

async fn dispatch(
	logger: &slog::Logger,
	socket: &UdpSocket,
	codec: &ProtocolCodec,
	outbound: Vec<Outbound>,
	backend_addr: SocketAddr,
	slave_addr: SocketAddr,
) {
	for item in outbound {
		let (packet, target) = match item {
			Outbound::ToSlave { destination_id, message } => (
				Packet::MasterToSlave { destination_id, message },
				slave_addr,
			),
			Outbound::ToBackend(message) => (Packet::MasterToBackend { message }, backend_addr),
			Outbound::Forward { slave_id, device_status, message } => (
				Packet::SlaveToBackend { slave_id, device_status, message },
				backend_addr,
			),
		};

		let frames = match codec.encode_packet(&packet) {
			Ok(frames) => frames,
			Err(e) => {
				error!(logger, "Failed to encode packet"; "error" => e.to_string());
				continue;
			}
		};

		for frame in frames {
			if let Err(e) = socket.send_to(&frame, target).await {
				error!(logger, "Failed to send frame"; "error" => e.to_string());
			}
		}
	}
}
