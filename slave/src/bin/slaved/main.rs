use std::io::stderr;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use common::obs::assemble_logger;
use common::time::MonotonicClock;
use slave::gpio::VirtualGpio;
use slave::{Reply, SlaveDevice};
use slog::{error, info, warn};
use tokio::net::UdpSocket;
use whts::{CodecConfig, Packet, ProtocolCodec};

#[tokio::main]
async fn main() -> Result<()> {
	let matches = Command::new("slaved")
		.version("0.1.0")
		.about("WHTS slave measurement device")
		.arg(
			Arg::new("device-id")
				.long("device-id")
				.short('i')
				.required(true)
				.num_args(1)
				.help("32-bit device id, decimal or 0x-prefixed hex"),
		)
		.arg(
			Arg::new("listen-port")
				.default_value("8081")
				.long("listen-port")
				.short('l')
				.num_args(1)
				.help("UDP port to receive master broadcasts on"),
		)
		.arg(
			Arg::new("master-addr")
				.default_value("127.0.0.1:8080")
				.long("master-addr")
				.short('m')
				.num_args(1)
				.help("Address replies are unicast to"),
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
		.get_matches();

	let logger = assemble_logger(stderr());

	let device_id = parse_device_id(matches.get_one::<String>("device-id").unwrap())?;
	let listen_port: u16 = matches.get_one::<String>("listen-port").unwrap().parse()?;
	let master_addr: SocketAddr = matches.get_one::<String>("master-addr").unwrap().parse()?;
	let mtu: usize = matches.get_one::<String>("mtu").unwrap().parse()?;
	if mtu <= whts::FRAME_HEADER_SIZE {
		return Err(anyhow!("mtu must be larger than the 7-byte frame header"));
	}
	let max_receive_buffer: usize = matches.get_one::<String>("max-receive-buffer").unwrap().parse()?;
	let fragment_timeout_ms: u32 = matches.get_one::<String>("fragment-timeout-ms").unwrap().parse()?;
	let codec_config = CodecConfig {
		mtu,
		max_receive_buffer,
		fragment_timeout_ms,
	};

	let socket = UdpSocket::bind(("0.0.0.0", listen_port)).await?;
	info!(logger, "Slave device listening";
		"device_id" => format!("{:#010X}", device_id),
		"port" => listen_port,
		"master" => master_addr.to_string());

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(logger, "Shutting down");
			Ok(())
		}
		result = run(logger.clone(), socket, device_id, master_addr, codec_config) => {
			if let Err(ref e) = result {
				error!(logger, "Device loop failed"; "error" => e.to_string());
			}
			result
		}
	}
}

fn parse_device_id(raw: &str) -> Result<u32> {
	let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
		u32::from_str_radix(hex, 16)
	} else {
		raw.parse()
	};

	parsed.map_err(|_| anyhow!("invalid device id: {}", raw))
}

async fn run(
	logger: slog::Logger,
	socket: UdpSocket,
	device_id: u32,
	master_addr: SocketAddr,
	codec_config: CodecConfig,
) -> Result<()> {
	let clock = MonotonicClock::new();
	let mut codec = ProtocolCodec::with_config(codec_config);
	let mut device = SlaveDevice::new(device_id, VirtualGpio::with_loopback());

	// Announce so the master registers us and assigns a short id.
	let announce = Packet::SlaveToMaster {
		slave_id: device_id,
		message: device.announce(),
	};
	send_packet(&logger, &socket, &codec, &announce, master_addr).await;

	let mut buf = [0u8; 2048];
	loop {
		device.poll(clock.now_ms());

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

			let Packet::MasterToSlave { destination_id, message } = packet else {
				warn!(logger, "Unsupported packet direction"; "packet_id" => frame.packet_id);
				continue;
			};

			if let Some(reply) = device.handle_message(destination_id, &message, clock.now_ms()) {
				let packet = match reply {
					Reply::ToMaster(message) => Packet::SlaveToMaster {
						slave_id: device_id,
						message,
					},
					Reply::ToBackend(message) => Packet::SlaveToBackend {
						slave_id: device_id,
						device_status: device.device_status(),
						message,
					},
				};
				send_packet(&logger, &socket, &codec, &packet, master_addr).await;
			}
		}
	}
}

async fn send_packet(
	logger: &slog::Logger,
	socket: &UdpSocket,
	codec: &ProtocolCodec,
	packet: &Packet,
	target: SocketAddr,
) {
	let frames = match codec.encode_packet(packet) {
		Ok(frames) => frames,
		Err(e) => {
			error!(logger, "Failed to encode packet"; "error" => e.to_string());
			return;
		}
	};

	for frame in frames {
		if let Err(e) = socket.send_to(&frame, target).await {
			error!(logger, "Failed to send frame"; "error" => e.to_string());
		}
	}
}
