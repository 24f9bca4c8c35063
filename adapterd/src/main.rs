mod config;

use std::cell::RefCell;
use std::io::stderr;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Arg, Command};
use cip_connmgr::ConnectionPoint;
use cip_core::{CipContext, DeviceConfig, NetLoop};
use cip_epath::DeviceIdentity;
use cip_object::{ApplicationHooks, ConnectionHandle, GeneralStatus, IoConnectionEvent};
use common::obs::assemble_logger;
use config::{AdapterConfig, ConnectionPointConfig};
use slog::{error, info, o, warn};

/// Logs every integrator-facing hook call instead of acting on it; the
/// generic binary has no device-specific application logic of its own, just
/// the Assembly buffers the config wires up.
struct LoggingHooks {
	logger: slog::Logger,
}

impl ApplicationHooks for LoggingHooks {
	fn after_assembly_data_received(&mut self, instance: u32) -> Result<(), GeneralStatus> {
		slog::debug!(self.logger, "assembly data received"; "instance" => instance);
		Ok(())
	}

	fn before_assembly_data_send(&mut self, _instance: u32) -> bool {
		true
	}

	fn run_idle_changed(&mut self, connection: ConnectionHandle, is_running: bool) {
		info!(self.logger, "run/idle changed"; "connection" => connection.0, "running" => is_running);
	}

	fn notify_io_connection_event(&mut self, connection: ConnectionHandle, event: IoConnectionEvent) {
		info!(self.logger, "connection event"; "connection" => connection.0, "event" => format!("{:?}", event));
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	let matches = Command::new("adapterd")
		.version("0.1.0")
		.about("An EtherNet/IP adapter (target) device")
		.arg(Arg::new("config").long("config").num_args(1).default_value("/etc/adapterd/adapter.toml").help("The path to the TOML configuration file"))
		.arg(Arg::new("serial").long("serial").num_args(1).help("Overrides the configured device serial number"))
		.arg(Arg::new("product-name").long("product-name").num_args(1).help("Overrides the configured product name"))
		.get_matches();

	let logger = assemble_logger(stderr());

	let config_path: &String = matches.get_one("config").unwrap();
	let mut config = match AdapterConfig::load(std::path::Path::new(config_path)) {
		Ok(c) => c,
		Err(e) => {
			error!(logger, "failed to load configuration"; "path" => config_path, "error" => format!("{}", e));
			return ExitCode::FAILURE;
		}
	};

	if let Some(serial) = matches.get_one::<String>("serial") {
		match serial.parse() {
			Ok(v) => config.identity.serial_number = v,
			Err(_) => {
				error!(logger, "invalid --serial value"; "value" => serial);
				return ExitCode::FAILURE;
			}
		}
	}
	if let Some(name) = matches.get_one::<String>("product-name") {
		config.identity.product_name = name.clone();
	}

	if let Err(e) = run(config, logger.clone()).await {
		error!(logger, "adapter exited with error"; "error" => format!("{:#}", e));
		return ExitCode::FAILURE;
	}

	ExitCode::SUCCESS
}

async fn run(config: AdapterConfig, logger: slog::Logger) -> anyhow::Result<()> {
	let device = DeviceConfig {
		identity: DeviceIdentity {
			vendor_id: config.identity.vendor_id,
			device_type: config.identity.device_type,
			product_code: config.identity.product_code,
			major_revision: config.identity.major_revision,
			minor_revision: config.identity.minor_revision,
		},
		serial_number: config.identity.serial_number,
		product_name: config.identity.product_name.clone(),
		status: config.identity.status,
		state: config.identity.state,
		device_ip: config.network.ip,
		tcp_port: config.network.tcp_port,
	};

	let hooks: Rc<RefCell<dyn ApplicationHooks>> = Rc::new(RefCell::new(LoggingHooks { logger: logger.new(o!("component" => "hooks")) }));

	let mut ctx = CipContext::new(device, config.network.netmask, 1, config.session_capacity, config.delay_capacity, config.tick_usecs, hooks, logger.new(o!("component" => "cip-core")));

	for assembly in &config.assemblies {
		let mut initial = assembly.initial_data.clone();
		initial.resize(assembly.size, 0);
		ctx.create_assembly_instance(assembly.instance, initial);
	}

	for point in &config.connection_points {
		if let Err(e) = configure_connection_point(&mut ctx, point) {
			warn!(logger, "skipping invalid connection point"; "kind" => &point.kind, "error" => e);
		}
	}

	info!(logger, "starting adapter";
		"ip" => config.network.ip.to_string(),
		"tcp_port" => config.network.tcp_port,
		"io_port" => config.network.io_port,
		"tick_usecs" => config.tick_usecs,
	);

	let mut net_loop = NetLoop::bind(config.network.ip, config.network.netmask, config.tick_usecs, config.network.tcp_port, config.network.io_port).await?;
	net_loop.run(&mut ctx).await?;
	Ok(())
}

fn configure_connection_point(ctx: &mut CipContext, point: &ConnectionPointConfig) -> Result<(), &'static str> {
	let connection_point = ConnectionPoint {
		consuming_assembly: point.output_assembly,
		producing_assembly: point.input_assembly,
		config_assembly: point.config_assembly,
	};

	match point.kind.as_str() {
		"exclusive_owner" => ctx.configure_exclusive_owner(connection_point),
		"input_only" => ctx.configure_input_only(connection_point, point.capacity),
		"listen_only" => ctx.configure_listen_only(connection_point, point.capacity),
		_ => return Err("kind must be one of exclusive_owner/input_only/listen_only"),
	}

	Ok(())
}
