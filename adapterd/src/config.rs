//! The TOML schema `adapterd` boots a device from: network/identity fields
//! plus the static connection-point expectations that would otherwise need
//! a bespoke bootstrap call per connection point.

use std::net::Ipv4Addr;

use serde::Deserialize;

fn default_tcp_port() -> u16 {
	0xAF12
}

fn default_io_port() -> u16 {
	0x08AE
}

fn default_tick_usecs() -> u32 {
	10_000
}

fn default_session_capacity() -> usize {
	64
}

fn default_delay_capacity() -> usize {
	64
}

/// The device's network identity: address, mask, and the optional
/// host/domain names `SetHostName`/`SetDomainName` attribute reads return.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NetworkConfig {
	pub ip: Ipv4Addr,
	pub netmask: Ipv4Addr,
	pub gateway: Option<Ipv4Addr>,
	#[serde(default)]
	pub host_name: String,
	#[serde(default)]
	pub domain_name: String,
	#[serde(default)]
	pub mac_address: Option<String>,
	#[serde(default = "default_tcp_port")]
	pub tcp_port: u16,
	#[serde(default = "default_io_port")]
	pub io_port: u16,
}

/// The Identity object's electronic-key fields plus the handful of extra
/// attributes ListIdentity and attribute reads expose.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IdentityConfig {
	pub vendor_id: u16,
	pub device_type: u16,
	pub product_code: u16,
	pub major_revision: u8,
	pub minor_revision: u8,
	pub product_name: String,
	pub serial_number: u32,
	#[serde(default)]
	pub status: u16,
	#[serde(default)]
	pub state: u8,
}

/// One connection point to pre-configure at startup, matching one of the
/// three `Configure*ConnectionPoint` bootstrap calls.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionPointConfig {
	/// `exclusive_owner`, `input_only`, or `listen_only`.
	pub kind: String,
	pub output_assembly: Option<u32>,
	pub input_assembly: Option<u32>,
	pub config_assembly: Option<u32>,
	/// Concurrent connection slots; ignored (always 1) for `exclusive_owner`.
	#[serde(default = "default_capacity")]
	pub capacity: usize,
}

fn default_capacity() -> usize {
	1
}

/// One Assembly instance to create at startup, with its initial buffer
/// contents (zero-filled to `size` if `initial_data` is shorter).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
	pub instance: u32,
	pub size: usize,
	#[serde(default)]
	pub initial_data: Vec<u8>,
}

/// The root config file `adapterd` loads at startup.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AdapterConfig {
	pub network: NetworkConfig,
	pub identity: IdentityConfig,
	#[serde(default = "default_tick_usecs")]
	pub tick_usecs: u32,
	#[serde(default = "default_session_capacity")]
	pub session_capacity: usize,
	#[serde(default = "default_delay_capacity")]
	pub delay_capacity: usize,
	#[serde(default)]
	pub assemblies: Vec<AssemblyConfig>,
	#[serde(default)]
	pub connection_points: Vec<ConnectionPointConfig>,
}

impl AdapterConfig {
	pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
		toml::from_str(&text).map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))
	}
}
