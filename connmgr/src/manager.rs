use std::cell::RefCell;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::rc::Rc;

use cip_codec::ByteWriter;
use cip_epath::DeviceIdentity;
use cip_object::{Class, ConnMgrStatus, CipStatus, GeneralStatus, Instance, ObjectModel, Service, ServiceReply, ServiceRequest};

use crate::connection::{ActiveConnections, Connection, ConnectionIdAllocator, ConnectionState};
use crate::expectation::{ConnectionPoint, ExpectationKind, ExpectationPool};
use crate::forward_open::{parse_forward_open, ConnectionData, ForwardOpenParseError};
use crate::ncp::ConnectionType;
use crate::triad::ConnectionTriad;

/// The Connection Manager class id (Vol1 Table C-1.1).
pub const CONN_MGR_CLASS_ID: u16 = 0x06;
const SVC_FORWARD_OPEN: u8 = 0x54;
const SVC_FORWARD_CLOSE: u8 = 0x4E;

/// A registry of the live assembly attribute-3 buffers, keyed by instance
/// id. `cip-core` shares the same [`std::rc::Rc`] it hands to
/// [`cip_object::build_assembly_instance`] here, so the Connection Manager
/// can validate connection sizes and write config data without reaching
/// back into the [`ObjectModel`] (a service closure only ever sees its own
/// class's instance, per `cip-object`'s design).
#[derive(Clone, Default)]
pub struct AssemblyBuffers {
	buffers: Rc<RefCell<BTreeMap<u32, Rc<RefCell<Vec<u8>>>>>>,
}

impl AssemblyBuffers {
	pub fn new() -> Self {
		AssemblyBuffers::default()
	}

	pub fn register(&self, instance_id: u32, buffer: Rc<RefCell<Vec<u8>>>) {
		self.buffers.borrow_mut().insert(instance_id, buffer);
	}

	pub fn len_of(&self, instance_id: u32) -> Option<usize> {
		self.buffers.borrow().get(&instance_id).map(|b| b.borrow().len())
	}

	pub fn write(&self, instance_id: u32, data: &[u8]) -> bool {
		match self.buffers.borrow().get(&instance_id) {
			Some(buffer) => {
				*buffer.borrow_mut() = data.to_vec();
				true
			}
			None => false,
		}
	}

	pub fn read(&self, instance_id: u32) -> Option<Vec<u8>> {
		self.buffers.borrow().get(&instance_id).map(|b| b.borrow().clone())
	}
}

/// All of the Connection Manager's process-wide state (§4.9), shared
/// between the registered `Forward_Open`/`Forward_Close` services and
/// `cip-core`'s tick handler.
pub struct ConnMgrState {
	pub device: DeviceIdentity,
	pub expectations: ExpectationPool,
	pub active: ActiveConnections,
	pub allocator: ConnectionIdAllocator,
	pub assemblies: AssemblyBuffers,
	/// Whether producing class-1 connections prefix their data with a
	/// 32-bit Run/Idle header, subtracted from the requested connection
	/// size during size validation (§4.9 "Size validation").
	pub run_idle_header_enabled: bool,
	pub logger: slog::Logger,
}

impl ConnMgrState {
	pub fn new(device: DeviceIdentity, incarnation_id: u16, assemblies: AssemblyBuffers, logger: slog::Logger) -> Self {
		ConnMgrState {
			device,
			expectations: ExpectationPool::new(),
			active: ActiveConnections::new(),
			allocator: ConnectionIdAllocator::new(incarnation_id),
			assemblies,
			run_idle_header_enabled: true,
			logger,
		}
	}
}

/// The accepted half of a Forward_Open: what the reply needs plus the
/// handle `cip-core` uses to drive socket setup and the
/// Configuring→Established transition.
pub struct ForwardOpenAccept {
	pub handle: cip_object::ConnectionHandle,
	pub o_to_t_connection_id: u32,
	pub t_to_o_connection_id: u32,
	pub o_to_t_api_usecs: u32,
	pub t_to_o_api_usecs: u32,
	pub triad: ConnectionTriad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct AssignedPaths {
	config: Option<u32>,
	consuming: Option<u32>,
	producing: Option<u32>,
}

/// Vol1 Table 3-5.13: resolves the one to three Application Paths a
/// Forward_Open carries into config/consuming/producing assembly ids,
/// keyed on which directions are Null and whether a Data (config) segment
/// is present.
fn assign_paths(o_to_t_null: bool, t_to_o_null: bool, has_config_data: bool, paths: &[cip_epath::ApplicationPath]) -> Option<AssignedPaths> {
	let inst = |p: &cip_epath::ApplicationPath| p.instance;
	match (o_to_t_null, t_to_o_null, has_config_data, paths.len()) {
		(true, true, true, 1) => Some(AssignedPaths { config: inst(&paths[0]), ..Default::default() }),
		(true, true, false, 1) => Some(AssignedPaths { consuming: inst(&paths[0]), ..Default::default() }),
		(false, true, true, 1) => Some(AssignedPaths {
			config: inst(&paths[0]),
			consuming: inst(&paths[0]),
			..Default::default()
		}),
		(false, true, true, 2) => Some(AssignedPaths {
			config: inst(&paths[0]),
			consuming: inst(&paths[1]),
			..Default::default()
		}),
		(false, true, false, 1) => Some(AssignedPaths { consuming: inst(&paths[0]), ..Default::default() }),
		(true, false, true, 1) => Some(AssignedPaths {
			config: inst(&paths[0]),
			producing: inst(&paths[0]),
			..Default::default()
		}),
		(true, false, true, 2) => Some(AssignedPaths {
			config: inst(&paths[0]),
			producing: inst(&paths[1]),
			..Default::default()
		}),
		(true, false, false, 1) => Some(AssignedPaths { producing: inst(&paths[0]), ..Default::default() }),
		(false, false, true, 1) => Some(AssignedPaths {
			config: inst(&paths[0]),
			consuming: inst(&paths[0]),
			producing: inst(&paths[0]),
		}),
		(false, false, true, 2) => Some(AssignedPaths {
			config: inst(&paths[0]),
			consuming: inst(&paths[1]),
			producing: inst(&paths[1]),
		}),
		(false, false, true, 3) => Some(AssignedPaths {
			config: inst(&paths[0]),
			consuming: inst(&paths[1]),
			producing: inst(&paths[2]),
		}),
		(false, false, false, 1) => Some(AssignedPaths {
			consuming: inst(&paths[0]),
			producing: inst(&paths[0]),
			..Default::default()
		}),
		(false, false, false, 2) => Some(AssignedPaths {
			consuming: inst(&paths[0]),
			producing: inst(&paths[1]),
			..Default::default()
		}),
		// Three paths with both directions non-Null and no config segment: the
		// first path is ignored outright (§9's resolved open question - its
		// class is not folded into the others).
		(false, false, false, 3) => Some(AssignedPaths {
			consuming: inst(&paths[1]),
			producing: inst(&paths[2]),
			..Default::default()
		}),
		_ => None,
	}
}

/// The matching procedure's outcome: which expectation slot a candidate
/// Forward_Open landed in.
struct Matched {
	kind: ExpectationKind,
	point: ConnectionPoint,
}

fn match_expectation(state: &ConnMgrState, assigned: AssignedPaths, t_to_o_connection_type: ConnectionType) -> Result<Matched, CipStatus> {
	if let Some(exp) = state
		.expectations
		.iter()
		.find(|e| e.kind == ExpectationKind::ExclusiveOwner && e.point.consuming_assembly == assigned.consuming && e.point.producing_assembly == assigned.producing && e.point.config_assembly == assigned.config)
	{
		if state.active.count_at(ExpectationKind::ExclusiveOwner, exp.point) > 0 {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::OwnershipConflict));
		}
		return Ok(Matched { kind: ExpectationKind::ExclusiveOwner, point: exp.point });
	}

	if let Some(exp) = state.expectations.iter().find(|e| e.kind == ExpectationKind::InputOnly && e.point.consuming_assembly == assigned.consuming) {
		if exp.point.producing_assembly != assigned.producing {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::InvalidProducingApplicationPath));
		}
		if exp.point.config_assembly != assigned.config {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::InconsistentApplicationPathCombo));
		}
		if state.active.count_at(ExpectationKind::InputOnly, exp.point) >= exp.capacity {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::TargetObjectOutOfConnections));
		}
		return Ok(Matched { kind: ExpectationKind::InputOnly, point: exp.point });
	}

	if let Some(exp) = state.expectations.iter().find(|e| e.kind == ExpectationKind::ListenOnly && e.point.producing_assembly == assigned.producing) {
		if t_to_o_connection_type != ConnectionType::Multicast {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::NonListenOnlyConnectionNotOpened));
		}
		if exp.point.consuming_assembly != assigned.consuming || exp.point.config_assembly != assigned.config {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::InconsistentApplicationPathCombo));
		}
		let has_producer = state.active.iter().any(|(_, c)| {
			matches!(c.kind, ExpectationKind::ExclusiveOwner | ExpectationKind::InputOnly) && c.point.producing_assembly == exp.point.producing_assembly && matches!(c.state, ConnectionState::Established)
		});
		if !has_producer {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::NonListenOnlyConnectionNotOpened));
		}
		if state.active.count_at(ExpectationKind::ListenOnly, exp.point) >= exp.capacity {
			return Err(CipStatus::conn_mgr(ConnMgrStatus::TargetObjectOutOfConnections));
		}
		return Ok(Matched { kind: ExpectationKind::ListenOnly, point: exp.point });
	}

	Err(CipStatus::conn_mgr(ConnMgrStatus::InconsistentApplicationPathCombo))
}

/// §4.9's size-validation header overhead: the class-1 sequence prefix plus
/// an optional Run/Idle header, subtracted from the requested connection
/// size before comparing it against the target assembly's length.
fn header_overhead(transport_class: u8, requested: u16, run_idle_enabled: bool) -> u16 {
	let mut overhead = 0u16;
	if transport_class == 1 {
		overhead += 2;
	}
	if run_idle_enabled && requested > 0 {
		overhead += 4;
	}
	overhead
}

/// Checks `requested` (the O→T/T→O connection size Forward_Open asked
/// for) against `assembly_len` once the header overhead is stripped off.
/// On mismatch returns the corrected wire-level size - `assembly_len` plus
/// the same overhead - the target would accept instead.
fn validate_connection_size(fixed: bool, requested: u16, assembly_len: usize, transport_class: u8, run_idle_enabled: bool) -> Result<(), u16> {
	let overhead = header_overhead(transport_class, requested, run_idle_enabled);
	let effective = requested.saturating_sub(overhead) as usize;
	let ok = if fixed { effective == assembly_len } else { effective <= assembly_len };
	if ok {
		Ok(())
	} else {
		Err(assembly_len as u16 + overhead)
	}
}

/// Runs the full §4.9 matching/validation procedure and, on success,
/// inserts a new `Configuring` [`Connection`] into the active set.
/// `cip-core` is responsible for the socket setup that follows: on success
/// it either transitions the connection to `Established` or removes it
/// again if socket setup fails.
pub fn handle_forward_open(state: &mut ConnMgrState, data: ConnectionData, originator_ip: IpAddr) -> Result<ForwardOpenAccept, CipStatus> {
	if state.active.find_by_triad(&data.triad).is_some() {
		return Err(CipStatus::conn_mgr(ConnMgrStatus::ConnectionInUse));
	}

	if let Some(key) = &data.path.electronic_key {
		key.check(&state.device).map_err(|mismatch| {
			let status = match mismatch {
				cip_epath::KeyMismatch::VendorOrProductCodeMismatch => ConnMgrStatus::VendorOrProductCodeMismatch,
				cip_epath::KeyMismatch::DeviceTypeMismatch => ConnMgrStatus::DeviceTypeMismatch,
				cip_epath::KeyMismatch::RevisionMismatch => ConnMgrStatus::RevisionMismatch,
			};
			CipStatus::conn_mgr(status)
		})?;
	}

	if data.timeout_multiplier > 7 {
		return Err(CipStatus::conn_mgr(ConnMgrStatus::InvalidNetworkConnectionParameter));
	}

	if data.pit_exceeds_rpi() {
		return Err(CipStatus::conn_mgr(ConnMgrStatus::PitGreaterThanRpi));
	}

	let o_to_t_null = data.o_to_t_ncp.connection_type == ConnectionType::Null;
	let t_to_o_null = data.t_to_o_ncp.connection_type == ConnectionType::Null;
	let assigned = assign_paths(o_to_t_null, t_to_o_null, data.path.config_data.is_some(), &data.path.application_paths)
		.ok_or_else(|| CipStatus::conn_mgr(ConnMgrStatus::InvalidSegmentTypeInPath))?;

	let matched = match_expectation(state, assigned, data.t_to_o_ncp.connection_type)?;

	if !o_to_t_null {
		if let Some(consuming) = assigned.consuming {
			if let Some(len) = state.assemblies.len_of(consuming) {
				let ncp = data.o_to_t_ncp;
				if let Err(corrected) = validate_connection_size(ncp.fixed, ncp.size, len, data.transport_trigger.transport_class, state.run_idle_header_enabled) {
					return Err(CipStatus::conn_mgr_with_extra(ConnMgrStatus::InvalidOToTConnectionSize, corrected));
				}
			}
		}
	}

	if !t_to_o_null {
		if let Some(producing) = assigned.producing {
			if let Some(len) = state.assemblies.len_of(producing) {
				let ncp = data.t_to_o_ncp;
				if let Err(corrected) = validate_connection_size(ncp.fixed, ncp.size, len, data.transport_trigger.transport_class, state.run_idle_header_enabled) {
					return Err(CipStatus::conn_mgr_with_extra(ConnMgrStatus::InvalidTToOConnectionSize, corrected));
				}
			}
		}
	}

	if let Some(config_data) = &data.path.config_data {
		if let Some(config_assembly) = assigned.config {
			let clashes_with_different_payload = state.active.iter().any(|(_, c)| c.point.config_assembly == Some(config_assembly) && state.assemblies.read(config_assembly).as_deref() != Some(config_data.as_slice()));
			if clashes_with_different_payload {
				return Err(CipStatus::conn_mgr(ConnMgrStatus::OwnershipConflict));
			}
			state.assemblies.write(config_assembly, config_data);
		}
	}

	let o_to_t_connection_id = if data.o_to_t_ncp.connection_type == ConnectionType::PointToPoint {
		state.allocator.next()
	} else {
		data.o_to_t_connection_id
	};
	let t_to_o_connection_id = if data.t_to_o_ncp.connection_type == ConnectionType::Multicast {
		state.allocator.next()
	} else {
		data.t_to_o_connection_id
	};

	let triad = data.triad;
	let o_to_t_api_usecs = data.o_to_t_rpi_usecs;
	let t_to_o_api_usecs = data.t_to_o_rpi_usecs;
	let watchdog = data.inactivity_watchdog_usecs();

	let connection = Connection {
		state: ConnectionState::Configuring,
		kind: matched.kind,
		point: matched.point,
		data,
		originator_ip,
		watchdog_remaining_usecs: watchdog,
	};
	let handle = state.active.insert(connection);

	Ok(ForwardOpenAccept {
		handle,
		o_to_t_connection_id,
		t_to_o_connection_id,
		o_to_t_api_usecs,
		t_to_o_api_usecs,
		triad,
	})
}

/// §4.9 Forward_Close: matches by triad alone, ignoring priority/timetick.
/// Moves the connection to `Closing` rather than removing it outright -
/// the multicast-takeover/cascade bookkeeping and the `Closed` hook live
/// in `cip-core`, which reconciles every `Closing` connection once this
/// service returns (see `CipContext::reconcile_closing_connections`).
pub fn handle_forward_close(state: &mut ConnMgrState, triad: ConnectionTriad) -> Result<cip_object::ConnectionHandle, CipStatus> {
	match state.active.find_by_triad(&triad) {
		Some(handle) => {
			if let Some(conn) = state.active.get_mut(handle) {
				conn.state = ConnectionState::Closing;
			}
			Ok(handle)
		}
		None => Err(CipStatus::conn_mgr(ConnMgrStatus::ConnectionNotFoundAtTargetApplication)),
	}
}

fn write_success_reply(accept: &ForwardOpenAccept) -> Vec<u8> {
	let mut buf = vec![0u8; 26];
	let mut w = ByteWriter::new(&mut buf);
	w.put32(accept.o_to_t_connection_id).ok();
	w.put32(accept.t_to_o_connection_id).ok();
	w.put16(accept.triad.connection_serial).ok();
	w.put16(accept.triad.originator_vendor_id).ok();
	w.put32(accept.triad.originator_serial).ok();
	w.put32(accept.o_to_t_api_usecs).ok();
	w.put32(accept.t_to_o_api_usecs).ok();
	w.put8(0).ok(); // application reply size, in words: none
	w.put8(0).ok(); // reserved
	buf
}

fn write_failure_reply(triad: &ConnectionTriad) -> Vec<u8> {
	let mut buf = vec![0u8; 10];
	let mut w = ByteWriter::new(&mut buf);
	w.put16(triad.connection_serial).ok();
	w.put16(triad.originator_vendor_id).ok();
	w.put32(triad.originator_serial).ok();
	w.put8(0).ok(); // remaining path size
	w.put8(0).ok(); // reserved
	buf
}

fn forward_open_service(_instance: &mut Instance, request: &ServiceRequest, reply: &mut ServiceReply, state: Rc<RefCell<ConnMgrState>>) -> CipStatus {
	let data = match parse_forward_open(&request.payload) {
		Ok(data) => data,
		Err(ForwardOpenParseError::InvalidTransportTrigger) => return CipStatus::conn_mgr(ConnMgrStatus::TransportTriggerNotSupported),
		Err(_) => return GeneralStatus::PathSegmentError.into(),
	};
	let triad = data.triad;
	let originator_ip = request.originator_ip.unwrap_or(IpAddr::from([0, 0, 0, 0]));

	let mut state = state.borrow_mut();
	match handle_forward_open(&mut state, data, originator_ip) {
		Ok(accept) => {
			reply.append(&write_success_reply(&accept));
			CipStatus::ok()
		}
		Err(status) => {
			reply.append(&write_failure_reply(&triad));
			status
		}
	}
}

fn forward_close_service(_instance: &mut Instance, request: &ServiceRequest, reply: &mut ServiceReply, state: Rc<RefCell<ConnMgrState>>) -> CipStatus {
	let mut r = cip_codec::ByteReader::new(&request.payload);
	let triad = match (r.get8(), r.get8(), r.get16(), r.get16(), r.get32()) {
		(Ok(_priority_timetick), Ok(_timeout_ticks), Ok(connection_serial), Ok(originator_vendor_id), Ok(originator_serial)) => ConnectionTriad {
			connection_serial,
			originator_vendor_id,
			originator_serial,
		},
		_ => return GeneralStatus::PathSegmentError.into(),
	};

	let mut state = state.borrow_mut();
	match handle_forward_close(&mut state, triad) {
		Ok(_handle) => CipStatus::ok(),
		Err(status) => {
			reply.append(&write_failure_reply(&triad));
			status
		}
	}
}

/// Registers the Connection Manager class (id 0x06) with its two services
/// against `model`, closing over `state` the way `cip-object`'s own
/// service-table design expects collaborators with state outside the
/// object model to (see `cip_object::Service`'s doc comment).
pub fn register(model: &mut ObjectModel, state: Rc<RefCell<ConnMgrState>>) {
	let mut class = Class::new(CONN_MGR_CLASS_ID, 1, "Connection Manager", 0);
	class.add_instance(Instance::new(1));

	let open_state = state.clone();
	class.add_service(Service::new(SVC_FORWARD_OPEN, move |instance, request, reply| forward_open_service(instance, request, reply, open_state.clone())));

	let close_state = state.clone();
	class.add_service(Service::new(SVC_FORWARD_CLOSE, move |instance, request, reply| forward_close_service(instance, request, reply, close_state.clone())));

	model.register_class(class);
}

#[cfg(test)]
mod test {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;

	fn sample_device() -> DeviceIdentity {
		DeviceIdentity {
			vendor_id: 0x42,
			device_type: 0x0C,
			product_code: 1,
			major_revision: 1,
			minor_revision: 1,
		}
	}

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	fn sample_request(path: &[u8]) -> Vec<u8> {
		let mut buf = vec![
			0x03, 0xFA, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x27, 0x42, 0x00, 0x01, 0x02, 0x03, 0x04, 0x03, 0, 0, 0, 0x40, 0x42, 0x0F, 0x00, 0x04, 0x20, 0x40, 0x42,
			0x0F, 0x00, 0x04, 0x20, 0x01,
		];
		buf.push((path.len() / 2) as u8);
		buf.extend_from_slice(path);
		buf
	}

	fn state_with_expectation() -> Rc<RefCell<ConnMgrState>> {
		let assemblies = AssemblyBuffers::new();
		assemblies.register(101, Rc::new(RefCell::new(vec![0u8; 4])));
		assemblies.register(102, Rc::new(RefCell::new(vec![0u8; 4])));
		let mut state = ConnMgrState::new(sample_device(), 0xBEEF, assemblies, logger());
		state.expectations.configure(
			ExpectationKind::ExclusiveOwner,
			ConnectionPoint {
				consuming_assembly: Some(101),
				producing_assembly: Some(102),
				config_assembly: None,
			},
			1,
		);
		Rc::new(RefCell::new(state))
	}

	#[test]
	fn accepts_a_matching_exclusive_owner_open() {
		let path = [0x20, 0x04, 0x24, 101, 0x2C, 102]; // class 4, instance 101, conn point 102
		let data = parse_forward_open(&sample_request(&path)).unwrap();
		let rc = state_with_expectation();
		let mut state = rc.borrow_mut();
		let accept = handle_forward_open(&mut state, data, "10.0.0.5".parse().unwrap()).unwrap();
		assert_eq!(accept.o_to_t_connection_id >> 16, 0xBEEF);
		assert_eq!(state.active.iter().count(), 1);
	}

	#[test]
	fn duplicate_triad_is_rejected_as_connection_in_use() {
		let path = [0x20, 0x04, 0x24, 101, 0x2C, 102];
		let rc = state_with_expectation();
		{
			let data = parse_forward_open(&sample_request(&path)).unwrap();
			let mut state = rc.borrow_mut();
			handle_forward_open(&mut state, data, "10.0.0.5".parse().unwrap()).unwrap();
		}
		let data = parse_forward_open(&sample_request(&path)).unwrap();
		let mut state = rc.borrow_mut();
		let err = handle_forward_open(&mut state, data, "10.0.0.5".parse().unwrap()).unwrap_err();
		assert_eq!(err, CipStatus::conn_mgr(ConnMgrStatus::ConnectionInUse));
	}

	#[test]
	fn unmatched_application_paths_yield_inconsistent_combo() {
		let path = [0x20, 0x04, 0x24, 55, 0x2C, 56];
		let data = parse_forward_open(&sample_request(&path)).unwrap();
		let rc = state_with_expectation();
		let mut state = rc.borrow_mut();
		let err = handle_forward_open(&mut state, data, "10.0.0.5".parse().unwrap()).unwrap_err();
		assert_eq!(err, CipStatus::conn_mgr(ConnMgrStatus::InconsistentApplicationPathCombo));
	}

	#[test]
	fn forward_close_marks_the_matching_connection_closing() {
		let path = [0x20, 0x04, 0x24, 101, 0x2C, 102];
		let rc = state_with_expectation();
		let triad;
		{
			let data = parse_forward_open(&sample_request(&path)).unwrap();
			triad = data.triad;
			let mut state = rc.borrow_mut();
			let accept = handle_forward_open(&mut state, data, "10.0.0.5".parse().unwrap()).unwrap();
			// cip-core promotes Configuring -> Established once socket setup
			// finishes; simulate that here since Forward_Close only matches
			// Established/TimedOut connections.
			state.active.get_mut(accept.handle).unwrap().state = ConnectionState::Established;
		}
		let mut state = rc.borrow_mut();
		let handle = handle_forward_close(&mut state, triad).unwrap();
		assert_eq!(state.active.get(handle).unwrap().state, ConnectionState::Closing);
		assert!(handle_forward_close(&mut state, triad).is_err());
	}
}
