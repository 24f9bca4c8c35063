use crate::status::GeneralStatus;

/// A lightweight handle identifying an I/O connection to the application,
/// independent of whatever arena index `cip-connmgr`/`cip-ioconn` use
/// internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u32);

/// The lifecycle events `NotifyIoConnectionEvent` reports (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoConnectionEvent {
	Opened,
	TimedOut,
	Closed,
}

/// Everything the core calls into the integrator for (§6 "Core calls into
/// the collaborator"). Held as `Box<dyn ApplicationHooks>` inside
/// `cip-core`'s `CipContext`, mirroring the teacher stack's
/// `Action`/`ActionFactory` trait-object collaborator pattern.
pub trait ApplicationHooks {
	/// Called after an assembly's attribute 3 has been overwritten by an
	/// explicit `SetAttributeSingle` or an accepted I/O frame. Returning an
	/// error status causes the explicit path to reply `InvalidAttributeValue`;
	/// on the implicit path the frame is still accepted (the sequence number
	/// still advances) but the failure is reported to the integrator.
	fn after_assembly_data_received(&mut self, instance: u32) -> Result<(), GeneralStatus>;

	/// Called before serving a producing assembly's bytes onto the wire.
	/// The return value tells the class-1 path whether to bump
	/// `sequence_count_producing`.
	fn before_assembly_data_send(&mut self, instance: u32) -> bool;

	/// Called when a connection's Run/Idle header bit changes value.
	fn run_idle_changed(&mut self, connection: ConnectionHandle, is_running: bool);

	fn notify_io_connection_event(&mut self, connection: ConnectionHandle, event: IoConnectionEvent);
}

/// A no-op implementation, useful for unit tests that don't exercise the
/// application-facing hooks.
#[derive(Default)]
pub struct NullHooks;

impl ApplicationHooks for NullHooks {
	fn after_assembly_data_received(&mut self, _instance: u32) -> Result<(), GeneralStatus> {
		Ok(())
	}

	fn before_assembly_data_send(&mut self, _instance: u32) -> bool {
		true
	}

	fn run_idle_changed(&mut self, _connection: ConnectionHandle, _is_running: bool) {}

	fn notify_io_connection_event(&mut self, _connection: ConnectionHandle, _event: IoConnectionEvent) {}
}
