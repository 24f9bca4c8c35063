/// A fixed-size table mapping a 32-bit session handle (`index + 1`) to the
/// TCP socket identifier that registered it, per §4.6.
///
/// `S` is left generic over whatever the caller uses to identify a TCP
/// connection (`adapterd` uses a `tokio::net::TcpStream`-keyed token); this
/// crate only needs equality to support `CheckRegisteredSession`/`CloseSocket`.
#[derive(Debug)]
pub struct SessionTable<S> {
	slots: Vec<Option<S>>,
}

impl<S: Copy + PartialEq> SessionTable<S> {
	pub fn new(capacity: usize) -> Self {
		SessionTable {
			slots: vec![None; capacity],
		}
	}

	/// Registers `socket` in the first free slot. Fails if `socket` already
	/// holds a session (duplicate RegisterSession on the same connection must
	/// be refused per §8's boundary behavior) or the table is full.
	pub fn register(&mut self, socket: S) -> Result<u32, RegisterError> {
		if let Some(existing) = self.find_handle(socket) {
			return Err(RegisterError::AlreadyRegistered(existing));
		}

		match self.slots.iter().position(|s| s.is_none()) {
			Some(index) => {
				self.slots[index] = Some(socket);
				Ok(index as u32 + 1)
			}
			None => Err(RegisterError::TableFull),
		}
	}

	pub fn find_handle(&self, socket: S) -> Option<u32> {
		self.slots
			.iter()
			.position(|s| *s == Some(socket))
			.map(|index| index as u32 + 1)
	}

	/// The predicate gating `SendRRData`/`SendUnitData`.
	pub fn is_registered(&self, handle: u32) -> bool {
		self.socket_for(handle).is_some()
	}

	pub fn socket_for(&self, handle: u32) -> Option<S> {
		handle
			.checked_sub(1)
			.and_then(|index| self.slots.get(index as usize).copied().flatten())
	}

	pub fn unregister(&mut self, handle: u32) -> Option<S> {
		let index = handle.checked_sub(1)? as usize;
		self.slots.get_mut(index).and_then(|slot| slot.take())
	}

	pub fn close_socket(&mut self, socket: S) -> Option<u32> {
		let handle = self.find_handle(socket)?;
		self.unregister(handle);
		Some(handle)
	}

	/// All sockets currently holding a session, used to close everything at
	/// shutdown.
	pub fn sockets(&self) -> impl Iterator<Item = S> + '_ {
		self.slots.iter().filter_map(|s| *s)
	}
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterError {
	AlreadyRegistered(u32),
	TableFull,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn registers_and_looks_up_handles() {
		let mut table: SessionTable<u32> = SessionTable::new(4);
		let handle = table.register(101).unwrap();
		assert_eq!(handle, 1);
		assert!(table.is_registered(handle));
		assert_eq!(table.socket_for(handle), Some(101));
	}

	#[test]
	fn duplicate_registration_is_refused() {
		let mut table: SessionTable<u32> = SessionTable::new(4);
		let handle = table.register(101).unwrap();
		assert_eq!(table.register(101), Err(RegisterError::AlreadyRegistered(handle)));
	}

	#[test]
	fn table_full_is_reported() {
		let mut table: SessionTable<u32> = SessionTable::new(1);
		table.register(1).unwrap();
		assert_eq!(table.register(2), Err(RegisterError::TableFull));
	}

	#[test]
	fn close_socket_frees_its_slot() {
		let mut table: SessionTable<u32> = SessionTable::new(2);
		let handle = table.register(5).unwrap();
		assert_eq!(table.close_socket(5), Some(handle));
		assert!(!table.is_registered(handle));
		// The slot is reusable afterwards.
		assert_eq!(table.register(5), Ok(handle));
	}
}
