use crate::instance::Instance;
use crate::status::CipStatus;

/// Common Services (Vol1 Table 4A-3) that every class supports unless a
/// class-specific service overrides the id.
pub const SVC_GET_ATTRIBUTE_ALL: u8 = 0x01;
pub const SVC_GET_ATTRIBUTE_SINGLE: u8 = 0x0E;
pub const SVC_SET_ATTRIBUTE_SINGLE: u8 = 0x10;

/// A deserialized message-router request, post-EPATH-resolution: class and
/// instance have already been resolved to a target by [`crate::registry::ObjectModel`];
/// `attribute` and `payload` are what the service closure needs to act.
pub struct ServiceRequest {
	pub class_id: u16,
	pub instance_id: u32,
	pub attribute: Option<u16>,
	pub payload: Vec<u8>,
	/// The sender's network address, when the transport that carried this
	/// request has one. Most services ignore it; the Connection Manager's
	/// Forward_Open needs it to bind a multicast/point-to-point producing
	/// socket to the right peer.
	pub originator_ip: Option<std::net::IpAddr>,
}

/// The service-specific payload a handler accumulates; the message-router
/// envelope (`reply_service`, status, additional-status) is added by
/// [`crate::registry::ObjectModel::notify_mr`] after the handler returns.
#[derive(Debug, Default)]
pub struct ServiceReply {
	pub payload: Vec<u8>,
}

impl ServiceReply {
	pub fn append(&mut self, bytes: &[u8]) {
		self.payload.extend_from_slice(bytes);
	}
}

/// One dispatchable CIP service: a 7-bit code (the reply sets the high bit)
/// paired with a closure. Collaborators that own mutable state outside the
/// object model - the Connection Manager's active connection set, for
/// Forward_Open/Forward_Close - close over an `Rc<RefCell<..>>` to reach it;
/// the single-threaded event loop means no further synchronization is
/// needed (§4.9's "attribute getter/setter closures" design note applies
/// equally here).
pub struct Service {
	pub service_id: u8,
	handler: Box<dyn FnMut(&mut Instance, &ServiceRequest, &mut ServiceReply) -> CipStatus>,
}

impl Service {
	pub fn new(service_id: u8, handler: impl FnMut(&mut Instance, &ServiceRequest, &mut ServiceReply) -> CipStatus + 'static) -> Self {
		Service {
			service_id,
			handler: Box::new(handler),
		}
	}

	pub fn invoke(&mut self, instance: &mut Instance, request: &ServiceRequest, reply: &mut ServiceReply) -> CipStatus {
		(self.handler)(instance, request, reply)
	}
}
