//! The CIP Class/Instance/Attribute/Service registry (§4.7) and the
//! Assembly object (§4.8) built on top of it. `cip-connmgr` and `cip-ioconn`
//! sit above this crate: they register their own classes/services here and
//! reach the same [`hooks::ApplicationHooks`] collaborator trait.

mod assembly;
mod attribute;
mod class;
mod hooks;
mod instance;
mod registry;
mod service;
mod status;
mod types;

pub use assembly::{before_send, build_assembly_instance, ASSEMBLY_ALL_MASK, ASSEMBLY_CLASS_ID};
pub use attribute::{Attribute, AttributeFlags, AttributeStorage};
pub use class::{get_attribute_all, Class};
pub use hooks::{ApplicationHooks, ConnectionHandle, IoConnectionEvent, NullHooks};
pub use instance::Instance;
pub use registry::{ObjectModel, RequestParseError, SYMBOL_CLASS_ID};
pub use service::{Service, ServiceReply, ServiceRequest, SVC_GET_ATTRIBUTE_ALL, SVC_GET_ATTRIBUTE_SINGLE, SVC_SET_ATTRIBUTE_SINGLE};
pub use status::{CipStatus, ConnMgrStatus, GeneralStatus};
pub use types::CipDataType;
