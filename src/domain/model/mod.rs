//! Reconstructed call model: callback regions, address naming and interfaces

mod address;
mod callback;
mod interface;

pub use address::{AddressEntry, AddressRegistry, NameOrigin};
pub use callback::{classify, trigger_for, CallbackKind, CallbackRegion, TriggerRule, TRIGGER_TABLE};
pub use interface::ContractInterfaceSet;
