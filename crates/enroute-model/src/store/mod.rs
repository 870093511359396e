mod addresses;
mod flavors;

pub use addresses::{AddressStore, ChangeListener, SharedAddressStore};
pub use flavors::{FlavorError, FlavorStore, SharedFlavorStore};
