mod address;
mod space;

pub use address::{AddressController, WorkerHandle};
pub use space::SpaceController;
