pub mod model;
pub mod store;

pub use model::{Reservation, ReservationStatus, generate_code};
pub use store::ReservationStore;
