pub mod store;

pub use store::{Order, OrderStatus, Payment, PaymentStatus, ServiceType, User};
