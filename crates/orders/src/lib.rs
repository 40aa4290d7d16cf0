//! `storecore-orders` — customer order and payment-verification domain.

pub mod order;

pub use order::{
    AdvanceStatus, CustomerInfo, Order, OrderCommand, OrderEvent, OrderId, OrderLine, OrderStatus,
    PaymentMethod, PaymentStatus, PlaceOrder, VerifyPayment,
};
