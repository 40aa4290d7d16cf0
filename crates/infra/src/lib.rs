//! `storecore-infra` — infrastructure layer: event store, command dispatch,
//! checkout orchestration and read-side projections.

pub mod checkout;
pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod streams;
