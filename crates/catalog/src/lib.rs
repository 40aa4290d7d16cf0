//! `storecore-catalog` — product catalog domain.

pub mod product;

pub use product::{
    ActivateProduct, ChangePrice, CreateProduct, DeactivateProduct, Product, ProductCommand,
    ProductEvent, ProductId,
};
