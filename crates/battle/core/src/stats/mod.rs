//! Attribute storage and derived-stat recomputation.
//!
//! Each member owns one [`StatContainer`]. Attributes are addressed by dotted
//! paths (`abi.vit`, `hp.current`, `weapon.attack.physical`) and are either
//! plain values or formulas over other attributes.
mod container;
mod error;
mod modifier;

pub use container::{StatContainer, StatSnapshot, StatValue};
pub use error::StatError;
pub use modifier::{
    BaseSource, Modifier, ModifierBucket, ModifierEntry, dynamic_total, static_total,
};
