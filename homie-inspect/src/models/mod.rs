//! Data models for homie-inspect

pub mod home;
pub mod inventory;
pub mod link;
pub mod report;
pub mod room;

pub use home::Home;
pub use inventory::{Discrepancy, InventoryItem, PhotoData, RoomFindings};
pub use link::{LinkState, TenantLink};
pub use report::{InspectionReport, OverallStatus, RoomInspectionReport};
pub use room::{Room, RoomAnalysis};
