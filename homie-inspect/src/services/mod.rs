//! Service modules for home inventory and tenant inspections
//!
//! Collaborators (vision model, mail, photo storage) sit behind traits so
//! the workflows can run against in-process fakes.

pub mod discrepancy;
pub mod inspection_controller;
pub mod inspection_session;
pub mod inventory_merger;
pub mod link_lifecycle;
pub mod mail_client;
pub mod photo_store;
pub mod property_manager;
pub mod report_document;
pub mod room_analysis;
pub mod session_registry;
pub mod vision_client;

pub use inspection_controller::{InspectionSessionController, OpenOutcome, SubmissionOutcome};
pub use inspection_session::{InspectionSession, SessionError, SessionState, SessionView};
pub use link_lifecycle::{LinkError, LinkLifecycleManager};
pub use mail_client::{DisabledMailer, MailError, MailSender, MailjetClient, MailjetSettings};
pub use photo_store::{LocalPhotoStore, PhotoScope, PhotoStore, StorageError};
pub use property_manager::{HomeUpdate, PropertyManager};
pub use room_analysis::RoomAnalyzer;
pub use session_registry::SessionRegistry;
pub use vision_client::{DisabledVision, GeminiSettings, GeminiVisionClient, VisionAnalysisGateway, VisionError};
