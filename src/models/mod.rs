pub mod delivery_run;
pub mod delivery_run_item;
pub mod loading_batch;
pub mod loading_batch_item;
pub mod reference;
pub mod shipment_note;
pub mod shipment_note_event;
pub mod vehicle_queue_entry;

pub use delivery_run::RunStatus;
pub use delivery_run_item::DeliveryOutcome;
pub use loading_batch::BatchStatus;
pub use reference::EntityRef;
pub use shipment_note::{NoteStatus, PaymentType};
pub use shipment_note_event::NoteEventKind;
pub use vehicle_queue_entry::{QueueKind, QueueStatus};
