pub mod delivery_runs;
pub mod invoicing;
pub mod loading_batches;
pub mod note_transitions;
pub mod shipment_notes;
pub mod vehicle_queue;

/// Branch codes are stored trimmed and upper-case.
pub fn normalize_branch(branch_id: &str) -> String {
    branch_id.trim().to_uppercase()
}
