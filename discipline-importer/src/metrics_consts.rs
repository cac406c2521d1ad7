pub const CONTROL_EVENTS_RECEIVED: &str = "discipline_importer_control_events_received";
pub const OFFSETS_COMMITTED: &str = "discipline_importer_offsets_committed";
pub const IMPORTS_COMPLETED: &str = "discipline_importer_imports_completed";
pub const IMPORTS_FAILED: &str = "discipline_importer_imports_failed";
pub const DISCIPLINES_QUEUED: &str = "discipline_importer_disciplines_queued";
pub const BATCHES_PUBLISHED: &str = "discipline_importer_batches_published";
pub const PUBLISH_FAILURES: &str = "discipline_importer_publish_failures";
