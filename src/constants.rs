/// Name of the persisted slot holding the full edit mapping
pub const EDITS_SLOT: &str = "corpus_edits";

/// Prefix of exported edit snapshots (`edits_backup_<timestamp>.json`)
pub const EXPORT_FILE_PREFIX: &str = "edits_backup_";

/// Default number of cards per page
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Page sizes offered by the pager
pub const PAGE_SIZE_CHOICES: [usize; 3] = [10, 25, 50];

/// Number of page buttons shown around the current page
pub const PAGER_WINDOW: usize = 5;

/// Message shown when an export is requested with nothing edited
pub const NO_EDITS_MESSAGE: &str = "No edits to export";
