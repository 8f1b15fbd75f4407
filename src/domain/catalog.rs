// ============================================================
// Layer 3 - Item Catalog Types
// ============================================================
// Rows of the processed catalog and synopsis tables. These are
// not used for training; they are written next to the encoders
// so a recommendation consumer can turn item ids back into
// something displayable.

use serde::{Deserialize, Serialize};

use crate::domain::rating::RawId;

/// One item of the processed catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_id:     RawId,
    /// English title, or the original name when there is none
    pub eng_version: String,
    pub score:       Option<f64>,
    pub genres:      Option<String>,
    pub episodes:    Option<String>,
    pub kind:        Option<String>,
    pub premiered:   Option<String>,
    pub members:     Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynopsisEntry {
    pub item_id:  RawId,
    pub name:     String,
    pub genres:   Option<String>,
    pub synopsis: Option<String>,
}
