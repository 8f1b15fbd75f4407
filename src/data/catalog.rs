// ============================================================
// Layer 4 - Catalog Loader
// ============================================================
// Turns the raw item catalog and the synopsis table into the
// processed tables written next to the encoders.
//
// Catalog cleanup, in order:
//   1. "Unknown" and empty cells become absent values
//   2. `English name` falls back to `Name` when absent
//   3. rows are sorted by score, best first, unscored last
//   4. only the columns a recommender displays are kept
//
// The raw headers are the upstream ones (MAL_ID, Name, ...);
// the processed tables use item_id / eng_version / synopsis.

use std::cmp::Ordering;
use std::path::Path;

use serde::Deserialize;

use crate::domain::catalog::{CatalogEntry, SynopsisEntry};
use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::RawId;

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Deserialize)]
struct RawCatalogRow {
    #[serde(rename = "MAL_ID", alias = "item_id")]
    item_id:      RawId,
    #[serde(rename = "Name")]
    name:         String,
    #[serde(rename = "English name", default)]
    english_name: Option<String>,
    #[serde(rename = "Score", default)]
    score:        Option<String>,
    #[serde(rename = "Genres", default)]
    genres:       Option<String>,
    #[serde(rename = "Episodes", default)]
    episodes:     Option<String>,
    #[serde(rename = "Type", default)]
    kind:         Option<String>,
    #[serde(rename = "Premiered", default)]
    premiered:    Option<String>,
    #[serde(rename = "Members", default)]
    members:      Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSynopsisRow {
    #[serde(rename = "MAL_ID", alias = "item_id")]
    item_id:  RawId,
    #[serde(rename = "Name")]
    name:     String,
    #[serde(rename = "Genres", default)]
    genres:   Option<String>,
    // the upstream header really is misspelled
    #[serde(rename = "sypnopsis", alias = "synopsis", default)]
    synopsis: Option<String>,
}

/// "Unknown" and blank cells carry no information.
fn known(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && v != UNKNOWN
    })
}

fn known_number<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    known(value).and_then(|v| v.trim().parse().ok())
}

fn read_rows<T>(path: &Path) -> RecResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let display = path.display();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| RecError::data_load_caused(format!("cannot open '{display}'"), e))?;

    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(index, row)| {
            row.map_err(|e| {
                RecError::data_load_caused(format!("malformed row at line {} of '{display}'", index + 2), e)
            })
        })
        .collect()
}

/// Load and clean the item catalog, sorted best score first.
pub fn load_catalog(path: &Path) -> RecResult<Vec<CatalogEntry>> {
    let rows: Vec<RawCatalogRow> = read_rows(path)?;

    let mut entries: Vec<CatalogEntry> = rows
        .into_iter()
        .map(|row| CatalogEntry {
            item_id:     row.item_id,
            eng_version: known(row.english_name).unwrap_or(row.name),
            score:       known_number(row.score),
            genres:      known(row.genres),
            episodes:    known(row.episodes),
            kind:        known(row.kind),
            premiered:   known(row.premiered),
            members:     known_number(row.members),
        })
        .collect();

    // stable sort: equal scores keep their catalog order
    entries.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None)    => Ordering::Less,
        (None, Some(_))    => Ordering::Greater,
        (None, None)       => Ordering::Equal,
    });

    tracing::info!("Loaded {} catalog entries from '{}'", entries.len(), path.display());
    Ok(entries)
}

/// Load the synopsis table.
pub fn load_synopses(path: &Path) -> RecResult<Vec<SynopsisEntry>> {
    let rows: Vec<RawSynopsisRow> = read_rows(path)?;

    let entries: Vec<SynopsisEntry> = rows
        .into_iter()
        .map(|row| SynopsisEntry {
            item_id:  row.item_id,
            name:     row.name,
            genres:   known(row.genres),
            synopsis: known(row.synopsis),
        })
        .collect();

    tracing::info!("Loaded {} synopses from '{}'", entries.len(), path.display());
    Ok(entries)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CATALOG: &str = "\
MAL_ID,Name,Score,Genres,English name,Japanese name,Type,Episodes,Aired,Premiered,Members
1,Alpha,7.5,Action,Alpha EN,a,TV,12,x,Spring 1998,1000
2,Beta,Unknown,Drama,Unknown,b,Movie,1,x,Unknown,50
3,Gamma,8.9,Comedy,,c,TV,24,x,Fall 2001,2000
";

    #[test]
    fn test_catalog_cleanup_and_order() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.csv");
        fs::write(&path, CATALOG).unwrap();

        let entries = load_catalog(&path).unwrap();
        let ids: Vec<RawId> = entries.iter().map(|e| e.item_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        // English title fallback
        assert_eq!(entries[0].eng_version, "Gamma");
        assert_eq!(entries[1].eng_version, "Alpha EN");
        assert_eq!(entries[2].eng_version, "Beta");

        // Unknown → absent
        assert_eq!(entries[2].score, None);
        assert_eq!(entries[2].premiered, None);
        assert_eq!(entries[0].members, Some(2000));
    }

    #[test]
    fn test_synopsis_header_is_renamed() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("synopsis.csv");
        fs::write(&path, "MAL_ID,Name,Score,Genres,sypnopsis\n1,Alpha,7.5,Action,\"A story, told.\"\n")
            .unwrap();

        let entries = load_synopses(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].synopsis.as_deref(), Some("A story, told."));
    }

    #[test]
    fn test_missing_catalog_is_a_data_load_error() {
        let err = load_catalog(Path::new("/no/such/catalog.csv")).unwrap_err();
        assert!(matches!(err, RecError::DataLoad { .. }));
    }
}
