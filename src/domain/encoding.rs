// ============================================================
// Layer 3 - Identifier Encoding Maps
// ============================================================
// An IdMapping is a bijection between the raw ids observed in
// one column and the dense range [0, N). Ids are numbered in
// the order they are first seen. Once built a mapping is never
// mutated; it is passed around by reference and persisted as
// two tables (raw -> encoded, encoded -> raw) so training and
// any downstream consumer agree on the numbering.
//
// EncodingMap bundles the user and item mappings of one run.

use std::collections::{BTreeMap, HashMap};

use crate::domain::error::{RecError, RecResult};
use crate::domain::rating::{EncodedId, RawId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    /// encoded -> raw, indexed by the encoded id
    decoded: Vec<RawId>,
    /// raw -> encoded
    encoded: HashMap<RawId, EncodedId>,
}

impl IdMapping {
    /// Number ids in first-seen order, skipping repeats.
    pub fn from_first_seen<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = RawId>,
    {
        let mut mapping = Self::default();
        for raw in ids {
            if !mapping.encoded.contains_key(&raw) {
                let next = mapping.decoded.len() as EncodedId;
                mapping.encoded.insert(raw, next);
                mapping.decoded.push(raw);
            }
        }
        mapping
    }

    pub fn encode(&self, raw: RawId) -> Option<EncodedId> {
        self.encoded.get(&raw).copied()
    }

    // Inverse lookup for consumers of the saved mappings.
    #[allow(dead_code)]
    pub fn decode(&self, encoded: EncodedId) -> Option<RawId> {
        self.decoded.get(encoded as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    /// Raw ids in encoded order.
    pub fn raw_ids(&self) -> &[RawId] {
        &self.decoded
    }

    pub fn encoded_table(&self) -> BTreeMap<RawId, EncodedId> {
        self.encoded.iter().map(|(&raw, &enc)| (raw, enc)).collect()
    }

    pub fn decoded_table(&self) -> BTreeMap<EncodedId, RawId> {
        self.raw_ids()
            .iter()
            .enumerate()
            .map(|(enc, &raw)| (enc as EncodedId, raw))
            .collect()
    }

    /// Rebuild a mapping from its two persisted tables.
    ///
    /// Fails unless the decoded table covers exactly [0, N) and the
    /// encoded table is its inverse.
    pub fn from_tables(
        encoded: &BTreeMap<RawId, EncodedId>,
        decoded: &BTreeMap<EncodedId, RawId>,
    ) -> RecResult<Self> {
        if encoded.len() != decoded.len() {
            return Err(RecError::data_load(format!(
                "mapping tables disagree in size: {} encoded vs {} decoded",
                encoded.len(),
                decoded.len()
            )));
        }

        let mut mapping = Self {
            decoded: Vec::with_capacity(decoded.len()),
            encoded: HashMap::with_capacity(encoded.len()),
        };

        // BTreeMap iterates in key order, so position == expected id
        for (position, (&enc, &raw)) in decoded.iter().enumerate() {
            if enc as usize != position {
                return Err(RecError::data_load(format!(
                    "encoded ids are not dense: expected {position}, found {enc}"
                )));
            }
            if encoded.get(&raw) != Some(&enc) {
                return Err(RecError::data_load(format!(
                    "raw id {raw} does not map back to encoded id {enc}"
                )));
            }
            mapping.decoded.push(raw);
            mapping.encoded.insert(raw, enc);
        }

        Ok(mapping)
    }
}

/// The user and item bijections of one dataset snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodingMap {
    pub users: IdMapping,
    pub items: IdMapping,
}

impl EncodingMap {
    pub fn new(users: IdMapping, items: IdMapping) -> Self {
        Self { users, items }
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let m = IdMapping::from_first_seen([30, 10, 30, 20, 10]);
        assert_eq!(m.raw_ids(), &[30, 10, 20]);
        assert_eq!(m.encode(30), Some(0));
        assert_eq!(m.encode(10), Some(1));
        assert_eq!(m.encode(20), Some(2));
        assert_eq!(m.encode(99), None);
        assert_eq!(m.decode(3), None);
    }

    #[test]
    fn test_bijection_round_trips() {
        let raw: Vec<RawId> = vec![5, 900, 12, 5, 44, 900, 1];
        let m = IdMapping::from_first_seen(raw.iter().copied());

        for &r in &raw {
            let enc = m.encode(r).unwrap();
            assert_eq!(m.decode(enc), Some(r));
        }
        for enc in 0..m.len() as EncodedId {
            let r = m.decode(enc).unwrap();
            assert_eq!(m.encode(r), Some(enc));
        }
        // dense range [0, unique)
        let mut ids: Vec<EncodedId> = raw.iter().filter_map(|&r| m.encode(r)).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, (0..5).collect::<Vec<_>>());
    }

    #[test]
    fn test_tables_rebuild_identical_mapping() {
        let m = IdMapping::from_first_seen([7, 3, 9]);
        let rebuilt = IdMapping::from_tables(&m.encoded_table(), &m.decoded_table()).unwrap();
        assert_eq!(rebuilt, m);
    }

    #[test]
    fn test_tables_with_gap_are_rejected() {
        let encoded = BTreeMap::from([(7, 0), (3, 2)]);
        let decoded = BTreeMap::from([(0, 7), (2, 3)]);
        let err = IdMapping::from_tables(&encoded, &decoded).unwrap_err();
        assert!(matches!(err, RecError::DataLoad { .. }));
    }

    #[test]
    fn test_tables_that_disagree_are_rejected() {
        let encoded = BTreeMap::from([(7, 1), (3, 0)]);
        let decoded = BTreeMap::from([(0, 7), (1, 3)]);
        assert!(IdMapping::from_tables(&encoded, &decoded).is_err());
    }
}
