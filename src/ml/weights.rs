// ============================================================
// Layer 5 - Embedding Weight Extraction
// ============================================================
// After training, both embedding tables are copied out of the
// (best-restored) model into plain ndarray matrices and every
// row is divided by its Euclidean norm. A downstream consumer
// can then rank items for a user, or neighbours of an item,
// with a plain dot product.
//
// A row with zero (or non-finite) norm cannot be normalised.
// That is reported as RecError::ZeroNorm naming the table and
// row; nothing is divided by zero and nothing is skipped.

use burn::prelude::*;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::domain::error::{RecError, RecResult};
use crate::ml::model::RecommenderModel;

pub const USER_TABLE: &str = "user_embedding";
pub const ITEM_TABLE: &str = "item_embedding";

/// The two L2-normalised weight matrices of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingWeights {
    /// [num_users, embedding_size]
    pub user: Array2<f32>,
    /// [num_items, embedding_size]
    pub item: Array2<f32>,
}

/// Read both tables and normalise their rows.
pub fn extract_weights<B: Backend>(model: &RecommenderModel<B>) -> RecResult<EmbeddingWeights> {
    let user = table_to_array(model.user_embedding.weight.val(), USER_TABLE)?;
    let item = table_to_array(model.item_embedding.weight.val(), ITEM_TABLE)?;

    tracing::info!("Extracting weights for {} {:?} and {} {:?}", USER_TABLE, user.dim(), ITEM_TABLE, item.dim());

    Ok(EmbeddingWeights {
        user: l2_normalize_rows(user, USER_TABLE)?,
        item: l2_normalize_rows(item, ITEM_TABLE)?,
    })
}

/// Copy a [rows, cols] tensor into an ndarray matrix.
pub fn table_to_array<B: Backend>(weights: Tensor<B, 2>, table: &str) -> RecResult<Array2<f32>> {
    let [rows, cols] = weights.dims();
    let values = weights
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| RecError::ModelBuild(format!("cannot read `{table}` weights: {e:?}")))?;

    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| RecError::ModelBuild(format!("`{table}` weights have a bad shape: {e}")))
}

/// Divide every row by its Euclidean norm.
pub fn l2_normalize_rows(mut weights: Array2<f32>, table: &str) -> RecResult<Array2<f32>> {
    for (row, mut vector) in weights.axis_iter_mut(Axis(0)).enumerate() {
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if !(norm > 0.0 && norm.is_finite()) {
            return Err(RecError::ZeroNorm { table: table.to_string(), row });
        }
        vector.mapv_inplace(|x| x / norm);
    }
    Ok(weights)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::RecommenderConfig;
    use ndarray::array;

    type TestBackend = burn::backend::NdArray;

    fn assert_unit_rows(m: &Array2<f32>) {
        for row in m.axis_iter(Axis(0)) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5, "row norm {norm}");
        }
    }

    #[test]
    fn test_rows_become_unit_length() {
        let m = array![[3.0f32, 4.0], [0.0, -2.0], [1.0, 1.0]];
        let n = l2_normalize_rows(m, "t").unwrap();
        assert_unit_rows(&n);
        assert_eq!(n.row(0).to_vec(), vec![0.6, 0.8]);
        assert_eq!(n.row(1).to_vec(), vec![0.0, -1.0]);
    }

    #[test]
    fn test_zero_row_is_reported() {
        let m   = array![[1.0f32, 0.0], [0.0, 0.0]];
        let err = l2_normalize_rows(m, USER_TABLE).unwrap_err();
        match err {
            RecError::ZeroNorm { table, row } => {
                assert_eq!(table, USER_TABLE);
                assert_eq!(row, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_row_is_reported() {
        let m = array![[f32::NAN, 1.0]];
        assert!(matches!(l2_normalize_rows(m, ITEM_TABLE), Err(RecError::ZeroNorm { .. })));
    }

    #[test]
    fn test_extract_from_model() {
        let device = Default::default();
        let model: RecommenderModel<TestBackend> = RecommenderConfig::new(6, 4)
            .with_embedding_size(5)
            .init(&device)
            .unwrap();

        let weights = extract_weights(&model).unwrap();
        assert_eq!(weights.user.dim(), (6, 5));
        assert_eq!(weights.item.dim(), (4, 5));
        assert_unit_rows(&weights.user);
        assert_unit_rows(&weights.item);
    }
}
