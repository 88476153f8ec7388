//! クラス比を保った学習／評価分割。
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::classification::LabeledExample;

/// これ以上の件数があるときだけ分割する。
pub const SPLIT_THRESHOLD: usize = 10;
pub const TEST_FRACTION: f64 = 0.2;
pub const SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, Default)]
pub struct Split {
    pub train: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
}

/// クラスごとに `round(n * test_fraction)` 件を評価側に回す。
///
/// 2 件以上あるクラスは最低 1 件を評価側へ、1 件以上は必ず学習側へ残す。
#[must_use]
pub fn stratified_split(examples: &[LabeledExample], test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let (positives, negatives): (Vec<usize>, Vec<usize>) =
        (0..examples.len()).partition(|&idx| examples[idx].label.is_positive());

    let mut split = Split::default();
    let mut test_indices = Vec::new();
    let mut train_indices = Vec::new();
    for mut class_indices in [positives, negatives] {
        class_indices.shuffle(&mut rng);
        let take = test_count(class_indices.len(), test_fraction);
        let (test, train) = class_indices.split_at(take);
        test_indices.extend_from_slice(test);
        train_indices.extend_from_slice(train);
    }
    // 元の並び順を保つ
    train_indices.sort_unstable();
    test_indices.sort_unstable();
    split.train = train_indices.iter().map(|&idx| examples[idx].clone()).collect();
    split.test = test_indices.iter().map(|&idx| examples[idx].clone()).collect();
    split
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn test_count(class_size: usize, test_fraction: f64) -> usize {
    if class_size < 2 {
        return 0;
    }
    let rounded = (class_size as f64 * test_fraction).round() as usize;
    rounded.clamp(1, class_size - 1)
}
