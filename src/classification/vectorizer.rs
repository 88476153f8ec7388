//! コーパスから語彙と IDF を学習する TF-IDF ベクトライザ。
use std::collections::HashSet;

use rustc_hash::FxHashMap;
use sprs::{CsMat, TriMat};
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

use super::tokenizer::unigrams_and_bigrams;

/// 語彙サイズの上限。
pub const MAX_VOCABULARY: usize = 4000;

/// ユニグラム+バイグラムの TF-IDF ベクトライザ。
///
/// `fit` 時に渡された文書だけから語彙を作り、以降の `transform` は語彙外の語を無視する。
/// 行ベクトルは L2 正規化される。
#[derive(Debug, Clone)]
pub struct TextVectorizer {
    vocabulary: FxHashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
    fingerprint: u64,
}

impl TextVectorizer {
    /// 文書集合から語彙を構築する。
    ///
    /// 語彙はコーパス全体の出現回数の降順（同数は辞書順）で上位 `max_features` 件に絞り、
    /// 列は語の辞書順に並べる。
    #[must_use]
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> Self {
        let mut term_counts: FxHashMap<String, usize> = FxHashMap::default();
        let mut doc_freq: FxHashMap<String, usize> = FxHashMap::default();

        for document in documents {
            let grams = unigrams_and_bigrams(document.as_ref());
            let mut unique: HashSet<&str> = HashSet::new();
            for gram in &grams {
                *term_counts.entry(gram.clone()).or_insert(0) += 1;
                unique.insert(gram.as_str());
            }
            for gram in unique {
                *doc_freq.entry(gram.to_string()).or_insert(0) += 1;
            }
        }

        let unique_terms = term_counts.len();
        let mut ranked: Vec<(String, usize)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        #[allow(clippy::cast_precision_loss)]
        let n = documents.len() as f64;
        let idf: Vec<f64> = terms
            .iter()
            .map(|term| {
                #[allow(clippy::cast_precision_loss)]
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        debug!(
            documents = documents.len(),
            unique_terms,
            vocabulary = terms.len(),
            "fitted text vectorizer"
        );

        Self::from_parts(terms, idf)
    }

    fn from_parts(terms: Vec<String>, idf: Vec<f64>) -> Self {
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        let mut hasher = Xxh3::new();
        for (term, weight) in terms.iter().zip(&idf) {
            hasher.update(term.as_bytes());
            hasher.update(&[0]);
            hasher.update(&weight.to_bits().to_le_bytes());
        }
        Self {
            vocabulary,
            terms,
            idf,
            fingerprint: hasher.digest(),
        }
    }

    /// 文書集合を (文書数 × 語彙数) の疎行列に変換する。
    #[must_use]
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> CsMat<f64> {
        let mut triplets = TriMat::new((documents.len(), self.terms.len()));
        for (row, document) in documents.iter().enumerate() {
            let mut counts: FxHashMap<usize, f64> = FxHashMap::default();
            for gram in unigrams_and_bigrams(document.as_ref()) {
                if let Some(&col) = self.vocabulary.get(&gram) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
            let mut weighted: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(col, tf)| (col, tf * self.idf[col]))
                .collect();
            let norm = weighted.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                weighted.sort_by_key(|(col, _)| *col);
                for (col, value) in weighted {
                    triplets.add_triplet(row, col, value / norm);
                }
            }
        }
        triplets.to_csr()
    }

    /// 語彙数（テキスト表現の列数）。
    #[must_use]
    pub fn vocab_len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    #[must_use]
    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// 語彙と IDF から計算した識別子。同じ fit 結果なら同じ値になる。
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
