//! Property and concurrency tests for the in-memory vector index.

use std::sync::Arc;

use pdfqa_rag::{InMemoryVectorIndex, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// *For any* generation stored in an `InMemoryVectorIndex`, querying returns
/// at most `k` results ordered by ascending distance.
mod prop_query_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_ascending_and_bounded_by_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, stored) = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                let texts: Vec<String> = (0..embeddings.len()).map(|i| format!("text {i}")).collect();
                let stored = texts.len();
                index.replace_all(texts, embeddings.clone()).await.unwrap();
                (index.query(&query, k).await.unwrap(), stored)
            });

            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(stored));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "results not in ascending order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
        }
    }
}

/// *For any* two generations A and B, after `replace_all(A)` then
/// `replace_all(B)` no query returns a chunk from A.
mod prop_replacement {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn replaced_generation_is_never_returned(
            first in proptest::collection::vec(arb_normalized_embedding(DIM), 1..10),
            second in proptest::collection::vec(arb_normalized_embedding(DIM), 1..10),
            query in arb_normalized_embedding(DIM),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                let a: Vec<String> = (0..first.len()).map(|i| format!("A{i}")).collect();
                let b: Vec<String> = (0..second.len()).map(|i| format!("B{i}")).collect();
                index.replace_all(a, first.clone()).await.unwrap();
                index.replace_all(b, second.clone()).await.unwrap();
                index.query(&query, 100).await.unwrap()
            });

            prop_assert_eq!(results.len(), second.len());
            prop_assert!(results.iter().all(|r| r.text.starts_with('B')));
        }
    }
}

#[tokio::test]
async fn three_chunks_query_returns_two_nearest() {
    let index = InMemoryVectorIndex::new();
    index
        .replace_all(
            vec!["Alpha".into(), "Beta".into(), "Gamma".into()],
            vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.7, 0.0, 0.7]],
        )
        .await
        .unwrap();

    let results = index.query(&[1.0, 0.0, 0.0], 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "Alpha");
    assert_eq!(results[1].text, "Gamma");
    assert!(results[0].distance <= results[1].distance);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_never_mix_generations() {
    let index = Arc::new(InMemoryVectorIndex::new());
    let dim = 4;
    let generation = move |tag: &str, n: usize| {
        let texts: Vec<String> = (0..n).map(|i| format!("{tag}{i}")).collect();
        let embeddings: Vec<Vec<f32>> =
            (0..n).map(|i| (0..dim).map(|d| ((i + d) % 3) as f32 + 0.1).collect()).collect();
        (texts, embeddings)
    };

    let (texts, embeddings) = generation("A", 6);
    index.replace_all(texts, embeddings).await.unwrap();

    let writer = {
        let index = Arc::clone(&index);
        tokio::spawn(async move {
            for round in 0..50 {
                let tag = if round % 2 == 0 { "B" } else { "A" };
                let (texts, embeddings) = generation(tag, 6);
                index.replace_all(texts, embeddings).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let index = Arc::clone(&index);
        readers.push(tokio::spawn(async move {
            for _ in 0..100 {
                let results = index.query(&[1.0, 1.0, 1.0, 1.0], 10).await.unwrap();
                assert_eq!(results.len(), 6);
                let first = results[0].text.chars().next().unwrap();
                assert!(results.iter().all(|r| r.text.starts_with(first)), "mixed generations");
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_generation_is_cleared_at_most_once() {
    let index = Arc::new(InMemoryVectorIndex::new());

    // Every generation gets a distinct size, so a cleared count names the
    // generation it removed.
    let writer = {
        let index = Arc::clone(&index);
        tokio::spawn(async move {
            for size in 1..=200usize {
                let texts: Vec<String> = (0..size).map(|i| format!("g{size}-{i}")).collect();
                index.replace_all(texts, vec![vec![1.0, 0.5]; size]).await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let mut clearers = Vec::new();
    for _ in 0..4 {
        let index = Arc::clone(&index);
        clearers.push(tokio::spawn(async move {
            let mut removed = Vec::new();
            for _ in 0..100 {
                removed.push(index.clear().await.unwrap());
                tokio::task::yield_now().await;
            }
            removed
        }));
    }

    writer.await.unwrap();
    let mut cleared: Vec<usize> = Vec::new();
    for clearer in clearers {
        cleared.extend(clearer.await.unwrap().into_iter().filter(|&n| n > 0));
    }
    cleared.push(index.clear().await.unwrap());
    cleared.retain(|&n| n > 0);

    let mut unique = cleared.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), cleared.len(), "a generation was reported cleared twice");
    assert!(cleared.iter().all(|&n| (1..=200).contains(&n)));
    assert_eq!(index.count().await.unwrap(), 0);
}
