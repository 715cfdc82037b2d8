//! Property tests for the recursive chunker.

use std::time::{Duration, Instant};

use pdfqa_rag::{ChunkSpan, Chunker, RecursiveChunker};
use proptest::prelude::*;

/// Text drawn from the characters the separator cascade cares about, plus
/// multi-byte characters to exercise UTF-8 boundaries.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .!?\n\té€漢]{0,600}"
}

/// `chunk_size` in 1..120 with an overlap strictly below it.
fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

/// Rebuild the source from spans by skipping each chunk's overlapping prefix.
fn reconstruct(text: &str, spans: &[ChunkSpan]) -> String {
    let mut rebuilt = String::new();
    let mut covered = 0;
    for span in spans {
        rebuilt.push_str(&text[covered.max(span.start)..span.end]);
        covered = span.end;
    }
    rebuilt
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn every_chunk_fits(text in arb_text(), (size, overlap) in arb_params()) {
        let chunks = RecursiveChunker::new(size, overlap).chunk(&text).unwrap();
        for chunk in &chunks {
            prop_assert!(chunk.chars().count() <= size, "chunk {:?} exceeds {}", chunk, size);
        }
    }

    #[test]
    fn spans_cover_text_losslessly(text in arb_text(), (size, overlap) in arb_params()) {
        let chunker = RecursiveChunker::new(size, overlap);
        let spans = chunker.split_spans(&text).unwrap();

        if text.is_empty() {
            prop_assert!(spans.is_empty());
        } else {
            prop_assert!(!spans.is_empty());
            prop_assert_eq!(spans[0].start, 0);
            prop_assert_eq!(spans[spans.len() - 1].end, text.len());
            for pair in spans.windows(2) {
                prop_assert!(pair[1].start <= pair[0].end, "gap between chunks");
                prop_assert!(pair[1].start >= pair[0].start);
                prop_assert!(pair[1].end > pair[0].end);
            }
        }

        prop_assert_eq!(reconstruct(&text, &spans), text.clone());

        let chunks = chunker.chunk(&text).unwrap();
        prop_assert_eq!(chunks.len(), spans.len());
        for (chunk, span) in chunks.iter().zip(&spans) {
            prop_assert_eq!(chunk.as_str(), &text[span.start..span.end]);
        }
    }

    #[test]
    fn overlap_is_exact_when_previous_chunk_is_long_enough(
        text in arb_text(),
        (size, overlap) in arb_params(),
    ) {
        let chunker = RecursiveChunker::new(size, overlap);
        let spans = chunker.split_spans(&text).unwrap();
        for pair in spans.windows(2) {
            let previous = &text[pair[0].start..pair[0].end];
            let shared = text[pair[1].start..pair[0].end].chars().count();
            prop_assert_eq!(shared, overlap.min(previous.chars().count()));
        }
    }

    #[test]
    fn chunking_is_idempotent(text in arb_text(), (size, overlap) in arb_params()) {
        let chunker = RecursiveChunker::new(size, overlap);
        prop_assert_eq!(chunker.chunk(&text).unwrap(), chunker.chunk(&text).unwrap());
    }
}

#[test]
fn default_sized_chunks_prefer_paragraphs() {
    let paragraph = "word ".repeat(150);
    let text = format!("{paragraph}\n\n{paragraph}\n\n{paragraph}");
    let chunks = RecursiveChunker::new(1000, 150).chunk(&text).unwrap();

    assert!(chunks.len() >= 2);
    assert!(chunks[0].ends_with("\n\n"));
    assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
}

#[test]
fn large_single_paragraph_chunks_in_linear_time() {
    // ~400 KB each: one with sentence breaks, one where no terminator ever appears.
    let sentences = "Lorem ipsum dolor sit amet consectetur. ".repeat(10_000);
    let words = "lorem ipsum dolor sit amet ".repeat(15_000);
    let chunker = RecursiveChunker::new(1000, 150);

    for text in [&sentences, &words] {
        let started = Instant::now();
        let chunks = chunker.chunk(text).unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(5), "chunking {} bytes took {elapsed:?}", text.len());
        assert!(chunks.len() > text.len() / 1000);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }
}
