//! Per-persona TF-IDF retrieval index.
//!
//! A secondary layer over the memory buffers: it never drives eviction, it
//! only surfaces older related lines when a prompt is built. Vectors are
//! rebuilt lazily after any mutation.

use std::collections::{HashMap, HashSet};

use colloquy_types::memory::RetrievalDocument;

use crate::text::{truncate_chars, words};

const MIN_DOCUMENT_CHARS: usize = 10;
const MAX_DOCUMENT_CHARS: usize = 300;
const MIN_SIMILARITY: f64 = 0.05;
const EVENT_BOOST: f64 = 1.3;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "may", "she", "who", "did", "yes",
    "get", "got", "let", "too", "use", "this", "that", "with", "have", "from", "they", "will",
    "would", "there", "their", "what", "about", "which", "when", "were", "been", "into", "just",
    "than", "then", "them", "these", "those", "some", "your", "yours", "mine", "also", "very",
    "only", "here", "where", "should", "could", "must", "need", "maybe", "really", "over",
    "because", "while", "we're", "you're", "don", "doesn", "didn", "isn", "aren", "won",
    "itself", "myself", "ourselves", "yourself",
];

type SparseVector = HashMap<String, f64>;

/// Lowercase words of at least three letters, without stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_default() += 1;
    }
    let max = counts.values().copied().max().unwrap_or(1) as f64;
    counts
        .into_iter()
        .map(|(w, f)| (w, 0.5 + 0.5 * f as f64 / max))
        .collect()
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(k, va)| b.get(k).map(|vb| va * vb))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalIndex {
    documents: Vec<RetrievalDocument>,
    max_documents: usize,
    idf: HashMap<String, f64>,
    vectors: Vec<SparseVector>,
    dirty: bool,
}

impl RetrievalIndex {
    pub fn new(max_documents: usize) -> Self {
        Self {
            documents: Vec::new(),
            max_documents,
            idf: HashMap::new(),
            vectors: Vec::new(),
            dirty: false,
        }
    }

    /// Restore from persisted documents.
    pub fn from_documents(documents: Vec<RetrievalDocument>, max_documents: usize) -> Self {
        let mut index = Self::new(max_documents);
        index.dirty = !documents.is_empty();
        index.documents = documents;
        index.prune();
        index
    }

    pub fn documents(&self) -> &[RetrievalDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Index a document. Texts under ten characters are ignored.
    ///
    /// Returns whether the document was stored.
    pub fn add(&mut self, mut doc: RetrievalDocument) -> bool {
        let trimmed = doc.text.trim();
        if trimmed.chars().count() < MIN_DOCUMENT_CHARS {
            return false;
        }
        doc.text = truncate_chars(trimmed, MAX_DOCUMENT_CHARS).to_string();
        self.documents.push(doc);
        self.dirty = true;
        if self.documents.len() > self.max_documents {
            self.prune();
        }
        true
    }

    /// Drop every document for which `keep` returns false.
    pub fn retain(&mut self, keep: impl FnMut(&RetrievalDocument) -> bool) {
        let before = self.documents.len();
        self.documents.retain(keep);
        if self.documents.len() != before {
            self.dirty = true;
        }
    }

    /// Rewrite the speaker label of documents recorded under `old`.
    pub fn relabel(&mut self, old: &str, new: &str) {
        for doc in &mut self.documents {
            if doc.speaker_label == old {
                doc.speaker_label = new.to_string();
            }
        }
    }

    /// Top `top_k` documents related to `query`, skipping excluded ticks.
    pub fn search(
        &mut self,
        query: &str,
        top_k: usize,
        exclude_ticks: &HashSet<u64>,
    ) -> Vec<RetrievalDocument> {
        if self.documents.is_empty() || query.trim().is_empty() {
            return Vec::new();
        }
        if self.dirty {
            self.rebuild();
        }

        let tokens = tokenize(query);
        let query_vec: SparseVector = term_frequencies(&tokens)
            .into_iter()
            .filter_map(|(w, tf)| {
                self.idf
                    .get(w)
                    .filter(|idf| **idf > 0.0)
                    .map(|idf| (w.to_string(), tf * idf))
            })
            .collect();
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, usize)> = self
            .documents
            .iter()
            .zip(&self.vectors)
            .enumerate()
            .filter(|(_, (doc, _))| !exclude_ticks.contains(&doc.tick))
            .filter_map(|(i, (doc, vec))| {
                let sim = cosine(&query_vec, vec);
                if sim <= MIN_SIMILARITY {
                    return None;
                }
                let mut boosted = sim * (0.7 + 0.3 * doc.importance);
                if doc.is_event {
                    boosted *= EVENT_BOOST;
                }
                Some((boosted, i))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(top_k)
            .map(|(_, i)| self.documents[i].clone())
            .collect()
    }

    /// Search with a query built from the active event and recent lines.
    pub fn search_by_context(
        &mut self,
        recent: &[String],
        current_event: Option<&str>,
        top_k: usize,
        exclude_ticks: &HashSet<u64>,
    ) -> Vec<RetrievalDocument> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(event) = current_event.filter(|e| !e.is_empty()) {
            parts.push(event);
        }
        for line in &recent[recent.len().saturating_sub(3)..] {
            parts.push(truncate_chars(line, 100));
        }
        let query = parts.join(" ");
        self.search(&query, top_k, exclude_ticks)
    }

    fn rebuild(&mut self) {
        let tokenized: Vec<Vec<String>> = self.documents.iter().map(|d| tokenize(&d.text)).collect();
        let n = tokenized.len() as f64;

        let mut df: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for t in unique {
                *df.entry(t).or_default() += 1;
            }
        }
        self.idf = df
            .into_iter()
            .map(|(w, count)| (w.to_string(), ((n + 1.0) / (count as f64 + 1.0)).ln() + 1.0))
            .collect();

        self.vectors = tokenized
            .iter()
            .map(|tokens| {
                term_frequencies(tokens)
                    .into_iter()
                    .map(|(w, tf)| (w.to_string(), tf * self.idf.get(w).copied().unwrap_or(0.0)))
                    .collect()
            })
            .collect();
        self.dirty = false;
    }

    /// Keep events and important documents, then fill up with the newest.
    fn prune(&mut self) {
        if self.documents.len() <= self.max_documents {
            return;
        }
        let (mut keep, mut removable): (Vec<_>, Vec<_>) = std::mem::take(&mut self.documents)
            .into_iter()
            .partition(|d| d.is_event || d.importance >= 0.8);

        removable.sort_by(|a, b| {
            b.tick
                .cmp(&a.tick)
                .then_with(|| b.importance.total_cmp(&a.importance))
        });
        let slots = self.max_documents.saturating_sub(keep.len());
        removable.truncate(slots);
        keep.extend(removable);
        keep.sort_by_key(|d| d.tick);

        tracing::debug!(kept = keep.len(), "Pruned retrieval index");
        self.documents = keep;
        self.dirty = true;
    }
}
