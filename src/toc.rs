//! Table-of-contents windowing.
//!
//! Pure views over a caller-supplied chapter index. Filtering happens before
//! windowing so page counts always describe the filtered set. Pages are
//! numbered from 1.

use crate::chapter::TocEntry;
use serde::Serialize;
use ts_rs::TS;
use unicode_normalization::UnicodeNormalization;

/// One window of the (possibly filtered) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TocPage {
    pub page_number: usize,
    pub window_size: usize,
    pub page_count: usize,
    pub total_entries: usize,
    pub entries: Vec<TocEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocPaginator {
    entries: Vec<TocEntry>,
    window_size: usize,
}

impl TocPaginator {
    /// A zero window size is treated as one entry per page.
    pub fn new(entries: Vec<TocEntry>, window_size: usize) -> Self {
        Self {
            entries,
            window_size: window_size.max(1),
        }
    }

    /// Keep entries whose title or chapter number matches `filter`.
    ///
    /// Matching is case-insensitive and compatibility-normalized, so
    /// full-width digits and ligatures match their plain forms.
    pub fn filtered(&self, filter: &str) -> Self {
        let needle = fold(filter.trim());
        if needle.is_empty() {
            return self.clone();
        }
        let entries = self
            .entries
            .iter()
            .filter(|entry| {
                fold(&entry.title).contains(&needle)
                    || entry.chapter_number.to_string().starts_with(&needle)
            })
            .cloned()
            .collect();
        Self {
            entries,
            window_size: self.window_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(self.window_size)
    }

    /// Page `n` is the half-open slice `[(n-1)*W, min(n*W, len))`.
    pub fn page(&self, page_number: usize) -> Option<TocPage> {
        if page_number == 0 || page_number > self.page_count() {
            return None;
        }
        let start = (page_number - 1) * self.window_size;
        let end = (page_number * self.window_size).min(self.entries.len());
        Some(TocPage {
            page_number,
            window_size: self.window_size,
            page_count: self.page_count(),
            total_entries: self.entries.len(),
            entries: self.entries[start..end].to_vec(),
        })
    }

    /// The page holding `chapter_number`, for opening the index at the
    /// current reading position.
    pub fn page_containing(&self, chapter_number: u32) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.chapter_number == chapter_number)
            .map(|idx| idx / self.window_size + 1)
    }
}

fn fold(text: &str) -> String {
    text.nfkc().flat_map(char::to_lowercase).collect()
}
