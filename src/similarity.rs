//! Trigram word similarity, computed the way Postgres' `pg_trgm`
//! `word_similarity(term, text)` computes it.
//!
//! Both strings are split into words of alphanumeric characters, lowercased,
//! and every word is padded with two leading blanks and one trailing blank
//! before cutting it into trigrams. The score is the best
//! `shared / (|term trigrams| + |extent trigrams| - shared)` over contiguous
//! extents of the text's trigram sequence, found with the same greedy
//! lower-bound scan `pg_trgm` uses, in single precision.
//!
//! `word_similarity("Homo sapien", "Homo sapiens")` is `11/12`: the term has
//! twelve distinct trigrams and the extent ending at `"ien"` shares eleven of
//! them without adding any.

use std::collections::{HashMap, HashSet};

type Trigram = [char; 3];

fn trigrams(s: &str) -> Vec<Trigram> {
    let mut out = Vec::new();
    for word in s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();
        out.extend(padded.windows(3).map(|w| [w[0], w[1], w[2]]));
    }
    out
}

fn calc(count: usize, len1: usize, len2: usize) -> f32 {
    let denominator = (len1 + len2).saturating_sub(count);
    if denominator == 0 {
        0.0
    } else {
        count as f32 / denominator as f32
    }
}

/// Greatest similarity between the trigram set of `term` and any contiguous
/// extent of `text`. Returns a value in `[0, 1]`.
pub fn word_similarity(term: &str, text: &str) -> f32 {
    let needle: HashSet<Trigram> = trigrams(term).into_iter().collect();
    let haystack = trigrams(text);
    if needle.is_empty() || haystack.is_empty() {
        return 0.0;
    }

    // Distinct text trigrams get dense ids; `found` marks ids shared with the term.
    let mut ids: HashMap<Trigram, usize> = HashMap::new();
    let mut found: Vec<bool> = Vec::new();
    let indexes: Vec<usize> = haystack
        .iter()
        .map(|t| {
            *ids.entry(*t).or_insert_with(|| {
                found.push(needle.contains(t));
                found.len() - 1
            })
        })
        .collect();

    let ulen1 = needle.len();
    let mut lastpos: Vec<Option<usize>> = vec![None; found.len()];
    let mut lower: Option<usize> = None;
    let mut ulen2 = 0usize;
    let mut count = 0usize;
    let mut best = 0.0f32;

    for (upper, &idx) in indexes.iter().enumerate() {
        if lower.is_some() || found[idx] {
            if lastpos[idx].is_none() {
                ulen2 += 1;
                if found[idx] {
                    count += 1;
                }
            }
            lastpos[idx] = Some(upper);
        }

        // Extents only end on trigrams the term contains.
        if !found[idx] {
            continue;
        }

        let prev_lower = match lower {
            Some(lower) => lower,
            None => {
                ulen2 = 1;
                upper
            }
        };

        let mut current = calc(count, ulen1, ulen2);
        let mut new_lower = prev_lower;
        let (mut tmp_count, mut tmp_ulen2) = (count, ulen2);
        for tmp_lower in prev_lower..=upper {
            let candidate = calc(tmp_count, ulen1, tmp_ulen2);
            if candidate > current {
                current = candidate;
                ulen2 = tmp_ulen2;
                count = tmp_count;
                new_lower = tmp_lower;
            }

            let t = indexes[tmp_lower];
            if lastpos[t] == Some(tmp_lower) {
                tmp_ulen2 = tmp_ulen2.saturating_sub(1);
                if found[t] {
                    tmp_count = tmp_count.saturating_sub(1);
                }
            }
        }

        best = best.max(current);

        for tmp_lower in prev_lower..new_lower {
            let t = indexes[tmp_lower];
            if lastpos[t] == Some(tmp_lower) {
                lastpos[t] = None;
            }
        }
        lower = Some(new_lower);
    }

    best
}
