use ahash::AHashMap;

/// Sequences at least this long get the "popular element" heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// A maximal matching block: `a[a..a + size] == b[b..b + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// A text prepared for repeated comparison.
///
/// Indexing is per Unicode scalar value. When the text is used as the second
/// sequence (`b`) of a comparison, characters occurring more than
/// `len / 100 + 1` times in a text of 200+ characters are "popular" and are
/// left out of the index, so they can extend a match but never start one.
#[derive(Debug, Clone)]
pub struct Sequence {
    chars: Vec<char>,
    b2j: AHashMap<char, Vec<usize>>,
    counts: AHashMap<char, usize>,
}

impl Sequence {
    pub fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();

        let mut b2j: AHashMap<char, Vec<usize>> = AHashMap::new();
        for (j, &c) in chars.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        let counts: AHashMap<char, usize> =
            b2j.iter().map(|(&c, idxs)| (c, idxs.len())).collect();

        let n = chars.len();
        if n >= AUTOJUNK_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, idxs| idxs.len() <= ntest);
        }

        Self { chars, b2j, counts }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// `2 * matches / total`, with two empty sequences counting as identical.
fn calculate_ratio(matches: usize, length: usize) -> f64 {
    if length == 0 {
        1.0
    } else {
        2.0 * matches as f64 / length as f64
    }
}

/// Longest matching block in `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn find_longest_match(
    a: &Sequence,
    b: &Sequence,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> Match {
    let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);

    // j2len[j] = length of longest match ending at a[i-1], b[j]
    let mut j2len: AHashMap<usize, usize> = AHashMap::new();
    for i in alo..ahi {
        let mut new_j2len: AHashMap<usize, usize> = AHashMap::new();
        if let Some(indices) = b.b2j.get(&a.chars[i]) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                new_j2len.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = new_j2len;
    }

    // Popular characters were never indexed; grow the block over equal neighbours.
    while besti > alo && bestj > blo && a.chars[besti - 1] == b.chars[bestj - 1] {
        besti -= 1;
        bestj -= 1;
        bestsize += 1;
    }
    while besti + bestsize < ahi
        && bestj + bestsize < bhi
        && a.chars[besti + bestsize] == b.chars[bestj + bestsize]
    {
        bestsize += 1;
    }

    Match {
        a: besti,
        b: bestj,
        size: bestsize,
    }
}

/// All matching blocks, sorted by position. Found by taking the longest match
/// and recursing into the unmatched regions on either side of it.
pub fn matching_blocks(a: &Sequence, b: &Sequence) -> Vec<Match> {
    let mut queue = vec![(0, a.len(), 0, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let m = find_longest_match(a, b, alo, ahi, blo, bhi);
        if m.size == 0 {
            continue;
        }
        blocks.push(m);
        if alo < m.a && blo < m.b {
            queue.push((alo, m.a, blo, m.b));
        }
        if m.a + m.size < ahi && m.b + m.size < bhi {
            queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
        }
    }

    blocks.sort();
    blocks
}

/// Similarity in [0, 1]. Not symmetric in general: `a` is scanned, `b` is indexed.
pub fn ratio(a: &Sequence, b: &Sequence) -> f64 {
    let matches: usize = matching_blocks(a, b).iter().map(|m| m.size).sum();
    calculate_ratio(matches, a.len() + b.len())
}

/// Upper bound on `ratio` from the multiset of shared characters.
pub fn quick_ratio(a: &Sequence, b: &Sequence) -> f64 {
    let matches: usize = a
        .counts
        .iter()
        .map(|(c, &n)| n.min(b.counts.get(c).copied().unwrap_or(0)))
        .sum();
    calculate_ratio(matches, a.len() + b.len())
}

/// Upper bound on `ratio` from the lengths alone.
pub fn real_quick_ratio(a: &Sequence, b: &Sequence) -> f64 {
    calculate_ratio(a.len().min(b.len()), a.len() + b.len())
}

/// Convenience wrapper for one-off comparisons.
pub fn similarity(a: &str, b: &str) -> f64 {
    ratio(&Sequence::new(a), &Sequence::new(b))
}
