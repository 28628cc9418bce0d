/// Similarity above which two names denote the same module.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

const COMMUNICATION: &str = "communication";

/// Lowercase, collapse whitespace runs and trim.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Decides whether two module names refer to the same module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleMatcher {
    threshold: f64,
}

impl Default for ModuleMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl ModuleMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare two names, optionally against the aliases of the catalog
    /// entry one of them comes from.
    pub fn matches(&self, a: &str, b: &str, aliases: Option<&[String]>) -> bool {
        let a = normalize_name(a);
        let b = normalize_name(b);

        if a.contains(COMMUNICATION) && b.contains(COMMUNICATION) {
            return communication_variants_match(&a, &b);
        }

        if contains_either_way(&a, &b) {
            return true;
        }

        if let Some(aliases) = aliases {
            let hit = aliases.iter().map(|alias| normalize_name(alias)).any(|alias| {
                contains_either_way(&a, &alias) || contains_either_way(&b, &alias)
            });
            if hit {
                return true;
            }
        }

        similarity(&a, &b) > self.threshold
    }
}

/// The French (F1) and English (A1) communication modules are both
/// mandatory and must never absorb each other. Untagged names never match.
fn communication_variants_match(a: &str, b: &str) -> bool {
    let (a_f1, a_a1) = (a.contains("f1"), a.contains("a1"));
    let (b_f1, b_a1) = (b.contains("f1"), b.contains("a1"));

    if (a_f1 && b_a1) || (a_a1 && b_f1) {
        return false;
    }
    (a_f1 && b_f1) || (a_a1 && b_a1)
}

fn contains_either_way(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// `1 - distance / len(longer)`, case-insensitive. Two empty strings are
/// identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (longer - distance) as f64 / longer as f64
}

/// Edit distance over chars (not bytes, names carry accents).
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}
