// Client and supervisor names often arrive doubled from the source system
// ("JUAN PEREZ JUAN PEREZ", "JUAN PEREZ / JUAN PEREZ", "JuanPerezJuanPerez").
//
// `clean_name` runs a fixed set of passes until the value stops changing.
// Known behavior:
// - over-collapses legitimate repeated words: "Rosa Rosa Martinez" becomes
//   "Rosa Martinez";
// - leaves short glued doubles alone: "AnaAna" stays as is, because glued
//   halves must be at least four characters.
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_PASSES: usize = 10;
const MAX_EDGE_STRIPS: usize = 10;
const MIN_GLUED_HALF: usize = 4;

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([/|;])\s*").unwrap());
static SEPARATOR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-/|;]+$").unwrap());

pub fn clean_name(raw: &str) -> String {
    let spaced = SEPARATOR_RUN.replace_all(raw, " $1 ");
    let mut current = trim_edge_separators(&spaced);
    for _ in 0..MAX_PASSES {
        let next = clean_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Separators left dangling at either edge carry no meaning.
fn trim_edge_separators(s: &str) -> String {
    let tokens = words(s);
    let start = tokens.iter().position(|t| !is_separator(t)).unwrap_or(tokens.len());
    let end = tokens.iter().rposition(|t| !is_separator(t)).map_or(start, |i| i + 1);
    tokens[start..end].join(" ")
}

// Every pass starts from a trimmed value, so the fixpoint is the string
// `clean_name` returns.
fn clean_pass(raw: &str) -> String {
    let trimmed = trim_edge_separators(raw);
    let s = trimmed.as_str();
    if let Some(half) = mirrored_halves(s) {
        return half;
    }
    let stripped = strip_edge_repeats(s);
    if stripped != s {
        return stripped;
    }
    if let Some(half) = glued_halves(s) {
        return half;
    }
    collapse_repeated_words(s)
}

fn words(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn is_separator(token: &str) -> bool {
    SEPARATOR_TOKEN.is_match(token)
}

fn same_words(a: &[&str], b: &[&str]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_lowercase() == y.to_lowercase())
}

/// "Juan Perez Juan Perez" or "Juan Perez / Juan Perez" -> "Juan Perez".
fn mirrored_halves(s: &str) -> Option<String> {
    let tokens: Vec<&str> = words(s).into_iter().filter(|t| !is_separator(t)).collect();
    let n = tokens.len();
    if n < 2 || n % 2 != 0 {
        return None;
    }
    let (left, right) = tokens.split_at(n / 2);
    if same_words(left, right) {
        Some(left.join(" "))
    } else {
        None
    }
}

/// Drop a trailing block that repeats the block right before it, or a
/// leading block repeated right after it. Longest block first.
fn strip_edge_repeats(s: &str) -> String {
    let mut tokens = words(s);
    for _ in 0..MAX_EDGE_STRIPS {
        let n = tokens.len();
        let mut changed = false;
        for k in (1..=n / 2).rev() {
            if same_words(&tokens[n - 2 * k..n - k], &tokens[n - k..]) {
                tokens.truncate(n - k);
                changed = true;
                break;
            }
            if same_words(&tokens[..k], &tokens[k..2 * k]) {
                tokens.drain(..k);
                changed = true;
                break;
            }
        }
        if !changed {
            break;
        }
    }
    tokens.join(" ")
}

/// "JuanPerezJuanPerez" or "Juan PerezJuan Perez" -> first half, keeping
/// the original spacing of that half.
fn glued_halves(s: &str) -> Option<String> {
    let compact: Vec<char> = s
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '/' | '|' | ';' | '-'))
        .collect();
    let n = compact.len();
    if n % 2 != 0 || n / 2 < MIN_GLUED_HALF {
        return None;
    }
    let (left, right) = compact.split_at(n / 2);
    let equal = left
        .iter()
        .zip(right)
        .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()));
    if !equal {
        return None;
    }
    let mut seen = 0usize;
    let mut cut = s.len();
    for (i, c) in s.char_indices() {
        if c.is_whitespace() || matches!(c, '/' | '|' | ';' | '-') {
            continue;
        }
        seen += 1;
        if seen == n / 2 {
            cut = i + c.len_utf8();
            break;
        }
    }
    let half = s[..cut].trim();
    Some(words(half).join(" "))
}

/// "Maria Jose Jose Lopez" -> "Maria Jose Lopez".
fn collapse_repeated_words(s: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for t in words(s) {
        match out.last() {
            Some(prev) if prev.to_lowercase() == t.to_lowercase() => {}
            _ => out.push(t),
        }
    }
    out.join(" ")
}
