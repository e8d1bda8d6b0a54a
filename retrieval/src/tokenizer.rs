//! Token spans for chunking and term analysis for the hashing model.

use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;
use std::ops::Range;

lazy_static! {
    static ref TERM_RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref WORD_RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}]+").expect("valid regex");
    static ref TOKEN_RE: Regex = Regex::new(r"(?u)\s+|\S+\s*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Splits text into token spans.
///
/// Chunk boundaries and token budgets are both measured with the same
/// instance, so implementations must return contiguous byte ranges that
/// cover the input exactly (`text[spans[0].start..spans[n-1].end] == text`),
/// and re-tokenizing any contiguous run of tokens must yield the same run.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>>;

    fn count_tokens(&self, text: &str) -> usize {
        self.tokenize(text).len()
    }
}

/// Whitespace-delimited tokens: each token is a run of non-whitespace plus the
/// whitespace that follows it. Leading whitespace forms a token of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        TOKEN_RE.find_iter(text).map(|m| m.range()).collect()
    }
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Analyze text into (term, position) using NFKC normalization, lowercase, stopword removal, and stemming.
pub fn analyze(text: &str) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut terms = Vec::new();
    for (pos, mat) in TERM_RE.find_iter(&normalized).enumerate() {
        let term = mat.as_str();
        if is_stopword(term) { continue; }
        let stem = STEMMER.stem(term).to_string();
        terms.push((stem, pos));
    }
    terms
}

/// Normalized lowercase words with no stopword filtering or stemming.
pub fn words(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD_RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}
