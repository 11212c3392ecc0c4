//! Text folding shared by the normalizer, deduplicator and keyword classifier.

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Words that carry no event identity in a headline
const STOPWORDS: &[&str] = &[
  "a", "about", "after", "against", "amid", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have",
  "in", "inc", "into", "is", "it", "its", "limited", "ltd", "news", "of", "on", "or", "over", "per", "plc", "report",
  "reports", "said", "says", "than", "that", "the", "this", "to", "up", "was", "were", "will", "with",
];

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static HTML_ENTITY: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"&(#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

static FOOTER_LINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?im)^\s*(read more|continue reading|click here|also read|subscribe (now|to)|follow us|for more news)\b.*$")
    .expect("valid regex")
});

static BYLINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)^[ \t]*(By|BY)[ \t]+[A-Z][\w.'-]*([ \t]+[A-Z][\w.'-]*){0,3}[ \t]*([,|].*)?$").expect("valid regex")
});

static DATELINE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\s*[A-Z][A-Za-z .]{1,30}\((Reuters|PTI|AP|IANS|Bloomberg|AFP)\)\s*[-:]+\s*").expect("valid regex")
});

static TRUNCATION_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(\[\+\d+ chars\]|\[…\]|\[\.\.\.\])").expect("valid regex"));

static MONEY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?:[$₹]\s*|\brs\.?\s*|\busd\s*|\binr\s*)?\b(\d+(?:[.,]\d+)*)\s*(trillion|billion|million|thousand|crores?|lakhs?|tn|bn|mn|cr|t|b|m|k)\b",
  )
  .expect("valid regex")
});

pub fn is_stopword(word: &str) -> bool {
  STOPWORDS.binary_search(&word).is_ok()
}

/// Lowercase, turn punctuation into spaces and collapse whitespace
pub fn fold(text: &str) -> String {
  let lowered: String = text
    .chars()
    .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
    .collect::<String>()
    .to_lowercase();
  lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folded text with stopwords removed, used for the exact fingerprint
pub fn trim_stopwords(folded: &str) -> String {
  folded
    .split(' ')
    .filter(|w| !w.is_empty() && !is_stopword(w))
    .collect::<Vec<_>>()
    .join(" ")
}

/// Whole-word, case-insensitive pattern for a name or phrase.
///
/// Inner whitespace matches any whitespace run; `suffixes` allows inflections
/// such as "lawsuits" for "lawsuit".
pub fn phrase_pattern(phrase: &str, suffixes: bool) -> Option<Regex> {
  let phrase = phrase.trim();
  if phrase.is_empty() {
    return None;
  }

  let body = phrase.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+");
  let starts_word = phrase.chars().next().is_some_and(|c| c.is_alphanumeric());
  let ends_word = phrase.chars().last().is_some_and(|c| c.is_alphanumeric());

  let mut pattern = String::from("(?i)");
  if starts_word {
    pattern.push_str(r"\b");
  }
  pattern.push_str(&body);
  if suffixes {
    pattern.push_str("(?:s|es|d|ed|ing)?");
  }
  if ends_word {
    pattern.push_str(r"\b");
  }
  Regex::new(&pattern).ok()
}

/// Removes HTML artifacts, bylines, wire datelines and "Read more" style footers
#[derive(Debug, Clone)]
pub struct Boilerplate {
  extra: Option<Regex>,
}

impl Boilerplate {
  pub fn new(extra_phrases: &[String]) -> Self {
    let alternatives: Vec<String> = extra_phrases
      .iter()
      .map(|p| p.trim())
      .filter(|p| !p.is_empty())
      .map(regex::escape)
      .collect();

    let extra = if alternatives.is_empty() {
      None
    } else {
      Regex::new(&format!(r"(?im)^.*({}).*$", alternatives.join("|"))).ok()
    };

    Self { extra }
  }

  pub fn strip(&self, text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "\n");
    let text = HTML_ENTITY.replace_all(&text, |caps: &Captures| decode_entity(&caps[1]));
    let text = FOOTER_LINE.replace_all(&text, "");
    let text = BYLINE.replace_all(&text, "");
    let text = TRUNCATION_MARKER.replace_all(&text, "");
    let text = match &self.extra {
      Some(re) => re.replace_all(&text, "").into_owned(),
      None => text.into_owned(),
    };
    let text = DATELINE.replace(text.trim_start(), "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
  }
}

fn decode_entity(entity: &str) -> String {
  match entity {
    "amp" => "&".to_string(),
    "quot" => "\"".to_string(),
    "apos" | "#39" => "'".to_string(),
    "lt" => "<".to_string(),
    "gt" => ">".to_string(),
    "rsquo" | "lsquo" => "'".to_string(),
    _ => {
      let code = entity
        .strip_prefix("#x")
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
      code
        .and_then(char::from_u32)
        .filter(|c| !c.is_control())
        .map(String::from)
        .unwrap_or_else(|| " ".to_string())
    }
  }
}

/// Reduces a headline to the tokens that identify the event it reports.
///
/// Money amounts are folded (`$2B`, `2 bn` and `$2 billion` all become `2b`),
/// synonyms collapse onto their group's first word, stopwords and plural `s`
/// are dropped.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
  synonyms: HashMap<String, String>,
}

impl Canonicalizer {
  pub fn new(groups: &[Vec<String>]) -> Self {
    let mut synonyms = HashMap::new();
    for group in groups {
      let Some(head) = group.first() else {
        continue;
      };
      let head = head.trim().to_lowercase();
      for word in group {
        synonyms.entry(word.trim().to_lowercase()).or_insert_with(|| head.clone());
      }
    }
    Self { synonyms }
  }

  pub fn tokens(&self, text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let folded = MONEY.replace_all(&lowered, |caps: &Captures| {
      let amount = caps[1].replace(',', "");
      format!(" {}{} ", amount, unit_code(&caps[2]))
    });

    folded
      .split(|c: char| !c.is_alphanumeric() && c != '.')
      .map(|t| t.trim_matches('.'))
      .filter(|t| !t.is_empty() && !is_stopword(t))
      .filter_map(|t| self.canonical(t))
      .collect()
  }

  fn canonical(&self, token: &str) -> Option<String> {
    if let Some(mapped) = self.synonyms.get(token) {
      return Some(mapped.clone());
    }
    let singular = singularize(token);
    if let Some(mapped) = self.synonyms.get(singular) {
      return Some(mapped.clone());
    }
    let keep = singular.chars().count() >= 2 || singular.chars().all(|c| c.is_ascii_digit());
    keep.then(|| singular.to_string())
  }
}

fn unit_code(unit: &str) -> &'static str {
  match unit {
    "trillion" | "tn" | "t" => "t",
    "billion" | "bn" | "b" => "b",
    "million" | "mn" | "m" => "m",
    "thousand" | "k" => "k",
    "crore" | "crores" | "cr" => "cr",
    _ => "l",
  }
}

fn singularize(token: &str) -> &str {
  let plural = token.len() > 3
    && token.ends_with('s')
    && !token.ends_with("ss")
    && !token.ends_with("us")
    && !token.ends_with("is")
    && !token.ends_with("ys")
    && !token.chars().any(|c| c.is_ascii_digit());
  if plural { &token[..token.len() - 1] } else { token }
}
