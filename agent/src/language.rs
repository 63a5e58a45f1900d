//! Caller language handling.
//!
//! The session latches the language detected on the first substantive
//! utterance and annotates every tool call and phrase with it. Detection is
//! a closed marker-word vote, not a model: the telephony bridge gives us
//! text, and four languages with distinctive function words are separable
//! by lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Pt,
    Fr,
}

impl Language {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Pt => "pt",
            Language::Fr => "fr",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "es" => Some(Language::Es),
            "pt" => Some(Language::Pt),
            "fr" => Some(Language::Fr),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

const ES_MARKERS: &[&str] = &[
    "hola", "necesito", "quiero", "estoy", "cama", "refugio", "ayuda", "gracias", "por",
    "favor", "sin", "hogar", "noche", "donde", "dónde", "usted", "señor",
];

const PT_MARKERS: &[&str] = &[
    "olá", "ola", "preciso", "quero", "estou", "cama", "abrigo", "ajuda", "obrigado",
    "obrigada", "sem", "teto", "noite", "onde", "você", "senhor",
];

const FR_MARKERS: &[&str] = &[
    "bonjour", "besoin", "je", "suis", "lit", "abri", "aide", "merci", "nuit", "où",
    "vous", "monsieur", "dormir", "sans",
];

/// Vote on the utterance language. Returns `None` when no language is
/// clearly ahead so the caller keeps whatever it already latched.
pub fn detect(utterance: &str) -> Option<Language> {
    let words: Vec<String> = utterance
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'').to_string())
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return None;
    }

    let score = |markers: &[&str]| words.iter().filter(|w| markers.contains(&w.as_str())).count();

    let es = score(ES_MARKERS);
    let pt = score(PT_MARKERS);
    let fr = score(FR_MARKERS);

    let best = es.max(pt).max(fr);
    if best == 0 {
        // No non-English markers; an English utterance scores zero across
        // the board, so English is the informed default here.
        return Some(Language::En);
    }

    // Ambiguous ties (shared Romance vocabulary) stay undecided.
    let mut leaders = 0;
    for s in [es, pt, fr] {
        if s == best {
            leaders += 1;
        }
    }
    if leaders > 1 {
        return None;
    }

    if es == best {
        Some(Language::Es)
    } else if pt == best {
        Some(Language::Pt)
    } else {
        Some(Language::Fr)
    }
}
