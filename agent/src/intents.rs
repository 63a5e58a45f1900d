//! Intent classification over a closed set.
//!
//! Classification is strict by design: `crisis` fires only on an explicit
//! phrase from the closed multilingual self-harm lexicon, checked across
//! every language regardless of what the session latched. Statements of
//! homelessness, hunger or urgency are shelter need, never crisis.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    BedInquiry,
    Chapel,
    Volunteer,
    Donation,
    Crisis,
    Farewell,
    Other,
}

/// Closed multilingual self-harm keyword set. Compiled-in defaults are the
/// deployment baseline; `CRISIS_LEXICON_PATH` may point at a JSON override
/// (`{"en": ["..."], "es": [...]}`). Additions require redeploy either way.
#[derive(Debug, Clone)]
pub struct CrisisLexicon {
    phrases: HashMap<Language, Vec<String>>,
}

#[derive(Deserialize)]
struct LexiconFile(HashMap<String, Vec<String>>);

impl CrisisLexicon {
    pub fn builtin() -> Self {
        let mut phrases = HashMap::new();
        phrases.insert(
            Language::En,
            to_owned(&[
                "kill myself",
                "suicide",
                "suicidal",
                "end my life",
                "want to die",
                "hurt myself",
            ]),
        );
        phrases.insert(
            Language::Es,
            to_owned(&[
                "matarme",
                "suicidarme",
                "suicidio",
                "quiero morir",
                "quitarme la vida",
                "hacerme daño",
            ]),
        );
        phrases.insert(
            Language::Pt,
            to_owned(&[
                "me matar",
                "suicidar",
                "suicídio",
                "quero morrer",
                "tirar minha vida",
                "me machucar",
            ]),
        );
        phrases.insert(
            Language::Fr,
            to_owned(&[
                "me tuer",
                "me suicider",
                "suicide",
                "veux mourir",
                "mettre fin à ma vie",
                "me faire du mal",
            ]),
        );
        Self { phrases }
    }

    /// Load overrides from a JSON file; unknown language tags are rejected
    /// so a typo cannot silently drop a language.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let parsed: LexiconFile = serde_json::from_str(&raw)?;

        let mut phrases = HashMap::new();
        for (tag, list) in parsed.0 {
            let lang = Language::from_tag(&tag)
                .ok_or_else(|| anyhow::anyhow!("unknown language tag in crisis lexicon: {tag}"))?;
            phrases.insert(lang, list.into_iter().map(|p| p.to_lowercase()).collect());
        }

        info!(path = %path.display(), "crisis lexicon loaded from file");
        Ok(Self { phrases })
    }

    /// Builtin lexicon unless `CRISIS_LEXICON_PATH` names an override.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var("CRISIS_LEXICON_PATH") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => Ok(Self::builtin()),
        }
    }

    /// True if the utterance contains a crisis phrase in any language.
    pub fn matches(&self, utterance: &str) -> bool {
        let normalized = utterance.to_lowercase();
        self.phrases
            .values()
            .flatten()
            .any(|phrase| normalized.contains(phrase.as_str()))
    }
}

fn to_owned(phrases: &[&str]) -> Vec<String> {
    phrases.iter().map(|p| p.to_lowercase()).collect()
}

pub struct IntentClassifier {
    crisis: CrisisLexicon,
}

const FAREWELL_PHRASES: &[&str] = &[
    "goodbye",
    "bye",
    "that's all",
    "that is all",
    "adiós",
    "adios",
    "hasta luego",
    "tchau",
    "adeus",
    "au revoir",
];

const CHAPEL_TERMS: &[&str] = &[
    "chapel", "worship", "mass", "capilla", "misa", "culto", "capela", "chapelle", "messe",
    "prayer service", "church service", "servicio religioso", "oración", "oração", "prière",
];

const VOLUNTEER_TERMS: &[&str] = &[
    "volunteer", "volunteering", "voluntario", "voluntaria", "voluntário", "voluntária",
    "bénévole", "benevole",
];

const DONATION_TERMS: &[&str] = &[
    "donate", "donation", "donación", "donacion", "donar", "doação", "doacao", "doar",
    "faire un don", "contribution",
];

const BED_TERMS: &[&str] = &[
    "bed", "shelter", "sleep", "homeless", "stay the night", "tonight", "cama", "refugio",
    "albergue", "sin hogar", "dormir", "abrigo", "sem teto", "lit", "abri", "sans abri",
    "hébergement", "hebergement", "hungry", "evicted", "eviction",
];

impl IntentClassifier {
    pub fn new(crisis: CrisisLexicon) -> Self {
        Self { crisis }
    }

    pub fn is_crisis(&self, utterance: &str) -> bool {
        self.crisis.matches(utterance)
    }

    /// Single-token farewells match whole words only ("maybe" is not a
    /// goodbye); multi-word phrases match by containment.
    pub fn is_farewell(&self, utterance: &str) -> bool {
        let normalized = utterance.to_lowercase();
        let words: Vec<&str> = normalized
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        FAREWELL_PHRASES.iter().any(|p| {
            if p.contains(' ') {
                normalized.contains(p)
            } else {
                words.iter().any(|w| w == p)
            }
        })
    }

    /// Classify one utterance. Precedence: crisis, then farewell, then the
    /// narrower topical intents before the broad bed vocabulary, so
    /// "I want to donate beds" routes to donation.
    pub fn classify(&self, utterance: &str) -> Intent {
        if self.is_crisis(utterance) {
            return Intent::Crisis;
        }
        if self.is_farewell(utterance) {
            return Intent::Farewell;
        }

        let normalized = utterance.to_lowercase();
        let has = |terms: &[&str]| terms.iter().any(|t| normalized.contains(t));

        if has(CHAPEL_TERMS) {
            Intent::Chapel
        } else if has(VOLUNTEER_TERMS) {
            Intent::Volunteer
        } else if has(DONATION_TERMS) {
            Intent::Donation
        } else if has(BED_TERMS) {
            Intent::BedInquiry
        } else {
            Intent::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new(CrisisLexicon::builtin())
    }

    #[test]
    fn crisis_requires_explicit_phrases_in_every_language() {
        let c = classifier();
        for utterance in [
            "I want to kill myself",
            "I'm feeling suicidal",
            "Quiero matarme.",
            "Quiero quitarme la vida",
            "Eu quero me matar",
            "Quero morrer",
            "Je veux me tuer",
            "Je veux mourir",
        ] {
            assert_eq!(c.classify(utterance), Intent::Crisis, "{utterance}");
        }
    }

    #[test]
    fn shelter_need_is_never_crisis() {
        let c = classifier();
        for utterance in [
            "I'm homeless and desperate, I need a bed tonight",
            "I'm hungry and have nowhere to sleep",
            "Necesito una cama, estoy sin hogar",
            "Preciso de um abrigo, estou sem teto",
            "Je suis sans abri, il me faut un lit",
        ] {
            assert_eq!(c.classify(utterance), Intent::BedInquiry, "{utterance}");
        }
    }

    #[test]
    fn topical_intents_win_over_bed_vocabulary() {
        let c = classifier();
        assert_eq!(c.classify("I'd like to donate some beds"), Intent::Donation);
        assert_eq!(c.classify("Can I volunteer at the shelter?"), Intent::Volunteer);
        assert_eq!(
            c.classify("I want to book the chapel for a service"),
            Intent::Chapel
        );
    }

    #[test]
    fn farewell_and_other() {
        let c = classifier();
        assert_eq!(c.classify("Okay, goodbye"), Intent::Farewell);
        assert_eq!(c.classify("Hasta luego"), Intent::Farewell);
        assert_eq!(c.classify("What's the weather like?"), Intent::Other);
        // "maybe" contains "bye" but is not a goodbye.
        assert!(!c.is_farewell("maybe"));
    }

    #[test]
    fn lexicon_file_overrides_builtin() {
        let dir = std::env::temp_dir().join(format!("lexicon-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("crisis.json");
        std::fs::write(&path, r#"{"en": ["custom trigger"]}"#).unwrap();

        let lexicon = CrisisLexicon::from_file(&path).unwrap();
        assert!(lexicon.matches("this has a CUSTOM TRIGGER inside"));
        // Builtin Spanish phrases are gone; the file is the closed set.
        assert!(!lexicon.matches("quiero matarme"));
    }

    #[test]
    fn lexicon_file_rejects_unknown_language_tags() {
        let dir = std::env::temp_dir().join(format!("lexicon-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("crisis.json");
        std::fs::write(&path, r#"{"xx": ["whatever"]}"#).unwrap();

        assert!(CrisisLexicon::from_file(&path).is_err());
    }

    proptest! {
        /// Padding a shelter-need sentence with arbitrary non-lexicon noise
        /// never upgrades it to crisis.
        #[test]
        fn bed_inquiries_stay_bed_inquiries_under_noise(noise in "[a-z ]{0,40}") {
            let c = classifier();
            let utterance = format!("I need a bed tonight {noise}");
            prop_assert_ne!(c.classify(&utterance), Intent::Crisis);
        }
    }
}
