use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fomo::identity::name_hash;
use crate::fomo::store::ObfuscatedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

impl Gender {
    fn portrait_dir(self) -> &'static str {
        match self {
            Gender::Male => "men",
            Gender::Female => "women",
        }
    }
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Override,
    FirstName,
    Learned,
    Suffix,
    HashParity,
}

impl Source {
    /// Guesses that have to be remembered to stay stable.
    pub fn is_guess(self) -> bool {
        matches!(self, Source::Suffix | Source::HashParity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inference {
    pub gender: Gender,
    pub source: Source,
}

static SUFFIX_RULES: Lazy<Vec<(Regex, Gender)>> = Lazy::new(|| {
    [
        (r"(?i)(a|ia|ta|na|la|ra|ya|za)$", Gender::Female),
        (r"(?i)(ette|elle|ine|ika)$", Gender::Female),
        (r"(?i)(son|ton|us|o|an|en|yn|ias|ian|ko|mir)$", Gender::Male),
    ]
    .into_iter()
    .filter_map(|(pattern, gender)| Regex::new(pattern).ok().map(|re| (re, gender)))
    .collect()
});

fn first_name(full: &str) -> &str {
    full.split(' ').next().unwrap_or("")
}

/// Suffix rules on the first name, then hash parity of the full name.
pub fn heuristic_guess(full: &str) -> Inference {
    let first = first_name(full).to_lowercase();
    for (re, gender) in SUFFIX_RULES.iter() {
        if re.is_match(&first) {
            return Inference {
                gender: *gender,
                source: Source::Suffix,
            };
        }
    }
    let gender = if name_hash(full) % 2 == 0 {
        Gender::Male
    } else {
        Gender::Female
    };
    Inference {
        gender,
        source: Source::HashParity,
    }
}

/// Pure part of gender classification: static tables plus heuristics.
#[derive(Debug, Clone)]
pub struct GenderClassifier {
    overrides: HashMap<String, Gender>,
    first_names: HashMap<String, Gender>,
}

impl GenderClassifier {
    pub fn new(overrides: &[(&str, Gender)], first_names: &[(&str, Gender)]) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(name, g)| (name.to_string(), *g))
                .collect(),
            first_names: first_names
                .iter()
                .map(|(name, g)| (name.to_lowercase(), *g))
                .collect(),
        }
    }

    pub fn infer(&self, full: &str, learned: &BTreeMap<String, Gender>) -> Inference {
        if let Some(gender) = self.overrides.get(full) {
            return Inference {
                gender: *gender,
                source: Source::Override,
            };
        }
        if let Some(gender) = self.first_names.get(&first_name(full).to_lowercase()) {
            return Inference {
                gender: *gender,
                source: Source::FirstName,
            };
        }
        if let Some(gender) = learned.get(full) {
            return Inference {
                gender: *gender,
                source: Source::Learned,
            };
        }
        heuristic_guess(full)
    }
}

/// Write-through cache of heuristic guesses, keyed by exact full name.
pub struct LearnedGenders {
    storage_key: String,
    entries: BTreeMap<String, Gender>,
}

impl LearnedGenders {
    pub fn empty(storage_key: &str) -> Self {
        Self {
            storage_key: storage_key.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn load(store: &ObfuscatedStore, storage_key: &str) -> Self {
        let entries = store.get(storage_key).unwrap_or_default();
        Self {
            storage_key: storage_key.to_string(),
            entries,
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, Gender> {
        &self.entries
    }

    pub fn record(&mut self, store: &ObfuscatedStore, name: &str, gender: Gender) {
        self.entries.insert(name.to_string(), gender);
        if let Err(e) = store.set(&self.storage_key, &self.entries) {
            log::warn!("Persisting learned genders failed: {}", e);
        }
    }
}

/// Classifier plus its persisted cache; derives portrait URLs.
pub struct GenderResolver {
    classifier: GenderClassifier,
    learned: LearnedGenders,
    store: ObfuscatedStore,
}

impl GenderResolver {
    pub fn new(classifier: GenderClassifier, store: ObfuscatedStore, storage_key: &str) -> Self {
        Self {
            classifier,
            learned: LearnedGenders::empty(storage_key),
            store,
        }
    }

    /// Pulls the persisted guesses in. Called once the engine hydrates.
    pub fn hydrate(&mut self) {
        let key = self.learned.storage_key.clone();
        self.learned = LearnedGenders::load(&self.store, &key);
    }

    pub fn classify(&mut self, full: &str) -> Gender {
        let inference = self.classifier.infer(full, self.learned.entries());
        if inference.source.is_guess() {
            log::debug!("Learned {:?} for {} via {:?}", inference.gender, full, inference.source);
            self.learned.record(&self.store, full, inference.gender);
        }
        inference.gender
    }

    pub fn avatar_for(&mut self, full: &str, slots: u32) -> String {
        self.alternate_avatar(full, 0, slots)
    }

    /// Portrait `attempt` steps past the primary one, for image load errors.
    pub fn alternate_avatar(&mut self, full: &str, attempt: u32, slots: u32) -> String {
        let gender = self.classify(full);
        let slots = slots.max(1);
        let index = (name_hash(full) % slots + attempt % slots) % slots;
        portrait_url(gender, index)
    }
}

pub fn portrait_url(gender: Gender, index: u32) -> String {
    format!(
        "https://randomuser.me/api/portraits/{}/{}.jpg",
        gender.portrait_dir(),
        index
    )
}
