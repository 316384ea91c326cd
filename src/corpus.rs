use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Annotation category assigned to a sentence or profile by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Boosters,
    Hedges,
    Both,
    None,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "boosters" => Some(Category::Boosters),
            "hedges" => Some(Category::Hedges),
            "both" => Some(Category::Both),
            "none" => Some(Category::None),
            _ => None,
        }
    }
}

/// One sentence of the corpus with its speaker metadata and baseline annotations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub nativeness: String,
    #[serde(default)]
    pub price: f64,
    /// Raw sentence without markup
    #[serde(default, alias = "plainSentence")]
    pub plain_text: String,
    /// Sentence with the baseline highlighting already applied
    #[serde(default)]
    pub sentence: String,
    #[serde(default)]
    pub original_boosters: Vec<String>,
    #[serde(default)]
    pub original_hedges: Vec<String>,
    #[serde(default)]
    pub all_words: Vec<String>,
    #[serde(default)]
    pub booster_count: u32,
    #[serde(default)]
    pub hedge_count: u32,
    /// Zero-based position of the sentence within the speaker's profile
    #[serde(default)]
    pub sentence_index: usize,
    #[serde(default)]
    pub category: Option<Category>,
    /// Key of the speaker's entry in the profile collection
    #[serde(default)]
    pub url: Option<String>,
}

/// Aggregate of all sentences from one speaker
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub nativeness: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub full_text: String,
    #[serde(default)]
    pub all_words: Vec<String>,
    #[serde(default)]
    pub total_booster_count: u32,
    #[serde(default)]
    pub total_hedge_count: u32,
    #[serde(default)]
    pub booster_frequency: HashMap<String, u32>,
    #[serde(default)]
    pub hedge_frequency: HashMap<String, u32>,
}

impl Profile {
    /// Boosters ordered by descending frequency, ties by word
    pub fn top_boosters(&self) -> Vec<(&str, u32)> {
        ranked(&self.booster_frequency)
    }

    /// Hedges ordered by descending frequency, ties by word
    pub fn top_hedges(&self) -> Vec<(&str, u32)> {
        ranked(&self.hedge_frequency)
    }
}

fn ranked(frequency: &HashMap<String, u32>) -> Vec<(&str, u32)> {
    let mut words: Vec<(&str, u32)> = frequency.iter().map(|(w, c)| (w.as_str(), *c)).collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    words
}

/// Fields shared by sentence and profile cards, used by filtering and sorting
pub trait Listing {
    fn name(&self) -> &str;
    fn gender(&self) -> &str;
    fn language(&self) -> &str;
    fn country(&self) -> &str;
    fn nativeness(&self) -> &str;
    fn price(&self) -> f64;
    fn booster_total(&self) -> u32;
    fn hedge_total(&self) -> u32;
    fn words(&self) -> &[String];
    fn category(&self) -> Option<Category>;
}

impl Listing for Record {
    fn name(&self) -> &str {
        &self.name
    }
    fn gender(&self) -> &str {
        &self.gender
    }
    fn language(&self) -> &str {
        &self.language
    }
    fn country(&self) -> &str {
        &self.country
    }
    fn nativeness(&self) -> &str {
        &self.nativeness
    }
    fn price(&self) -> f64 {
        self.price
    }
    fn booster_total(&self) -> u32 {
        self.booster_count
    }
    fn hedge_total(&self) -> u32 {
        self.hedge_count
    }
    fn words(&self) -> &[String] {
        &self.all_words
    }
    fn category(&self) -> Option<Category> {
        self.category
    }
}

impl Listing for Profile {
    fn name(&self) -> &str {
        &self.name
    }
    fn gender(&self) -> &str {
        &self.gender
    }
    fn language(&self) -> &str {
        &self.language
    }
    fn country(&self) -> &str {
        &self.country
    }
    fn nativeness(&self) -> &str {
        &self.nativeness
    }
    fn price(&self) -> f64 {
        self.price
    }
    fn booster_total(&self) -> u32 {
        self.total_booster_count
    }
    fn hedge_total(&self) -> u32 {
        self.total_hedge_count
    }
    fn words(&self) -> &[String] {
        &self.all_words
    }
    fn category(&self) -> Option<Category> {
        self.category
    }
}

/// Read-only sentence and profile collections, loaded once at startup
#[derive(Debug, Default)]
pub struct Corpus {
    records: Vec<Record>,
    index: HashMap<String, usize>,
    profiles: BTreeMap<String, Profile>,
}

impl Corpus {
    pub fn new(records: Vec<Record>, profiles: BTreeMap<String, Profile>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (pos, record) in records.iter().enumerate() {
            if index.contains_key(&record.id) {
                warn!("Duplicate record id '{}' ignored for lookups", record.id);
                continue;
            }
            index.insert(record.id.clone(), pos);
        }
        Self {
            records,
            index,
            profiles,
        }
    }

    /// Load the sentence collection and, if given, the profile collection
    pub fn load(
        corpus_source: &str,
        profiles_source: Option<&str>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let records: Vec<Record> = load_source(corpus_source)?;
        info!("Loaded {} records from {}", records.len(), corpus_source);

        let profiles: BTreeMap<String, Profile> = match profiles_source {
            Some(source) => {
                let profiles: BTreeMap<String, Profile> = load_source(source)?;
                info!("Loaded {} profiles from {}", profiles.len(), source);
                profiles
            }
            None => BTreeMap::new(),
        };

        Ok(Self::new(records, profiles))
    }

    pub fn record(&self, id: &str) -> Option<&Record> {
        self.index.get(id).map(|&pos| &self.records[pos])
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.get(id)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}

/// Whether a data source names a remote document rather than a local file
pub fn is_remote_source(source: &str) -> bool {
    match url::Url::parse(source) {
        Ok(url) => url.scheme() == "http" || url.scheme() == "https",
        Err(_) => false,
    }
}

/// Fetch a JSON document from an http(s) URL or read it from disk
pub fn load_source<T: DeserializeOwned>(source: &str) -> Result<T, Box<dyn std::error::Error>> {
    if is_remote_source(source) {
        let response = reqwest::blocking::get(source)
            .map_err(|e| format!("Failed to fetch '{}': {}", source, e))?;
        if !response.status().is_success() {
            return Err(format!("HTTP error fetching '{}': {}", source, response.status()).into());
        }
        let value = response
            .json::<T>()
            .map_err(|e| format!("Failed to parse '{}': {}", source, e))?;
        return Ok(value);
    }

    let path = Path::new(source);
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    Ok(value)
}
