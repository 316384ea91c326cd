use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::constants::{DEFAULT_PAGE_SIZE, PAGER_WINDOW};
use crate::corpus::{Category, Corpus, Listing, Profile, Record};
use crate::edits::EditMap;
use crate::highlight::card_text;

/// Card ordering offered by the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    #[default]
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    BoostersDesc,
    HedgesDesc,
}

type Comparator<L> = fn(&L, &L) -> Ordering;

fn by_name<L: Listing>(a: &L, b: &L) -> Ordering {
    a.name()
        .to_lowercase()
        .cmp(&b.name().to_lowercase())
        .then_with(|| a.name().cmp(b.name()))
}

fn by_price<L: Listing>(a: &L, b: &L) -> Ordering {
    a.price().total_cmp(&b.price())
}

fn by_boosters<L: Listing>(a: &L, b: &L) -> Ordering {
    a.booster_total().cmp(&b.booster_total())
}

fn by_hedges<L: Listing>(a: &L, b: &L) -> Ordering {
    a.hedge_total().cmp(&b.hedge_total())
}

impl SortMode {
    pub const ALL: [SortMode; 6] = [
        SortMode::NameAsc,
        SortMode::NameDesc,
        SortMode::PriceAsc,
        SortMode::PriceDesc,
        SortMode::BoostersDesc,
        SortMode::HedgesDesc,
    ];

    /// Ascending comparator underlying this mode
    pub fn comparator<L: Listing>(self) -> Comparator<L> {
        match self {
            SortMode::NameAsc | SortMode::NameDesc => by_name::<L>,
            SortMode::PriceAsc | SortMode::PriceDesc => by_price::<L>,
            SortMode::BoostersDesc => by_boosters::<L>,
            SortMode::HedgesDesc => by_hedges::<L>,
        }
    }

    pub fn descending(self) -> bool {
        matches!(
            self,
            SortMode::NameDesc | SortMode::PriceDesc | SortMode::BoostersDesc | SortMode::HedgesDesc
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            SortMode::NameAsc => "Name A-Z",
            SortMode::NameDesc => "Name Z-A",
            SortMode::PriceAsc => "Price Low-High",
            SortMode::PriceDesc => "Price High-Low",
            SortMode::BoostersDesc => "Most Boosters",
            SortMode::HedgesDesc => "Most Hedges",
        }
    }

    /// Stable sort of `items` in this order
    pub fn sort<L: Listing>(self, items: &mut [&L]) {
        let cmp = self.comparator::<L>();
        if self.descending() {
            items.sort_by(|a, b| cmp(b, a));
        } else {
            items.sort_by(|a, b| cmp(a, b));
        }
    }
}

/// List request as sent by the frontend; "all" or an absent value disables a filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub gender: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub nativeness: Option<String>,
    pub word: Option<String>,
    /// Comma-separated categories, e.g. `boosters,both`
    pub category: Option<String>,
    #[serde(default)]
    pub sort: SortMode,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

fn active(value: &Option<String>) -> Option<&str> {
    match value.as_deref() {
        None | Some("") | Some("all") => None,
        Some(v) => Some(v),
    }
}

impl ListQuery {
    /// Categories to keep, `None` when every category is shown
    pub fn categories(&self) -> Option<Vec<Category>> {
        active(&self.category)
            .map(|list| list.split(',').filter_map(|c| Category::parse(c.trim())).collect())
    }

    /// Whether `item` passes every active filter
    pub fn matches<L: Listing>(&self, item: &L) -> bool {
        let field = |filter: &Option<String>, value: &str| match active(filter) {
            Some(wanted) => wanted == value,
            None => true,
        };

        field(&self.gender, item.gender())
            && field(&self.language, item.language())
            && field(&self.country, item.country())
            && field(&self.nativeness, item.nativeness())
            && match active(&self.word) {
                Some(word) => item.words().iter().any(|w| w == word),
                None => true,
            }
            && match self.categories() {
                Some(categories) => item
                    .category()
                    .map(|c| categories.contains(&c))
                    .unwrap_or(false),
                None => true,
            }
    }
}

/// Slice bounds and pager state for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
    /// Page numbers to show as buttons
    pub pager: Vec<usize>,
}

/// Pagination over `len` items; an out-of-range page falls back to the first
pub fn paginate(len: usize, page: usize, page_size: usize) -> PageWindow {
    let page_size = page_size.max(1);
    let total_pages = len.div_ceil(page_size).max(1);
    let page = if page == 0 || page > total_pages { 1 } else { page };

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(len);

    let first = page.saturating_sub(2).max(1);
    let last = (first + PAGER_WINDOW - 1).min(total_pages);

    PageWindow {
        page,
        page_size,
        total_pages,
        start,
        end,
        pager: (first..=last).collect(),
    }
}

/// One page of cards plus the counters shown above them
#[derive(Debug, Serialize)]
pub struct PageView<T> {
    pub total: usize,
    pub filtered: usize,
    pub displayed: usize,
    #[serde(flatten)]
    pub window: PageWindow,
    pub items: Vec<T>,
}

fn select<'a, L: Listing>(
    items: impl Iterator<Item = &'a L>,
    query: &ListQuery,
    default_page_size: usize,
) -> (usize, Vec<&'a L>, PageWindow)
where
    L: 'a,
{
    let mut total = 0;
    let mut filtered: Vec<&L> = items
        .inspect(|_| total += 1)
        .filter(|item| query.matches(*item))
        .collect();
    query.sort.sort(&mut filtered);

    let window = paginate(
        filtered.len(),
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(default_page_size),
    );
    (total, filtered, window)
}

#[derive(Debug, Clone, Serialize)]
pub struct SentenceCard {
    pub id: String,
    pub name: String,
    pub gender: String,
    pub language: String,
    pub country: String,
    pub nativeness: String,
    pub price: f64,
    /// One-based position in the speaker's profile
    pub sentence_number: usize,
    pub booster_count: u32,
    pub hedge_count: u32,
    pub category: Option<Category>,
    pub profile: Option<String>,
    pub edited: bool,
    /// Highlighted sentence markup
    pub text: String,
}

impl SentenceCard {
    pub fn build(record: &Record, edits: &EditMap) -> Self {
        let entry = edits.get(&record.id);
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            gender: record.gender.clone(),
            language: record.language.clone(),
            country: record.country.clone(),
            nativeness: record.nativeness.clone(),
            price: record.price,
            sentence_number: record.sentence_index + 1,
            booster_count: record.booster_count,
            hedge_count: record.hedge_count,
            category: record.category,
            profile: record.url.clone(),
            edited: entry.is_some(),
            text: card_text(record, entry).into_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WordCount {
    pub word: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileCard {
    pub url: String,
    pub name: String,
    pub gender: String,
    pub language: String,
    pub country: String,
    pub nativeness: String,
    pub price: f64,
    pub category: Option<Category>,
    pub booster_count: u32,
    pub hedge_count: u32,
    pub full_text: String,
    pub top_boosters: Vec<WordCount>,
    pub top_hedges: Vec<WordCount>,
}

impl ProfileCard {
    pub fn build(profile: &Profile) -> Self {
        let counts = |words: Vec<(&str, u32)>| {
            words
                .into_iter()
                .map(|(word, count)| WordCount {
                    word: word.to_string(),
                    count,
                })
                .collect()
        };
        Self {
            url: profile.url.clone(),
            name: profile.name.clone(),
            gender: profile.gender.clone(),
            language: profile.language.clone(),
            country: profile.country.clone(),
            nativeness: profile.nativeness.clone(),
            price: profile.price,
            category: profile.category,
            booster_count: profile.total_booster_count,
            hedge_count: profile.total_hedge_count,
            full_text: profile.full_text.clone(),
            top_boosters: counts(profile.top_boosters()),
            top_hedges: counts(profile.top_hedges()),
        }
    }
}

/// Filtered, sorted page of sentence cards
pub fn list_records(corpus: &Corpus, edits: &EditMap, query: &ListQuery) -> PageView<SentenceCard> {
    list_records_with_page_size(corpus, edits, query, DEFAULT_PAGE_SIZE)
}

pub fn list_records_with_page_size(
    corpus: &Corpus,
    edits: &EditMap,
    query: &ListQuery,
    default_page_size: usize,
) -> PageView<SentenceCard> {
    let (total, filtered, window) = select(corpus.records().iter(), query, default_page_size);
    let items: Vec<SentenceCard> = filtered[window.start..window.end]
        .iter()
        .map(|record| SentenceCard::build(record, edits))
        .collect();

    PageView {
        total,
        filtered: filtered.len(),
        displayed: items.len(),
        window,
        items,
    }
}

/// Filtered, sorted page of profile cards
pub fn list_profiles(
    corpus: &Corpus,
    query: &ListQuery,
    default_page_size: usize,
) -> PageView<ProfileCard> {
    let (total, filtered, window) = select(corpus.profiles(), query, default_page_size);
    let items: Vec<ProfileCard> = filtered[window.start..window.end]
        .iter()
        .map(|profile| ProfileCard::build(profile))
        .collect();

    PageView {
        total,
        filtered: filtered.len(),
        displayed: items.len(),
        window,
        items,
    }
}

/// Distinct non-empty values for each filter drop-down
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacetOptions {
    pub genders: Vec<String>,
    pub languages: Vec<String>,
    pub countries: Vec<String>,
    pub nativenesses: Vec<String>,
    pub words: Vec<String>,
    pub sorts: Vec<SortOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortOption {
    pub value: SortMode,
    pub label: &'static str,
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn facet_options(records: &[Record]) -> FacetOptions {
    FacetOptions {
        genders: distinct(records.iter().map(|r| r.gender.as_str())),
        languages: distinct(records.iter().map(|r| r.language.as_str())),
        countries: distinct(records.iter().map(|r| r.country.as_str())),
        nativenesses: distinct(records.iter().map(|r| r.nativeness.as_str())),
        words: distinct(records.iter().flat_map(|r| r.all_words.iter().map(String::as_str))),
        sorts: SortMode::ALL
            .iter()
            .map(|&value| SortOption {
                value,
                label: value.label(),
            })
            .collect(),
    }
}
