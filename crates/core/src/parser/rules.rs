//! Phrase tables for the text parser. Each rule maps a spoken phrase (and its
//! common mis-transcriptions) to a canonical menu term. Catalog vocabulary is
//! merged in at construction so custom menus parse without code changes.

use serde::Serialize;

use crate::menu::MenuCatalog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Category,
    Size,
    Protein,
    Salad,
    AllSalads,
    Sauce,
    Extra,
    ChipsSize,
    ChipsSalt,
    DrinkBrand,
    Meal,
    Negation,
}

/// Static synonym table: (kind, spoken phrase, canonical value).
const SYNONYMS: &[(TermKind, &str, &str)] = &[
    (TermKind::Category, "kebap", "kebab"),
    (TermKind::Category, "kabab", "kebab"),
    (TermKind::Category, "kebob", "kebab"),
    (TermKind::Category, "cabab", "kebab"),
    (TermKind::Category, "kebbab", "kebab"),
    (TermKind::Category, "donner", "kebab"),
    (TermKind::Category, "h s p", "hsp"),
    (TermKind::Category, "hs p", "hsp"),
    (TermKind::Category, "h sp", "hsp"),
    (TermKind::Category, "hsb", "hsp"),
    (TermKind::Category, "h s b", "hsp"),
    (TermKind::Category, "aitch s p", "hsp"),
    (TermKind::Category, "hala snack pack", "hsp"),
    (TermKind::Category, "halal snak pack", "hsp"),
    (TermKind::Category, "halal pack", "hsp"),
    (TermKind::Category, "chip", "chips"),
    (TermKind::Category, "chipps", "chips"),
    (TermKind::Category, "soda", "drink"),
    (TermKind::Size, "small", "small"),
    (TermKind::Size, "smol", "small"),
    (TermKind::Size, "regular", "regular"),
    (TermKind::Size, "large", "large"),
    (TermKind::Size, "larg", "large"),
    (TermKind::Size, "big", "large"),
    (TermKind::Size, "can", "can"),
    (TermKind::Size, "bottle", "bottle"),
    (TermKind::Protein, "lam", "lamb"),
    (TermKind::Protein, "lamp", "lamb"),
    (TermKind::Protein, "chook", "chicken"),
    (TermKind::Protein, "chickn", "chicken"),
    (TermKind::Protein, "mix", "mixed"),
    (TermKind::Protein, "mixed meat", "mixed"),
    (TermKind::Protein, "felafel", "falafel"),
    (TermKind::Protein, "falafal", "falafel"),
    (TermKind::Salad, "onions", "onion"),
    (TermKind::Salad, "tabbouleh", "tabouli"),
    (TermKind::Salad, "tabouleh", "tabouli"),
    (TermKind::Salad, "pickle", "pickles"),
    (TermKind::Salad, "olive", "olives"),
    (TermKind::AllSalads, "everything", "all"),
    (TermKind::AllSalads, "the lot", "all"),
    (TermKind::AllSalads, "all salads", "all"),
    (TermKind::AllSalads, "all the salad", "all"),
    (TermKind::Sauce, "garlic sauce", "garlic"),
    (TermKind::Sauce, "chili", "chilli"),
    (TermKind::Sauce, "chilli sauce", "chilli"),
    (TermKind::Sauce, "hot sauce", "chilli"),
    (TermKind::Sauce, "sweet chili", "sweet chilli"),
    (TermKind::Sauce, "barbecue", "bbq"),
    (TermKind::Sauce, "barbeque", "bbq"),
    (TermKind::Sauce, "bbq sauce", "bbq"),
    (TermKind::Sauce, "barbecue sauce", "bbq"),
    (TermKind::Sauce, "b b q", "bbq"),
    (TermKind::Sauce, "ketchup", "tomato sauce"),
    (TermKind::Sauce, "humus", "hummus"),
    (TermKind::Sauce, "houmous", "hummus"),
    (TermKind::Sauce, "yogurt", "yoghurt"),
    (TermKind::Sauce, "mayonnaise", "mayo"),
    (TermKind::Extra, "chees", "cheese"),
    (TermKind::Extra, "extra cheese", "cheese"),
    (TermKind::Extra, "double meat", "extra meat"),
    (TermKind::Extra, "more meat", "extra meat"),
    (TermKind::Extra, "haloumi", "halloumi"),
    (TermKind::Extra, "halumi", "halloumi"),
    (TermKind::ChipsSize, "small chips", "small"),
    (TermKind::ChipsSize, "small chip", "small"),
    (TermKind::ChipsSize, "small fries", "small"),
    (TermKind::ChipsSize, "large chips", "large"),
    (TermKind::ChipsSize, "large chip", "large"),
    (TermKind::ChipsSize, "large fries", "large"),
    (TermKind::ChipsSize, "big chips", "large"),
    (TermKind::ChipsSize, "small hot chips", "small"),
    (TermKind::ChipsSize, "large hot chips", "large"),
    (TermKind::ChipsSalt, "regular salt", "plain salt"),
    (TermKind::ChipsSalt, "normal salt", "plain salt"),
    (TermKind::ChipsSalt, "just salt", "plain salt"),
    (TermKind::ChipsSalt, "without salt", "no salt"),
    (TermKind::DrinkBrand, "coca cola", "coke"),
    (TermKind::DrinkBrand, "cola", "coke"),
    (TermKind::DrinkBrand, "coke no sugar", "coke zero"),
    (TermKind::DrinkBrand, "pepsi max", "pepsi"),
    (TermKind::DrinkBrand, "lemonade", "sprite"),
    (TermKind::DrinkBrand, "mount franklin", "water"),
    (TermKind::Meal, "meal", "meal"),
    (TermKind::Meal, "combo", "meal"),
    (TermKind::Meal, "meal deal", "meal"),
    (TermKind::Meal, "make it a meal", "meal"),
    (TermKind::Negation, "no", "no"),
    (TermKind::Negation, "without", "no"),
    (TermKind::Negation, "hold the", "no"),
    (TermKind::Negation, "hold", "no"),
    (TermKind::Negation, "minus", "no"),
    (TermKind::Negation, "skip the", "no"),
    (TermKind::Negation, "except", "no"),
    (TermKind::Negation, "but no", "no"),
    (TermKind::Negation, "but not", "no"),
    (TermKind::Negation, "not", "no"),
    (TermKind::Negation, "dont want", "no"),
];

/// Leading phrases that carry no order content.
const FILLER_PREFIXES: &[&str] = &[
    "can i please get",
    "can i please have",
    "can i get",
    "can i have",
    "could i get",
    "could i have",
    "i would like",
    "id like",
    "i want",
    "ill have",
    "ill get",
    "ill take",
    "let me get",
    "lemme get",
    "give me",
    "gimme",
    "get me",
    "please",
    "yeah",
    "yes",
    "um",
    "uh",
    "and",
    "also",
    "plus",
];

/// Words allowed between a negation marker and the term it negates.
pub(crate) const NEGATION_GAP_WORDS: &[&str] = &["the", "any", "a", "an", "of", "with", "extra", "some"];

/// Words that carry a negation on to the following term.
pub(crate) const NEGATION_CHAIN_WORDS: &[&str] = &["or", "nor"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub kind: TermKind,
    pub phrase: Vec<String>,
    pub canonical: String,
}

/// A phrase occurrence accepted by the matcher, addressed by token span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub kind: TermKind,
    pub canonical: String,
    pub start: usize,
    pub len: usize,
}

impl Term {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn for_catalog(catalog: &MenuCatalog) -> Self {
        let mut set = Self::default();
        let meal = catalog.meal_rules();

        for category in catalog.categories() {
            set.push(TermKind::Category, &category.name, &category.name);
            set.push(TermKind::Category, &category.display_name, &category.name);
            for alias in &category.aliases {
                set.push(TermKind::Category, alias, &category.name);
            }
            for size in category.sizes.keys().chain(category.size_aliases.keys()) {
                set.push(TermKind::Size, size, size);
            }
            for protein in &category.proteins {
                set.push(TermKind::Protein, protein, protein);
            }
            for salad in &category.salads {
                set.push(TermKind::Salad, salad, salad);
            }
            for sauce in &category.sauces {
                set.push(TermKind::Sauce, sauce, sauce);
            }
            for addon in category.addons.keys() {
                set.push(TermKind::Extra, addon, addon);
            }
        }
        set.push(TermKind::Extra, "cheese", "cheese");
        for salt in &meal.chips_salts {
            set.push(TermKind::ChipsSalt, salt, salt);
        }
        for brand in &meal.drink_brands {
            set.push(TermKind::DrinkBrand, brand, brand);
        }

        for (kind, phrase, canonical) in SYNONYMS {
            let known = match kind {
                TermKind::Category => catalog.category(canonical).is_ok(),
                TermKind::DrinkBrand => meal.drink_brands.iter().any(|brand| brand == canonical),
                TermKind::ChipsSalt => meal.chips_salts.iter().any(|salt| salt == canonical),
                _ => true,
            };
            if known {
                set.push(*kind, phrase, canonical);
            }
        }

        set
    }

    fn push(&mut self, kind: TermKind, phrase: &str, canonical: &str) {
        let phrase = tokenize(&normalize(phrase));
        if phrase.is_empty() {
            return;
        }
        let rule = Rule { kind, phrase, canonical: canonical.to_ascii_lowercase() };
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Greedy longest-match scan. Longer phrases win over shorter ones, then
    /// earlier positions, then table order. Accepted spans never overlap and
    /// are returned in text order.
    pub fn scan(&self, tokens: &[String]) -> Vec<Term> {
        let mut candidates: Vec<(usize, Term)> = Vec::new();
        for (order, rule) in self.rules.iter().enumerate() {
            let width = rule.phrase.len();
            if width > tokens.len() {
                continue;
            }
            for start in 0..=(tokens.len() - width) {
                let window = &tokens[start..start + width];
                if window.iter().zip(&rule.phrase).all(|(token, word)| token_matches(token, word)) {
                    candidates.push((
                        order,
                        Term { kind: rule.kind, canonical: rule.canonical.clone(), start, len: width },
                    ));
                }
            }
        }

        candidates.sort_by(|(left_order, left), (right_order, right)| {
            right.len.cmp(&left.len).then(left.start.cmp(&right.start)).then(left_order.cmp(right_order))
        });

        let mut taken = vec![false; tokens.len()];
        let mut accepted = Vec::new();
        for (_, term) in candidates {
            if taken[term.start..term.end()].iter().any(|used| *used) {
                continue;
            }
            taken[term.start..term.end()].iter_mut().for_each(|used| *used = true);
            accepted.push(term);
        }

        accepted.sort_by_key(|term| term.start);
        accepted
    }
}

/// Plural tolerant token comparison: "pickles" matches "pickle", "tomatoes"
/// matches "tomato".
fn token_matches(token: &str, word: &str) -> bool {
    if token == word {
        return true;
    }
    match token.strip_prefix(word) {
        Some("s") | Some("es") => word.len() > 2,
        _ => false,
    }
}

/// Lowercases and turns punctuation into word breaks. Apostrophes are
/// dropped so "i'd" reads as "id".
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\'' || ch == '\u{2019}' {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    tokenize(&out).join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Removes leading filler phrases, repeatedly, from a normalized token list.
pub fn strip_filler(tokens: &mut Vec<String>) {
    loop {
        let prefix = FILLER_PREFIXES.iter().find_map(|phrase| {
            let words: Vec<&str> = phrase.split(' ').collect();
            let matches = words.len() <= tokens.len()
                && words.iter().zip(tokens.iter()).all(|(word, token)| token == word);
            matches.then_some(words.len())
        });
        match prefix {
            Some(width) if width < tokens.len() => {
                tokens.drain(..width);
            }
            _ => return,
        }
    }
}

/// Canonical spelling of a single value, e.g. "barbecue" as a sauce is
/// "bbq". Values without a synonym entry are returned normalized.
pub fn canonical_term(kind: TermKind, raw: &str) -> String {
    let normalized = normalize(raw);
    SYNONYMS
        .iter()
        .find(|(rule_kind, phrase, _)| *rule_kind == kind && *phrase == normalized)
        .map(|(_, _, canonical)| canonical.to_string())
        .unwrap_or(normalized)
}

/// Numeric value of a digit string or a spoken number word.
/// Digit strings too long for `u32` saturate so bounds checks still reject them.
pub fn number_value(word: &str) -> Option<u32> {
    if let Some(number) = digits_value(word) {
        return Some(number);
    }
    let value = match word {
        "zero" => 0,
        "one" => 1,
        "two" | "couple" | "pair" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" | "dozen" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        "fifteen" => 15,
        "sixteen" => 16,
        "seventeen" => 17,
        "eighteen" => 18,
        "nineteen" => 19,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "hundred" => 100,
        _ => return None,
    };
    Some(value)
}

fn digits_value(word: &str) -> Option<u32> {
    if word.is_empty() || !word.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(word.parse::<u32>().unwrap_or(u32::MAX))
}

/// Number at the start of a token list. A tens word followed by a units
/// word reads as one number: "twenty five" is 25.
pub fn leading_number(tokens: &[String]) -> Option<u32> {
    let first = tokens.first()?;
    let value = number_value(first)?;
    let is_tens_word = digits_value(first).is_none() && (20..100).contains(&value) && value % 10 == 0;
    if !is_tens_word {
        return Some(value);
    }
    let units = tokens
        .get(1)
        .filter(|next| digits_value(next).is_none())
        .and_then(|next| number_value(next))
        .filter(|units| (1..10).contains(units));
    Some(value + units.unwrap_or(0))
}

/// Quantity markers of the form "x2" or "2x".
pub fn multiplier_value(token: &str) -> Option<u32> {
    token.strip_prefix('x').or_else(|| token.strip_suffix('x')).and_then(digits_value)
}

#[cfg(test)]
mod tests {
    use super::{
        leading_number, multiplier_value, normalize, number_value, strip_filler, tokenize, RuleSet, TermKind,
    };
    use crate::menu::MenuCatalog;

    fn scan(text: &str) -> Vec<(TermKind, String)> {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        let rules = RuleSet::for_catalog(&catalog);
        rules
            .scan(&tokenize(&normalize(text)))
            .into_iter()
            .map(|term| (term.kind, term.canonical))
            .collect()
    }

    #[test]
    fn normalization_breaks_punctuation_and_drops_apostrophes() {
        assert_eq!(normalize("I'd like an H.S.P, please!"), "id like an h s p please");
    }

    #[test]
    fn filler_is_stripped_but_content_is_kept() {
        let mut tokens = tokenize("yeah can i get two kebabs");
        strip_filler(&mut tokens);
        assert_eq!(tokens, vec!["two", "kebabs"]);

        let mut only_filler = tokenize("please");
        strip_filler(&mut only_filler);
        assert_eq!(only_filler, vec!["please"]);
    }

    #[test]
    fn longest_phrase_wins() {
        assert_eq!(scan("sweet chilli"), vec![(TermKind::Sauce, "sweet chilli".to_string())]);
        assert_eq!(scan("chicken salt"), vec![(TermKind::ChipsSalt, "chicken salt".to_string())]);
        assert_eq!(scan("no salt"), vec![(TermKind::ChipsSalt, "no salt".to_string())]);
        assert_eq!(scan("tomato sauce"), vec![(TermKind::Sauce, "tomato sauce".to_string())]);
        assert_eq!(scan("large chips"), vec![(TermKind::ChipsSize, "large".to_string())]);
    }

    #[test]
    fn mis_transcriptions_map_to_canonical_terms() {
        assert_eq!(scan("h s p")[0], (TermKind::Category, "hsp".to_string()));
        assert_eq!(scan("kebob")[0], (TermKind::Category, "kebab".to_string()));
        assert_eq!(scan("barbecue")[0], (TermKind::Sauce, "bbq".to_string()));
        assert_eq!(scan("pickles")[0], (TermKind::Salad, "pickles".to_string()));
        assert_eq!(scan("tomatoes")[0], (TermKind::Salad, "tomato".to_string()));
    }

    #[test]
    fn single_values_resolve_through_the_synonym_table() {
        assert_eq!(super::canonical_term(TermKind::Sauce, "Barbecue"), "bbq");
        assert_eq!(super::canonical_term(TermKind::DrinkBrand, "Coca-Cola"), "coke");
        assert_eq!(super::canonical_term(TermKind::Salad, "lettuce"), "lettuce");
    }

    #[test]
    fn number_words_and_multipliers() {
        assert_eq!(number_value("three"), Some(3));
        assert_eq!(number_value("12"), Some(12));
        assert_eq!(number_value("lots"), None);
        assert_eq!(multiplier_value("x2"), Some(2));
        assert_eq!(multiplier_value("3x"), Some(3));
        assert_eq!(multiplier_value("x"), None);
        assert_eq!(number_value("99999999999"), Some(u32::MAX));
        assert_eq!(multiplier_value("x99999999999"), Some(u32::MAX));
    }

    #[test]
    fn tens_and_units_words_combine() {
        let tokens = |text: &str| tokenize(text);
        assert_eq!(leading_number(&tokens("twenty five kebabs")), Some(25));
        assert_eq!(leading_number(&tokens("forty nine")), Some(49));
        assert_eq!(leading_number(&tokens("twenty kebabs")), Some(20));
        assert_eq!(leading_number(&tokens("twelve one")), Some(12));
        assert_eq!(leading_number(&tokens("20 5")), Some(20));
        assert_eq!(leading_number(&tokens("kebab")), None);
    }
}
