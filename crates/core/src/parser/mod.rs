//! Free-text item parser. Turns one spoken item description into an
//! [`ItemDraft`] using the phrase tables in [`rules`]. Negation is resolved
//! before positive detection so "no cheese" beats a later "cheese".

pub mod rules;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::item::{push_unique, ItemDraft};
use crate::errors::OrderError;
use crate::menu::{Category, MenuCatalog};

use self::rules::{
    leading_number, multiplier_value, normalize, strip_filler, tokenize, RuleSet, Term, TermKind,
    NEGATION_CHAIN_WORDS, NEGATION_GAP_WORDS,
};

#[derive(Clone, Debug)]
pub struct TextParser {
    catalog: Arc<MenuCatalog>,
    rules: RuleSet,
    max_quantity: u32,
}

/// Terms sorted into positive mentions and negated ones.
struct ScannedTerms {
    positive: Vec<Term>,
    negated: BTreeSet<(TermKind, String)>,
}

impl ScannedTerms {
    fn is_negated(&self, kind: TermKind, canonical: &str) -> bool {
        self.negated.contains(&(kind, canonical.to_string()))
    }

    fn values(&self, kind: TermKind) -> impl Iterator<Item = &str> + '_ {
        self.positive
            .iter()
            .filter(move |term| term.kind == kind)
            .filter(move |term| !self.is_negated(kind, &term.canonical))
            .map(|term| term.canonical.as_str())
    }

    fn first(&self, kind: TermKind) -> Option<&str> {
        self.values(kind).next()
    }
}

impl TextParser {
    pub fn new(catalog: Arc<MenuCatalog>, max_quantity: u32) -> Self {
        let rules = RuleSet::for_catalog(&catalog);
        Self { catalog, rules, max_quantity }
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    pub fn parse(&self, text: &str) -> Result<ItemDraft, OrderError> {
        let mut tokens = tokenize(&normalize(text));
        strip_filler(&mut tokens);
        if tokens.is_empty() {
            return Err(OrderError::ParseFailure {
                message: "I didn't catch an item there. What would you like to order?".to_string(),
            });
        }

        let quantity = self.quantity(&tokens)?;
        let scanned = classify(&tokens, self.rules.scan(&tokens));
        let category = self.category(&scanned).ok_or_else(|| OrderError::ParseFailure {
            message: format!(
                "I couldn't tell which menu item \"{}\" is. Could you say it again, for example \"small chicken kebab\"?",
                text.trim()
            ),
        })?;

        let mut draft = ItemDraft::new(category.name.clone());
        draft.quantity = quantity;
        self.apply_terms(category, &scanned, &mut draft);

        debug!(
            event_name = "order.parser.parsed",
            category = %draft.category,
            quantity = draft.quantity,
            is_combo = draft.is_combo,
            "parsed item description"
        );
        Ok(draft)
    }

    fn quantity(&self, tokens: &[String]) -> Result<u32, OrderError> {
        let leading = match tokens.first().map(String::as_str) {
            // "a couple of", "a dozen"
            Some("a" | "an") => Some(leading_number(&tokens[1..]).unwrap_or(1)),
            _ => leading_number(tokens),
        };
        let quantity = leading
            .or_else(|| tokens.iter().find_map(|token| multiplier_value(token)))
            .unwrap_or(1);

        if quantity == 0 {
            return Err(OrderError::invalid_value("quantity", "quantity must be at least 1"));
        }
        if quantity > self.max_quantity {
            return Err(OrderError::LimitExceeded {
                what: "quantity".to_string(),
                limit: self.max_quantity as usize,
            });
        }
        Ok(quantity)
    }

    fn category(&self, scanned: &ScannedTerms) -> Option<&Category> {
        let resolve = |name: &str| self.catalog.category(name).ok();
        let meal = self.catalog.meal_rules();

        if let Some(name) = scanned.first(TermKind::Category) {
            return resolve(name);
        }
        if scanned.first(TermKind::ChipsSize).is_some() {
            return resolve(&meal.chips_category);
        }
        if scanned.first(TermKind::DrinkBrand).is_some() {
            return resolve(&meal.drink_category);
        }
        None
    }

    fn apply_terms(&self, category: &Category, scanned: &ScannedTerms, draft: &mut ItemDraft) {
        let is_chips = self.catalog.is_chips(&category.name);
        let is_drink = self.catalog.is_drink(&category.name);
        let meal = self.catalog.meal_rules();

        draft.size = scanned
            .values(TermKind::Size)
            .find_map(|size| category.resolve_size(size))
            .map(str::to_string);
        if draft.size.is_none() && is_chips {
            draft.size = scanned
                .first(TermKind::ChipsSize)
                .and_then(|size| category.resolve_size(size))
                .map(str::to_string);
        }
        if draft.size.is_none() {
            draft.size = category.implied_size().map(str::to_string);
        }

        let proteins: Vec<&str> = scanned
            .values(TermKind::Protein)
            .filter(|protein| category.proteins.iter().any(|known| known == protein))
            .collect();
        draft.protein = if proteins.contains(&"lamb")
            && proteins.contains(&"chicken")
            && category.proteins.iter().any(|known| known == "mixed")
        {
            Some("mixed".to_string())
        } else {
            proteins.first().map(|protein| protein.to_string())
        };

        for salad in scanned.values(TermKind::Salad) {
            if category.salads.iter().any(|known| known == salad) {
                push_unique(&mut draft.salads, salad);
            }
        }
        if scanned.first(TermKind::AllSalads).is_some() {
            for salad in &category.salads {
                if !scanned.is_negated(TermKind::Salad, salad) {
                    push_unique(&mut draft.salads, salad.as_str());
                }
            }
        }

        for sauce in scanned.values(TermKind::Sauce) {
            if category.sauces.iter().any(|known| known == sauce) {
                push_unique(&mut draft.sauces, sauce);
            } else {
                debug!(event_name = "order.parser.term_dropped", term = sauce, category = %category.name, "sauce not offered");
            }
        }

        draft.cheese = category.default_cheese;
        for extra in scanned.values(TermKind::Extra) {
            if extra == "cheese" {
                draft.cheese = category.accepts_cheese();
            } else if category.addons.contains_key(extra) {
                draft.extras.insert(extra.to_string());
            } else {
                debug!(event_name = "order.parser.term_dropped", term = extra, category = %category.name, "add-on not offered");
            }
        }
        if scanned.is_negated(TermKind::Extra, "cheese") {
            draft.cheese = false;
        }

        draft.is_combo = category.meal_eligible
            && scanned.first(TermKind::Meal).is_some()
            && !scanned.is_negated(TermKind::Meal, "meal");

        if draft.is_combo {
            draft.chips_size = scanned
                .first(TermKind::ChipsSize)
                .filter(|size| meal.chips_upgrades.contains_key(*size))
                .map(str::to_string);
        }
        if draft.is_combo || is_chips {
            draft.chips_salt = scanned.first(TermKind::ChipsSalt).map(str::to_string);
        }
        if draft.is_combo || is_drink {
            draft.drink_brand = scanned.first(TermKind::DrinkBrand).map(str::to_string);
        }
    }
}

/// Splits scanned terms into positive mentions and negated values. A
/// negation covers the next term (skipping filler words) and carries on
/// through "or"/"nor" chains.
fn classify(tokens: &[String], terms: Vec<Term>) -> ScannedTerms {
    let mut positive = Vec::new();
    let mut negated = BTreeSet::new();
    let mut scope_end: Option<usize> = None;

    for term in terms {
        if term.kind == TermKind::Negation {
            scope_end = Some(term.end());
            continue;
        }

        let in_scope = scope_end
            .map(|end| {
                end <= term.start
                    && tokens[end..term.start].iter().all(|gap| {
                        NEGATION_GAP_WORDS.contains(&gap.as_str())
                            || NEGATION_CHAIN_WORDS.contains(&gap.as_str())
                    })
                    && tokens[end..term.start]
                        .iter()
                        .filter(|gap| NEGATION_CHAIN_WORDS.contains(&gap.as_str()))
                        .count()
                        <= 1
            })
            .unwrap_or(false);

        if in_scope {
            scope_end = next_chain_scope(tokens, term.end());
            negated.insert((term.kind, term.canonical));
        } else {
            scope_end = None;
            positive.push(term);
        }
    }

    ScannedTerms { positive, negated }
}

/// After a negated term, the negation continues only if the next word is a
/// chaining conjunction.
fn next_chain_scope(tokens: &[String], after: usize) -> Option<usize> {
    tokens
        .get(after)
        .filter(|word| NEGATION_CHAIN_WORDS.contains(&word.as_str()))
        .map(|_| after + 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::TextParser;
    use crate::errors::{ErrorKind, OrderError};
    use crate::menu::MenuCatalog;

    fn parser() -> TextParser {
        let catalog = MenuCatalog::reference().expect("reference menu loads");
        TextParser::new(Arc::new(catalog), 50)
    }

    #[test]
    fn parses_a_fully_specified_kebab() {
        let draft = parser()
            .parse("Can I get two large lamb kebabs with lettuce, tomato and garlic sauce")
            .expect("parse succeeds");

        assert_eq!(draft.category, "kebab");
        assert_eq!(draft.quantity, 2);
        assert_eq!(draft.size.as_deref(), Some("large"));
        assert_eq!(draft.protein.as_deref(), Some("lamb"));
        assert_eq!(draft.salads, vec!["lettuce", "tomato"]);
        assert_eq!(draft.sauces, vec!["garlic"]);
        assert!(!draft.is_combo);
    }

    #[test]
    fn negated_cheese_never_appears() {
        let parser = parser();
        for _ in 0..3 {
            let draft = parser
                .parse("large chicken hsp with no cheese, just barbecue sauce")
                .expect("parse succeeds");
            assert_eq!(draft.category, "hsp");
            assert!(!draft.cheese);
            assert!(!draft.extras.contains("cheese"));
            assert_eq!(draft.sauces, vec!["bbq"]);
        }
    }

    #[test]
    fn negation_precedence_is_per_term() {
        let draft = parser()
            .parse("chicken kebab with garlic and chilli, no onion or tomato, extra onion")
            .expect("parse succeeds");

        assert!(draft.salads.is_empty());
        assert_eq!(draft.sauces, vec!["garlic", "chilli"]);
    }

    #[test]
    fn negation_does_not_leak_past_the_next_term() {
        let draft = parser()
            .parse("lamb kebab without onion with lettuce and garlic")
            .expect("parse succeeds");

        assert_eq!(draft.salads, vec!["lettuce"]);
        assert_eq!(draft.sauces, vec!["garlic"]);
    }

    #[test]
    fn everything_expands_to_the_category_salads_minus_exclusions() {
        let draft =
            parser().parse("small mixed kebab with the lot but no olives").expect("parse succeeds");

        assert_eq!(draft.protein.as_deref(), Some("mixed"));
        assert!(draft.salads.contains(&"lettuce".to_string()));
        assert!(!draft.salads.contains(&"olives".to_string()));
    }

    #[test]
    fn lamb_and_chicken_become_mixed() {
        let draft = parser().parse("a large lamb and chicken kebab").expect("parse succeeds");
        assert_eq!(draft.protein.as_deref(), Some("mixed"));
        assert_eq!(draft.quantity, 1);
    }

    #[test]
    fn meal_keyword_attaches_meal_choices() {
        let draft = parser()
            .parse("small chicken kebab meal with large chips and a coke zero")
            .expect("parse succeeds");

        assert!(draft.is_combo);
        assert_eq!(draft.size.as_deref(), Some("small"));
        assert_eq!(draft.chips_size.as_deref(), Some("large"));
        assert_eq!(draft.drink_brand.as_deref(), Some("coke zero"));
    }

    #[test]
    fn meal_keyword_is_ignored_for_ineligible_categories() {
        let draft = parser().parse("large lamb hsp meal with a coke").expect("parse succeeds");

        assert!(!draft.is_combo);
        assert_eq!(draft.drink_brand, None);
        assert!(draft.cheese);
    }

    #[test]
    fn side_and_drink_orders_fall_back_to_their_categories() {
        let parser = parser();

        let chips = parser.parse("large chips with chicken salt").expect("chips parse");
        assert_eq!(chips.category, "chips");
        assert_eq!(chips.size.as_deref(), Some("large"));
        assert_eq!(chips.chips_salt.as_deref(), Some("chicken salt"));

        let drink = parser.parse("3 cans of coke").expect("drink parse");
        assert_eq!(drink.category, "drink");
        assert_eq!(drink.size.as_deref(), Some("can"));
        assert_eq!(drink.drink_brand.as_deref(), Some("coke"));
        assert_eq!(drink.quantity, 3);

        let sprite = parser.parse("a sprite").expect("sprite parse");
        assert_eq!(sprite.size.as_deref(), Some("can"));
    }

    #[test]
    fn mis_transcribed_categories_are_recognised() {
        let parser = parser();
        assert_eq!(parser.parse("h.s.p with lamb").map(|draft| draft.category).ok(), Some("hsp".to_string()));
        assert_eq!(parser.parse("one chicken kebob").map(|draft| draft.category).ok(), Some("kebab".to_string()));
    }

    #[test]
    fn unknown_items_fail_instead_of_guessing() {
        let error = parser().parse("a large pizza with pineapple").expect_err("should fail");
        assert!(matches!(error, OrderError::ParseFailure { .. }));
        assert_eq!(error.kind(), ErrorKind::Validation);

        assert!(parser().parse("   ").is_err());
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        let parser = parser();
        assert_eq!(parser.parse("0 kebabs").map_err(|error| error.kind()).err(), Some(ErrorKind::Validation));
        assert_eq!(
            parser.parse("60 chicken kebabs").map_err(|error| error.kind()).err(),
            Some(ErrorKind::LimitExceeded)
        );
        assert_eq!(parser.parse("lamb kebab x3").map(|draft| draft.quantity).ok(), Some(3));
        assert_eq!(
            parser.parse("9999999999 lamb kebabs small").map_err(|error| error.kind()).err(),
            Some(ErrorKind::LimitExceeded)
        );
        assert_eq!(
            parser.parse("lamb kebab x99999999999").map_err(|error| error.kind()).err(),
            Some(ErrorKind::LimitExceeded)
        );
    }

    #[test]
    fn compound_number_words_are_read_whole() {
        let parser = parser();
        assert_eq!(parser.parse("twenty five small lamb kebabs").map(|draft| draft.quantity).ok(), Some(25));
        assert_eq!(
            parser.parse("fifty five small lamb kebabs").map_err(|error| error.kind()).err(),
            Some(ErrorKind::LimitExceeded)
        );
    }

    #[test]
    fn article_before_a_number_word_uses_the_number() {
        assert_eq!(parser().parse("a couple of lamb kebabs").map(|draft| draft.quantity).ok(), Some(2));
    }

    #[test]
    fn unknown_add_ons_are_dropped() {
        let draft = parser().parse("small chips with halloumi and cheese").expect("parse succeeds");
        assert!(draft.extras.is_empty());
        assert!(draft.cheese);
    }
}
