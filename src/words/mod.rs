//! Spelling monetary amounts out in words, as required on Polish invoices
//! ("słownie").
//!
//! The integer part is split into thousands groups. Each group is spelled from
//! the hundreds/teens/tens/units tables of a [`Lexicon`] and followed by the
//! scale noun (tysiąc, milion, ...) in the form picked by the locale's plural
//! rule. The currency noun is chosen by the same rule over the whole integer
//! and the minor units close the phrase as an `NN/100` token.

pub mod polish;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{round_money, DocumentError, DocumentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluralCategory {
    One,
    Few,
    Many,
}

/// Singular, "few" and "many" forms of a noun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluralForms {
    pub one: &'static str,
    pub few: &'static str,
    pub many: &'static str,
}

impl PluralForms {
    pub const fn new(one: &'static str, few: &'static str, many: &'static str) -> Self {
        PluralForms { one, few, many }
    }

    pub fn select(&self, category: PluralCategory) -> &'static str {
        match category {
            PluralCategory::One => self.one,
            PluralCategory::Few => self.few,
            PluralCategory::Many => self.many,
        }
    }
}

/// Word tables for one language, indexed by magnitude class.
pub struct Lexicon {
    pub zero: &'static str,
    /// `units[0]` is unused.
    pub units: [&'static str; 10],
    /// 10 through 19.
    pub teens: [&'static str; 10],
    /// `tens[0]` and `tens[1]` are unused.
    pub tens: [&'static str; 10],
    pub hundreds: [&'static str; 10],
    /// `scales[0]` names 10^3, `scales[1]` 10^6 and so on.
    pub scales: &'static [PluralForms],
    pub currency: PluralForms,
    pub currency_code: &'static str,
    pub plural: fn(u128) -> PluralCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    Polish,
}

impl Locale {
    pub fn lexicon(&self) -> &'static Lexicon {
        match self {
            Locale::Polish => &polish::LEXICON,
        }
    }
}

/// An amount spelled out word by word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountInWords {
    words: Vec<String>,
}

impl AmountInWords {
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl fmt::Display for AmountInWords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.words.join(" "))
    }
}

/// Spells `amount` out. The amount is first rounded to whole minor units.
pub fn amount_to_words(amount: Decimal, locale: Locale) -> DocumentResult<AmountInWords> {
    if amount < Decimal::ZERO {
        return Err(DocumentError::invalid_amount(format!(
            "cannot spell a negative amount: {}",
            amount
        )));
    }
    let rounded = round_money(amount);

    let lexicon = locale.lexicon();
    let major = whole_units(rounded.trunc());
    let minor = whole_units((rounded - rounded.trunc()) * Decimal::ONE_HUNDRED);

    let mut words: Vec<String> = integer_words(major, lexicon)
        .into_iter()
        .map(str::to_string)
        .collect();
    words.push(lexicon.currency.select((lexicon.plural)(major)).to_string());
    words.push(format!("{:02}/100", minor));
    words.push(lexicon.currency_code.to_string());

    Ok(AmountInWords { words })
}

/// Same as [`amount_to_words`] for callers holding a float.
pub fn amount_to_words_f64(amount: f64, locale: Locale) -> DocumentResult<AmountInWords> {
    if !amount.is_finite() {
        return Err(DocumentError::invalid_amount(format!(
            "amount is not finite: {}",
            amount
        )));
    }
    let decimal = Decimal::try_from(amount)
        .map_err(|e| DocumentError::invalid_amount(format!("{}: {}", amount, e)))?;
    amount_to_words(decimal, locale)
}

fn whole_units(value: Decimal) -> u128 {
    let mut value = value.trunc();
    value.rescale(0);
    value.mantissa().unsigned_abs()
}

/// Words for a non-negative integer up to the largest `Decimal`, without the
/// currency noun.
fn integer_words(n: u128, lexicon: &Lexicon) -> Vec<&'static str> {
    if n == 0 {
        return vec![lexicon.zero];
    }

    let mut groups = Vec::new();
    let mut rest = n;
    while rest > 0 {
        groups.push((rest % 1000) as usize);
        rest /= 1000;
    }

    let mut words = Vec::new();
    for (magnitude, &group) in groups.iter().enumerate().rev() {
        if group == 0 {
            continue;
        }
        if magnitude == 0 {
            words.extend(group_words(group, lexicon));
            continue;
        }

        let scale = &lexicon.scales[magnitude - 1];
        if group == 1 {
            words.push(scale.one);
        } else {
            words.extend(group_words(group, lexicon));
            words.push(scale.select((lexicon.plural)(group as u128)));
        }
    }
    words
}

/// Words for 1..=999.
fn group_words(group: usize, lexicon: &Lexicon) -> Vec<&'static str> {
    let mut words = Vec::with_capacity(3);
    let hundreds = group / 100;
    let rest = group % 100;

    if hundreds > 0 {
        words.push(lexicon.hundreds[hundreds]);
    }
    if (10..=19).contains(&rest) {
        words.push(lexicon.teens[rest - 10]);
    } else {
        if rest >= 20 {
            words.push(lexicon.tens[rest / 10]);
        }
        if rest % 10 > 0 {
            words.push(lexicon.units[rest % 10]);
        }
    }
    words
}
