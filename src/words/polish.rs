//! Polish number words and złoty forms.

use super::{Lexicon, PluralCategory, PluralForms};

const UNITS: [&str; 10] = [
    "", "jeden", "dwa", "trzy", "cztery", "pięć", "sześć", "siedem", "osiem", "dziewięć",
];

const TEENS: [&str; 10] = [
    "dziesięć",
    "jedenaście",
    "dwanaście",
    "trzynaście",
    "czternaście",
    "piętnaście",
    "szesnaście",
    "siedemnaście",
    "osiemnaście",
    "dziewiętnaście",
];

const TENS: [&str; 10] = [
    "",
    "",
    "dwadzieścia",
    "trzydzieści",
    "czterdzieści",
    "pięćdziesiąt",
    "sześćdziesiąt",
    "siedemdziesiąt",
    "osiemdziesiąt",
    "dziewięćdziesiąt",
];

const HUNDREDS: [&str; 10] = [
    "", "sto", "dwieście", "trzysta", "czterysta", "pięćset", "sześćset", "siedemset",
    "osiemset", "dziewięćset",
];

/// Long scale, 10^3 up to 10^27 (enough for any `Decimal`).
const SCALES: [PluralForms; 9] = [
    PluralForms::new("tysiąc", "tysiące", "tysięcy"),
    PluralForms::new("milion", "miliony", "milionów"),
    PluralForms::new("miliard", "miliardy", "miliardów"),
    PluralForms::new("bilion", "biliony", "bilionów"),
    PluralForms::new("biliard", "biliardy", "biliardów"),
    PluralForms::new("trylion", "tryliony", "trylionów"),
    PluralForms::new("tryliard", "tryliardy", "tryliardów"),
    PluralForms::new("kwadrylion", "kwadryliony", "kwadrylionów"),
    PluralForms::new("kwadryliard", "kwadryliardy", "kwadryliardów"),
];

/// `1` is singular; endings 2–4 take the few form unless the number ends
/// in 12–14; everything else, zero included, takes the many form.
pub fn plural_category(n: u128) -> PluralCategory {
    if n == 1 {
        return PluralCategory::One;
    }
    if (12..=14).contains(&(n % 100)) {
        return PluralCategory::Many;
    }
    match n % 10 {
        2..=4 => PluralCategory::Few,
        _ => PluralCategory::Many,
    }
}

pub static LEXICON: Lexicon = Lexicon {
    zero: "zero",
    units: UNITS,
    teens: TEENS,
    tens: TENS,
    hundreds: HUNDREDS,
    scales: &SCALES,
    currency: PluralForms::new("złoty", "złote", "złotych"),
    currency_code: "PLN",
    plural: plural_category,
};
